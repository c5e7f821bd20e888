//! Common Type Aliases
//!
//! Shared identifier and scalar aliases used across the engine.

/// Photo identifier (ULID string)
pub type PhotoId = String;

/// Analysis identifier (ULID string)
pub type AnalysisId = String;

/// Suggestion identifier (ULID string)
pub type SuggestionId = String;

/// Processed media identifier (ULID string)
pub type MediaId = String;

/// External transformation job identifier (opaque, provider-assigned)
pub type JobId = String;

/// Time duration in seconds
pub type TimeSec = f64;

/// Generates a new ULID-based identifier.
pub fn new_id() -> String {
    ulid::Ulid::new().to_string()
}

/// Current timestamp in RFC 3339 format.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
