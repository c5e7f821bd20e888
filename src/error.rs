//! Photomorph Error Definitions
//!
//! Defines error types used throughout the engine.

use thiserror::Error;

use super::{MediaId, PhotoId, SuggestionId};

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Credential / Configuration Errors
    // =========================================================================
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    // =========================================================================
    // Image Errors
    // =========================================================================
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    // =========================================================================
    // Upstream AI Errors
    // =========================================================================
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),

    // =========================================================================
    // Store Errors
    // =========================================================================
    #[error("Photo not found: {0}")]
    PhotoNotFound(PhotoId),

    #[error("Suggestion not found: {0}")]
    SuggestionNotFound(SuggestionId),

    #[error("Media not found: {0}")]
    MediaNotFound(MediaId),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// True when the orchestrator should substitute the deterministic
    /// fallback pipeline rather than surfacing the failure to the user.
    /// Covers every way a provider call can fail, including an image the
    /// client could not re-encode for upload; store and programming errors
    /// are never masked.
    pub fn is_maskable(&self) -> bool {
        matches!(
            self,
            CoreError::Upstream(_)
                | CoreError::MalformedResponse(_)
                | CoreError::Timeout(_)
                | CoreError::Network(_)
                | CoreError::EmptyResult(_)
                | CoreError::MissingCredential(_)
                | CoreError::InvalidImage(_)
        )
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::Storage(e.to_string())
    }
}
