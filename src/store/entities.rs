//! Persisted Entity Models
//!
//! The four entity kinds owned by the media store: Photo, Analysis,
//! Suggestion, and ProcessedMedia. A Photo cascade-owns everything derived
//! from it; a Suggestion owns at most one ProcessedMedia result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{new_id, now_rfc3339, AnalysisId, JobId, MediaId, PhotoId, SuggestionId, TimeSec};

// =============================================================================
// Transformation Kind
// =============================================================================

/// Kind of transformation a suggestion proposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationKind {
    /// Practical correction (exposure fix, object removal, sharpening)
    UtilityEdit,
    /// Artistic restyle producing a still image
    CreativeTransform,
    /// Image-to-video animation
    VideoAnimation,
}

impl TransformationKind {
    /// Stable wire/database string
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformationKind::UtilityEdit => "utility_edit",
            TransformationKind::CreativeTransform => "creative_transform",
            TransformationKind::VideoAnimation => "video_animation",
        }
    }

    /// Parses the wire/database string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "utility_edit" => Some(TransformationKind::UtilityEdit),
            "creative_transform" => Some(TransformationKind::CreativeTransform),
            "video_animation" => Some(TransformationKind::VideoAnimation),
            _ => None,
        }
    }

    /// True for kinds whose output is a video
    pub fn is_video(&self) -> bool {
        matches!(self, TransformationKind::VideoAnimation)
    }

    /// Default target model when the suggestion response names none
    pub fn default_model(&self) -> &'static str {
        match self {
            TransformationKind::UtilityEdit => "flux-kontext-dev",
            TransformationKind::CreativeTransform => "flux-kontext-pro",
            TransformationKind::VideoAnimation => "kling-v1.6-standard",
        }
    }
}

impl std::fmt::Display for TransformationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Suggestion Parameters
// =============================================================================

/// Model parameters carried by a suggestion.
///
/// Tagged per target-model family: image-edit models take a prompt, video
/// models take a short style label. Anything else stays an opaque key-value
/// map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuggestionParams {
    /// Free-text edit prompt for image-to-image models
    Prompt { value: String },
    /// Short style label for image-to-video models
    Style { value: String },
    /// Opaque model-specific parameters
    Opaque { values: BTreeMap<String, String> },
}

impl SuggestionParams {
    pub fn prompt(value: impl Into<String>) -> Self {
        SuggestionParams::Prompt {
            value: value.into(),
        }
    }

    pub fn style(value: impl Into<String>) -> Self {
        SuggestionParams::Style {
            value: value.into(),
        }
    }

    /// Style label, if this is a style parameter
    pub fn style_value(&self) -> Option<&str> {
        match self {
            SuggestionParams::Style { value } => Some(value),
            _ => None,
        }
    }

    /// Prompt text, if this is a prompt parameter
    pub fn prompt_value(&self) -> Option<&str> {
        match self {
            SuggestionParams::Prompt { value } => Some(value),
            _ => None,
        }
    }

    /// Flattens into the key-value form submitted to the media API
    pub fn to_map(&self) -> BTreeMap<String, String> {
        match self {
            SuggestionParams::Prompt { value } => {
                BTreeMap::from([("prompt".to_string(), value.clone())])
            }
            SuggestionParams::Style { value } => {
                BTreeMap::from([("style".to_string(), value.clone())])
            }
            SuggestionParams::Opaque { values } => values.clone(),
        }
    }
}

// =============================================================================
// Media Kind and Status
// =============================================================================

/// Kind of processed media output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// Lifecycle status of a processed media record.
///
/// Transitions are monotone: pending → processing → one terminal state.
/// Terminal states never regress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl MediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Pending => "pending",
            MediaStatus::Processing => "processing",
            MediaStatus::Completed => "completed",
            MediaStatus::Failed => "failed",
            MediaStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(MediaStatus::Pending),
            "processing" => Some(MediaStatus::Processing),
            "completed" => Some(MediaStatus::Completed),
            "failed" => Some(MediaStatus::Failed),
            "cancelled" => Some(MediaStatus::Cancelled),
            _ => None,
        }
    }

    /// True once no further status change is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MediaStatus::Completed | MediaStatus::Failed | MediaStatus::Cancelled
        )
    }

    /// Whether moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: MediaStatus) -> bool {
        match self {
            MediaStatus::Pending => next != MediaStatus::Pending,
            MediaStatus::Processing => next.is_terminal(),
            _ => false,
        }
    }
}

// =============================================================================
// Photo
// =============================================================================

/// An immutable original photo plus derived-state flags
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: PhotoId,
    pub filename: String,
    /// Original image bytes (immutable after creation)
    #[serde(skip)]
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub byte_size: u64,
    /// Set once an Analysis has been attached
    pub analysis_completed: bool,
    pub created_at: String,
}

impl Photo {
    /// Creates a new photo entity; dimensions are probed by the store.
    pub fn new(data: Vec<u8>, filename: impl Into<String>, width: u32, height: u32) -> Self {
        let byte_size = data.len() as u64;
        Self {
            id: new_id(),
            filename: filename.into(),
            data,
            width,
            height,
            byte_size,
            analysis_completed: false,
            created_at: now_rfc3339(),
        }
    }
}

// =============================================================================
// Analysis
// =============================================================================

/// Structured scene understanding for one photo (one-to-one)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: AnalysisId,
    pub photo_id: PhotoId,
    /// Detected objects, in model order
    pub objects: Vec<String>,
    pub scene_description: String,
    pub lighting: String,
    pub composition: String,
    pub mood: String,
    pub style: String,
    pub technical_quality: String,
    pub improvements: Vec<String>,
    /// Overall confidence in [0, 1]
    pub confidence: f64,
    /// True when synthesized by the local fallback pipeline
    pub mock: bool,
    /// Original failure text when this analysis was synthesized after an error
    pub fallback_error: Option<String>,
    pub created_at: String,
}

impl Analysis {
    pub fn new(photo_id: impl Into<PhotoId>) -> Self {
        Self {
            id: new_id(),
            photo_id: photo_id.into(),
            objects: Vec::new(),
            scene_description: String::new(),
            lighting: String::new(),
            composition: String::new(),
            mood: String::new(),
            style: String::new(),
            technical_quality: String::new(),
            improvements: Vec::new(),
            confidence: 0.0,
            mock: false,
            fallback_error: None,
            created_at: now_rfc3339(),
        }
    }
}

// =============================================================================
// Suggestion
// =============================================================================

/// One proposed transformation a user may apply to a photo
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: SuggestionId,
    pub photo_id: PhotoId,
    pub kind: TransformationKind,
    pub title: String,
    pub description: String,
    pub reasoning: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Opaque generative-media model/pipeline identifier
    pub target_model: String,
    pub params: SuggestionParams,
    pub estimated_duration_sec: TimeSec,
    /// Zero-based, contiguous per photo; defines display order
    pub order_index: u32,
    /// True when synthesized by the local fallback pipeline
    pub mock: bool,
    pub created_at: String,
}

impl Suggestion {
    pub fn new(
        photo_id: impl Into<PhotoId>,
        kind: TransformationKind,
        title: impl Into<String>,
        params: SuggestionParams,
    ) -> Self {
        Self {
            id: new_id(),
            photo_id: photo_id.into(),
            kind,
            title: title.into(),
            description: String::new(),
            reasoning: String::new(),
            confidence: 0.8,
            target_model: kind.default_model().to_string(),
            params,
            estimated_duration_sec: 15.0,
            order_index: 0,
            mock: false,
            created_at: now_rfc3339(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_target_model(mut self, model: impl Into<String>) -> Self {
        self.target_model = model.into();
        self
    }

    pub fn with_estimated_duration(mut self, seconds: TimeSec) -> Self {
        self.estimated_duration_sec = seconds;
        self
    }

    pub fn as_mock(mut self) -> Self {
        self.mock = true;
        self
    }

    /// Output media kind this suggestion produces
    pub fn media_kind(&self) -> MediaKind {
        if self.kind.is_video() {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

// =============================================================================
// Processed Media
// =============================================================================

/// Final payload attached when a media record completes
#[derive(Debug, Clone, Default)]
pub struct MediaPayload {
    pub data: Vec<u8>,
    pub thumbnail: Option<Vec<u8>>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Required for video output, absent for images
    pub duration_sec: Option<TimeSec>,
}

/// Output of one transformation job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedMedia {
    pub id: MediaId,
    pub photo_id: PhotoId,
    /// Absent when produced outside suggestion context (mock fallback)
    pub suggestion_id: Option<SuggestionId>,
    pub kind: MediaKind,
    pub status: MediaStatus,
    /// Present iff status is Completed
    #[serde(skip)]
    pub media_data: Option<Vec<u8>>,
    #[serde(skip)]
    pub thumbnail_data: Option<Vec<u8>>,
    pub filename: String,
    pub byte_size: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Present iff kind is Video
    pub duration_sec: Option<TimeSec>,
    /// Processing progress in [0, 1], monotone within one job
    pub progress: f64,
    /// Present only when status is Failed
    pub error_text: Option<String>,
    /// External job identifier from the media provider
    pub job_id: Option<JobId>,
    pub favorited: bool,
    pub shared: bool,
    pub share_count: u32,
    /// Diagnostic tags (e.g. mock: true, fallback error text)
    pub metadata: BTreeMap<String, String>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl ProcessedMedia {
    pub fn new(
        photo_id: impl Into<PhotoId>,
        suggestion_id: Option<SuggestionId>,
        kind: MediaKind,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            photo_id: photo_id.into(),
            suggestion_id,
            kind,
            status: MediaStatus::Pending,
            media_data: None,
            thumbnail_data: None,
            filename: filename.into(),
            byte_size: 0,
            width: None,
            height: None,
            duration_sec: None,
            progress: 0.0,
            error_text: None,
            job_id: None,
            favorited: false,
            shared: false,
            share_count: 0,
            metadata: BTreeMap::new(),
            created_at: now_rfc3339(),
            completed_at: None,
        }
    }

    /// True once the record has reached a terminal status
    pub fn is_done(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // TransformationKind Tests
    // ========================================================================

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            TransformationKind::UtilityEdit,
            TransformationKind::CreativeTransform,
            TransformationKind::VideoAnimation,
        ] {
            assert_eq!(TransformationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TransformationKind::parse("unknown"), None);
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&TransformationKind::VideoAnimation).unwrap(),
            "\"video_animation\""
        );
        assert_eq!(
            serde_json::from_str::<TransformationKind>("\"utility_edit\"").unwrap(),
            TransformationKind::UtilityEdit
        );
    }

    #[test]
    fn test_kind_default_models() {
        assert_eq!(
            TransformationKind::UtilityEdit.default_model(),
            "flux-kontext-dev"
        );
        assert!(TransformationKind::VideoAnimation.is_video());
        assert!(!TransformationKind::CreativeTransform.is_video());
    }

    // ========================================================================
    // SuggestionParams Tests
    // ========================================================================

    #[test]
    fn test_params_roundtrip() {
        let params = SuggestionParams::style("dreamy slow zoom");
        let json = serde_json::to_string(&params).unwrap();
        let parsed: SuggestionParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params, parsed);

        let opaque = SuggestionParams::Opaque {
            values: BTreeMap::from([
                ("strength".to_string(), "0.6".to_string()),
                ("seed".to_string(), "42".to_string()),
            ]),
        };
        let json = serde_json::to_string(&opaque).unwrap();
        let parsed: SuggestionParams = serde_json::from_str(&json).unwrap();
        assert_eq!(opaque, parsed);
    }

    #[test]
    fn test_params_accessors() {
        let style = SuggestionParams::style("cinematic");
        assert_eq!(style.style_value(), Some("cinematic"));
        assert_eq!(style.prompt_value(), None);

        let prompt = SuggestionParams::prompt("remove the lamp post");
        assert_eq!(prompt.prompt_value(), Some("remove the lamp post"));
        assert_eq!(prompt.to_map().get("prompt").unwrap(), "remove the lamp post");
    }

    // ========================================================================
    // MediaStatus Tests
    // ========================================================================

    #[test]
    fn test_status_transitions() {
        use MediaStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Cancelled));

        // Terminal states never regress.
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Pending));
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            MediaStatus::Pending,
            MediaStatus::Processing,
            MediaStatus::Completed,
            MediaStatus::Failed,
            MediaStatus::Cancelled,
        ] {
            assert_eq!(MediaStatus::parse(status.as_str()), Some(status));
        }
    }

    // ========================================================================
    // Entity Construction Tests
    // ========================================================================

    #[test]
    fn test_photo_new() {
        let photo = Photo::new(vec![1, 2, 3], "beach.jpg", 3000, 2000);
        assert!(!photo.id.is_empty());
        assert_eq!(photo.byte_size, 3);
        assert_eq!(photo.width, 3000);
        assert!(!photo.analysis_completed);
    }

    #[test]
    fn test_suggestion_builder() {
        let suggestion = Suggestion::new(
            "photo-1",
            TransformationKind::VideoAnimation,
            "Bring it to life",
            SuggestionParams::style("gentle parallax"),
        )
        .with_confidence(1.4)
        .with_estimated_duration(30.0)
        .as_mock();

        assert_eq!(suggestion.confidence, 1.0); // clamped
        assert_eq!(suggestion.target_model, "kling-v1.6-standard");
        assert_eq!(suggestion.media_kind(), MediaKind::Video);
        assert!(suggestion.mock);
    }

    #[test]
    fn test_processed_media_new() {
        let media = ProcessedMedia::new("photo-1", None, MediaKind::Image, "out.jpg");
        assert_eq!(media.status, MediaStatus::Pending);
        assert!(media.media_data.is_none());
        assert!(!media.is_done());
        assert_eq!(media.share_count, 0);
    }
}
