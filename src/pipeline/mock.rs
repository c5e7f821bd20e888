//! Deterministic Fallback Pipeline
//!
//! Local synthesis used when a client call fails: a fixed example analysis,
//! a fixed suggestion batch, and a passthrough media payload built from the
//! original photo bytes. Every synthesized record is tagged `mock` and keeps
//! the real failure text for diagnostics.

use crate::store::{
    Analysis, MediaPayload, Photo, Suggestion, SuggestionParams, TransformationKind,
};
use crate::PhotoId;

/// Metadata key marking a record as synthesized by the fallback pipeline
pub const MOCK_TAG_KEY: &str = "mock";

/// Metadata key carrying the original failure text on a fallback record
pub const FALLBACK_ERROR_KEY: &str = "fallback_error";

/// Fixed example analysis standing in for a failed analysis call.
pub fn mock_analysis(photo_id: impl Into<PhotoId>, error_text: Option<String>) -> Analysis {
    let mut analysis = Analysis::new(photo_id);
    analysis.objects = vec![
        "subject".to_string(),
        "background".to_string(),
        "natural light".to_string(),
    ];
    analysis.scene_description =
        "A well-composed photograph with a clear subject against a softer background.".to_string();
    analysis.lighting = "Balanced natural lighting with soft shadows.".to_string();
    analysis.composition = "Subject placed near a rule-of-thirds intersection.".to_string();
    analysis.mood = "calm".to_string();
    analysis.style = "natural".to_string();
    analysis.technical_quality = "Good sharpness and exposure overall.".to_string();
    analysis.improvements = vec![
        "Try a subtle exposure lift".to_string(),
        "Experiment with a creative restyle".to_string(),
    ];
    analysis.confidence = 0.5;
    analysis.mock = true;
    analysis.fallback_error = error_text;
    analysis
}

/// Fixed five-entry suggestion batch standing in for a failed suggestion
/// call. One video entry, four image entries, all tagged mock.
pub fn mock_suggestions(photo_id: &str) -> Vec<Suggestion> {
    vec![
        Suggestion::new(
            photo_id,
            TransformationKind::UtilityEdit,
            "Enhance Lighting",
            SuggestionParams::prompt("Balance the exposure and gently lift the shadows"),
        )
        .with_description("Even out the exposure for a cleaner look.")
        .with_reasoning("Most photos benefit from a light exposure pass.")
        .with_confidence(0.7)
        .as_mock(),
        Suggestion::new(
            photo_id,
            TransformationKind::UtilityEdit,
            "Sharpen Details",
            SuggestionParams::prompt("Increase local contrast and sharpen fine detail"),
        )
        .with_description("Bring out fine texture across the frame.")
        .with_reasoning("Extra clarity makes the subject stand out.")
        .with_confidence(0.65)
        .as_mock(),
        Suggestion::new(
            photo_id,
            TransformationKind::CreativeTransform,
            "Oil Painting",
            SuggestionParams::prompt("Repaint the scene as a classical oil painting"),
        )
        .with_description("Reimagine the photo as a classical oil painting.")
        .with_reasoning("Painterly texture suits a calm composition.")
        .with_confidence(0.6)
        .as_mock(),
        Suggestion::new(
            photo_id,
            TransformationKind::CreativeTransform,
            "Vintage Film",
            SuggestionParams::prompt("Apply a warm faded vintage film look with subtle grain"),
        )
        .with_description("Give the photo a warm analog film character.")
        .with_reasoning("A film look adds nostalgic warmth.")
        .with_confidence(0.6)
        .as_mock(),
        Suggestion::new(
            photo_id,
            TransformationKind::VideoAnimation,
            "Gentle Motion",
            SuggestionParams::style("cinematic"),
        )
        .with_description("Animate the photo with slow cinematic camera motion.")
        .with_reasoning("Subtle motion brings a still scene to life.")
        .with_confidence(0.6)
        .with_estimated_duration(30.0)
        .as_mock(),
    ]
}

/// Passthrough payload standing in for a failed transform: the original
/// photo bytes, unmodified. Video suggestions get their estimated duration
/// so the completed record stays valid.
pub fn mock_payload(photo: &Photo, suggestion: &Suggestion) -> MediaPayload {
    MediaPayload {
        data: photo.data.clone(),
        thumbnail: None,
        width: Some(photo.width),
        height: Some(photo.height),
        duration_sec: suggestion
            .kind
            .is_video()
            .then_some(suggestion.estimated_duration_sec),
    }
}
