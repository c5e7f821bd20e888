//! Transformation Suggestion Client
//!
//! Generates a bounded, policy-constrained batch of transformation proposals
//! from a photo analysis. The distribution policy is enforced after parsing:
//! exactly one video suggestion survives, a deterministic fallback video is
//! synthesized when the model offers none, and the batch never exceeds four
//! entries.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::ai::analysis::AnalysisResult;
use crate::ai::gemini::{self, GeminiClient, GenerationOptions, Part};
use crate::config::ProviderConfig;
use crate::store::{Suggestion, SuggestionParams, TransformationKind};
use crate::{CoreError, CoreResult, PhotoId, TimeSec};

// =============================================================================
// Policy Constants
// =============================================================================

/// Maximum batch size after filtering
const MAX_SUGGESTIONS: usize = 4;

/// Confidence when no value is provided
const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Estimated duration when no value is provided (seconds)
const DEFAULT_DURATION_SEC: TimeSec = 15.0;

/// Confidence assigned to the synthesized fallback video suggestion
const FALLBACK_VIDEO_CONFIDENCE: f64 = 0.75;

/// Estimated duration of the synthesized fallback video suggestion
const FALLBACK_VIDEO_DURATION_SEC: TimeSec = 30.0;

/// Style label used when the analysis offers none
const FALLBACK_STYLE: &str = "cinematic";

// =============================================================================
// Result Type
// =============================================================================

/// One transformation proposal from the suggestion call
#[derive(Debug, Clone)]
pub struct SuggestionResult {
    pub kind: TransformationKind,
    pub title: String,
    pub description: String,
    pub reasoning: String,
    pub confidence: f64,
    pub target_model: String,
    pub params: SuggestionParams,
    pub estimated_duration_sec: TimeSec,
}

impl SuggestionResult {
    /// Converts into a persistable Suggestion entity. The store assigns the
    /// final order index.
    pub fn to_suggestion(&self, photo_id: impl Into<PhotoId>) -> Suggestion {
        Suggestion::new(photo_id, self.kind, self.title.clone(), self.params.clone())
            .with_description(self.description.clone())
            .with_reasoning(self.reasoning.clone())
            .with_confidence(self.confidence)
            .with_target_model(self.target_model.clone())
            .with_estimated_duration(self.estimated_duration_sec)
    }
}

/// Seam for the suggestion call, so pipelines can take test doubles
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// Generates a batch of transformation proposals from an analysis.
    async fn suggest(&self, analysis: &AnalysisResult) -> CoreResult<Vec<SuggestionResult>>;
}

// =============================================================================
// Wire Format
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SuggestionsEnvelope {
    suggestions: Vec<SuggestionEntry>,
}

/// Loosely-typed suggestion entry as the model returns it.
///
/// Confidence and duration accept integer or real encodings (both land in
/// f64); every field is optional so one bad entry never fails the batch.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SuggestionEntry {
    kind: Option<String>,
    title: Option<String>,
    description: Option<String>,
    reasoning: Option<String>,
    confidence: Option<f64>,
    target_model: Option<String>,
    parameters: BTreeMap<String, serde_json::Value>,
    estimated_duration: Option<f64>,
}

impl SuggestionEntry {
    /// Validates and normalizes one entry, or drops it (`None`).
    fn normalize(self) -> Option<SuggestionResult> {
        let kind = TransformationKind::parse(self.kind.as_deref()?)?;
        let title = non_empty(self.title)?;
        let description = non_empty(self.description)?;
        let reasoning = non_empty(self.reasoning)?;

        let params = if kind.is_video() {
            // A video suggestion without a usable style is treated as absent.
            let style = self
                .parameters
                .get("style")
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())?;
            SuggestionParams::style(style)
        } else if let Some(prompt) = self
            .parameters
            .get("prompt")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            SuggestionParams::prompt(prompt)
        } else if !self.parameters.is_empty() {
            SuggestionParams::Opaque {
                values: self
                    .parameters
                    .iter()
                    .map(|(k, v)| {
                        let s = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                        (k.clone(), s)
                    })
                    .collect(),
            }
        } else {
            // No parameters at all: the description doubles as the edit prompt.
            SuggestionParams::prompt(description.clone())
        };

        let target_model = self
            .target_model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| kind.default_model().to_string());

        Some(SuggestionResult {
            kind,
            title,
            description,
            reasoning,
            confidence: self.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0),
            target_model,
            params,
            estimated_duration_sec: self.estimated_duration.unwrap_or(DEFAULT_DURATION_SEC),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

// =============================================================================
// Suggestion Client
// =============================================================================

/// Production suggestion client backed by the Gemini transport
pub struct SuggestionClient {
    transport: GeminiClient,
    synthesize_fallback: bool,
}

impl SuggestionClient {
    /// Sampling options for suggestion calls: creative temperature, larger
    /// output budget than analysis
    const OPTIONS: GenerationOptions = GenerationOptions {
        temperature: 0.8,
        max_output_tokens: 4096,
    };

    pub fn new(config: &ProviderConfig) -> CoreResult<Self> {
        Ok(Self {
            transport: GeminiClient::new(config)?,
            synthesize_fallback: true,
        })
    }

    /// Disables fallback video synthesis. With no fallback, a batch that
    /// filters down to nothing surfaces `EmptyResult`.
    pub fn without_fallback(mut self) -> Self {
        self.synthesize_fallback = false;
        self
    }

    fn build_prompt(analysis: &AnalysisResult) -> String {
        format!(
            "You are a photo transformation assistant. Based on this photo analysis, propose \
             transformations the user could apply.\n\
             \n\
             Analysis:\n\
             - Objects: {}\n\
             - Scene: {}\n\
             - Lighting: {}\n\
             - Composition: {}\n\
             - Mood: {}\n\
             - Style: {}\n\
             - Technical quality: {}\n\
             - Suggested improvements: {}\n\
             \n\
             Propose exactly one \"video_animation\" suggestion and two or three image \
             suggestions of kind \"utility_edit\" or \"creative_transform\".\n\
             Respond with a single JSON object: {{\"suggestions\": [...]}}. Each suggestion \
             must have: \"kind\", \"title\", \"description\", \"reasoning\", \"confidence\" \
             (0 to 1), \"target_model\", \"parameters\" (for image kinds a \"prompt\" string; \
             for video_animation a single short \"style\" label), and \"estimated_duration\" \
             in seconds. JSON only, no surrounding prose.",
            analysis.objects.join(", "),
            analysis.scene_description,
            analysis.lighting,
            analysis.composition,
            analysis.mood,
            analysis.style,
            analysis.technical_quality,
            analysis.improvements.join("; "),
        )
    }

    /// Deterministic video suggestion used when the model proposes none.
    fn fallback_video(analysis: &AnalysisResult) -> SuggestionResult {
        let style = analysis.style.trim();
        let style = if style.is_empty() { FALLBACK_STYLE } else { style };

        SuggestionResult {
            kind: TransformationKind::VideoAnimation,
            title: "Bring It to Life".to_string(),
            description: "Animate the photo into a short ambient video clip.".to_string(),
            reasoning: "Every photo benefits from at least one motion option.".to_string(),
            confidence: FALLBACK_VIDEO_CONFIDENCE,
            target_model: TransformationKind::VideoAnimation.default_model().to_string(),
            params: SuggestionParams::style(style),
            estimated_duration_sec: FALLBACK_VIDEO_DURATION_SEC,
        }
    }

    /// Parses a model response and applies the distribution policy:
    /// (a) only the first video-kind suggestion is kept,
    /// (b) image-kind entries are capped at three, so the video slot can
    ///     never be crowded out of the four-entry batch,
    /// (c) a fallback video is synthesized when none survive.
    fn parse_and_filter(
        text: &str,
        analysis: &AnalysisResult,
        synthesize_fallback: bool,
    ) -> CoreResult<Vec<SuggestionResult>> {
        let json = gemini::extract_json(text)?;
        let envelope: SuggestionsEnvelope = serde_json::from_str(json).map_err(|e| {
            CoreError::MalformedResponse(format!("Suggestions JSON invalid: {}", e))
        })?;

        let total = envelope.suggestions.len();
        let mut results = Vec::new();
        let mut seen_video = false;
        let mut image_count = 0;

        for entry in envelope.suggestions {
            let Some(result) = entry.normalize() else {
                continue;
            };
            if result.kind.is_video() {
                if seen_video {
                    // Policy (a): only the first video survives.
                    continue;
                }
                seen_video = true;
            } else {
                // Policy (b): one slot is always reserved for the video.
                if image_count >= MAX_SUGGESTIONS - 1 {
                    continue;
                }
                image_count += 1;
            }
            results.push(result);
        }

        debug!(parsed = results.len(), total, "suggestion entries survived filtering");

        if !seen_video {
            if synthesize_fallback {
                // Policy (c): always offer exactly one motion option.
                results.push(Self::fallback_video(analysis));
            } else if results.is_empty() {
                return Err(CoreError::EmptyResult(
                    "No suggestions survived filtering".to_string(),
                ));
            }
        }

        Ok(results)
    }
}

#[async_trait]
impl SuggestionProvider for SuggestionClient {
    async fn suggest(&self, analysis: &AnalysisResult) -> CoreResult<Vec<SuggestionResult>> {
        let prompt = Self::build_prompt(analysis);
        let text = self
            .transport
            .generate(vec![Part::text(prompt)], Self::OPTIONS)
            .await?;

        Self::parse_and_filter(&text, analysis, self.synthesize_fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            style: "impressionist".to_string(),
            scene_description: "A park in autumn.".to_string(),
            ..Default::default()
        }
    }

    fn entry_json(kind: &str, title: &str, params: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "kind": kind,
            "title": title,
            "description": format!("{} description", title),
            "reasoning": "it would look good",
            "confidence": 0.9,
            "parameters": params,
            "estimated_duration": 20
        })
    }

    fn response_with(entries: Vec<serde_json::Value>) -> String {
        serde_json::json!({ "suggestions": entries }).to_string()
    }

    // ========================================================================
    // Parsing Tests
    // ========================================================================

    #[test]
    fn test_well_formed_batch() {
        let text = response_with(vec![
            entry_json("utility_edit", "Fix exposure", serde_json::json!({"prompt": "lift shadows"})),
            entry_json("creative_transform", "Oil painting", serde_json::json!({"prompt": "oil style"})),
            entry_json("video_animation", "Falling leaves", serde_json::json!({"style": "drifting leaves"})),
        ]);

        let results = SuggestionClient::parse_and_filter(&text, &analysis(), true).unwrap();
        assert_eq!(results.len(), 3);

        let videos: Vec<_> = results.iter().filter(|r| r.kind.is_video()).collect();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].params.style_value(), Some("drifting leaves"));
        assert_eq!(results[0].estimated_duration_sec, 20.0); // integer accepted
    }

    #[test]
    fn test_missing_required_field_drops_entry() {
        let mut bad = entry_json("utility_edit", "No reasoning", serde_json::json!({}));
        bad.as_object_mut().unwrap().remove("reasoning");

        let text = response_with(vec![
            bad,
            entry_json("creative_transform", "Kept", serde_json::json!({"prompt": "p"})),
            entry_json("video_animation", "Video", serde_json::json!({"style": "slow pan"})),
        ]);

        let results = SuggestionClient::parse_and_filter(&text, &analysis(), true).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Kept");
    }

    #[test]
    fn test_defaults_applied() {
        let mut sparse = entry_json("utility_edit", "Sparse", serde_json::json!({}));
        {
            let obj = sparse.as_object_mut().unwrap();
            obj.remove("confidence");
            obj.remove("estimated_duration");
        }
        let text = response_with(vec![
            sparse,
            entry_json("video_animation", "Video", serde_json::json!({"style": "zoom"})),
        ]);

        let results = SuggestionClient::parse_and_filter(&text, &analysis(), true).unwrap();
        let sparse = &results[0];
        assert_eq!(sparse.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(sparse.estimated_duration_sec, DEFAULT_DURATION_SEC);
        assert_eq!(sparse.target_model, "flux-kontext-dev");
        // With no parameters, the description doubles as the prompt.
        assert_eq!(sparse.params.prompt_value(), Some("Sparse description"));
    }

    // ========================================================================
    // Video Policy Tests
    // ========================================================================

    #[test]
    fn test_two_videos_keeps_first() {
        let text = response_with(vec![
            entry_json("video_animation", "First video", serde_json::json!({"style": "first"})),
            entry_json("utility_edit", "Edit", serde_json::json!({"prompt": "p"})),
            entry_json("video_animation", "Second video", serde_json::json!({"style": "second"})),
        ]);

        let results = SuggestionClient::parse_and_filter(&text, &analysis(), true).unwrap();
        let videos: Vec<_> = results.iter().filter(|r| r.kind.is_video()).collect();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].title, "First video");
    }

    #[test]
    fn test_zero_videos_synthesizes_fallback() {
        let text = response_with(vec![
            entry_json("utility_edit", "Edit", serde_json::json!({"prompt": "p"})),
            entry_json("creative_transform", "Restyle", serde_json::json!({"prompt": "q"})),
        ]);

        let results = SuggestionClient::parse_and_filter(&text, &analysis(), true).unwrap();
        assert_eq!(results.len(), 3);

        let video = results.iter().find(|r| r.kind.is_video()).unwrap();
        assert_eq!(video.confidence, FALLBACK_VIDEO_CONFIDENCE);
        assert_eq!(video.estimated_duration_sec, FALLBACK_VIDEO_DURATION_SEC);
        // Style comes from the analysis style assessment.
        assert_eq!(video.params.style_value(), Some("impressionist"));
    }

    #[test]
    fn test_fallback_default_style_when_analysis_blank() {
        let text = response_with(vec![entry_json(
            "utility_edit",
            "Edit",
            serde_json::json!({"prompt": "p"}),
        )]);

        let blank = AnalysisResult::default();
        let results = SuggestionClient::parse_and_filter(&text, &blank, true).unwrap();
        let video = results.iter().find(|r| r.kind.is_video()).unwrap();
        assert_eq!(video.params.style_value(), Some(FALLBACK_STYLE));
    }

    #[test]
    fn test_video_without_style_treated_as_absent() {
        // The only video lacks a style: it is dropped, and the fallback
        // replaces it.
        let text = response_with(vec![
            entry_json("video_animation", "Styleless", serde_json::json!({})),
            entry_json("utility_edit", "Edit", serde_json::json!({"prompt": "p"})),
        ]);

        let results = SuggestionClient::parse_and_filter(&text, &analysis(), true).unwrap();
        let videos: Vec<_> = results.iter().filter(|r| r.kind.is_video()).collect();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].confidence, FALLBACK_VIDEO_CONFIDENCE);
    }

    #[test]
    fn test_blank_style_also_rejected() {
        let text = response_with(vec![
            entry_json("video_animation", "Blank style", serde_json::json!({"style": "   "})),
            entry_json("utility_edit", "Edit", serde_json::json!({"prompt": "p"})),
        ]);

        let results = SuggestionClient::parse_and_filter(&text, &analysis(), true).unwrap();
        let video = results.iter().find(|r| r.kind.is_video()).unwrap();
        assert_eq!(video.confidence, FALLBACK_VIDEO_CONFIDENCE);
    }

    // ========================================================================
    // Size and Error Tests
    // ========================================================================

    #[test]
    fn test_truncation_preserves_order() {
        let text = response_with(vec![
            entry_json("video_animation", "V", serde_json::json!({"style": "s"})),
            entry_json("utility_edit", "A", serde_json::json!({"prompt": "a"})),
            entry_json("utility_edit", "B", serde_json::json!({"prompt": "b"})),
            entry_json("creative_transform", "C", serde_json::json!({"prompt": "c"})),
            entry_json("creative_transform", "D", serde_json::json!({"prompt": "d"})),
            entry_json("utility_edit", "E", serde_json::json!({"prompt": "e"})),
        ]);

        let results = SuggestionClient::parse_and_filter(&text, &analysis(), true).unwrap();
        assert_eq!(results.len(), MAX_SUGGESTIONS);
        let titles: Vec<_> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["V", "A", "B", "C"]);
    }

    #[test]
    fn test_image_heavy_batch_still_gets_video() {
        // Four valid image entries, no video: only three images survive and
        // the synthesized video fills the reserved slot.
        let text = response_with(vec![
            entry_json("utility_edit", "A", serde_json::json!({"prompt": "a"})),
            entry_json("utility_edit", "B", serde_json::json!({"prompt": "b"})),
            entry_json("creative_transform", "C", serde_json::json!({"prompt": "c"})),
            entry_json("creative_transform", "D", serde_json::json!({"prompt": "d"})),
        ]);

        let results = SuggestionClient::parse_and_filter(&text, &analysis(), true).unwrap();
        assert_eq!(results.len(), MAX_SUGGESTIONS);

        let videos: Vec<_> = results.iter().filter(|r| r.kind.is_video()).collect();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].params.style_value(), Some("impressionist"));

        let titles: Vec<_> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles[..3], ["A", "B", "C"]);
    }

    #[test]
    fn test_video_after_image_flood_survives() {
        // The model lists its one video last, after more images than fit.
        let text = response_with(vec![
            entry_json("utility_edit", "A", serde_json::json!({"prompt": "a"})),
            entry_json("utility_edit", "B", serde_json::json!({"prompt": "b"})),
            entry_json("creative_transform", "C", serde_json::json!({"prompt": "c"})),
            entry_json("creative_transform", "D", serde_json::json!({"prompt": "d"})),
            entry_json("video_animation", "Late video", serde_json::json!({"style": "slow pan"})),
        ]);

        let results = SuggestionClient::parse_and_filter(&text, &analysis(), true).unwrap();
        assert_eq!(results.len(), MAX_SUGGESTIONS);

        let videos: Vec<_> = results.iter().filter(|r| r.kind.is_video()).collect();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].title, "Late video");
    }

    #[test]
    fn test_unknown_kind_dropped() {
        let text = response_with(vec![
            entry_json("hologram", "Weird", serde_json::json!({})),
            entry_json("video_animation", "Video", serde_json::json!({"style": "s"})),
        ]);

        let results = SuggestionClient::parse_and_filter(&text, &analysis(), true).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Video");
    }

    #[test]
    fn test_empty_result_without_fallback() {
        let text = response_with(vec![]);
        let err = SuggestionClient::parse_and_filter(&text, &analysis(), false).unwrap_err();
        assert!(matches!(err, CoreError::EmptyResult(_)));
    }

    #[test]
    fn test_malformed_response() {
        let err =
            SuggestionClient::parse_and_filter("no json at all", &analysis(), true).unwrap_err();
        assert!(matches!(err, CoreError::MalformedResponse(_)));
    }

    #[test]
    fn test_prose_wrapped_response() {
        let inner = response_with(vec![entry_json(
            "video_animation",
            "Video",
            serde_json::json!({"style": "s"}),
        )]);
        let wrapped = format!("Here you go:\n```json\n{}\n```", inner);

        let results = SuggestionClient::parse_and_filter(&wrapped, &analysis(), true).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_to_suggestion_conversion() {
        let result = SuggestionResult {
            kind: TransformationKind::CreativeTransform,
            title: "Oil painting".to_string(),
            description: "desc".to_string(),
            reasoning: "why".to_string(),
            confidence: 0.85,
            target_model: "flux-kontext-pro".to_string(),
            params: SuggestionParams::prompt("oil on canvas"),
            estimated_duration_sec: 12.0,
        };

        let suggestion = result.to_suggestion("photo-1");
        assert_eq!(suggestion.photo_id, "photo-1");
        assert_eq!(suggestion.kind, TransformationKind::CreativeTransform);
        assert_eq!(suggestion.confidence, 0.85);
        assert!(!suggestion.mock);
    }
}
