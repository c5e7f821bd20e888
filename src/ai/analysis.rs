//! Photo Analysis Client
//!
//! Turns raw image bytes into structured scene understanding via one
//! vision-language call. Parsing is tolerant: absent fields default to empty
//! values, the call never fails on a missing optional field. Retry policy
//! lives in the orchestrator, not here.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ai::gemini::{self, GeminiClient, GenerationOptions, Part};
use crate::config::ProviderConfig;
use crate::store::Analysis;
use crate::{imaging, CoreResult, PhotoId};

/// Instructional prompt requesting the eight-field analysis schema
const ANALYSIS_PROMPT: &str = "\
Analyze this photograph and respond with a single JSON object using exactly \
these keys: \
\"objects\" (array of strings naming the detected objects, most prominent first), \
\"scene_description\" (one or two sentences), \
\"lighting\" (assessment of the light), \
\"composition\" (compositional notes), \
\"mood\" (a short emotional/mood tag), \
\"style\" (photographic style assessment), \
\"technical_quality\" (sharpness, noise, exposure notes), \
\"improvements\" (array of concrete improvement suggestions), \
\"confidence\" (number between 0 and 1). \
Respond with JSON only, no surrounding prose.";

/// Structured result of one analysis call.
///
/// Mirrors the persisted Analysis entity's fields; every field is defaulted
/// so a sparse model response still parses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisResult {
    pub objects: Vec<String>,
    pub scene_description: String,
    pub lighting: String,
    pub composition: String,
    pub mood: String,
    pub style: String,
    pub technical_quality: String,
    pub improvements: Vec<String>,
    pub confidence: f64,
}

impl AnalysisResult {
    /// Converts into a persistable Analysis entity for the given photo.
    pub fn to_analysis(&self, photo_id: impl Into<PhotoId>) -> Analysis {
        let mut analysis = Analysis::new(photo_id);
        analysis.objects = self.objects.clone();
        analysis.scene_description = self.scene_description.clone();
        analysis.lighting = self.lighting.clone();
        analysis.composition = self.composition.clone();
        analysis.mood = self.mood.clone();
        analysis.style = self.style.clone();
        analysis.technical_quality = self.technical_quality.clone();
        analysis.improvements = self.improvements.clone();
        analysis.confidence = self.confidence.clamp(0.0, 1.0);
        analysis
    }
}

/// Seam for the analysis call, so pipelines can take test doubles
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Analyzes an image, returning a fully-defaulted result or a typed error.
    async fn analyze(&self, image: &[u8]) -> CoreResult<AnalysisResult>;
}

/// Production analysis client backed by the Gemini transport
pub struct AnalysisClient {
    transport: GeminiClient,
}

impl AnalysisClient {
    /// Sampling options for analysis calls: low temperature, modest budget
    const OPTIONS: GenerationOptions = GenerationOptions {
        temperature: 0.4,
        max_output_tokens: 2048,
    };

    pub fn new(config: &ProviderConfig) -> CoreResult<Self> {
        Ok(Self {
            transport: GeminiClient::new(config)?,
        })
    }

    /// Parses model output text into a result, tolerating prose wrapping and
    /// missing fields.
    fn parse_response(text: &str) -> CoreResult<AnalysisResult> {
        let json = gemini::extract_json(text)?;
        let mut result: AnalysisResult = serde_json::from_str(json).map_err(|e| {
            crate::CoreError::MalformedResponse(format!("Analysis JSON invalid: {}", e))
        })?;
        result.confidence = result.confidence.clamp(0.0, 1.0);
        Ok(result)
    }
}

#[async_trait]
impl AnalysisProvider for AnalysisClient {
    async fn analyze(&self, image: &[u8]) -> CoreResult<AnalysisResult> {
        // Lossy re-encode keeps the upload small; quality 80 is visually
        // transparent for scene understanding.
        let jpeg = imaging::encode_jpeg(image, imaging::ANALYSIS_UPLOAD_QUALITY)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&jpeg);

        debug!(
            raw_bytes = image.len(),
            upload_bytes = jpeg.len(),
            "submitting photo for analysis"
        );

        let text = self
            .transport
            .generate(
                vec![
                    Part::text(ANALYSIS_PROMPT),
                    Part::inline_data("image/jpeg", encoded),
                ],
                Self::OPTIONS,
            )
            .await?;

        Self::parse_response(&text)
    }
}
