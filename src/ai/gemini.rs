//! Gemini Transport
//!
//! Shared HTTP transport for the generateContent endpoint used by both the
//! analysis and suggestion clients. Handles request construction, error
//! mapping, and extraction of JSON from prose-wrapped model output.

use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::{CoreError, CoreResult};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

/// One content part: either text or inline image data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    /// Text part
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    /// Inline base64-encoded media part
    pub fn inline_data(mime_type: impl Into<String>, base64_data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: base64_data.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

/// Sampling options for one generation call
#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

// =============================================================================
// Gemini Client
// =============================================================================

/// HTTP client for a generateContent-style vision-language endpoint
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Default model for both analysis and suggestion calls
    pub const DEFAULT_MODEL: &'static str = "gemini-2.5-flash";

    /// Default API base URL
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com/v1beta";

    /// Creates a client from provider config. The credential is checked
    /// eagerly: no client exists without a key.
    pub fn new(config: &ProviderConfig) -> CoreResult<Self> {
        let api_key = config
            .require_api_key(crate::config::VISION_API_KEY_ENV)?
            .to_string();

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url,
            model: Self::DEFAULT_MODEL.to_string(),
            client,
        })
    }

    /// Overrides the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Runs one generation call and returns the first candidate's text.
    pub async fn generate(
        &self,
        parts: Vec<Part>,
        options: GenerationOptions,
    ) -> CoreResult<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: Some(GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
            }),
        };

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::Timeout(format!("Generation request timed out: {}", e))
                } else {
                    CoreError::Network(format!("Generation request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::Network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error)
                .unwrap_or(ApiErrorDetail {
                    message: body.chars().take(500).collect(),
                    status: None,
                });
            return Err(CoreError::Upstream(format!(
                "Generation API error ({}; status={}): {}",
                status,
                detail.status.as_deref().unwrap_or("unknown"),
                detail.message
            )));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| CoreError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

        parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| {
                CoreError::MalformedResponse("No text candidate in response".to_string())
            })
    }
}

// =============================================================================
// JSON Extraction
// =============================================================================

/// Extracts the JSON object span from model output.
///
/// Models frequently wrap JSON in prose or markdown fences; the payload is
/// taken as the substring from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> CoreResult<&str> {
    let start = text
        .find('{')
        .ok_or_else(|| CoreError::MalformedResponse("No JSON object in response".to_string()))?;
    let end = text
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| CoreError::MalformedResponse("Unterminated JSON object".to_string()))?;

    Ok(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_credential() {
        let config = ProviderConfig::default();
        let err = GeminiClient::new(&config).unwrap_err();
        assert!(matches!(err, CoreError::MissingCredential(_)));
    }

    #[test]
    fn test_generate_url() {
        let config = ProviderConfig::with_api_key("k").with_base_url("https://api.example.com/v1");
        let client = GeminiClient::new(&config).unwrap().with_model("test-model");
        assert_eq!(
            client.generate_url(),
            "https://api.example.com/v1/models/test-model:generateContent"
        );
    }

    #[test]
    fn test_request_serialization() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    Part::text("Describe this photo"),
                    Part::inline_data("image/jpeg", "aGVsbG8="),
                ],
            }],
            generation_config: Some(GenerationConfig {
                temperature: 0.4,
                max_output_tokens: 2048,
            }),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Describe this photo");
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/jpeg"
        );
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn test_response_text_extraction_shape() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"hello"}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(body).unwrap();
        let text = parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text);
        assert_eq!(text.as_deref(), Some("hello"));
    }

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json(r#"{"a":1}"#).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn test_extract_json_wrapped_in_prose() {
        let text = "Sure! Here is the JSON you asked for:\n```json\n{\"a\": {\"b\": 2}}\n```\nHope it helps.";
        assert_eq!(extract_json(text).unwrap(), r#"{"a": {"b": 2}}"#);
    }

    #[test]
    fn test_extract_json_missing() {
        assert!(matches!(
            extract_json("no json here"),
            Err(CoreError::MalformedResponse(_))
        ));
        assert!(matches!(
            extract_json("} backwards {"),
            Err(CoreError::MalformedResponse(_))
        ));
    }
}
