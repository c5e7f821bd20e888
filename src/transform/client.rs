//! Generative Media Transform Client
//!
//! Adapter for the generative-media job API: submit/poll/download with
//! inline-vs-blob image reference preparation and a single recompression
//! retry when the upstream rejects the payload as too large.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{self, ProviderConfig};
use crate::imaging;
use crate::store::{SuggestionParams, TransformationKind};
use crate::transform::progress::ProgressReporter;
use crate::{CoreError, CoreResult};

// =============================================================================
// Constants
// =============================================================================

/// Poll interval for image jobs
const IMAGE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Poll interval for video jobs
const VIDEO_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Maximum poll attempts for image jobs
const IMAGE_POLL_ATTEMPTS: u32 = 30;

/// Maximum poll attempts for video jobs
const VIDEO_POLL_ATTEMPTS: u32 = 60;

/// Recompression target for the one payload-too-large retry. Half the normal
/// target, so the retry is strictly more aggressive.
const RETRY_TARGET_BYTES: usize = imaging::RECOMPRESS_TARGET_BYTES / 2;

/// Progress checkpoints within one job
const PROGRESS_PREPARED: f64 = 0.05;
const PROGRESS_SUBMITTED: f64 = 0.1;
const PROGRESS_POLL_CEILING: f64 = 0.9;
const PROGRESS_DOWNLOADED: f64 = 0.95;

// =============================================================================
// API Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
struct SubmitRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<String>,
    image_url: String,
    output_format: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    extra: BTreeMap<String, String>,
}

/// Submit response: either an immediate output or a request id to poll
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SubmitResponse {
    request_id: Option<String>,
    output: Option<OutputPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PollResponse {
    status: String,
    progress: Option<f64>,
    output: Option<OutputPayload>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OutputPayload {
    url: Option<String>,
    duration_sec: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BlobUploadResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Content type for an inline data URL, from magic bytes
fn detect_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

/// One poll classified
enum JobState {
    Waiting { progress: Option<f64> },
    Completed(OutputPayload),
    Failed(String),
}

// =============================================================================
// Request/Output Types
// =============================================================================

/// One transformation to execute
#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub image: Vec<u8>,
    pub kind: TransformationKind,
    pub target_model: String,
    pub params: SuggestionParams,
}

/// Resolved result of one transformation job
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub media_bytes: Vec<u8>,
    pub is_video: bool,
    pub duration_sec: Option<f64>,
    pub metadata: BTreeMap<String, String>,
}

/// Seam for transformation execution, so pipelines can take test doubles.
///
/// The returned future is the unit of cancellation: callers abort the task
/// driving it, and the job stops at the next await point.
#[async_trait]
pub trait TransformProvider: Send + Sync {
    async fn transform(
        &self,
        request: &TransformRequest,
        progress: &ProgressReporter,
    ) -> CoreResult<TransformOutput>;
}

// =============================================================================
// HttpTransformClient
// =============================================================================

/// Production transform client for the generative-media job API
pub struct HttpTransformClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for HttpTransformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransformClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpTransformClient {
    /// Creates a client from provider config. The credential is checked
    /// eagerly: no client exists without a key.
    pub fn new(cfg: &ProviderConfig) -> CoreResult<Self> {
        let api_key = cfg.require_api_key(config::MEDIA_API_KEY_ENV)?.to_string();

        let base_url = cfg
            .base_url
            .clone()
            .unwrap_or_else(|| config::DEFAULT_MEDIA_BASE_URL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }

    fn submit_url(&self, model: &str) -> String {
        format!("{}/models/{}/transformations", self.base_url, model)
    }

    fn poll_url(&self, request_id: &str) -> String {
        format!("{}/requests/{}", self.base_url, request_id)
    }

    fn blob_url(&self) -> String {
        format!("{}/blobs", self.base_url)
    }

    /// Parse an error response body into an upstream error
    fn parse_api_error(status: StatusCode, body: &str) -> CoreError {
        if let Ok(parsed) = serde_json::from_str::<ApiErrorResponse>(body) {
            if let Some(detail) = parsed.error {
                return CoreError::Upstream(format!(
                    "Transform API error ({}): {} (code: {})",
                    status,
                    detail.message.unwrap_or_default(),
                    detail.code.unwrap_or_default(),
                ));
            }
        }

        let truncated: String = body.chars().take(500).collect();
        CoreError::Upstream(format!("Transform API error ({}): {}", status, truncated))
    }

    /// Returns true for the request-too-large class of upstream errors, which
    /// earn exactly one recompression retry.
    fn is_payload_too_large(error: &CoreError) -> bool {
        let CoreError::Upstream(message) = error else {
            return false;
        };
        let lowered = message.to_ascii_lowercase();
        lowered.contains("413")
            || lowered.contains("payload too large")
            || lowered.contains("request entity too large")
            || lowered.contains("payload_too_large")
    }

    fn validate_download_url(url: &str) -> CoreResult<reqwest::Url> {
        let parsed = reqwest::Url::parse(url).map_err(|e| {
            CoreError::MalformedResponse(format!("Invalid result URL '{}': {}", url, e))
        })?;

        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            scheme => Err(CoreError::MalformedResponse(format!(
                "Unsupported result URL scheme '{}'",
                scheme
            ))),
        }
    }

    /// True when bytes of this size are referenced via blob storage rather
    /// than inlined as a data URL. The routing is decided on the original
    /// size, never on a recompressed one.
    fn routes_to_blob(len: usize) -> bool {
        len > imaging::INLINE_THRESHOLD_BYTES
    }

    /// Prepares the image reference for a submit: blob-storage URL for large
    /// images, inline data URL otherwise. Blob uploads above the raw safety
    /// threshold are shrunk toward the recompression target first; an image
    /// that cannot reach the target still proceeds at its smallest obtained
    /// encoding.
    async fn image_reference(&self, image: &[u8]) -> CoreResult<String> {
        if Self::routes_to_blob(image.len()) {
            let shrunk;
            let upload: &[u8] = if image.len() > imaging::INLINE_SAFETY_THRESHOLD_BYTES {
                shrunk = imaging::compress_to_target(image, imaging::RECOMPRESS_TARGET_BYTES)?;
                &shrunk
            } else {
                image
            };
            debug!(
                original = image.len(),
                upload = upload.len(),
                "uploading image to blob storage"
            );
            return self.upload_blob(upload).await;
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        Ok(format!("data:{};base64,{}", detect_mime(image), encoded))
    }

    async fn upload_blob(&self, bytes: &[u8]) -> CoreResult<String> {
        let response = self
            .client
            .post(self.blob_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::Timeout(format!("Blob upload timed out: {}", e))
                } else {
                    CoreError::Network(format!("Blob upload failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::Network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Self::parse_api_error(status, &body));
        }

        let parsed: BlobUploadResponse = serde_json::from_str(&body).map_err(|e| {
            CoreError::MalformedResponse(format!("Failed to parse blob response: {}", e))
        })?;

        if parsed.url.is_empty() {
            return Err(CoreError::MalformedResponse(
                "Blob response missing url".to_string(),
            ));
        }

        Ok(parsed.url)
    }

    fn build_submit_request(request: &TransformRequest, image_url: String) -> SubmitRequest {
        let (prompt, style, extra) = match &request.params {
            SuggestionParams::Prompt { value } => (Some(value.clone()), None, BTreeMap::new()),
            SuggestionParams::Style { value } => (None, Some(value.clone()), BTreeMap::new()),
            SuggestionParams::Opaque { values } => (None, None, values.clone()),
        };

        SubmitRequest {
            prompt,
            style,
            image_url,
            output_format: if request.kind.is_video() { "mp4" } else { "jpeg" }.to_string(),
            extra,
        }
    }

    async fn submit(
        &self,
        request: &TransformRequest,
        image_url: String,
    ) -> CoreResult<SubmitResponse> {
        let body = Self::build_submit_request(request, image_url);

        let response = self
            .client
            .post(self.submit_url(&request.target_model))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::Timeout(format!("Submit timed out: {}", e))
                } else {
                    CoreError::Network(format!("Submit failed: {}", e))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CoreError::Network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Self::parse_api_error(status, &text));
        }

        serde_json::from_str(&text).map_err(|e| {
            CoreError::MalformedResponse(format!("Failed to parse submit response: {}", e))
        })
    }

    fn classify_poll(response: PollResponse) -> CoreResult<JobState> {
        match response.status.as_str() {
            "queued" | "pending" => Ok(JobState::Waiting { progress: None }),
            "in_progress" | "processing" | "running" => Ok(JobState::Waiting {
                progress: response.progress,
            }),
            "completed" | "succeeded" => Ok(JobState::Completed(
                response.output.unwrap_or_default(),
            )),
            "failed" | "error" => Ok(JobState::Failed(
                response
                    .error
                    .unwrap_or_else(|| "Unknown transform failure".to_string()),
            )),
            other => {
                warn!(status = other, "unknown transform job status");
                Ok(JobState::Waiting {
                    progress: response.progress,
                })
            }
        }
    }

    async fn poll_once(&self, request_id: &str) -> CoreResult<JobState> {
        let response = self
            .client
            .get(self.poll_url(request_id))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::Timeout(format!("Poll timed out: {}", e))
                } else {
                    CoreError::Network(format!("Poll failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::Network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Self::parse_api_error(status, &body));
        }

        let parsed: PollResponse = serde_json::from_str(&body).map_err(|e| {
            CoreError::MalformedResponse(format!("Failed to parse poll response: {}", e))
        })?;

        Self::classify_poll(parsed)
    }

    /// Polls a job until it resolves. Each iteration awaits the interval, so
    /// aborting the caller's task interrupts the loop promptly.
    async fn poll_until_done(
        &self,
        request_id: &str,
        kind: TransformationKind,
        progress: &ProgressReporter,
    ) -> CoreResult<OutputPayload> {
        let (interval, attempts) = if kind.is_video() {
            (VIDEO_POLL_INTERVAL, VIDEO_POLL_ATTEMPTS)
        } else {
            (IMAGE_POLL_INTERVAL, IMAGE_POLL_ATTEMPTS)
        };

        for attempt in 1..=attempts {
            tokio::time::sleep(interval).await;

            match self.poll_once(request_id).await? {
                JobState::Completed(output) => return Ok(output),
                JobState::Failed(message) => {
                    return Err(CoreError::Upstream(format!(
                        "Transform job {} failed: {}",
                        request_id, message
                    )));
                }
                JobState::Waiting { progress: reported } => {
                    // Upstream progress when reported, otherwise attempt
                    // fraction, both mapped into the polling window.
                    let fraction = reported
                        .unwrap_or(f64::from(attempt) / f64::from(attempts))
                        .clamp(0.0, 1.0);
                    progress.report(
                        PROGRESS_SUBMITTED + fraction * (PROGRESS_POLL_CEILING - PROGRESS_SUBMITTED),
                    );
                }
            }
        }

        Err(CoreError::Timeout(format!(
            "Transform job {} did not resolve within {} polls",
            request_id, attempts
        )))
    }

    async fn download(&self, url: &str) -> CoreResult<Vec<u8>> {
        let validated = Self::validate_download_url(url)?;

        let response = self.client.get(validated).send().await.map_err(|e| {
            if e.is_timeout() {
                CoreError::Timeout(format!("Download timed out: {}", e))
            } else {
                CoreError::Network(format!("Download failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Upstream(format!(
                "Download failed with status {}",
                status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CoreError::Network(format!("Failed to read media bytes: {}", e)))?;

        Ok(bytes.to_vec())
    }

    /// One full submit/poll/download pass with the given upload bytes.
    async fn run_job(
        &self,
        request: &TransformRequest,
        upload: &[u8],
        progress: &ProgressReporter,
    ) -> CoreResult<TransformOutput> {
        let image_url = self.image_reference(upload).await?;
        progress.report(PROGRESS_PREPARED);

        let submitted = self.submit(request, image_url).await?;
        progress.report(PROGRESS_SUBMITTED);

        let output = match (submitted.output, submitted.request_id) {
            // Synchronous-style response: the payload resolved immediately.
            (Some(output), _) => output,
            (None, Some(request_id)) => {
                info!(
                    request_id = %request_id,
                    model = %request.target_model,
                    "transform job submitted"
                );
                self.poll_until_done(&request_id, request.kind, progress)
                    .await?
            }
            (None, None) => {
                return Err(CoreError::MalformedResponse(
                    "Submit response carried neither output nor request_id".to_string(),
                ));
            }
        };

        let url = output.url.ok_or_else(|| {
            CoreError::MalformedResponse("Completed job missing result url".to_string())
        })?;

        let media_bytes = self.download(&url).await?;
        progress.report(PROGRESS_DOWNLOADED);

        let mut metadata = BTreeMap::new();
        metadata.insert("target_model".to_string(), request.target_model.clone());
        metadata.insert("result_url".to_string(), url);

        Ok(TransformOutput {
            media_bytes,
            is_video: request.kind.is_video(),
            duration_sec: output.duration_sec,
            metadata,
        })
    }

    /// Runs a job with the original bytes, then exactly once more with
    /// harder compression when the upstream rejects the payload as too
    /// large. Any other failure, and a too-large rejection of the retry,
    /// stands as-is.
    async fn run_with_payload_retry<F, Fut>(image: &[u8], run: F) -> CoreResult<TransformOutput>
    where
        F: Fn(Vec<u8>) -> Fut,
        Fut: std::future::Future<Output = CoreResult<TransformOutput>>,
    {
        match run(image.to_vec()).await {
            Err(err) if Self::is_payload_too_large(&err) => {
                warn!(error = %err, "payload rejected as too large, retrying compressed");
                let harder = imaging::compress_to_target(image, RETRY_TARGET_BYTES)?;
                run(harder).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl TransformProvider for HttpTransformClient {
    async fn transform(
        &self,
        request: &TransformRequest,
        progress: &ProgressReporter,
    ) -> CoreResult<TransformOutput> {
        let output = Self::run_with_payload_retry(&request.image, |upload| async move {
            self.run_job(request, &upload, progress).await
        })
        .await?;

        progress.report(1.0);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Encodes a flat-color RGB image as PNG for use as test input.
    fn test_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    fn sample_output() -> TransformOutput {
        TransformOutput {
            media_bytes: vec![1, 2, 3],
            is_video: false,
            duration_sec: None,
            metadata: BTreeMap::new(),
        }
    }

    fn client() -> HttpTransformClient {
        let cfg = ProviderConfig::with_api_key("test-key")
            .with_base_url("https://media.example.com/v1");
        HttpTransformClient::new(&cfg).unwrap()
    }

    fn request(kind: TransformationKind, params: SuggestionParams) -> TransformRequest {
        TransformRequest {
            image: vec![0u8; 16],
            kind,
            target_model: kind.default_model().to_string(),
            params,
        }
    }

    #[test]
    fn test_client_requires_credential() {
        let err = HttpTransformClient::new(&ProviderConfig::default()).unwrap_err();
        assert!(matches!(err, CoreError::MissingCredential(_)));
    }

    #[test]
    fn test_url_building() {
        let client = client();
        assert_eq!(
            client.submit_url("flux-kontext-dev"),
            "https://media.example.com/v1/models/flux-kontext-dev/transformations"
        );
        assert_eq!(
            client.poll_url("req-42"),
            "https://media.example.com/v1/requests/req-42"
        );
        assert_eq!(client.blob_url(), "https://media.example.com/v1/blobs");
    }

    #[test]
    fn test_submit_request_for_image_edit() {
        let req = request(
            TransformationKind::UtilityEdit,
            SuggestionParams::prompt("remove the lamppost"),
        );
        let body = HttpTransformClient::build_submit_request(&req, "data:image/jpeg;base64,AA==".to_string());

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["prompt"], "remove the lamppost");
        assert_eq!(json["output_format"], "jpeg");
        assert!(json.get("style").is_none());
        assert!(json.get("extra").is_none());
    }

    #[test]
    fn test_submit_request_for_video() {
        let req = request(
            TransformationKind::VideoAnimation,
            SuggestionParams::style("slow zoom"),
        );
        let body = HttpTransformClient::build_submit_request(&req, "https://blobs/abc".to_string());

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["style"], "slow zoom");
        assert_eq!(json["output_format"], "mp4");
        assert_eq!(json["image_url"], "https://blobs/abc");
    }

    #[test]
    fn test_submit_request_opaque_params() {
        let mut values = BTreeMap::new();
        values.insert("strength".to_string(), "0.6".to_string());
        let req = request(
            TransformationKind::CreativeTransform,
            SuggestionParams::Opaque { values },
        );
        let body = HttpTransformClient::build_submit_request(&req, "u".to_string());

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["extra"]["strength"], "0.6");
    }

    #[test]
    fn test_blob_routing_decided_on_original_size() {
        assert!(!HttpTransformClient::routes_to_blob(512 * 1024));
        assert!(!HttpTransformClient::routes_to_blob(imaging::INLINE_THRESHOLD_BYTES));
        assert!(HttpTransformClient::routes_to_blob(imaging::INLINE_THRESHOLD_BYTES + 1));
        // A large original always goes to blob storage, regardless of what
        // recompression could shrink it to.
        assert!(HttpTransformClient::routes_to_blob(5 * 1024 * 1024));
    }

    #[tokio::test]
    async fn test_payload_retry_recompresses_once() {
        let png = test_png(256, 256);
        let attempts = AtomicUsize::new(0);
        let uploads = std::sync::Mutex::new(Vec::<Vec<u8>>::new());

        let result = HttpTransformClient::run_with_payload_retry(&png, |upload| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            uploads.lock().unwrap().push(upload);
            async move {
                if n == 0 {
                    Err(CoreError::Upstream(
                        "Transform API error (413): body too big".to_string(),
                    ))
                } else {
                    Ok(sample_output())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        let uploads = uploads.lock().unwrap();
        // First attempt carries the original bytes; the retry carries a
        // recompressed JPEG instead.
        assert_eq!(uploads[0], png);
        assert_eq!(detect_mime(&uploads[1]), "image/jpeg");
    }

    #[tokio::test]
    async fn test_payload_retry_happens_exactly_once() {
        let png = test_png(128, 128);
        let attempts = AtomicUsize::new(0);

        let err = HttpTransformClient::run_with_payload_retry(&png, |_upload| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(CoreError::Upstream(
                    "Transform API error (413): body too big".to_string(),
                ))
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, CoreError::Upstream(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let attempts = AtomicUsize::new(0);

        let err = HttpTransformClient::run_with_payload_retry(&[0u8; 16], |_upload| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(CoreError::Upstream(
                    "Transform API error (500): oops".to_string(),
                ))
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, CoreError::Upstream(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detect_mime() {
        assert_eq!(detect_mime(b"\x89PNG\r\n\x1a\n rest"), "image/png");
        assert_eq!(detect_mime(b"RIFF\x00\x00\x00\x00WEBPVP8 "), "image/webp");
        assert_eq!(detect_mime(b"\xff\xd8\xff\xe0"), "image/jpeg");
    }

    #[test]
    fn test_classify_poll_states() {
        let waiting: PollResponse =
            serde_json::from_str(r#"{"status":"queued"}"#).unwrap();
        assert!(matches!(
            HttpTransformClient::classify_poll(waiting).unwrap(),
            JobState::Waiting { progress: None }
        ));

        let in_progress: PollResponse =
            serde_json::from_str(r#"{"status":"in_progress","progress":0.4}"#).unwrap();
        assert!(matches!(
            HttpTransformClient::classify_poll(in_progress).unwrap(),
            JobState::Waiting {
                progress: Some(p)
            } if p == 0.4
        ));

        let completed: PollResponse = serde_json::from_str(
            r#"{"status":"completed","output":{"url":"https://ex.com/out.mp4","duration_sec":8.0}}"#,
        )
        .unwrap();
        match HttpTransformClient::classify_poll(completed).unwrap() {
            JobState::Completed(output) => {
                assert_eq!(output.url.as_deref(), Some("https://ex.com/out.mp4"));
                assert_eq!(output.duration_sec, Some(8.0));
            }
            _ => panic!("expected completed"),
        }

        let failed: PollResponse =
            serde_json::from_str(r#"{"status":"failed","error":"nsfw content"}"#).unwrap();
        match HttpTransformClient::classify_poll(failed).unwrap() {
            JobState::Failed(message) => assert_eq!(message, "nsfw content"),
            _ => panic!("expected failed"),
        }

        // Unknown statuses keep waiting rather than erroring.
        let unknown: PollResponse =
            serde_json::from_str(r#"{"status":"warming_up"}"#).unwrap();
        assert!(matches!(
            HttpTransformClient::classify_poll(unknown).unwrap(),
            JobState::Waiting { .. }
        ));
    }

    #[test]
    fn test_submit_response_shapes() {
        let immediate: SubmitResponse =
            serde_json::from_str(r#"{"output":{"url":"https://ex.com/o.jpg"}}"#).unwrap();
        assert!(immediate.output.is_some());
        assert!(immediate.request_id.is_none());

        let deferred: SubmitResponse =
            serde_json::from_str(r#"{"request_id":"req-7"}"#).unwrap();
        assert_eq!(deferred.request_id.as_deref(), Some("req-7"));
        assert!(deferred.output.is_none());
    }

    #[test]
    fn test_is_payload_too_large() {
        let too_large = CoreError::Upstream("Transform API error (413): body too big".to_string());
        assert!(HttpTransformClient::is_payload_too_large(&too_large));

        let worded =
            CoreError::Upstream("upstream rejected: Payload Too Large".to_string());
        assert!(HttpTransformClient::is_payload_too_large(&worded));

        let other = CoreError::Upstream("Transform API error (500): oops".to_string());
        assert!(!HttpTransformClient::is_payload_too_large(&other));

        let wrong_kind = CoreError::Network("413".to_string());
        assert!(!HttpTransformClient::is_payload_too_large(&wrong_kind));
    }

    #[test]
    fn test_validate_download_url() {
        assert!(HttpTransformClient::validate_download_url("https://ex.com/a.mp4").is_ok());
        assert!(HttpTransformClient::validate_download_url("http://ex.com/a.jpg").is_ok());
        assert!(HttpTransformClient::validate_download_url("file:///etc/passwd").is_err());
        assert!(HttpTransformClient::validate_download_url("not a url").is_err());
    }

    #[test]
    fn test_parse_api_error_structured() {
        let body = r#"{"error":{"message":"quota exceeded","code":"quota"}}"#;
        let err = HttpTransformClient::parse_api_error(StatusCode::TOO_MANY_REQUESTS, body);
        match err {
            CoreError::Upstream(msg) => {
                assert!(msg.contains("quota exceeded"));
                assert!(msg.contains("quota"));
            }
            _ => panic!("expected upstream error"),
        }
    }

    #[test]
    fn test_parse_api_error_unstructured() {
        let err =
            HttpTransformClient::parse_api_error(StatusCode::BAD_GATEWAY, "Bad Gateway");
        match err {
            CoreError::Upstream(msg) => assert!(msg.contains("Bad Gateway")),
            _ => panic!("expected upstream error"),
        }
    }
}
