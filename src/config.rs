//! Engine Configuration
//!
//! Process-level configuration for the two external AI providers.
//! Credentials are supplied via environment variables (or builder overrides)
//! and checked eagerly before any network call is made.

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Environment variable holding the vision-language provider API key
pub const VISION_API_KEY_ENV: &str = "PHOTOMORPH_VISION_API_KEY";

/// Environment variable holding the generative-media provider API key
pub const MEDIA_API_KEY_ENV: &str = "PHOTOMORPH_MEDIA_API_KEY";

/// Default base URL for the vision-language (generateContent) endpoint
pub const DEFAULT_VISION_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default base URL for the generative-media job API
pub const DEFAULT_MEDIA_BASE_URL: &str = "https://api.photomorph-media.dev/v1";

/// Configuration for one external provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key (required before any call)
    pub api_key: Option<String>,
    /// Base URL override
    pub base_url: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            timeout_secs: 120,
        }
    }
}

impl ProviderConfig {
    /// Creates a config with an API key
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Sets the base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the request timeout
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Returns the API key, failing with `MissingCredential` when absent or
    /// empty. `name` identifies the credential in the error message.
    pub fn require_api_key(&self, name: &str) -> CoreResult<&str> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(CoreError::MissingCredential(name.to_string())),
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Vision-language provider (analysis + suggestions)
    pub vision: ProviderConfig,
    /// Generative-media provider (transformation jobs)
    pub media: ProviderConfig,
}

impl EngineConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Self {
        let mut vision = ProviderConfig::default();
        if let Ok(key) = std::env::var(VISION_API_KEY_ENV) {
            vision.api_key = Some(key);
        }

        let mut media = ProviderConfig::default();
        if let Ok(key) = std::env::var(MEDIA_API_KEY_ENV) {
            media.api_key = Some(key);
        }

        Self { vision, media }
    }

    /// Sets the vision provider config
    pub fn with_vision(mut self, vision: ProviderConfig) -> Self {
        self.vision = vision;
        self
    }

    /// Sets the media provider config
    pub fn with_media(mut self, media: ProviderConfig) -> Self {
        self.media = media;
        self
    }

    /// Verifies both credentials are present.
    pub fn validate(&self) -> CoreResult<()> {
        self.vision.require_api_key(VISION_API_KEY_ENV)?;
        self.media.require_api_key(MEDIA_API_KEY_ENV)?;
        Ok(())
    }

    /// Resolved vision endpoint base URL
    pub fn vision_base_url(&self) -> &str {
        self.vision
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_VISION_BASE_URL)
    }

    /// Resolved media endpoint base URL
    pub fn media_base_url(&self) -> &str {
        self.media
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_MEDIA_BASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_config_builder() {
        let config = ProviderConfig::with_api_key("test-key")
            .with_base_url("https://custom.example.com/v2")
            .with_timeout_secs(30);

        assert_eq!(config.api_key, Some("test-key".to_string()));
        assert_eq!(config.base_url, Some("https://custom.example.com/v2".to_string()));
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_require_api_key_present() {
        let config = ProviderConfig::with_api_key("abc123");
        assert_eq!(config.require_api_key("TEST_KEY").unwrap(), "abc123");
    }

    #[test]
    fn test_require_api_key_missing() {
        let config = ProviderConfig::default();
        let err = config.require_api_key("TEST_KEY").unwrap_err();
        assert!(matches!(err, CoreError::MissingCredential(name) if name == "TEST_KEY"));
    }

    #[test]
    fn test_require_api_key_blank() {
        let config = ProviderConfig::with_api_key("   ");
        assert!(config.require_api_key("TEST_KEY").is_err());
    }

    #[test]
    fn test_engine_config_validate() {
        let config = EngineConfig::default()
            .with_vision(ProviderConfig::with_api_key("v"))
            .with_media(ProviderConfig::with_api_key("m"));
        assert!(config.validate().is_ok());

        let missing_media =
            EngineConfig::default().with_vision(ProviderConfig::with_api_key("v"));
        assert!(missing_media.validate().is_err());
    }

    #[test]
    fn test_default_base_urls() {
        let config = EngineConfig::default();
        assert_eq!(config.vision_base_url(), DEFAULT_VISION_BASE_URL);
        assert_eq!(config.media_base_url(), DEFAULT_MEDIA_BASE_URL);

        let overridden = EngineConfig::default()
            .with_media(ProviderConfig::default().with_base_url("https://stage.example.com"));
        assert_eq!(overridden.media_base_url(), "https://stage.example.com");
    }
}
