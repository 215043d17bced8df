//! Prompt-to-image pipeline behind `POST /api/generate-image`.
//!
//! Order of checks: prompt validation, mock short-circuit, credential
//! check, then the provider call raced against the configured timeout.
//! Every failure leaves here as an [`ApiError`].

use crate::ai::{GeminiImageClient, ImageGenerationService};
use crate::config::Config;
use crate::error::{ApiError, MSG_GENERATION_FAILED};
use crate::models::GenerationResult;
use crate::Error;
use std::sync::Arc;
use tracing::{error, info};

/// 1×1 JPEG returned while mock mode is on.
pub const PLACEHOLDER_IMAGE_BASE64: &str = "/9j/4AAQSkZJRgABAQAAAQABAAD/2wCEAAkGBxAQEBUQFRUQFRUVFRUVFRUVFRUVFhUVFhUVFRUYHSggGBolHRUVITEhJSkrLi4uFx8zODMsNygtLisBCgoKDg0OGxAQGy0lICUtLS0tLS0tLS0tLS0tLS0tLS0tLS0tLS0tLS0tLS0tLS0tLS0tLS0tLS0tLS0tLf/AABEIAAEAAQMBIgACEQEDEQH/xAAXAAEBAQEAAAAAAAAAAAAAAAAABQEE/8QAFxABAQEBAAAAAAAAAAAAAAAAAQACIf/EABYBAQEBAAAAAAAAAAAAAAAAAAACA//EABYRAQEBAAAAAAAAAAAAAAAAAAABEf/aAAwDAQACEQMRAD8A7wCKAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAf/2Q==";

/// Trim a prompt and check its length in characters.
pub fn validate_prompt(raw: &str, max_length: usize) -> Result<String, ApiError> {
    let trimmed = raw.trim();
    let length = trimmed.chars().count();

    if length == 0 {
        return Err(ApiError::prompt_required());
    }
    if length > max_length {
        return Err(ApiError::prompt_too_long(max_length));
    }

    Ok(trimmed.to_string())
}

pub struct ImageGenerator {
    config: Arc<Config>,
    service: Option<Arc<dyn ImageGenerationService>>,
}

impl ImageGenerator {
    /// Build a generator around an explicit provider (or none).
    pub fn new(config: Arc<Config>, service: Option<Arc<dyn ImageGenerationService>>) -> Self {
        Self { config, service }
    }

    /// Build the Gemini-backed generator described by `config`.
    ///
    /// Without a credential the generator still serves mock mode and answers
    /// everything else with `ServiceUnavailable`.
    pub fn from_config(config: Arc<Config>) -> Self {
        let service = config.gemini_api_key.clone().map(|api_key| {
            let client = GeminiImageClient::new(api_key, config.image_model.clone())
                .with_base_url(config.gemini_base_url.clone());
            info!("Image provider: Gemini (model: {})", client.model());
            Arc::new(client) as Arc<dyn ImageGenerationService>
        });

        Self::new(config, service)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn generate(&self, raw_prompt: &str) -> Result<GenerationResult, ApiError> {
        let prompt = validate_prompt(raw_prompt, self.config.prompt_max_length).map_err(|e| {
            info!("Rejected prompt: {}", e);
            e
        })?;

        if self.config.mock_ai {
            return Ok(GenerationResult {
                image_bytes: PLACEHOLDER_IMAGE_BASE64.to_string(),
            });
        }

        let service = self.service.clone().ok_or_else(|| {
            error!("Image generation requested but GEMINI_API_KEY is not configured");
            ApiError::ServiceUnavailable
        })?;

        // The provider call runs as its own task so that losing the race
        // below leaves it running; its late result is discarded.
        let upstream = tokio::spawn(async move { service.generate_image(&prompt).await });

        match tokio::time::timeout(self.config.image_timeout, upstream).await {
            Err(_) => {
                error!(
                    "Image generation timed out after {}ms",
                    self.config.image_timeout.as_millis()
                );
                Err(ApiError::Timeout)
            }
            Ok(Err(join_error)) => Err(self.internal_error(&join_error.to_string())),
            Ok(Ok(Err(Error::EmptyResponse))) => {
                error!("Image generation failed: empty provider response");
                Err(ApiError::UpstreamEmpty)
            }
            Ok(Ok(Err(e))) => Err(self.internal_error(&e.to_string())),
            Ok(Ok(Ok(image_bytes))) if image_bytes.is_empty() => {
                error!("Image generation failed: empty image payload");
                Err(ApiError::UpstreamEmpty)
            }
            Ok(Ok(Ok(image_bytes))) => Ok(GenerationResult { image_bytes }),
        }
    }

    fn internal_error(&self, detail: &str) -> ApiError {
        error!("Error in /api/generate-image: {}", detail);
        if self.config.production {
            ApiError::InternalError(MSG_GENERATION_FAILED.to_string())
        } else {
            ApiError::InternalError(detail.to_string())
        }
    }
}
