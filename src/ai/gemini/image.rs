use super::client::GeminiHttpClient;
use super::types::{OutputOptions, PredictInstance, PredictParameters, PredictRequest, PredictResponse};
use crate::ai::ImageGenerationService;
use crate::{prompts, Error, Result};
use async_trait::async_trait;
use secrecy::SecretString;
use std::time::Duration;

const ASPECT_RATIO: &str = "16:9";
const OUTPUT_MIME_TYPE: &str = "image/jpeg";

/// Upper bound for a single provider call. The endpoint's own timeout is
/// shorter; this only stops abandoned calls from living forever.
const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct GeminiImageClient {
    http: GeminiHttpClient,
}

impl GeminiImageClient {
    pub fn new(api_key: SecretString, model: String) -> Self {
        Self::new_with_client(api_key, model, reqwest::Client::new())
    }

    pub fn new_with_client(api_key: SecretString, model: String, client: reqwest::Client) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(api_key, model, TRANSPORT_TIMEOUT, client),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }

    pub fn model(&self) -> &str {
        self.http.model()
    }
}

#[async_trait]
impl ImageGenerationService for GeminiImageClient {
    async fn generate_image(&self, prompt: &str) -> Result<String> {
        let request = PredictRequest {
            instances: vec![PredictInstance {
                prompt: prompts::background_prompt(prompt),
            }],
            parameters: PredictParameters {
                sample_count: 1,
                aspect_ratio: Some(ASPECT_RATIO.to_string()),
                output_options: OutputOptions {
                    mime_type: OUTPUT_MIME_TYPE.to_string(),
                },
            },
        };

        let response: PredictResponse = self.http.predict(&request).await?;

        let prediction = response
            .predictions
            .into_iter()
            .next()
            .ok_or(Error::EmptyResponse)?;

        tracing::debug!(
            "Gemini returned image with mime_type: {}",
            prediction.mime_type.as_deref().unwrap_or("unknown")
        );

        match prediction.bytes_base64_encoded {
            Some(bytes) if !bytes.is_empty() => Ok(bytes),
            _ => Err(Error::EmptyResponse),
        }
    }
}
