//! Data models and structures
//!
//! Request and response payloads of the HTTP API. Nothing here is persisted;
//! a request lives for one call and its result ends at the response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Incoming body of `POST /api/generate-image`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
}

impl GenerationRequest {
    /// Parse a raw request body without ever failing.
    ///
    /// Anything other than a JSON object with a string `prompt` yields an
    /// empty prompt, which validation then rejects.
    pub fn from_body(body: &[u8]) -> Self {
        let prompt = serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|value| match value.get("prompt") {
                Some(Value::String(prompt)) => Some(prompt.clone()),
                _ => None,
            })
            .unwrap_or_default();

        Self { prompt }
    }
}

/// Successful body of `POST /api/generate-image`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    #[serde(rename = "imageBytes")]
    pub image_bytes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
}
