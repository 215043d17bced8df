//! Client side of the generation flow.
//!
//! [`BackdropClient`] talks to a running proxy; [`PromptSession`] tracks
//! the idle / submitting / success / failed cycle a UI walks through and
//! turns a successful result into a data URI or a JPEG on disk.

use crate::error::ErrorBody;
use crate::models::GenerationResult;
use crate::{Error, Result};
use base64::Engine as _;
use serde_json::json;
use std::path::Path;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8787";

pub struct BackdropClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackdropClient {
    pub fn new(base_url: &str) -> Self {
        Self::new_with_client(base_url, reqwest::Client::new())
    }

    pub fn new_with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Request a background for `prompt` and return its base64 JPEG.
    ///
    /// Server-side failures come back as `Error::Generic` carrying the
    /// server's own message so it can be shown verbatim.
    pub async fn generate_image(&self, prompt: &str) -> Result<String> {
        let trimmed = prompt.trim();
        if trimmed.is_empty() {
            return Err(Error::Generic("Prompt cannot be empty.".to_string()));
        }

        let response = self
            .client
            .post(format!("{}/api/generate-image", self.base_url))
            .json(&json!({ "prompt": trimmed }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Error generating image via API: {}", e);
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .map(|body| body.error)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("Server error: {}", status.as_u16()));
            tracing::error!("Error generating image via API: {}", message);
            return Err(Error::Generic(message));
        }

        let result: GenerationResult = response.json().await.map_err(|e| {
            tracing::error!("Malformed response from server: {}", e);
            Error::Generic("Image generation failed: empty response from server.".to_string())
        })?;

        if result.image_bytes.is_empty() {
            return Err(Error::Generic(
                "Image generation failed: empty response from server.".to_string(),
            ));
        }

        Ok(result.image_bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Submitting,
    Success { image_bytes: String },
    Failed { message: String },
}

/// One user's prompt/result cycle. Each submission replaces the previous
/// outcome; there is no automatic retry.
#[derive(Debug)]
pub struct PromptSession {
    state: SessionState,
}

impl Default for PromptSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == SessionState::Submitting
    }

    /// Whether `prompt` may be submitted right now.
    ///
    /// Only non-emptiness is checked here; the server enforces the length cap.
    pub fn can_submit(&self, prompt: &str) -> bool {
        !self.is_loading() && !prompt.trim().is_empty()
    }

    /// Enter `Submitting`, clearing any previous image or error.
    pub fn begin(&mut self, prompt: &str) -> bool {
        if !self.can_submit(prompt) {
            return false;
        }
        self.state = SessionState::Submitting;
        true
    }

    /// Settle the in-flight submission.
    pub fn finish(&mut self, outcome: Result<String>) {
        if !self.is_loading() {
            return;
        }
        self.state = match outcome {
            Ok(image_bytes) => SessionState::Success { image_bytes },
            Err(e) => SessionState::Failed {
                message: user_message(&e),
            },
        };
    }

    /// Submit a prompt through `client` and wait for the outcome.
    pub async fn submit(&mut self, client: &BackdropClient, prompt: &str) -> &SessionState {
        if self.begin(prompt) {
            let outcome = client.generate_image(prompt).await;
            self.finish(outcome);
        }
        &self.state
    }

    /// Return to `Idle` from a settled state.
    pub fn reset(&mut self) {
        if !self.is_loading() {
            self.state = SessionState::Idle;
        }
    }

    pub fn image_bytes(&self) -> Option<&str> {
        match &self.state {
            SessionState::Success { image_bytes } => Some(image_bytes),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            SessionState::Failed { message } => Some(message),
            _ => None,
        }
    }

    /// `data:` URI suitable for an `<img>` tag or a download link.
    pub fn data_uri(&self) -> Option<String> {
        self.image_bytes()
            .map(|bytes| format!("data:image/jpeg;base64,{}", bytes))
    }

    /// Decode the current image and write it to `path`.
    pub fn save_jpeg(&self, path: &Path) -> Result<()> {
        let encoded = self
            .image_bytes()
            .ok_or_else(|| Error::Generic("No image to save".to_string()))?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::Generic(format!("Failed to decode image: {}", e)))?;

        std::fs::write(path, bytes)?;
        tracing::info!("Saved background to {}", path.display());
        Ok(())
    }
}

fn user_message(error: &Error) -> String {
    match error {
        Error::Generic(message) if !message.is_empty() => message.clone(),
        Error::Http(e) => format!("Failed to generate image: {}", e),
        _ => "An unexpected error occurred.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::PLACEHOLDER_IMAGE_BASE64;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_generate_image_posts_trimmed_prompt() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate-image"))
            .and(body_json(serde_json::json!({ "prompt": "loft studio" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "imageBytes": "QUJD" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = BackdropClient::new(&server.uri());
        assert_eq!(client.generate_image("  loft studio ").await.unwrap(), "QUJD");
    }

    #[tokio::test]
    async fn test_empty_prompt_fails_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = BackdropClient::new(&server.uri());
        let err = client.generate_image("   ").await.unwrap_err();
        assert_eq!(err.to_string(), "Generic error: Prompt cannot be empty.");
    }

    #[tokio::test]
    async fn test_server_error_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": "Too many requests. Please try again later."
            })))
            .mount(&server)
            .await;

        let client = BackdropClient::new(&server.uri());
        match client.generate_image("desk").await.unwrap_err() {
            Error::Generic(message) => {
                assert_eq!(message, "Too many requests. Please try again later.")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_error_falls_back_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let client = BackdropClient::new(&server.uri());
        match client.generate_image("desk").await.unwrap_err() {
            Error::Generic(message) => assert_eq!(message, "Server error: 502"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_image_bytes_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = BackdropClient::new(&server.uri());
        match client.generate_image("desk").await.unwrap_err() {
            Error::Generic(message) => {
                assert_eq!(message, "Image generation failed: empty response from server.")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_session_transitions() {
        let mut session = PromptSession::new();
        assert_eq!(session.state(), &SessionState::Idle);

        assert!(!session.begin("   "));
        assert_eq!(session.state(), &SessionState::Idle);

        assert!(session.begin("desk"));
        assert!(session.is_loading());
        assert!(!session.begin("another"));

        session.finish(Err(Error::Generic("Prompt is required".to_string())));
        assert_eq!(session.error_message(), Some("Prompt is required"));

        assert!(session.begin("desk"));
        session.finish(Ok("QUJD".to_string()));
        assert_eq!(session.image_bytes(), Some("QUJD"));
        assert_eq!(
            session.data_uri().as_deref(),
            Some("data:image/jpeg;base64,QUJD")
        );

        session.reset();
        assert_eq!(session.state(), &SessionState::Idle);
    }

    #[test]
    fn test_finish_without_submission_is_ignored() {
        let mut session = PromptSession::new();
        session.finish(Ok("QUJD".to_string()));
        assert_eq!(session.state(), &SessionState::Idle);
    }

    #[tokio::test]
    async fn test_submit_round_trip_and_save() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "imageBytes": PLACEHOLDER_IMAGE_BASE64
            })))
            .mount(&server)
            .await;

        let client = BackdropClient::new(&server.uri());
        let mut session = PromptSession::new();
        session.submit(&client, "a minimalist home office").await;
        assert_eq!(session.image_bytes(), Some(PLACEHOLDER_IMAGE_BASE64));

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("background.jpg");
        session.save_jpeg(&file).unwrap();

        let written = std::fs::read(&file).unwrap();
        assert_eq!(&written[..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_save_without_image_fails() {
        let session = PromptSession::new();
        let dir = tempfile::tempdir().unwrap();
        assert!(session.save_jpeg(&dir.path().join("x.jpg")).is_err());
    }
}
