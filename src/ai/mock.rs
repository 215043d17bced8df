use super::ImageGenerationService;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
enum MockBehavior {
    Respond(String),
    Empty,
    Fail(String),
}

/// Scriptable stand-in for a real provider.
#[derive(Clone)]
pub struct MockImageGenerationClient {
    behavior: MockBehavior,
    delay: Option<Duration>,
    call_count: Arc<Mutex<usize>>,
    completed_count: Arc<Mutex<usize>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockImageGenerationClient {
    pub fn new() -> Self {
        Self {
            behavior: MockBehavior::Respond("/9j/bW9jaw==".to_string()),
            delay: None,
            call_count: Arc::new(Mutex::new(0)),
            completed_count: Arc::new(Mutex::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_image_response(mut self, image_bytes: String) -> Self {
        self.behavior = MockBehavior::Respond(image_bytes);
        self
    }

    pub fn with_empty_response(mut self) -> Self {
        self.behavior = MockBehavior::Empty;
        self
    }

    pub fn with_failure(mut self, message: &str) -> Self {
        self.behavior = MockBehavior::Fail(message.to_string());
        self
    }

    /// Sleep on the tokio clock before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Calls that ran to the end, including ones whose caller stopped waiting.
    pub fn get_completed_count(&self) -> usize {
        *self.completed_count.lock().unwrap()
    }

    pub fn received_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Default for MockImageGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageGenerationService for MockImageGenerationClient {
    async fn generate_image(&self, prompt: &str) -> Result<String> {
        *self.call_count.lock().unwrap() += 1;
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        *self.completed_count.lock().unwrap() += 1;

        match &self.behavior {
            MockBehavior::Respond(bytes) => Ok(bytes.clone()),
            MockBehavior::Empty => Err(Error::EmptyResponse),
            MockBehavior::Fail(message) => Err(Error::AiProvider(message.clone())),
        }
    }
}
