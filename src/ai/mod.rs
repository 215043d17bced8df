//! AI service integration for image generation
//!
//! Provides the provider-neutral [`ImageGenerationService`] seam, the Gemini
//! (Imagen) implementation and a scriptable mock for tests.

pub mod gemini;
pub mod mock;

pub use gemini::GeminiImageClient;
pub use mock::MockImageGenerationClient;

use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    /// Generate one JPEG for a trimmed user prompt.
    ///
    /// Returns the base64 payload exactly as the provider sent it.
    async fn generate_image(&self, prompt: &str) -> Result<String>;
}
