use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Language, ModelTier, RefinementAction, Surface, Tone};

pub mod gemini;
pub mod prompt;

pub use gemini::GeminiClient;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("content service unreachable: {0}")]
    Http(#[from] reqwest::Error),
    #[error("content service error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid content service response: {0}")]
    InvalidResponse(String),
    #[error("model returned no text")]
    EmptyText,
    #[error("no image data found in response")]
    NoImage,
    #[error("no API key configured")]
    MissingApiKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRequest {
    pub surface: Surface,
    pub topic: String,
    pub tone: Tone,
    pub language: Language,
    pub keywords: String,
    pub brand_voice: String,
    pub thread_mode: bool,
    pub model_tier: ModelTier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub surface: Surface,
    pub topic: String,
    /// Already generated post text; providers only look at a bounded excerpt.
    pub context_text: String,
    pub tone: Tone,
    pub model_tier: ModelTier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefineRequest {
    pub surface: Surface,
    pub current_text: String,
    pub action: RefinementAction,
    pub tone: Tone,
    pub language: Language,
    pub model_tier: ModelTier,
}

/// Generative content capability. Each call is a single fallible attempt;
/// implementations must not retry internally.
#[async_trait]
pub trait ContentService: Send + Sync {
    async fn generate_text(&self, req: &TextRequest) -> Result<String, GenerationError>;

    /// Returns an image reference (a `data:` URL for inline payloads).
    /// Must honor `req.surface.aspect_ratio()`.
    async fn generate_image(&self, req: &ImageRequest) -> Result<String, GenerationError>;

    async fn refine(&self, req: &RefineRequest) -> Result<String, GenerationError>;
}
