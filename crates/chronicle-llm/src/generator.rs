use async_trait::async_trait;

use chronicle_core::errors::GenerationError;
use chronicle_core::injection::ChatMessage;

/// Sampling knobs forwarded to the backend. All optional; `None` leaves the
/// backend default in place.
#[derive(Clone, Debug, Default)]
pub struct GenerateOptions {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub max_tokens: Option<u32>,
}

/// The text-generation backend, treated as an opaque function: an ordered
/// list of messages in, raw text out, or a failure. Everything the engine
/// knows about the backend goes through this trait.
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerateOptions,
    ) -> Result<String, GenerationError>;
}
