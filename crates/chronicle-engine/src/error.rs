use chronicle_core::errors::GenerationError;
use chronicle_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The generation service failed or was unreachable. Recoverable;
    /// automatic cycles retry these.
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    /// The generation output had no usable structure. Recoverable; the
    /// cycle fails with no state mutation.
    #[error("invalid generation output: {0}")]
    Parse(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Whether an automatic cycle should spend a retry attempt on this.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Generation(e) => !e.is_fatal(),
            Self::Parse(_) => true,
            Self::Store(_) => false,
        }
    }
}
