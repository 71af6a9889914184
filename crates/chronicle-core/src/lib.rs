pub mod aggregate;
pub mod errors;
pub mod ids;
pub mod increment;
pub mod injection;
pub mod transcript;

pub use aggregate::{Aggregate, LedgerEntry, SummaryStats, Watermark, UNSUMMARIZED};
pub use errors::GenerationError;
pub use ids::ConversationId;
pub use increment::Increment;
pub use injection::{ChatMessage, ChatRole, PromptInjection};
pub use transcript::{SpeakerRole, TranscriptEntry};
