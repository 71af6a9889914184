pub mod error;
pub mod ledger;
pub mod merge;
pub mod orchestrator;
pub mod project;
pub mod rollback;
pub mod session;
pub mod slice;

pub use error::EngineError;
pub use ledger::SnapshotLedger;
pub use orchestrator::{
    AutoTriggerConfig, CycleOutcome, LengthObservation, Orchestrator, Section, Trigger,
    TriggerTiming,
};
pub use rollback::{RollbackOutcome, ROLLBACK_THRESHOLD};
pub use session::{ConversationSession, SessionRegistry};
pub use slice::TranscriptSlice;
