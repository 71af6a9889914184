use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use chronicle_core::aggregate::{Aggregate, SummaryStats, Watermark, UNSUMMARIZED};
use chronicle_core::ids::ConversationId;
use chronicle_store::{StoreError, SummaryRecord, SummaryRepo};

use crate::ledger::SnapshotLedger;

/// Per-conversation mutable state. Busy flags and length tracking live
/// here rather than in process-wide globals, passed by reference through
/// the orchestrator, so concurrent conversations cannot interfere.
#[derive(Debug)]
pub struct ConversationSession {
    pub id: ConversationId,
    pub aggregate: Option<Aggregate>,
    pub watermark: Watermark,
    pub ledger: SnapshotLedger,
    /// Single-flight guard: at most one generation cycle per conversation.
    pub generating: bool,
    /// Serial of the cycle currently holding the guard. A finished or
    /// cancelled cycle may only release the guard (or commit) while its
    /// serial is still current.
    pub cycle: u64,
    /// Token for the in-flight cycle, if any. Cancelling it aborts the
    /// outstanding generation call on a best-effort basis.
    pub cancel: Option<CancellationToken>,
    pub last_known_length: usize,
}

impl ConversationSession {
    pub fn new(id: ConversationId) -> Self {
        Self {
            id,
            aggregate: None,
            watermark: UNSUMMARIZED,
            ledger: SnapshotLedger::new(),
            generating: false,
            cycle: 0,
            cancel: None,
            last_known_length: 0,
        }
    }

    pub fn hydrate(id: ConversationId, record: SummaryRecord) -> Self {
        Self {
            id,
            aggregate: record.json,
            watermark: record.last_summarized_mes_id,
            ledger: SnapshotLedger::from_entries(record.summary_history),
            generating: false,
            cycle: 0,
            cancel: None,
            last_known_length: 0,
        }
    }

    /// Snapshot the durable parts for persistence.
    pub fn to_record(&self) -> SummaryRecord {
        SummaryRecord {
            json: self.aggregate.clone(),
            last_summarized_mes_id: self.watermark,
            summary_history: self.ledger.entries().to_vec(),
            updated_at: 0,
        }
    }

    pub fn event_count(&self) -> usize {
        self.aggregate.as_ref().map(|a| a.event_count()).unwrap_or(0)
    }

    pub fn stats(&self, transcript_len: usize) -> SummaryStats {
        SummaryStats::compute(transcript_len, self.watermark, self.event_count())
    }

    /// Reset to the never-summarized state: aggregate absent, watermark at
    /// the sentinel, ledger emptied.
    pub fn clear(&mut self) {
        self.aggregate = None;
        self.watermark = UNSUMMARIZED;
        self.ledger.clear();
    }
}

/// Conversation-keyed session map, hydrated lazily from the store.
pub struct SessionRegistry {
    sessions: DashMap<ConversationId, Arc<Mutex<ConversationSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Fetch the session for a conversation, loading persisted state on
    /// first touch.
    pub fn get_or_hydrate(
        &self,
        id: &ConversationId,
        repo: &SummaryRepo,
    ) -> Result<Arc<Mutex<ConversationSession>>, StoreError> {
        if let Some(existing) = self.sessions.get(id) {
            return Ok(existing.clone());
        }

        let session = match repo.load(id)? {
            Some(record) => ConversationSession::hydrate(id.clone(), record),
            None => ConversationSession::new(id.clone()),
        };

        let entry = self
            .sessions
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(session)));
        Ok(entry.clone())
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
