use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use chronicle_core::aggregate::{Aggregate, LedgerEntry, Watermark, UNSUMMARIZED};
use chronicle_core::ids::ConversationId;

use crate::database::Database;
use crate::error::StoreError;

/// The persisted per-conversation summary envelope. Field names are the
/// external interface shape and must not change.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub json: Option<Aggregate>,
    pub last_summarized_mes_id: Watermark,
    #[serde(default)]
    pub summary_history: Vec<LedgerEntry>,
    #[serde(default)]
    pub updated_at: i64,
}

impl SummaryRecord {
    pub fn empty() -> Self {
        Self {
            json: None,
            last_summarized_mes_id: UNSUMMARIZED,
            summary_history: Vec::new(),
            updated_at: 0,
        }
    }
}

pub struct SummaryRepo {
    db: Database,
}

impl SummaryRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Load the summary state for a conversation. `None` when the
    /// conversation has never been persisted.
    #[instrument(skip(self), fields(conversation = %conversation))]
    pub fn load(&self, conversation: &ConversationId) -> Result<Option<SummaryRecord>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT aggregate, last_summarized, history, updated_at
                 FROM summaries WHERE conversation_id = ?1",
            )?;
            let mut rows = stmt.query([conversation.as_str()])?;

            let Some(row) = rows.next()? else {
                return Ok(None);
            };

            let aggregate_raw: Option<String> = row.get(0)?;
            let last_summarized: i64 = row.get(1)?;
            let history_raw: String = row.get(2)?;
            let updated_at: i64 = row.get(3)?;

            let json = match aggregate_raw {
                Some(raw) => Some(serde_json::from_str(&raw)?),
                None => None,
            };
            let summary_history = serde_json::from_str(&history_raw)?;

            Ok(Some(SummaryRecord {
                json,
                last_summarized_mes_id: last_summarized,
                summary_history,
                updated_at,
            }))
        })
    }

    /// Upsert the summary state for a conversation. Stamps `updated_at`.
    #[instrument(skip(self, record), fields(conversation = %conversation, watermark = record.last_summarized_mes_id))]
    pub fn save(
        &self,
        conversation: &ConversationId,
        record: &SummaryRecord,
    ) -> Result<(), StoreError> {
        let aggregate_raw = match &record.json {
            Some(agg) => Some(serde_json::to_string(agg)?),
            None => None,
        };
        let history_raw = serde_json::to_string(&record.summary_history)?;
        let now = Utc::now().timestamp_millis();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO summaries (conversation_id, aggregate, last_summarized, history, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(conversation_id) DO UPDATE SET
                    aggregate = excluded.aggregate,
                    last_summarized = excluded.last_summarized,
                    history = excluded.history,
                    updated_at = excluded.updated_at",
                rusqlite::params![
                    conversation.as_str(),
                    aggregate_raw,
                    record.last_summarized_mes_id,
                    history_raw,
                    now,
                ],
            )?;
            Ok(())
        })
    }

    /// Remove a conversation's summary state entirely.
    #[instrument(skip(self), fields(conversation = %conversation))]
    pub fn delete(&self, conversation: &ConversationId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM summaries WHERE conversation_id = ?1",
                [conversation.as_str()],
            )?;
            Ok(())
        })
    }
}
