use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use chronicle_core::aggregate::{Aggregate, SummaryStats};
use chronicle_core::errors::GenerationError;
use chronicle_core::ids::ConversationId;
use chronicle_core::injection::PromptInjection;
use chronicle_core::transcript::TranscriptEntry;
use chronicle_llm::generator::{GenerateOptions, Generator};
use chronicle_llm::parse::parse_increment;
use chronicle_llm::prompt::build_extraction_messages;
use chronicle_store::{Database, DebouncedWriter, SummaryRepo};

use crate::error::EngineError;
use crate::merge::merge;
use crate::project::{project, render_prior_context};
use crate::rollback::{maybe_rollback, RollbackOutcome};
use crate::session::SessionRegistry;
use crate::slice::select_slice;

/// Total attempts for an automatically triggered cycle before surfacing a
/// terminal failure. Manual cycles make a single attempt and leave retry to
/// the caller.
pub const AUTO_ATTEMPTS: u32 = 3;
pub const AUTO_RETRY_DELAY: Duration = Duration::from_secs(1);

/// How a cycle was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Manual,
    Auto,
}

/// When the auto-trigger policy is allowed to fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerTiming {
    AfterCharacter,
    BeforeUser,
    Manual,
}

/// Policy for automatically starting a cycle once enough pending entries
/// accumulate.
#[derive(Clone, Debug)]
pub struct AutoTriggerConfig {
    pub enabled: bool,
    pub interval: i64,
    pub timing: TriggerTiming,
}

impl Default for AutoTriggerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: 20,
            timing: TriggerTiming::AfterCharacter,
        }
    }
}

/// Result of one generation request.
#[derive(Clone, Debug, PartialEq)]
pub enum CycleOutcome {
    Completed {
        stats: SummaryStats,
        injection: Option<PromptInjection>,
    },
    /// The pending slice was empty — a successful no-op.
    NothingPending,
    /// A cycle is already running for this conversation. Rejected
    /// immediately, never queued or retried.
    Busy,
    /// The in-flight generation call was cancelled; nothing was merged.
    Cancelled,
}

impl CycleOutcome {
    pub fn status_text(&self) -> String {
        match self {
            Self::Completed { stats, .. } => format!(
                "Summarized up to entry {} · {} events",
                stats.summarized_up_to, stats.event_count
            ),
            Self::NothingPending => "No new entries to summarize".to_string(),
            Self::Busy => "A summary cycle is already running".to_string(),
            Self::Cancelled => "Stopped".to_string(),
        }
    }
}

/// Aggregate section addressable by the host's manual editor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Keywords,
    Events,
    Characters,
    Arcs,
}

impl Section {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "keywords" => Some(Self::Keywords),
            "events" => Some(Self::Events),
            "characters" => Some(Self::Characters),
            "arcs" => Some(Self::Arcs),
            _ => None,
        }
    }
}

/// What a transcript-length observation led to.
#[derive(Clone, Debug, PartialEq)]
pub enum LengthObservation {
    NoChange,
    RolledBack {
        outcome: RollbackOutcome,
        stats: SummaryStats,
        injection: Option<PromptInjection>,
    },
}

/// Drives one summarization cycle per request: slice → generate → parse →
/// merge → record → persist → project. Owns the per-conversation busy/idle
/// state and the retry policy for automatic cycles.
pub struct Orchestrator {
    registry: SessionRegistry,
    generator: Arc<dyn Generator>,
    repo: SummaryRepo,
    writer: DebouncedWriter,
    options: GenerateOptions,
    auto: AutoTriggerConfig,
}

impl Orchestrator {
    /// Must be constructed within a tokio runtime (spawns the debounced
    /// persistence task).
    pub fn new(generator: Arc<dyn Generator>, db: Database) -> Self {
        let repo = SummaryRepo::new(db.clone());
        let writer = DebouncedWriter::spawn(SummaryRepo::new(db));
        Self {
            registry: SessionRegistry::new(),
            generator,
            repo,
            writer,
            options: GenerateOptions::default(),
            auto: AutoTriggerConfig::default(),
        }
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_auto_trigger(mut self, auto: AutoTriggerConfig) -> Self {
        self.auto = auto;
        self
    }

    /// Run one summarization cycle for the pending slice up to
    /// `target_index`.
    ///
    /// Manual cycles make a single attempt. Automatic cycles retry
    /// recoverable failures up to [`AUTO_ATTEMPTS`] total attempts with a
    /// fixed [`AUTO_RETRY_DELAY`] between them. A `Busy` outcome is never
    /// retried.
    #[instrument(skip(self, entries), fields(conversation = %conversation, target_index))]
    pub async fn generate(
        &self,
        conversation: &ConversationId,
        entries: &[TranscriptEntry],
        target_index: usize,
        trigger: Trigger,
    ) -> Result<CycleOutcome, EngineError> {
        if trigger == Trigger::Manual {
            return self.run_cycle(conversation, entries, target_index).await;
        }

        let mut attempt = 1;
        loop {
            match self.run_cycle(conversation, entries, target_index).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    if !e.is_recoverable() || attempt >= AUTO_ATTEMPTS {
                        warn!(attempts = attempt, error = %e, "automatic summary generation giving up");
                        return Err(e);
                    }
                    warn!(attempt, error = %e, "automatic summary cycle failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(AUTO_RETRY_DELAY).await;
                }
            }
        }
    }

    async fn run_cycle(
        &self,
        conversation: &ConversationId,
        entries: &[TranscriptEntry],
        target_index: usize,
    ) -> Result<CycleOutcome, EngineError> {
        let session = self.registry.get_or_hydrate(conversation, &self.repo)?;

        // Acquire the single-flight guard and compute the request inputs
        // under one lock. The lock is released before awaiting the backend.
        let (slice, prior_context, next_event_id, cancel, my_cycle) = {
            let mut s = session.lock();
            if s.generating {
                return Ok(CycleOutcome::Busy);
            }

            let Some(slice) = select_slice(entries, target_index, s.watermark) else {
                return Ok(CycleOutcome::NothingPending);
            };

            s.generating = true;
            s.cycle += 1;
            let cancel = CancellationToken::new();
            s.cancel = Some(cancel.clone());

            let prior_context = render_prior_context(s.aggregate.as_ref());
            let next_event_id = s.aggregate.as_ref().map_or(1, |a| a.next_event_id());
            (slice, prior_context, next_event_id, cancel, s.cycle)
        };

        info!(
            range = %slice.range,
            count = slice.count,
            "summarizing pending transcript slice"
        );

        let messages =
            build_extraction_messages(&prior_context, &slice.text, &slice.range, next_event_id);

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(GenerationError::Cancelled),
            r = self.generator.generate(&messages, &self.options) => r,
        };

        let raw = match result {
            Ok(raw) if raw.trim().is_empty() => {
                self.finish_idle(&session, my_cycle);
                return Err(EngineError::Generation(GenerationError::EmptyResponse));
            }
            Ok(raw) => raw,
            Err(GenerationError::Cancelled) => {
                self.finish_idle(&session, my_cycle);
                return Ok(CycleOutcome::Cancelled);
            }
            Err(e) => {
                self.finish_idle(&session, my_cycle);
                return Err(EngineError::Generation(e));
            }
        };

        let Some(increment) = parse_increment(&raw) else {
            self.finish_idle(&session, my_cycle);
            return Err(EngineError::Parse(
                "generation output contained no valid JSON".to_string(),
            ));
        };

        // Commit: merge, advance the watermark, record the snapshot — all
        // under one lock so no observer sees a half-applied cycle.
        let (record, stats, injection) = {
            let mut s = session.lock();
            // A cancel that landed between the response and this commit
            // wins: drop the result rather than merge it.
            if s.cycle != my_cycle || !s.generating {
                return Ok(CycleOutcome::Cancelled);
            }

            let merged = merge(s.aggregate.as_ref(), &increment, slice.end as i64);
            s.aggregate = Some(merged);
            s.watermark = slice.end as i64;
            s.ledger.record(slice.end as i64);
            s.generating = false;
            s.cancel = None;

            let record = s.to_record();
            let stats = s.stats(entries.len());
            let injection = project(s.aggregate.as_ref(), s.watermark, entries.len());
            (record, stats, injection)
        };

        self.writer.schedule(conversation, record);

        info!(
            watermark = stats.summarized_up_to - 1,
            events = stats.event_count,
            "summary cycle committed"
        );

        Ok(CycleOutcome::Completed { stats, injection })
    }

    fn finish_idle(
        &self,
        session: &Arc<parking_lot::Mutex<crate::session::ConversationSession>>,
        my_cycle: u64,
    ) {
        let mut s = session.lock();
        if s.cycle == my_cycle {
            s.generating = false;
            s.cancel = None;
        }
    }

    /// Best-effort abort of the in-flight generation call. Returns whether
    /// a cycle was actually running. No partial result is ever merged.
    #[instrument(skip(self), fields(conversation = %conversation))]
    pub fn cancel(&self, conversation: &ConversationId) -> Result<bool, EngineError> {
        let session = self.registry.get_or_hydrate(conversation, &self.repo)?;
        let mut s = session.lock();
        let was_generating = s.generating;
        if let Some(token) = s.cancel.take() {
            token.cancel();
        }
        s.generating = false;
        Ok(was_generating)
    }

    /// Reset the conversation entirely: aggregate absent, watermark at the
    /// sentinel, ledger emptied, persisted.
    #[instrument(skip(self), fields(conversation = %conversation))]
    pub fn clear(
        &self,
        conversation: &ConversationId,
        transcript_len: usize,
    ) -> Result<SummaryStats, EngineError> {
        let session = self.registry.get_or_hydrate(conversation, &self.repo)?;
        let (record, stats) = {
            let mut s = session.lock();
            s.clear();
            (s.to_record(), s.stats(transcript_len))
        };
        self.writer.schedule(conversation, record);
        Ok(stats)
    }

    /// Wholesale replacement of one aggregate section from host-supplied
    /// JSON (the panel's manual editor). Returns the refreshed injection.
    #[instrument(skip(self, value), fields(conversation = %conversation, section = ?section))]
    pub fn update_section(
        &self,
        conversation: &ConversationId,
        section: Section,
        value: serde_json::Value,
    ) -> Result<Option<PromptInjection>, EngineError> {
        let session = self.registry.get_or_hydrate(conversation, &self.repo)?;
        let (record, injection) = {
            let mut s = session.lock();
            let aggregate = s.aggregate.get_or_insert_with(Aggregate::default);
            let result = match section {
                Section::Keywords => {
                    serde_json::from_value(value).map(|v| aggregate.keywords = v)
                }
                Section::Events => serde_json::from_value(value).map(|v| aggregate.events = v),
                Section::Characters => {
                    serde_json::from_value(value).map(|v| aggregate.characters = v)
                }
                Section::Arcs => serde_json::from_value(value).map(|v| aggregate.arcs = v),
            };
            result.map_err(|e| EngineError::Parse(format!("section payload: {e}")))?;

            let record = s.to_record();
            let injection = project(s.aggregate.as_ref(), s.watermark, s.last_known_length);
            (record, injection)
        };
        self.writer.schedule(conversation, record);
        Ok(injection)
    }

    /// Track the transcript length. A shrink past the watermark triggers
    /// the rollback engine; the restored state is persisted and
    /// re-projected.
    #[instrument(skip(self, entries), fields(conversation = %conversation, len = entries.len()))]
    pub fn observe_transcript(
        &self,
        conversation: &ConversationId,
        entries: &[TranscriptEntry],
    ) -> Result<LengthObservation, EngineError> {
        let session = self.registry.get_or_hydrate(conversation, &self.repo)?;
        let current_len = entries.len();

        let result = {
            let mut s = session.lock();
            let shrank = current_len < s.last_known_length;
            s.last_known_length = current_len;
            if !shrank {
                return Ok(LengthObservation::NoChange);
            }

            let s = &mut *s;
            match maybe_rollback(&mut s.aggregate, &mut s.watermark, &mut s.ledger, current_len) {
                Some(outcome) => {
                    let record = s.to_record();
                    let stats = s.stats(current_len);
                    let injection = project(s.aggregate.as_ref(), s.watermark, current_len);
                    Some((outcome, record, stats, injection))
                }
                None => None,
            }
        };

        match result {
            Some((outcome, record, stats, injection)) => {
                self.writer.schedule(conversation, record);
                Ok(LengthObservation::RolledBack {
                    outcome,
                    stats,
                    injection,
                })
            }
            None => Ok(LengthObservation::NoChange),
        }
    }

    /// Run an automatic cycle if the trigger policy allows it: enabled,
    /// timing matches, enough pending entries, and the conversation idle.
    pub async fn maybe_auto_generate(
        &self,
        conversation: &ConversationId,
        entries: &[TranscriptEntry],
        reason: TriggerTiming,
    ) -> Result<Option<CycleOutcome>, EngineError> {
        if !self.auto.enabled || self.auto.timing != reason || entries.is_empty() {
            return Ok(None);
        }

        let session = self.registry.get_or_hydrate(conversation, &self.repo)?;
        {
            let s = session.lock();
            if s.generating {
                return Ok(None);
            }
            let pending = entries.len() as i64 - s.watermark - 1;
            if pending < self.auto.interval.max(1) {
                return Ok(None);
            }
        }

        let outcome = self
            .generate(conversation, entries, entries.len() - 1, Trigger::Auto)
            .await?;
        Ok(Some(outcome))
    }

    pub fn stats(
        &self,
        conversation: &ConversationId,
        transcript_len: usize,
    ) -> Result<SummaryStats, EngineError> {
        let session = self.registry.get_or_hydrate(conversation, &self.repo)?;
        let s = session.lock();
        Ok(s.stats(transcript_len))
    }

    /// Snapshot of the full aggregate for the host's panel, if any.
    pub fn aggregate(
        &self,
        conversation: &ConversationId,
    ) -> Result<Option<Aggregate>, EngineError> {
        let session = self.registry.get_or_hydrate(conversation, &self.repo)?;
        let s = session.lock();
        Ok(s.aggregate.clone())
    }

    /// Current injection for the host, or `None` to remove any prior block.
    pub fn injection(
        &self,
        conversation: &ConversationId,
        transcript_len: usize,
    ) -> Result<Option<PromptInjection>, EngineError> {
        let session = self.registry.get_or_hydrate(conversation, &self.repo)?;
        let s = session.lock();
        Ok(project(s.aggregate.as_ref(), s.watermark, transcript_len))
    }

    /// Force buffered persistence out (graceful shutdown).
    pub async fn flush(&self) {
        self.writer.flush().await;
    }
}
