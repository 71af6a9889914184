use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use chronicle_core::ids::ConversationId;

use crate::summaries::{SummaryRecord, SummaryRepo};

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

enum Command {
    Save(ConversationId, SummaryRecord),
    Flush(oneshot::Sender<()>),
}

/// Coalescing writer for summary state. Rapid saves for the same
/// conversation collapse into one write, issued after a quiet period with
/// no further saves. Persistence is fire-and-forget: write failures are
/// logged, never surfaced to the merge cycle.
///
/// Must be spawned from within a tokio runtime.
#[derive(Clone)]
pub struct DebouncedWriter {
    tx: mpsc::UnboundedSender<Command>,
}

impl DebouncedWriter {
    pub fn spawn(repo: SummaryRepo) -> Self {
        Self::with_quiet_period(repo, DEFAULT_QUIET_PERIOD)
    }

    pub fn with_quiet_period(repo: SummaryRepo, quiet_period: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut pending: HashMap<ConversationId, SummaryRecord> = HashMap::new();

            loop {
                if pending.is_empty() {
                    // Nothing buffered: block until the next command.
                    match rx.recv().await {
                        Some(Command::Save(conversation, record)) => {
                            pending.insert(conversation, record);
                        }
                        Some(Command::Flush(ack)) => {
                            let _ = ack.send(());
                        }
                        None => break,
                    }
                    continue;
                }

                let timer = tokio::time::sleep(quiet_period);
                tokio::pin!(timer);

                tokio::select! {
                    cmd = rx.recv() => match cmd {
                        Some(Command::Save(conversation, record)) => {
                            // Resets the quiet period.
                            pending.insert(conversation, record);
                        }
                        Some(Command::Flush(ack)) => {
                            flush_all(&repo, &mut pending);
                            let _ = ack.send(());
                        }
                        None => {
                            flush_all(&repo, &mut pending);
                            break;
                        }
                    },
                    _ = &mut timer => {
                        flush_all(&repo, &mut pending);
                    }
                }
            }
        });

        Self { tx }
    }

    /// Buffer a save. The latest record per conversation wins.
    pub fn schedule(&self, conversation: &ConversationId, record: SummaryRecord) {
        let _ = self
            .tx
            .send(Command::Save(conversation.clone(), record));
    }

    /// Force all buffered writes out and wait for them to land.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

fn flush_all(repo: &SummaryRepo, pending: &mut HashMap<ConversationId, SummaryRecord>) {
    for (conversation, record) in pending.drain() {
        if let Err(e) = repo.save(&conversation, &record) {
            warn!(conversation = %conversation, error = %e, "debounced summary write failed");
        }
    }
}
