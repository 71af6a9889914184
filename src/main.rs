use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;

use chronicle_core::ids::ConversationId;
use chronicle_core::transcript::TranscriptEntry;
use chronicle_engine::{CycleOutcome, LengthObservation, Orchestrator, Trigger};
use chronicle_llm::generator::Generator;
use chronicle_llm::{HttpGenerator, MockGenerator};
use chronicle_store::Database;

#[derive(Parser)]
#[command(
    name = "chronicle",
    about = "Incremental story-fact extraction over a growing transcript"
)]
struct Cli {
    /// SQLite state database.
    #[arg(long, default_value = "chronicle.db")]
    db: PathBuf,

    /// Transcript file: one JSON entry per line.
    #[arg(long)]
    transcript: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one summarization cycle over the pending slice.
    Summarize {
        /// Last transcript index to fold in (defaults to the final entry).
        #[arg(long)]
        target: Option<usize>,

        /// Use the built-in mock backend instead of HTTP.
        #[arg(long)]
        mock: bool,

        /// Run as an automatic cycle (bounded retries with a fixed delay).
        #[arg(long)]
        auto: bool,

        /// OpenAI-compatible endpoint base URL.
        #[arg(long, default_value = "https://api.openai.com/v1")]
        base_url: String,

        /// Model name sent to the backend.
        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,
    },
    /// Print stats and the current injection.
    Status,
    /// Reset the conversation state.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let entries = load_transcript(&cli.transcript)
        .with_context(|| format!("load transcript {}", cli.transcript.display()))?;
    let conversation =
        ConversationId::from_raw(format!("transcript:{}", cli.transcript.display()));
    let db = Database::open(&cli.db).context("open state database")?;

    match cli.command {
        Command::Summarize {
            target,
            mock,
            auto,
            base_url,
            model,
        } => {
            let generator = build_generator(mock, &base_url, &model)?;
            let orchestrator = Orchestrator::new(generator, db);

            if let LengthObservation::RolledBack { outcome, .. } =
                orchestrator.observe_transcript(&conversation, &entries)?
            {
                println!(
                    "transcript shrank: rolled back to watermark {} ({} summarized entries removed)",
                    outcome.target, outcome.removed
                );
            }

            let target = target.unwrap_or(entries.len().saturating_sub(1));
            let trigger = if auto { Trigger::Auto } else { Trigger::Manual };
            let outcome = orchestrator
                .generate(&conversation, &entries, target, trigger)
                .await?;

            println!("{}", outcome.status_text());
            if let CycleOutcome::Completed { stats, injection } = outcome {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                if let Some(injection) = injection {
                    println!("--- injection (depth {}) ---", injection.depth);
                    println!("{}", injection.value);
                }
            }
            orchestrator.flush().await;
        }
        Command::Status => {
            let orchestrator = Orchestrator::new(Arc::new(MockGenerator::new(vec![])), db);
            let stats = orchestrator.stats(&conversation, entries.len())?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            match orchestrator.injection(&conversation, entries.len())? {
                Some(injection) => {
                    println!("--- injection (depth {}) ---", injection.depth);
                    println!("{}", injection.value);
                }
                None => println!("(no injection)"),
            }
        }
        Command::Clear => {
            let orchestrator = Orchestrator::new(Arc::new(MockGenerator::new(vec![])), db);
            let stats = orchestrator.clear(&conversation, entries.len())?;
            orchestrator.flush().await;
            println!("cleared · {} entries pending", stats.pending_entries);
        }
    }

    Ok(())
}

fn build_generator(mock: bool, base_url: &str, model: &str) -> Result<Arc<dyn Generator>> {
    if mock {
        // Advances the watermark without inventing facts; useful for
        // exercising the pipeline offline.
        return Ok(Arc::new(MockGenerator::always("{}")));
    }

    let Ok(key) = std::env::var("CHRONICLE_API_KEY") else {
        bail!("CHRONICLE_API_KEY is not set (or pass --mock)");
    };
    let generator = HttpGenerator::new(base_url, SecretString::from(key), model)
        .context("build HTTP generator")?;
    Ok(Arc::new(generator))
}

fn load_transcript(path: &Path) -> Result<Vec<TranscriptEntry>> {
    let raw = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: TranscriptEntry = serde_json::from_str(line)
            .with_context(|| format!("transcript line {}", line_no + 1))?;
        entries.push(entry);
    }
    Ok(entries)
}
