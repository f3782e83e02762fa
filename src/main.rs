//! Bedtime Agent command-line runner.
//!
//! Reads one input per line from stdin and prints each outcome as JSON.
//! A plain line is a message from the child in the default session; a JSON
//! line is a tagged command:
//!
//! ```text
//! {"type": "TURN", "sessionId": "s-1", "userId": "u-1", "message": "hi", "localHour": 20, "goals": [{"type": "RELAXATION", "targetMinutes": 15}]}
//! {"type": "BEAT_COMPLETED", "storyId": "moon", "beatIndex": 0, "totalBeats": 3, "sessionId": "s-1", "userId": "u-1"}
//! {"type": "SLEEP_CUE", "sessionId": "s-1", "userId": "u-1", "confidence": 0.9, "cue": "snoring"}
//! ```

use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bedtime_agent::adapters::memory::InMemoryMemoryStore;
use bedtime_agent::adapters::reasoning::{MockReasoningBackend, OpenAiReasoningBackend};
use bedtime_agent::adapters::storage::{InMemorySessionStore, RedisSessionStore};
use bedtime_agent::adapters::trace::{FileTraceSink, InMemoryTraceSink};
use bedtime_agent::application::{
    BeatCompletedEvent, Orchestrator, SleepCueEvent, TurnCommand,
};
use bedtime_agent::config::{AppConfig, StorageBackend};
use bedtime_agent::domain::foundation::{SessionId, UserId};
use bedtime_agent::ports::{ReasoningBackend, SessionStore, TraceSink};

const DEFAULT_SESSION: &str = "cli-session";
const DEFAULT_USER: &str = "cli-user";

/// One line of input.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum Inbound {
    Turn(TurnCommand),
    BeatCompleted(BeatCompletedEvent),
    SleepCue(SleepCueEvent),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let orchestrator = build_orchestrator(&config).await?;
    info!(
        storage = ?config.storage.backend,
        reasoning = if config.reasoning.has_api_key() { "openai" } else { "mock" },
        "Bedtime agent ready"
    );

    let session_id = SessionId::new(DEFAULT_SESSION)?;
    let user_id = UserId::new(DEFAULT_USER)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let inbound = if line.starts_with('{') {
            match serde_json::from_str::<Inbound>(line) {
                Ok(inbound) => inbound,
                Err(err) => {
                    warn!(error = %err, "Ignoring malformed input line");
                    continue;
                }
            }
        } else {
            Inbound::Turn(TurnCommand::message(session_id.clone(), user_id.clone(), line))
        };

        let output = match inbound {
            Inbound::Turn(command) => serde_json::to_string(&orchestrator.conduct_turn(command).await)?,
            Inbound::BeatCompleted(event) => match orchestrator.handle_beat_completed(event).await {
                Ok(outcome) => serde_json::to_string(&outcome)?,
                Err(err) => error_json(&err),
            },
            Inbound::SleepCue(event) => match orchestrator.handle_sleep_cue(event).await {
                Ok(outcome) => serde_json::to_string(&outcome)?,
                Err(err) => error_json(&err),
            },
        };

        stdout.write_all(output.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.as_str()));
    // Logs go to stderr; stdout carries outcomes.
    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    }
}

async fn build_orchestrator(config: &AppConfig) -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let sessions: Arc<dyn SessionStore> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(InMemorySessionStore::new()),
        StorageBackend::Redis => Arc::new(RedisSessionStore::connect(&config.storage.redis).await?),
    };

    let reasoning: Arc<dyn ReasoningBackend> = if config.reasoning.has_api_key() {
        Arc::new(OpenAiReasoningBackend::new(&config.reasoning)?)
    } else {
        warn!("No reasoning API key configured; using the scripted backend");
        Arc::new(MockReasoningBackend::new())
    };

    let traces: Arc<dyn TraceSink> = match &config.trace.path {
        Some(path) => Arc::new(FileTraceSink::new(path.clone())),
        None => Arc::new(InMemoryTraceSink::new()),
    };

    Ok(Orchestrator::new(
        sessions,
        reasoning,
        Arc::new(InMemoryMemoryStore::new()),
        traces,
        config.agent.clone(),
    )
    .with_feedback_policy(config.feedback.policy()))
}

fn error_json(err: &dyn std::error::Error) -> String {
    error!(error = %err, "Event rejected");
    serde_json::json!({ "status": "ERROR", "error": err.to_string() }).to_string()
}
