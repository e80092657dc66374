//! Application entry point — formcoach CLI.
//!
//! # Startup sequence
//!
//! 1. Parse CLI arguments.
//! 2. Initialise logging.
//! 3. Load [`AppConfig`] from disk (returns default on first run) and apply
//!    CLI overrides.
//! 4. Build the speech engine and queue.
//! 5. Build the feedback channel (SSE transport + manager).
//! 6. Build the upload pipeline.
//! 7. Build the session coordinator and spawn its run loop.
//! 8. Send `Start` and render session events until a terminal state.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tokio::sync::mpsc;

use formcoach::{
    channel::{ChannelManager, SseTransport, TaggedEvent},
    config::AppConfig,
    media::{FileAccessGate, FileMediaSource},
    session::{new_shared_view, SessionCommand, SessionCoordinator, SessionEvent},
    speech::{CommandSpeech, SilentSpeech, SpeechEngine, SpeechQueue},
    upload::UploadPipeline,
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Analyze an exercise video and speak the coach's feedback.
#[derive(Debug, Parser)]
#[command(name = "formcoach", version, about)]
struct Cli {
    /// Path to the exercise video to analyze.
    video: PathBuf,

    /// Analysis service base URL (overrides the configured one).
    #[arg(long)]
    server: Option<String>,

    /// Disable spoken feedback; corrections are printed only.
    #[arg(long)]
    mute: bool,
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. CLI
    let cli = Cli::parse();

    // 2. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("formcoach starting up");

    // 3. Configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    if let Some(server) = cli.server {
        config.server.base_url = server;
    }

    // 4. Speech
    let engine: Arc<dyn SpeechEngine> = if cli.mute || !config.speech.enabled {
        log::info!("Spoken feedback disabled");
        Arc::new(SilentSpeech)
    } else {
        Arc::new(CommandSpeech::from_config(&config.speech))
    };
    let speech = Arc::new(SpeechQueue::new(engine));

    // 5. Feedback channel
    let (tag_tx, tag_rx) = mpsc::channel::<TaggedEvent>(32);
    let channel = ChannelManager::new(
        Arc::new(SseTransport::new()),
        Duration::from_secs(config.server.connect_timeout_secs),
        tag_tx,
    );

    // 6. Upload pipeline
    let pipeline = Arc::new(UploadPipeline::from_config(&config.server, &config.upload));

    // 7. Coordinator
    let (events_tx, mut events) = mpsc::channel::<SessionEvent>(64);
    let (command_tx, command_rx) = mpsc::channel::<SessionCommand>(8);
    let coordinator = SessionCoordinator::new(
        new_shared_view(),
        Arc::new(FileAccessGate::new(&cli.video)),
        Arc::new(FileMediaSource::new(&cli.video)),
        pipeline,
        channel,
        tag_rx,
        Arc::clone(&speech),
        config.server.base_url.clone(),
        events_tx,
    );
    let runner = tokio::spawn(coordinator.run(command_rx));

    // 8. Drive one session to a terminal state
    command_tx
        .send(SessionCommand::Start)
        .await
        .context("session coordinator unavailable")?;

    let mut failure: Option<String> = None;
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::StateChanged(state) => log::info!("state: {}", state.label()),
            SessionEvent::Feedback { text } => println!("coach: {text}"),
            SessionEvent::Warning(message) => eprintln!("warning: {message}"),
            SessionEvent::Completed(result) => {
                if let Some(summary) = result.summary_text.as_deref() {
                    println!("summary: {summary}");
                }
                for message in &result.messages {
                    println!("[{}] {}", message.role, message.content);
                }
                break;
            }
            SessionEvent::Failed(error) => {
                failure = Some(error.to_string());
                break;
            }
        }
    }

    // Let queued speech finish before tearing the session down.
    while !speech.is_idle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let _ = command_tx.send(SessionCommand::Reset).await;
    drop(command_tx);
    let _ = runner.await;

    match failure {
        Some(message) => anyhow::bail!("{message}"),
        None => Ok(()),
    }
}
