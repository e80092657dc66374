//! Core `SpeechEngine` trait and the `CommandSpeech` implementation.
//!
//! `CommandSpeech` invokes a configurable text-to-speech command (`espeak`,
//! `say`, `spd-say`, …) once per utterance and resolves when the process
//! exits — playback completion is therefore an explicit suspension point for
//! the queue.  Connection details come from [`SpeechConfig`]; nothing is
//! hardcoded.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::SpeechConfig;

// ---------------------------------------------------------------------------
// SpeechError
// ---------------------------------------------------------------------------

/// Errors that can occur while speaking an utterance.
///
/// All variants are non-fatal at the queue level: a failed utterance is
/// logged and skipped, the queue proceeds to the next item.
#[derive(Debug, Clone, Error)]
pub enum SpeechError {
    /// The playback process could not be started at all.
    #[error("speech engine failed to start: {0}")]
    Spawn(String),

    /// The playback process started but exited unsuccessfully.
    #[error("speech playback failed: {0}")]
    Playback(String),
}

// ---------------------------------------------------------------------------
// SpeechEngine trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for spoken-feedback backends.
///
/// Implementations must be `Send + Sync` so that they can be held behind an
/// `Arc<dyn SpeechEngine>` and driven from the queue's worker task.
///
/// # Contract
///
/// - `speak` resolves only once playback of `text` has finished.
/// - Dropping the returned future must halt playback (used by
///   [`SpeechQueue::flush_and_stop`](crate::speech::SpeechQueue::flush_and_stop)).
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Speak `text` aloud and wait for playback to complete.
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;
}

// Compile-time assertion: Box<dyn SpeechEngine> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechEngine>) {}
};

// ---------------------------------------------------------------------------
// CommandSpeech
// ---------------------------------------------------------------------------

/// Production speech engine that runs an external TTS command per utterance.
///
/// The child process is spawned with `kill_on_drop` so that cancelling the
/// `speak` future (queue flush, session teardown) also silences the audio.
pub struct CommandSpeech {
    command: String,
    args: Vec<String>,
}

impl CommandSpeech {
    /// Build a `CommandSpeech` from application config.
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }
}

#[async_trait]
impl SpeechEngine for CommandSpeech {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let mut child = tokio::process::Command::new(&self.command)
            .args(&self.args)
            .arg(text)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpeechError::Spawn(format!("{}: {e}", self.command)))?;

        let status = child
            .wait()
            .await
            .map_err(|e| SpeechError::Playback(e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(SpeechError::Playback(format!(
                "{} exited with {status}",
                self.command
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// SilentSpeech
// ---------------------------------------------------------------------------

/// Engine used when spoken feedback is disabled (`--mute` or config).
///
/// Feedback still flows through the queue and the view as text; it just never
/// reaches an audio backend.
pub struct SilentSpeech;

#[async_trait]
impl SpeechEngine for SilentSpeech {
    async fn speak(&self, _text: &str) -> Result<(), SpeechError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
