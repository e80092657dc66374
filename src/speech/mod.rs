//! Spoken-feedback subsystem.
//!
//! This module provides:
//! * [`SpeechEngine`] — async trait implemented by all playback backends.
//! * [`CommandSpeech`] — production backend that shells out to a TTS command.
//! * [`SpeechQueue`] — FIFO queue that serializes playback, one utterance at
//!   a time, and survives per-utterance failures.
//! * [`SpeechError`] — error variants for playback operations.
//!
//! # Ordering contract
//!
//! Utterances are spoken in exact arrival order and never concurrently.  An
//! `enqueue` call never interrupts the utterance currently playing;
//! [`SpeechQueue::clear`] drops only pending utterances, and
//! [`SpeechQueue::flush_and_stop`] additionally halts in-flight playback.

pub mod engine;
pub mod queue;

pub use engine::{CommandSpeech, SilentSpeech, SpeechEngine, SpeechError};
pub use queue::SpeechQueue;
