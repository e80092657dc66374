//! FIFO speech queue — serializes utterance playback.
//!
//! [`SpeechQueue`] owns a single worker task that pops utterances off a
//! shared deque and plays them through an `Arc<dyn SpeechEngine>`.  Having
//! exactly one worker is what guarantees the ordering contract: no matter
//! how many `enqueue` calls race, two playback calls never overlap and
//! arrival order is playback order.
//!
//! The queue is a process-lifetime singleton: it is reused across sessions
//! and reset between them with [`clear`](SpeechQueue::clear) /
//! [`flush_and_stop`](SpeechQueue::flush_and_stop).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::speech::engine::SpeechEngine;

// ---------------------------------------------------------------------------
// SpeechQueue
// ---------------------------------------------------------------------------

struct Inner {
    /// Utterances not yet started, in arrival order.
    pending: Mutex<VecDeque<String>>,
    /// Wakes the worker when a new utterance arrives.
    wake: Notify,
    /// Cancellation handle for the utterance currently playing, if any.
    current: Mutex<Option<CancellationToken>>,
}

/// Serializing playback queue for spoken feedback.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use formcoach::config::SpeechConfig;
/// use formcoach::speech::{CommandSpeech, SpeechQueue};
///
/// # async fn example() {
/// let engine = Arc::new(CommandSpeech::from_config(&SpeechConfig::default()));
/// let queue = SpeechQueue::new(engine);
///
/// queue.enqueue("Keep your back straight");
/// queue.enqueue("Good form");
/// // spoken one after the other, in that order
/// # }
/// ```
pub struct SpeechQueue {
    inner: Arc<Inner>,
    worker: JoinHandle<()>,
}

impl SpeechQueue {
    /// Create a queue and spawn its worker task on the current runtime.
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        let inner = Arc::new(Inner {
            pending: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
            current: Mutex::new(None),
        });

        let worker = tokio::spawn(worker_loop(engine, Arc::clone(&inner)));

        Self { inner, worker }
    }

    /// Append `text` to the queue.  Never interrupts the utterance currently
    /// playing; the new utterance is spoken once everything ahead of it has
    /// finished (or failed).
    pub fn enqueue(&self, text: impl Into<String>) {
        self.inner.pending.lock().unwrap().push_back(text.into());
        self.inner.wake.notify_one();
    }

    /// Drop all pending (not-yet-started) utterances.  The utterance
    /// currently playing, if any, runs to completion.
    ///
    /// Used on session teardown so feedback for a dead session is never
    /// spoken.
    pub fn clear(&self) {
        let dropped = {
            let mut pending = self.inner.pending.lock().unwrap();
            let n = pending.len();
            pending.clear();
            n
        };
        if dropped > 0 {
            log::debug!("speech: cleared {dropped} pending utterance(s)");
        }
    }

    /// Drop all pending utterances **and** halt in-flight playback.
    ///
    /// Used when the user explicitly exits mid-session.
    pub fn flush_and_stop(&self) {
        self.clear();
        if let Some(token) = self.inner.current.lock().unwrap().as_ref() {
            token.cancel();
        }
    }

    /// Number of utterances waiting to be spoken (excludes the one playing).
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().unwrap().len()
    }

    /// True when nothing is pending and nothing is playing.  Lets callers
    /// wait for queued feedback to finish before shutting down.
    pub fn is_idle(&self) -> bool {
        let pending = self.inner.pending.lock().unwrap();
        pending.is_empty() && self.inner.current.lock().unwrap().is_none()
    }
}

impl Drop for SpeechQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Single consumer loop: pop → speak → repeat.
///
/// Playback failures are per-item and non-fatal: the error is logged and the
/// loop proceeds to the next utterance.
async fn worker_loop(engine: Arc<dyn SpeechEngine>, inner: Arc<Inner>) {
    loop {
        // `current` is set while the pending lock is still held so that
        // `is_idle` never observes the gap between pop and playback start.
        let next = {
            let mut pending = inner.pending.lock().unwrap();
            pending.pop_front().map(|text| {
                let token = CancellationToken::new();
                *inner.current.lock().unwrap() = Some(token.clone());
                (text, token)
            })
        };

        let Some((text, token)) = next else {
            inner.wake.notified().await;
            continue;
        };

        tokio::select! {
            _ = token.cancelled() => {
                // Dropping the speak future halts the underlying playback.
                log::debug!("speech: in-flight utterance stopped");
            }
            result = engine.speak(&text) => {
                if let Err(e) = result {
                    log::warn!("speech: playback failed, skipping utterance: {e}");
                }
            }
        }

        *inner.current.lock().unwrap() = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
