//! Feedback event types and channel connection state.

use chrono::{DateTime, Utc};

use crate::session::SessionId;

// ---------------------------------------------------------------------------
// FeedbackEvent
// ---------------------------------------------------------------------------

/// One real-time correction emitted by the analysis service.
///
/// Ephemeral: consumed by the speech queue and the presentation layer's
/// latest-feedback slot, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackEvent {
    /// Spoken/displayed correction text.
    pub text: String,
    /// When the event was decoded on this client.
    pub timestamp: DateTime<Utc>,
}

impl FeedbackEvent {
    /// Build an event stamped with the current time.
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// TaggedEvent
// ---------------------------------------------------------------------------

/// A [`FeedbackEvent`] tagged with the session id that was active when the
/// carrying connection was opened.
///
/// The tag is what lets the coordinator silently drop events that arrive
/// after teardown or that belong to a stale connection.
#[derive(Debug, Clone)]
pub struct TaggedEvent {
    pub session: SessionId,
    pub event: FeedbackEvent,
}

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Lifecycle state of the feedback channel.
///
/// `Failed` is non-fatal for the session: real-time feedback becomes
/// unavailable but the batch upload/analyze flow continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection and none being attempted.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Handshake acknowledged; events may arrive at any time.
    Connected,
    /// Connect (or the single reconnect attempt) failed.
    Failed,
}

impl ConnectionState {
    /// A short human-readable label suitable for status display.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Failed => "Failed",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
