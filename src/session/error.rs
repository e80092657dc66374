//! Session error taxonomy.
//!
//! Component-local failures with a defined recovery (reconnect, skip an
//! utterance) are absorbed where they happen; everything else funnels into
//! [`SessionError`], surfaces as the coordinator's `Error` state, and reaches
//! the presentation boundary as one human-readable message plus an
//! [`ErrorKind`] for programmatic handling.

use thiserror::Error;

use crate::channel::ChannelError;
use crate::media::MediaError;
use crate::upload::UploadError;

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Programmatic classification of a [`SessionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Capability denied.  Terminal for the attempt; no retry offered.
    PermissionDenied,
    /// Feedback channel unavailable.  Non-fatal: batch flow continues.
    ConnectFailed,
    /// Upload/analyze exchange failed.  Terminal for the attempt; the user
    /// may retry by restarting the session.
    UploadFailed,
    /// Concurrent-submission contract violation.  Logged, never user-facing.
    Busy,
    /// An utterance failed to play.  Logged inside the queue, non-fatal.
    PlaybackFailed,
}

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Errors surfaced by the session coordinator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// The capability check came back denied.
    #[error("access to the capture source was denied")]
    PermissionDenied,

    /// The feedback channel could not be established; real-time feedback is
    /// unavailable for this session.
    #[error("could not reach the feedback service: {0}")]
    ConnectFailed(String),

    /// The upload/analyze exchange failed.  `status` carries the HTTP status
    /// when the service answered at all.
    #[error("video analysis failed: {cause}")]
    UploadFailed { status: Option<u16>, cause: String },

    /// A second analysis was requested while one is running.
    #[error("another analysis is already running")]
    Busy,

    /// Spoken feedback could not be played.
    #[error("spoken feedback playback failed: {0}")]
    PlaybackFailed(String),
}

impl SessionError {
    /// Taxonomy kind for programmatic handling and tests.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::PermissionDenied => ErrorKind::PermissionDenied,
            SessionError::ConnectFailed(_) => ErrorKind::ConnectFailed,
            SessionError::UploadFailed { .. } => ErrorKind::UploadFailed,
            SessionError::Busy => ErrorKind::Busy,
            SessionError::PlaybackFailed(_) => ErrorKind::PlaybackFailed,
        }
    }
}

impl From<UploadError> for SessionError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::Rejected { status, cause } => SessionError::UploadFailed {
                status: Some(status),
                cause,
            },
            UploadError::Busy => SessionError::Busy,
            UploadError::Transport(cause)
            | UploadError::Parse(cause)
            | UploadError::Source(cause) => SessionError::UploadFailed {
                status: None,
                cause,
            },
        }
    }
}

impl From<ChannelError> for SessionError {
    fn from(e: ChannelError) -> Self {
        SessionError::ConnectFailed(e.to_string())
    }
}

impl From<MediaError> for SessionError {
    fn from(e: MediaError) -> Self {
        SessionError::UploadFailed {
            status: None,
            cause: e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
