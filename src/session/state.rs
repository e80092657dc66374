//! Session identity, state machine states and the shared view.
//!
//! State transitions are owned exclusively by the coordinator; everything
//! else reads a [`SharedView`] snapshot.
//!
//! ```text
//! Idle ─▶ PermissionPending ─▶ Capturing ─▶ Uploading ─▶ Analyzing ─▶ Completed
//!               │                  │                          │
//!               ▼                  ▼                          ▼
//!             Error              Idle (cancelled)           Error
//! ```
//!
//! Any non-`Idle` state can return to `Idle` via teardown (cancel/reset).

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::session::error::{ErrorKind, SessionError};
use crate::upload::AnalysisResult;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Opaque identifier for one analysis attempt.
///
/// Every side effect a session issues is tagged with its id, which is how
/// late results from a torn-down session get discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Authoritative lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session underway.
    #[default]
    Idle,
    /// Waiting on the capture capability check.
    PermissionPending,
    /// Media is being captured or selected.
    Capturing,
    /// The video is being submitted to the analysis service.
    Uploading,
    /// Submission dispatched; waiting on the verdict.
    Analyzing,
    /// Terminal: analysis result available.
    Completed,
    /// Terminal: the attempt failed (see the view's error fields).
    Error,
}

impl SessionState {
    /// Short label for logs and the status line.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::PermissionPending => "permission-pending",
            SessionState::Capturing => "capturing",
            SessionState::Uploading => "uploading",
            SessionState::Analyzing => "analyzing",
            SessionState::Completed => "completed",
            SessionState::Error => "error",
        }
    }

    /// Whether live feedback events are forwarded in this state.
    ///
    /// Feedback can only be meaningfully acted on while the exercise flow is
    /// underway; events arriving in terminal or idle states are discarded.
    pub fn accepts_feedback(&self) -> bool {
        matches!(
            self,
            SessionState::Capturing | SessionState::Uploading | SessionState::Analyzing
        )
    }

    /// Terminal states keep their session around until an explicit reset.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Error)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One analysis attempt, from start to a terminal state or teardown.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub last_error: Option<SessionError>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            state: SessionState::Idle,
            started_at: Utc::now(),
            last_error: None,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// SessionView
// ---------------------------------------------------------------------------

/// Presentation-facing snapshot, updated by the coordinator.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    pub state: SessionState,
    /// Most recent live feedback line, if any.
    pub latest_feedback: Option<String>,
    pub last_error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    /// Final analysis verdict once `Completed`.
    pub result: Option<AnalysisResult>,
}

/// Shared handle onto the view, cloned into whoever renders it.
pub type SharedView = Arc<Mutex<SessionView>>;

pub fn new_shared_view() -> SharedView {
    Arc::new(Mutex::new(SessionView::default()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
