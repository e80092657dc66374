//! Session lifecycle — the coordinator and its state machine.
//!
//! This module provides:
//! * [`SessionId`] / [`Session`] — one analysis attempt.
//! * [`SessionState`] — authoritative state machine states.
//! * [`SessionView`] / [`SharedView`] — what the presentation layer reads.
//! * [`SessionError`] / [`ErrorKind`] — the error taxonomy.
//! * [`SessionCoordinator`] — owns the lifecycle and composes the speech
//!   queue, channel manager and upload pipeline.  The only component the
//!   presentation layer talks to.

pub mod coordinator;
pub mod error;
pub mod state;

pub use coordinator::{SessionCommand, SessionCoordinator, SessionEvent};
pub use error::{ErrorKind, SessionError};
pub use state::{new_shared_view, Session, SessionId, SessionState, SessionView, SharedView};
