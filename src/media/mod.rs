//! Capture-capability and media-selection boundaries.
//!
//! The platform pieces the coordinator must not know about — permission
//! dialogs, camera/file pickers — are consumed through two narrow traits:
//!
//! * [`CaptureGate`] — a single idempotent yes/no capability check.
//! * [`MediaSource`] — produces the selected video, or `None` on user
//!   cancellation.
//!
//! The production implementations back both onto the local filesystem; GUI
//! platforms substitute their own.

pub mod gate;
pub mod source;

pub use gate::{CaptureGate, FileAccessGate};
pub use source::{FileMediaSource, MediaError, MediaSource};
