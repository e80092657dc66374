//! formcoach — exercise-video analysis client core.
//!
//! The user records or selects an exercise video, the client uploads it to a
//! remote analysis service and the service answers twice: once as a batched
//! [`AnalysisResult`](upload::AnalysisResult) and, while the session is
//! active, as a stream of real-time feedback events that are spoken aloud.
//!
//! # Architecture
//!
//! ```text
//! presentation (main.rs)
//!   └─▶ SessionCoordinator ── state machine, the only entry point
//!         ├─▶ ChannelManager ── persistent SSE feedback connection
//!         ├─▶ SpeechQueue ── serialized spoken feedback
//!         └─▶ UploadPipeline ── one-shot multipart upload / batch result
//! ```
//!
//! The coordinator is the only component the presentation layer talks to.
//! It owns the session lifecycle (`Idle → PermissionPending → Capturing →
//! Uploading → Analyzing → Completed`, `Error` from any non-terminal state)
//! and composes the three subsystems above.

pub mod channel;
pub mod config;
pub mod media;
pub mod session;
pub mod speech;
pub mod upload;
