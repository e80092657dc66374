//! One-shot video upload and batch-result parsing.
//!
//! This module provides:
//! * [`UploadRequest`] — one upload attempt, with platform-URI normalization.
//! * [`AnalysisResult`] / [`AnalysisMessage`] — the service's batch verdict.
//! * [`VideoSubmitter`] — async trait the coordinator drives uploads through.
//! * [`UploadPipeline`] — production submitter (multipart POST via reqwest).
//! * [`UploadError`] — error variants, including the single-flight `Busy`
//!   guard violation.
//!
//! The pipeline performs no automatic retry; retrying is a coordinator/user
//! decision (restart the session).

pub mod pipeline;
pub mod request;

pub use pipeline::{AnalysisMessage, AnalysisResult, UploadError, UploadPipeline, VideoSubmitter};
pub use request::UploadRequest;
