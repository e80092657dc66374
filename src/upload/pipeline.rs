//! Core `VideoSubmitter` trait and `UploadPipeline` implementation.
//!
//! `UploadPipeline` performs the one-shot upload/analyze exchange:
//! `POST {base}/api/process-video` with a multipart body holding exactly one
//! video part, then parses the JSON verdict into [`AnalysisResult`].
//!
//! At most one submission may be in flight; a second `submit` while one is
//! pending fails immediately with [`UploadError::Busy`] instead of queuing.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{ServerConfig, UploadConfig};
use crate::upload::request::UploadRequest;

// ---------------------------------------------------------------------------
// UploadError
// ---------------------------------------------------------------------------

/// Errors that can occur during the upload/analyze exchange.
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    /// The service answered with a non-2xx status.
    #[error("analysis service rejected the upload (HTTP {status}): {cause}")]
    Rejected { status: u16, cause: String },

    /// The request never completed (DNS, connect, broken pipe, …).
    #[error("upload transport failed: {0}")]
    Transport(String),

    /// The response body was not the expected JSON shape.
    #[error("analysis response could not be parsed: {0}")]
    Parse(String),

    /// The source video could not be read.
    #[error("video source could not be read: {0}")]
    Source(String),

    /// A submission is already in flight.  Contract violation by the caller;
    /// the pending submission is unaffected.
    #[error("an upload is already in flight")]
    Busy,
}

// ---------------------------------------------------------------------------
// AnalysisResult
// ---------------------------------------------------------------------------

/// One entry of the service's form-check conversation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisMessage {
    pub role: String,
    pub content: String,
}

/// The batched verdict returned by the analysis service.
///
/// Immutable once created.  Fields are never required to be fully populated:
/// a missing `messages` sequence deserializes to an empty vec and a missing
/// summary to `None` — neither is an error.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisResult {
    /// Spoken summary (wire field `text`).
    #[serde(rename = "text", default)]
    pub summary_text: Option<String>,

    /// Ordered form-check messages.
    #[serde(default)]
    pub messages: Vec<AnalysisMessage>,
}

// ---------------------------------------------------------------------------
// VideoSubmitter trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for one-shot video submission.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn VideoSubmitter>` by the coordinator.
#[async_trait]
pub trait VideoSubmitter: Send + Sync {
    /// Upload `request` and wait for the batched analysis verdict.
    async fn submit(&self, request: &UploadRequest) -> Result<AnalysisResult, UploadError>;
}

// Compile-time assertion: Box<dyn VideoSubmitter> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn VideoSubmitter>) {}
};

// ---------------------------------------------------------------------------
// UploadPipeline
// ---------------------------------------------------------------------------

/// Production submitter backed by reqwest.
///
/// The HTTP client deliberately carries no request timeout: analysis of a
/// 30-second clip may legitimately take tens of seconds, so the transport's
/// own limits are the only bound.
pub struct UploadPipeline {
    client: reqwest::Client,
    base_url: String,
    field_name: String,
    in_flight: AtomicBool,
}

/// Releases the single-flight guard on every exit path.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl UploadPipeline {
    /// Build a pipeline from application config.
    pub fn from_config(server: &ServerConfig, upload: &UploadConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: server.base_url.clone(),
            field_name: upload.field_name.clone(),
            in_flight: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl VideoSubmitter for UploadPipeline {
    async fn submit(&self, request: &UploadRequest) -> Result<AnalysisResult, UploadError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(UploadError::Busy);
        }
        let _guard = FlightGuard(&self.in_flight);

        let path = request.normalized_uri();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::Source(format!("{path}: {e}")))?;

        log::info!(
            "upload: submitting {} ({} bytes, {})",
            request.file_name,
            bytes.len(),
            request.mime_type
        );

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(request.file_name.clone())
            .mime_str(&request.mime_type)
            .map_err(|e| UploadError::Source(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part(self.field_name.clone(), part);

        let url = format!("{}/api/process-video", self.base_url);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let cause = match response.text().await {
                Ok(body) if !body.trim().is_empty() => truncate(body.trim(), 200),
                _ => status
                    .canonical_reason()
                    .unwrap_or("upload rejected")
                    .to_string(),
            };
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                cause,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        let result: AnalysisResult =
            serde_json::from_str(&body).map_err(|e| UploadError::Parse(e.to_string()))?;

        log::info!(
            "upload: analysis complete ({} message(s))",
            result.messages.len()
        );
        Ok(result)
    }
}

/// Cap a server-supplied cause string for log/error display.
fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
