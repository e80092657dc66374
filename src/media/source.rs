//! Media selection boundary.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::upload::UploadRequest;

// ---------------------------------------------------------------------------
// MediaError
// ---------------------------------------------------------------------------

/// Errors raised while acquiring media (distinct from user cancellation,
/// which is `Ok(None)`).
#[derive(Debug, Clone, Error)]
pub enum MediaError {
    #[error("media source unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// MediaSource trait
// ---------------------------------------------------------------------------

/// Object-safe interface over the capture/pick surface.
///
/// `Ok(None)` models the user cancelling the selection — the coordinator
/// returns to `Idle` with no side effects issued.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Produce the selected/recorded video, or `None` on cancellation.
    async fn acquire(&self) -> Result<Option<UploadRequest>, MediaError>;
}

// Compile-time assertion: Box<dyn MediaSource> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn MediaSource>) {}
};

// ---------------------------------------------------------------------------
// FileMediaSource
// ---------------------------------------------------------------------------

/// Production source for the pre-recorded flow: wraps a local video file.
pub struct FileMediaSource {
    path: PathBuf,
}

impl FileMediaSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MediaSource for FileMediaSource {
    async fn acquire(&self) -> Result<Option<UploadRequest>, MediaError> {
        if tokio::fs::metadata(&self.path).await.is_err() {
            return Err(MediaError::Unavailable(self.path.display().to_string()));
        }
        Ok(Some(UploadRequest::from_path(&self.path)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
