//! Capability check boundary.

use std::path::PathBuf;

use async_trait::async_trait;

// ---------------------------------------------------------------------------
// CaptureGate trait
// ---------------------------------------------------------------------------

/// Object-safe capability check consulted before any capture/pick flow.
///
/// The contract is deliberately minimal: one idempotent async call returning
/// granted/denied.  Denial is terminal for the session attempt — the
/// coordinator opens neither the channel nor the upload pipeline.
#[async_trait]
pub trait CaptureGate: Send + Sync {
    /// Returns `true` when the capture source may be used.
    async fn request_access(&self) -> bool;
}

// Compile-time assertion: Box<dyn CaptureGate> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn CaptureGate>) {}
};

// ---------------------------------------------------------------------------
// FileAccessGate
// ---------------------------------------------------------------------------

/// Production gate for the pre-recorded flow: access is granted when the
/// selected file exists and is a regular file.
pub struct FileAccessGate {
    path: PathBuf,
}

impl FileAccessGate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CaptureGate for FileAccessGate {
    async fn request_access(&self) -> bool {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.is_file(),
            Err(e) => {
                log::warn!("media: cannot access {}: {e}", self.path.display());
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
