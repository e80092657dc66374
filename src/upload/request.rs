//! Upload request construction and URI normalization.

use std::path::Path;

// ---------------------------------------------------------------------------
// UploadRequest
// ---------------------------------------------------------------------------

/// One video submission attempt.  Constructed once per upload; the
/// coordinator never mutates it after media selection.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    /// Source reference as produced by the media source (may carry a URI
    /// scheme such as `file://`).
    pub video_uri: String,
    /// MIME type sent with the multipart video part.
    pub mime_type: String,
    /// File name sent with the multipart video part.
    pub file_name: String,
}

impl UploadRequest {
    /// Build a request from a local filesystem path, inferring the MIME type
    /// from the extension.  Extensions outside the service's allow-list
    /// (mp4, mov, avi, webm) fall back to `video/mp4`.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mime_type = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("mov") => "video/quicktime",
            Some("avi") => "video/x-msvideo",
            Some("webm") => "video/webm",
            _ => "video/mp4",
        }
        .to_string();

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("exercise.mp4")
            .to_string();

        Self {
            video_uri: path.display().to_string(),
            mime_type,
            file_name,
        }
    }

    /// Source reference with the local-file scheme prefix stripped.
    ///
    /// The upload mechanism reads a plain filesystem path, so a `file://`
    /// prefix is removed; references under any other scheme pass through
    /// unchanged.
    pub fn normalized_uri(&self) -> &str {
        self.video_uri
            .strip_prefix("file://")
            .unwrap_or(&self.video_uri)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
