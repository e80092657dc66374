//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Connection settings for the remote analysis service.
///
/// The same base URL serves both surfaces:
///
/// | Surface | Path |
/// |---------|------|
/// | Batch upload | `POST {base_url}/api/process-video` |
/// | Feedback channel | `GET {base_url}/api/feedback` (event stream) |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the analysis service, without a trailing slash.
    pub base_url: String,
    /// Maximum seconds to wait for the feedback-channel handshake before the
    /// connection attempt is marked failed.  The batch upload deliberately
    /// has no such limit — analysis may legitimately take tens of seconds.
    pub connect_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5001".into(),
            connect_timeout_secs: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Settings for the spoken-feedback playback engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Whether feedback is spoken at all.  When disabled, feedback is still
    /// shown as text but never sent to the playback engine.
    pub enabled: bool,
    /// Text-to-speech command invoked once per utterance; the utterance text
    /// is appended as the final argument.
    pub command: String,
    /// Extra arguments passed to the command before the utterance text.
    pub args: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "espeak".into(),
            args: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// UploadConfig
// ---------------------------------------------------------------------------

/// Settings for the one-shot video upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Multipart field name the service expects the video part under.
    pub field_name: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            field_name: "video".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use formcoach::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Analysis-service connection settings.
    pub server: ServerConfig,
    /// Spoken-feedback playback settings.
    pub speech: SpeechConfig,
    /// Video upload settings.
    pub upload: UploadConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_server_points_at_localhost() {
        let config = AppConfig::default();
        assert_eq!(config.server.base_url, "http://localhost:5001");
        assert_eq!(config.server.connect_timeout_secs, 8);
    }

    #[test]
    fn default_upload_field_is_video() {
        assert_eq!(UploadConfig::default().field_name, "video");
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.toml");

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.server.base_url, ServerConfig::default().base_url);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut config = AppConfig::default();
        config.server.base_url = "http://10.0.2.2:5001".into();
        config.speech.enabled = false;
        config.speech.args = vec!["-s".into(), "150".into()];

        config.save_to(&path).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();

        assert_eq!(loaded.server.base_url, "http://10.0.2.2:5001");
        assert!(!loaded.speech.enabled);
        assert_eq!(loaded.speech.args, vec!["-s", "150"]);
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "this is [ not toml").unwrap();

        assert!(AppConfig::load_from(&path).is_err());
    }
}
