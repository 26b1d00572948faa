//! Configuration management for Playbill.
//!
//! Loads configuration from ${PLAYBILL_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Telegram bot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token for the Telegram API.
    pub bot_token: Option<String>,
}

/// Pacing knobs that are deliberately configurable rather than hardcoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Consecutive unattended active-mode deliveries before playback pauses.
    pub auto_pause_threshold: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            auto_pause_threshold: 15,
        }
    }
}

/// Audio narration configuration. Narration is disabled when no API key
/// resolves from config or environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// API key for the speech synthesis endpoint.
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: Option<String>,
    /// Speech synthesis model.
    pub model: Option<String>,
    /// Voice used for stage directions and speaker announcements.
    pub narrator_voice: Option<String>,
    /// Silence inserted between the speaker announcement and the line, in ms.
    pub segment_gap_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory of play JSON documents.
    pub plays_dir: Option<String>,

    /// Telegram bot configuration
    pub telegram: TelegramConfig,

    /// Pacing configuration
    pub pacing: PacingConfig,

    /// Audio narration configuration
    pub audio: AudioConfig,
}

impl Config {
    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Resolves the plays directory: config value, then PLAYBILL_PLAYS_DIR,
    /// then ${PLAYBILL_HOME}/plays.
    pub fn resolve_plays_dir(&self) -> PathBuf {
        self.plays_dir
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("PLAYBILL_PLAYS_DIR")
                    .ok()
                    .map(|dir| dir.trim().to_string())
                    .filter(|dir| !dir.is_empty())
                    .map(PathBuf::from)
            })
            .unwrap_or_else(paths::plays_dir)
    }
}

pub mod paths {
    //! Path resolution for Playbill configuration and data directories.
    //!
    //! PLAYBILL_HOME resolution order:
    //! 1. PLAYBILL_HOME environment variable (if set)
    //! 2. ~/.config/playbill (default)

    use std::path::PathBuf;

    /// Returns the Playbill home directory.
    ///
    /// Checks PLAYBILL_HOME env var first, falls back to ~/.config/playbill
    pub fn playbill_home() -> PathBuf {
        if let Ok(home) = std::env::var("PLAYBILL_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("playbill"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        playbill_home().join("config.toml")
    }

    /// Returns the default plays directory.
    pub fn plays_dir() -> PathBuf {
        playbill_home().join("plays")
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_from(&dir.path().join("config.toml")).expect("load");
        assert!(config.telegram.bot_token.is_none());
        assert_eq!(config.pacing.auto_pause_threshold, 15);
        assert!(config.audio.api_key.is_none());
    }

    #[test]
    fn parses_partial_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
plays_dir = "/srv/plays"

[telegram]
bot_token = "123:abc"

[pacing]
auto_pause_threshold = 3

[audio]
narrator_voice = "onyx"
segment_gap_ms = 500
"#,
        )
        .expect("write");

        let config = Config::load_from(&path).expect("load");
        assert_eq!(config.plays_dir.as_deref(), Some("/srv/plays"));
        assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.pacing.auto_pause_threshold, 3);
        assert_eq!(config.audio.narrator_voice.as_deref(), Some("onyx"));
        assert_eq!(config.audio.segment_gap_ms, Some(500));
        assert!(config.audio.api_key.is_none());
    }

    #[test]
    fn rejects_malformed_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "plays_dir = [nope").expect("write");
        assert!(Config::load_from(&path).is_err());
    }
}
