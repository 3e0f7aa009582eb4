//! Application settings loaded from the environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Bot-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Chat user id allowed to issue commands.
    pub owner_id: i64,

    /// Directory holding persisted driver sessions.
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,

    /// Session file name inside `sessions_dir`.
    #[serde(default = "default_session_file")]
    pub session_file: String,

    /// Command prefix for bot commands.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Delay between messages for newly created tasks, in seconds.
    #[serde(default = "default_delay")]
    pub default_delay_secs: f64,

    /// Directory the outbox driver writes delivered messages to.
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: PathBuf,
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from("sessions")
}

fn default_session_file() -> String {
    "default_state.json".to_owned()
}

fn default_command_prefix() -> String {
    "/".to_owned()
}

fn default_delay() -> f64 {
    1.0
}

fn default_outbox_dir() -> PathBuf {
    PathBuf::from("outbox")
}

impl BotSettings {
    /// Creates settings for the given owner with every other field defaulted.
    #[must_use]
    pub fn new(owner_id: i64) -> Self {
        Self {
            owner_id,
            sessions_dir: default_sessions_dir(),
            session_file: default_session_file(),
            command_prefix: default_command_prefix(),
            default_delay_secs: default_delay(),
            outbox_dir: default_outbox_dir(),
        }
    }

    /// Creates bot settings from environment variables.
    ///
    /// `OWNER_TG_ID` is required; everything else falls back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the owner id is missing or not an integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        let owner_id: i64 = std::env::var("OWNER_TG_ID")
            .map_err(|_| ConfigError::MissingEnvVar("OWNER_TG_ID"))?
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidOwnerId)?;

        Ok(Self {
            owner_id,
            sessions_dir: std::env::var("SESSIONS_DIR")
                .map_or_else(|_| default_sessions_dir(), PathBuf::from),
            session_file: std::env::var("SESSION_FILE")
                .unwrap_or_else(|_| default_session_file()),
            command_prefix: std::env::var("COMMAND_PREFIX")
                .unwrap_or_else(|_| default_command_prefix()),
            default_delay_secs: std::env::var("DEFAULT_DELAY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|d: &f64| d.is_finite() && *d >= 0.0)
                .unwrap_or_else(default_delay),
            outbox_dir: std::env::var("OUTBOX_DIR")
                .map_or_else(|_| default_outbox_dir(), PathBuf::from),
        })
    }

    /// Full path of the persisted session file.
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.sessions_dir.join(&self.session_file)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid owner id format (must be an integer chat user id)")]
    InvalidOwnerId,
}
