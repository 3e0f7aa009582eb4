//! Persisted driver session state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::DriverError;

/// Opaque credential bundle handed through to [`super::DriverFactory::open`].
///
/// The bot never inspects the contents beyond requiring valid JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionState(serde_json::Value);

impl SessionState {
    /// Wraps an already parsed session blob.
    #[must_use]
    pub const fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Builds a session from a bare `sessionid` cookie value.
    #[must_use]
    pub fn from_session_id(session_id: &str) -> Self {
        Self(serde_json::json!({
            "cookies": [{
                "name": "sessionid",
                "value": session_id,
                "path": "/",
                "httpOnly": true,
                "secure": true,
                "sameSite": "Lax",
            }],
            "origins": [],
        }))
    }

    /// Loads session state from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Session`] if the file is missing or not JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DriverError::Session(format!("{}: {e}", path.display())))?;
        let value = serde_json::from_str(&content)
            .map_err(|e| DriverError::Session(format!("{}: {e}", path.display())))?;
        Ok(Self(value))
    }

    /// Saves session state as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DriverError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.0)
            .map_err(|e| DriverError::Session(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Returns the raw session value.
    #[must_use]
    pub const fn value(&self) -> &serde_json::Value {
        &self.0
    }
}
