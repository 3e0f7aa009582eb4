//! File-backed driver that appends delivered messages to a JSONL outbox.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{DeliveryError, Driver, DriverError, DriverFactory, SessionState};

/// One line of the outbox file.
#[derive(Debug, Serialize)]
struct OutboxRecord<'a> {
    at: DateTime<Local>,
    target: &'a str,
    text: &'a str,
}

/// Driver writing each delivered payload as a JSON line.
#[derive(Debug)]
pub struct OutboxDriver {
    target: String,
    path: PathBuf,
    file: Option<File>,
}

impl OutboxDriver {
    /// Path of the outbox file this driver appends to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Driver for OutboxDriver {
    async fn deliver(&mut self, payload: &str) -> Result<(), DeliveryError> {
        let Some(file) = self.file.as_mut() else {
            return Err(DeliveryError::Fatal("outbox is closed".to_owned()));
        };

        let record = OutboxRecord {
            at: Local::now(),
            target: &self.target,
            text: payload,
        };
        let mut line =
            serde_json::to_string(&record).map_err(|e| DeliveryError::Step(e.to_string()))?;
        line.push('\n');

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| DeliveryError::Step(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| DeliveryError::Step(e.to_string()))?;

        debug!("Wrote {} bytes to {}", line.len(), self.path.display());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .await
                .map_err(|e| DriverError::Close(e.to_string()))?;
        }
        Ok(())
    }
}

/// Opens [`OutboxDriver`]s under a fixed directory.
#[derive(Debug, Clone)]
pub struct OutboxDriverFactory {
    dir: PathBuf,
}

impl OutboxDriverFactory {
    /// Creates a factory writing into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Outbox file path used for a target.
    #[must_use]
    pub fn path_for(&self, target: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", sanitize_target(target)))
    }
}

#[async_trait]
impl DriverFactory for OutboxDriverFactory {
    async fn open(
        &self,
        session: &SessionState,
        target: &str,
    ) -> Result<Box<dyn Driver>, DriverError> {
        if !session.value().is_object() {
            return Err(DriverError::Open(
                "session state must be a JSON object".to_owned(),
            ));
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(target);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| DriverError::Open(format!("{}: {e}", path.display())))?;

        debug!("Opened outbox {}", path.display());
        Ok(Box::new(OutboxDriver {
            target: target.to_owned(),
            path,
            file: Some(file),
        }))
    }
}

/// Maps a target (usually a URL) to a safe file stem.
fn sanitize_target(target: &str) -> String {
    let stem: String = target
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(100)
        .collect();
    let stem = stem.trim_matches('_');

    if stem.is_empty() {
        "target".to_owned()
    } else {
        stem.to_owned()
    }
}
