//! Automation driver interface.
//!
//! A driver is the external resource a task pushes its messages through
//! (a browser page, a chat connection, a file). Tasks only see the
//! [`Driver`] and [`DriverFactory`] traits; concrete drivers live here.

mod outbox;
mod session;

use async_trait::async_trait;
use thiserror::Error;

pub use outbox::{OutboxDriver, OutboxDriverFactory};
pub use session::SessionState;

/// Errors raised while delivering a single step.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The step failed but the driver is still usable.
    #[error("step delivery failed: {0}")]
    Step(String),

    /// The driver itself is unusable; no further step can succeed.
    #[error("driver failure: {0}")]
    Fatal(String),
}

/// Errors raised while opening, closing, or preparing a driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Failed to open driver: {0}")]
    Open(String),

    #[error("Failed to close driver: {0}")]
    Close(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bound automation resource that delivers payloads one at a time.
#[async_trait]
pub trait Driver: Send {
    /// Delivers one payload.
    ///
    /// # Errors
    ///
    /// [`DeliveryError::Step`] for a failure confined to this payload,
    /// [`DeliveryError::Fatal`] when the driver can no longer be used.
    async fn deliver(&mut self, payload: &str) -> Result<(), DeliveryError>;

    /// Tears the driver down. Must tolerate being called on a partially
    /// opened or already closed driver.
    ///
    /// # Errors
    ///
    /// Returns an error if teardown failed; callers treat it as best effort.
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Opens drivers bound to a persisted session and a delivery target.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// Opens a new driver.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying resource cannot be acquired.
    async fn open(
        &self,
        session: &SessionState,
        target: &str,
    ) -> Result<Box<dyn Driver>, DriverError>;
}
