//! Driver acquisition and release.
//!
//! A [`DriverLease`] owns one task's driver. Release happens exactly once:
//! explicitly through [`DriverLease::release`], or from `Drop` when the
//! runner never got that far (it panicked or was aborted). In the `Drop`
//! case the close runs on a spawned task, so anyone who needs to know the
//! driver is gone waits on [`DriverLease::released`] instead.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::driver::{DeliveryError, Driver, DriverError, DriverFactory, SessionState};

/// Hands out driver leases.
#[derive(Clone)]
pub struct ResourceManager {
    factory: Arc<dyn DriverFactory>,
}

impl ResourceManager {
    #[must_use]
    pub fn new(factory: Arc<dyn DriverFactory>) -> Self {
        Self { factory }
    }

    /// Opens a driver for `target`.
    ///
    /// # Errors
    ///
    /// Returns the factory error if the driver could not be opened.
    pub async fn acquire(
        &self,
        session: &SessionState,
        target: &str,
    ) -> Result<DriverLease, DriverError> {
        let driver = self.factory.open(session, target).await?;
        debug!("Driver acquired for {}", target);
        Ok(DriverLease::new(target, driver))
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager").finish_non_exhaustive()
    }
}

/// Exclusive ownership of one task's driver.
pub struct DriverLease {
    target: String,
    driver: Option<Box<dyn Driver>>,
    released: CancellationToken,
}

impl DriverLease {
    #[must_use]
    pub fn new(target: impl Into<String>, driver: Box<dyn Driver>) -> Self {
        Self {
            target: target.into(),
            driver: Some(driver),
            released: CancellationToken::new(),
        }
    }

    /// Delivers one payload through the leased driver.
    ///
    /// # Errors
    ///
    /// Propagates the driver's error; a released lease fails fatally.
    pub async fn deliver(&mut self, payload: &str) -> Result<(), DeliveryError> {
        match self.driver.as_mut() {
            Some(driver) => driver.deliver(payload).await,
            None => Err(DeliveryError::Fatal("driver already released".to_owned())),
        }
    }

    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.driver.is_none()
    }

    /// Token cancelled once the driver's close has finished, whichever
    /// path ran it.
    #[must_use]
    pub fn released(&self) -> CancellationToken {
        self.released.clone()
    }

    /// Tears the driver down. Later calls do nothing; teardown errors are
    /// logged and swallowed.
    pub async fn release(&mut self) {
        let Some(mut driver) = self.driver.take() else {
            return;
        };
        let _released = self.released.clone().drop_guard();

        match driver.close().await {
            Ok(()) => info!("Driver for {} released", self.target),
            Err(e) => warn!("Driver teardown for {} failed: {}", self.target, e),
        }
    }
}

impl Drop for DriverLease {
    fn drop(&mut self) {
        let Some(mut driver) = self.driver.take() else {
            return;
        };

        let target = std::mem::take(&mut self.target);
        let released = self.released.clone().drop_guard();
        warn!("Driver for {} dropped without release, closing in background", target);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    let _released = released;
                    if let Err(e) = driver.close().await {
                        warn!("Driver teardown for {} failed: {}", target, e);
                    }
                });
            }
            Err(_) => warn!("No runtime available to close driver for {}", target),
        }
    }
}

impl std::fmt::Debug for DriverLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverLease")
            .field("target", &self.target)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::tasks::mock::{MockFactory, Recorder};

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let recorder = Recorder::new();
        let mut lease = DriverLease::new("thread/1", recorder.driver());

        lease.release().await;
        lease.release().await;
        drop(lease);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(recorder.closes(), 1);
    }

    #[tokio::test]
    async fn test_release_swallows_teardown_errors() {
        let recorder = Recorder::new();
        recorder.fail_close();
        let mut lease = DriverLease::new("thread/1", recorder.driver());

        lease.release().await;
        assert!(lease.is_released());
        assert_eq!(recorder.closes(), 1);
    }

    #[tokio::test]
    async fn test_drop_closes_unreleased_driver() {
        let recorder = Recorder::new();
        drop(DriverLease::new("thread/1", recorder.driver()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(recorder.closes(), 1);
    }

    #[tokio::test]
    async fn test_released_fires_after_release() {
        let recorder = Recorder::new();
        let mut lease = DriverLease::new("thread/1", recorder.driver());
        let released = lease.released();
        assert!(!released.is_cancelled());

        lease.release().await;
        assert!(released.is_cancelled());
    }

    #[tokio::test]
    async fn test_released_fires_after_background_close() {
        let recorder = Recorder::new();
        recorder.slow_close(Duration::from_millis(50));
        let lease = DriverLease::new("thread/1", recorder.driver());
        let released = lease.released();

        drop(lease);
        assert_eq!(recorder.closes(), 0);

        tokio::time::timeout(Duration::from_secs(5), released.cancelled())
            .await
            .expect("background close should finish");
        assert_eq!(recorder.closes(), 1);
    }

    #[tokio::test]
    async fn test_deliver_after_release_is_fatal() {
        let recorder = Recorder::new();
        let mut lease = DriverLease::new("thread/1", recorder.driver());
        lease.release().await;
        assert!(matches!(
            lease.deliver("x").await,
            Err(DeliveryError::Fatal(_))
        ));
        assert!(recorder.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_acquire_failure_propagates() {
        let factory = MockFactory::new(Recorder::new()).failing_open();
        let manager = ResourceManager::new(Arc::new(factory));
        let result = manager
            .acquire(&SessionState::default(), "target")
            .await;
        assert!(matches!(result, Err(DriverError::Open(_))));
    }
}
