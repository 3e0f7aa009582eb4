//! Scripted in-memory driver for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::driver::{DeliveryError, Driver, DriverError, DriverFactory, SessionState};

/// How the mock driver reacts to a given payload.
#[derive(Debug, Clone)]
pub enum Behavior {
    StepError,
    Fatal,
    /// Blocks delivery until the notify fires.
    Hold(Arc<Notify>),
    /// Panics inside `deliver`, taking the runner down with it.
    Panic,
}

#[derive(Debug, Default)]
struct RecorderInner {
    attempts: Mutex<Vec<String>>,
    script: Mutex<HashMap<String, Behavior>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    fail_close: AtomicBool,
    close_delay: Mutex<Duration>,
}

/// Shared recorder for every driver it hands out.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    inner: Arc<RecorderInner>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn driver(&self) -> Box<dyn Driver> {
        Box::new(MockDriver {
            recorder: self.clone(),
        })
    }

    pub fn on(&self, payload: &str, behavior: Behavior) {
        self.inner
            .script
            .lock()
            .unwrap()
            .insert(payload.to_owned(), behavior);
    }

    pub fn fail_close(&self) {
        self.inner.fail_close.store(true, Ordering::SeqCst);
    }

    /// Makes every close take `delay` before it counts as done.
    pub fn slow_close(&self, delay: Duration) {
        *self.inner.close_delay.lock().unwrap() = delay;
    }

    pub fn attempts(&self) -> Vec<String> {
        self.inner.attempts.lock().unwrap().clone()
    }

    pub fn opens(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    fn behavior_for(&self, payload: &str) -> Option<Behavior> {
        self.inner.script.lock().unwrap().get(payload).cloned()
    }
}

struct MockDriver {
    recorder: Recorder,
}

#[async_trait]
impl Driver for MockDriver {
    async fn deliver(&mut self, payload: &str) -> Result<(), DeliveryError> {
        self.recorder
            .inner
            .attempts
            .lock()
            .unwrap()
            .push(payload.to_owned());

        match self.recorder.behavior_for(payload) {
            None => Ok(()),
            Some(Behavior::StepError) => Err(DeliveryError::Step(format!("rejected {payload}"))),
            Some(Behavior::Fatal) => Err(DeliveryError::Fatal("session died".to_owned())),
            Some(Behavior::Hold(gate)) => {
                gate.notified().await;
                Ok(())
            }
            Some(Behavior::Panic) => panic!("driver blew up on {payload}"),
        }
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        let delay = *self.recorder.inner.close_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.recorder.inner.closes.fetch_add(1, Ordering::SeqCst);
        if self.recorder.inner.fail_close.load(Ordering::SeqCst) {
            return Err(DriverError::Close("browser already gone".to_owned()));
        }
        Ok(())
    }
}

/// Factory handing out [`MockDriver`]s bound to one recorder.
#[derive(Debug, Clone)]
pub struct MockFactory {
    recorder: Recorder,
    fail_open: bool,
    refused: HashSet<String>,
    open_delays: HashMap<String, Duration>,
}

impl MockFactory {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            fail_open: false,
            refused: HashSet::new(),
            open_delays: HashMap::new(),
        }
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Fails opens for one target only.
    pub fn refusing(mut self, target: &str) -> Self {
        self.refused.insert(target.to_owned());
        self
    }

    /// Makes opening `target` take `delay`.
    pub fn open_delay(mut self, target: &str, delay: Duration) -> Self {
        self.open_delays.insert(target.to_owned(), delay);
        self
    }
}

#[async_trait]
impl DriverFactory for MockFactory {
    async fn open(
        &self,
        _session: &SessionState,
        target: &str,
    ) -> Result<Box<dyn Driver>, DriverError> {
        if let Some(delay) = self.open_delays.get(target) {
            tokio::time::sleep(*delay).await;
        }
        self.recorder.inner.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open || self.refused.contains(target) {
            return Err(DriverError::Open("browser failed to launch".to_owned()));
        }
        Ok(self.recorder.driver())
    }
}
