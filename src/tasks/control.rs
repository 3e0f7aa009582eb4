//! Per-task control signals.
//!
//! Three independent signals travel from the registry to a runner:
//! - stop: a one-shot [`CancellationToken`], idempotent, dominates pause
//! - pause: a level-triggered gate held in a `watch` channel
//! - delay: a latest-value `watch` channel read before each wait
//!
//! Every signal keeps its state, so a runner that checks late still sees it.

use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// What the runner should do after a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// Carry on with the next step.
    Proceed,
    /// Stop was raised; terminate.
    Stop,
}

/// Creates a connected control handle and listener.
#[must_use]
pub fn channel(initial_delay: Duration) -> (ControlHandle, ControlListener) {
    let stop = CancellationToken::new();
    let (pause_tx, pause_rx) = watch::channel(false);
    let (delay_tx, delay_rx) = watch::channel(initial_delay);

    let handle = ControlHandle {
        stop: stop.clone(),
        pause: pause_tx,
        delay: delay_tx,
    };
    let listener = ControlListener {
        stop,
        pause: pause_rx,
        delay: delay_rx,
    };
    (handle, listener)
}

/// Sending side, held by the registry.
#[derive(Debug)]
pub struct ControlHandle {
    stop: CancellationToken,
    pause: watch::Sender<bool>,
    delay: watch::Sender<Duration>,
}

impl ControlHandle {
    /// Closes the pause gate.
    pub fn pause(&self) {
        self.pause.send_replace(true);
    }

    /// Opens the pause gate.
    pub fn resume(&self) {
        self.pause.send_replace(false);
    }

    /// Raises the stop signal. Calling it again has no effect.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Replaces the inter-step delay.
    pub fn set_delay(&self, delay: Duration) {
        self.delay.send_replace(delay);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.pause.borrow()
    }

    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        *self.delay.borrow()
    }
}

/// Receiving side, owned by the runner.
#[derive(Debug)]
pub struct ControlListener {
    stop: CancellationToken,
    pause: watch::Receiver<bool>,
    delay: watch::Receiver<Duration>,
}

impl ControlListener {
    /// Returns true once stop has been raised.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Most recently set delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        *self.delay.borrow()
    }

    /// Blocks while the pause gate is closed.
    ///
    /// Returns [`Checkpoint::Stop`] if stop is raised before or while waiting.
    pub async fn wait_if_paused(&mut self) -> Checkpoint {
        if self.stop.is_cancelled() {
            return Checkpoint::Stop;
        }

        tokio::select! {
            biased;
            () = self.stop.cancelled() => Checkpoint::Stop,
            gate = self.pause.wait_for(|paused| !*paused) => {
                // Err means the handle was dropped and nobody can resume us.
                if gate.is_ok() { Checkpoint::Proceed } else { Checkpoint::Stop }
            }
        }
    }

    /// Sleeps for `duration` unless stop is raised first.
    pub async fn sleep(&self, duration: Duration) -> Checkpoint {
        if self.stop.is_cancelled() {
            return Checkpoint::Stop;
        }
        if duration.is_zero() {
            return Checkpoint::Proceed;
        }

        tokio::select! {
            biased;
            () = self.stop.cancelled() => Checkpoint::Stop,
            () = tokio::time::sleep(duration) => Checkpoint::Proceed,
        }
    }
}
