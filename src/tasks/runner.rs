//! Job runner: drives one task's steps through its driver.
//!
//! The runner follows a small state machine:
//! 1. Wait at the pause gate (stop wins over pause)
//! 2. Deliver the step at the cursor
//!    - step error → log, count it, keep going
//!    - fatal driver error → `Failed`, no more steps
//! 3. Advance the cursor
//! 4. Unless this was the last step, wait the current delay (stop interrupts)
//!
//! Whatever ends the loop, the lease is released before the terminal
//! status is recorded.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::control::{Checkpoint, ControlListener};
use super::lifecycle::DriverLease;
use super::{TaskId, TaskState, TaskStatus};
use crate::driver::DeliveryError;

/// How the step loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Termination {
    Completed,
    Stopped,
    Failed(String),
}

/// Runs one task to a terminal state.
pub struct JobRunner {
    id: TaskId,
    steps: Arc<[String]>,
    lease: DriverLease,
    control: ControlListener,
    state: Arc<RwLock<TaskState>>,
}

impl JobRunner {
    #[must_use]
    pub fn new(
        id: TaskId,
        steps: Arc<[String]>,
        lease: DriverLease,
        control: ControlListener,
        state: Arc<RwLock<TaskState>>,
    ) -> Self {
        Self {
            id,
            steps,
            lease,
            control,
            state,
        }
    }

    /// Runs until completion, stop, or a fatal driver error.
    pub async fn run(mut self) -> TaskStatus {
        info!("Task {} started with {} steps", self.id, self.steps.len());

        let termination = self.drive().await;
        self.lease.release().await;

        let (status, reason) = match termination {
            Termination::Completed => (TaskStatus::Completed, None),
            Termination::Stopped => (TaskStatus::Stopped, None),
            Termination::Failed(reason) => (TaskStatus::Failed, Some(reason)),
        };

        let mut state = self.state.write().await;
        state.finish(status, reason);
        info!(
            "Task {} {} after {}/{} steps ({} failed)",
            self.id,
            state.status(),
            state.cursor(),
            self.steps.len(),
            state.failed_steps()
        );
        state.status()
    }

    async fn drive(&mut self) -> Termination {
        let total = self.steps.len();

        for index in 0..total {
            if self.control.wait_if_paused().await == Checkpoint::Stop {
                return Termination::Stopped;
            }

            debug!("Task {} delivering step {}/{}", self.id, index + 1, total);
            let result = self.lease.deliver(&self.steps[index]).await;

            {
                let mut state = self.state.write().await;
                state.advance(total);
                match result {
                    Ok(()) => state.record_delivered(),
                    Err(DeliveryError::Step(reason)) => {
                        warn!("Task {} step {} failed: {}", self.id, index, reason);
                        state.record_step_failure(reason);
                    }
                    Err(DeliveryError::Fatal(reason)) => {
                        error!("Task {} driver failed at step {}: {}", self.id, index, reason);
                        return Termination::Failed(reason);
                    }
                }
            }

            if index + 1 < total {
                let delay = self.control.delay();
                if self.control.sleep(delay).await == Checkpoint::Stop {
                    return Termination::Stopped;
                }
            }
        }

        Termination::Completed
    }
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("id", &self.id)
            .field("steps", &self.steps.len())
            .finish_non_exhaustive()
    }
}
