//! Task registry: the control surface for all running tasks.
//!
//! The map lock is only held for short lookups and mutations, never
//! across a task's run or while joining a runner.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::control::{self, ControlHandle};
use super::lifecycle::{DriverLease, ResourceManager};
use super::runner::JobRunner;
use super::{TaskId, TaskInfo, TaskState, TaskStatus};
use crate::driver::{Driver, SessionState};

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),
}

/// Parameters for a new task.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    /// Where the driver delivers to (e.g. a conversation URL).
    pub target: String,

    /// Payloads, one per step.
    pub steps: Vec<String>,

    /// Initial delay between steps in seconds; zero is allowed.
    pub delay_secs: f64,
}

struct TaskEntry {
    id: TaskId,
    target: String,
    total_steps: usize,
    started_at: DateTime<Local>,
    control: ControlHandle,
    state: Arc<RwLock<TaskState>>,
    runner: Option<JoinHandle<TaskStatus>>,
    released: CancellationToken,
}

impl TaskEntry {
    /// True once the runner reached a terminal state or is gone.
    async fn is_finished(&self) -> bool {
        let runner_gone = self.runner.as_ref().is_none_or(JoinHandle::is_finished);
        runner_gone || self.state.read().await.status().is_terminal()
    }

    async fn snapshot(&self) -> TaskInfo {
        let state = self.state.read().await;
        let runner_gone = self.runner.as_ref().is_none_or(JoinHandle::is_finished);

        let status = if state.status().is_terminal() {
            state.status()
        } else if runner_gone {
            // Runner panicked before recording an outcome.
            TaskStatus::Failed
        } else if self.control.is_stop_requested() {
            TaskStatus::Stopping
        } else if self.control.is_paused() {
            TaskStatus::Paused
        } else {
            TaskStatus::Running
        };

        TaskInfo {
            id: self.id,
            status,
            target: self.target.clone(),
            cursor: state.cursor(),
            total_steps: self.total_steps,
            delivered: state.delivered(),
            failed_steps: state.failed_steps(),
            delay: self.control.delay(),
            started_at: self.started_at,
            last_error: state.last_error().map(str::to_owned),
        }
    }

    /// Waits for the runner to exit and its driver to be closed, then
    /// returns the final view.
    async fn join(mut self) -> TaskInfo {
        if let Some(runner) = self.runner.take()
            && let Err(e) = runner.await
        {
            error!("Runner for task {} aborted: {}", self.id, e);
            self.state
                .write()
                .await
                .finish(TaskStatus::Failed, Some(format!("runner aborted: {e}")));
        }
        // An aborted runner leaves the close to the lease's background task.
        self.released.cancelled().await;
        self.snapshot().await
    }
}

/// Registry of tasks keyed by id.
///
/// Ids are allocated under the map's write lock as entries are inserted,
/// so iterating the map yields tasks in insertion order and ids are never
/// spent on requests that fail.
pub struct TaskRegistry {
    resources: ResourceManager,
    next_id: AtomicU64,
    tasks: RwLock<BTreeMap<TaskId, TaskEntry>>,
}

impl TaskRegistry {
    #[must_use]
    pub fn new(resources: ResourceManager) -> Self {
        Self {
            resources,
            next_id: AtomicU64::new(1),
            tasks: RwLock::new(BTreeMap::new()),
        }
    }

    /// Acquires a driver for the request and starts a task on it.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty step list or a bad delay,
    /// `ResourceUnavailable` if the driver cannot be opened. Nothing is
    /// registered in either case.
    pub async fn create(
        &self,
        request: TaskRequest,
        session: &SessionState,
    ) -> Result<TaskId, TaskError> {
        let delay = validate_request(&request)?;

        let lease = self
            .resources
            .acquire(session, &request.target)
            .await
            .map_err(|e| {
                warn!("Could not acquire driver for {}: {}", request.target, e);
                TaskError::ResourceUnavailable(e.to_string())
            })?;

        Ok(self.spawn(request, delay, lease).await)
    }

    /// Starts a task on a driver the caller already opened.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty step list or a bad delay; the
    /// driver is closed in that case.
    pub async fn create_with_driver(
        &self,
        request: TaskRequest,
        driver: Box<dyn Driver>,
    ) -> Result<TaskId, TaskError> {
        let mut lease = DriverLease::new(request.target.as_str(), driver);

        let delay = match validate_request(&request) {
            Ok(delay) => delay,
            Err(e) => {
                lease.release().await;
                return Err(e);
            }
        };

        Ok(self.spawn(request, delay, lease).await)
    }

    /// Returns a snapshot of one task, finished or not.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is unknown or was removed.
    pub async fn lookup(&self, id: TaskId) -> Result<TaskInfo, TaskError> {
        let tasks = self.tasks.read().await;
        match tasks.get(&id) {
            Some(entry) => Ok(entry.snapshot().await),
            None => Err(TaskError::NotFound(id)),
        }
    }

    /// Snapshots of all tasks in creation order.
    pub async fn list(&self) -> Vec<TaskInfo> {
        let tasks = self.tasks.read().await;
        let mut infos = Vec::with_capacity(tasks.len());
        for entry in tasks.values() {
            infos.push(entry.snapshot().await);
        }
        infos
    }

    /// Deletes an entry. Unknown ids are ignored; an active task is told
    /// to stop and releases its driver on its own.
    pub async fn remove(&self, id: TaskId) {
        let removed = self.tasks.write().await.remove(&id);
        if let Some(entry) = removed {
            entry.control.stop();
            debug!("Removed task {}", id);
        }
    }

    /// Changes the delay used for the task's next wait.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` unless `seconds` is positive and finite,
    /// `NotFound` if the task is unknown or finished.
    pub async fn set_delay(&self, id: TaskId, seconds: f64) -> Result<(), TaskError> {
        let delay = delay_from_secs(seconds, false)?;
        let tasks = self.tasks.read().await;
        let entry = active_entry(&tasks, id).await?;
        entry.control.set_delay(delay);
        info!("Task {} delay set to {:?}", id, delay);
        Ok(())
    }

    /// Pauses the task after its current step.
    ///
    /// # Errors
    ///
    /// `NotFound` if the task is unknown or finished.
    pub async fn request_pause(&self, id: TaskId) -> Result<(), TaskError> {
        let tasks = self.tasks.read().await;
        active_entry(&tasks, id).await?.control.pause();
        info!("Task {} paused", id);
        Ok(())
    }

    /// Lets a paused task continue.
    ///
    /// # Errors
    ///
    /// `NotFound` if the task is unknown or finished.
    pub async fn request_resume(&self, id: TaskId) -> Result<(), TaskError> {
        let tasks = self.tasks.read().await;
        active_entry(&tasks, id).await?.control.resume();
        info!("Task {} resumed", id);
        Ok(())
    }

    /// Stops a task and waits until its runner exited and its driver was
    /// released. The entry is removed, so a second stop is `NotFound`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the task is unknown or finished.
    pub async fn request_stop(&self, id: TaskId) -> Result<TaskInfo, TaskError> {
        let entry = {
            let mut tasks = self.tasks.write().await;
            active_entry(&tasks, id).await?;
            tasks.remove(&id).ok_or(TaskError::NotFound(id))?
        };

        info!("Stopping task {}", id);
        entry.control.stop();
        Ok(entry.join().await)
    }

    /// Drops every finished entry, returning how many were removed.
    pub async fn prune_finished(&self) -> usize {
        let mut tasks = self.tasks.write().await;
        let mut finished = Vec::new();
        for (id, entry) in tasks.iter() {
            if entry.is_finished().await {
                finished.push(*id);
            }
        }
        for id in &finished {
            tasks.remove(id);
        }
        finished.len()
    }

    /// Stops every task and waits for all of them to release their drivers.
    pub async fn shutdown(&self) -> Vec<TaskInfo> {
        let entries = std::mem::take(&mut *self.tasks.write().await);
        for entry in entries.values() {
            entry.control.stop();
        }

        let mut reports = Vec::with_capacity(entries.len());
        for entry in entries.into_values() {
            reports.push(entry.join().await);
        }
        info!("Registry shut down, {} task(s) joined", reports.len());
        reports
    }

    async fn spawn(&self, request: TaskRequest, delay: Duration, lease: DriverLease) -> TaskId {
        let TaskRequest { target, steps, .. } = request;
        let total_steps = steps.len();
        let (control, listener) = control::channel(delay);
        let state = Arc::new(RwLock::new(TaskState::new()));
        let released = lease.released();

        let mut tasks = self.tasks.write().await;
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let runner = JobRunner::new(id, steps.into(), lease, listener, Arc::clone(&state));
        let handle = tokio::spawn(runner.run());
        tasks.insert(
            id,
            TaskEntry {
                id,
                target: target.clone(),
                total_steps,
                started_at: Local::now(),
                control,
                state,
                runner: Some(handle),
                released,
            },
        );
        info!(
            "Task {} created for {} ({} steps, delay {:?})",
            id, target, total_steps, delay
        );
        id
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

/// Looks up an entry that can still receive control signals.
async fn active_entry(
    tasks: &BTreeMap<TaskId, TaskEntry>,
    id: TaskId,
) -> Result<&TaskEntry, TaskError> {
    let entry = tasks.get(&id).ok_or(TaskError::NotFound(id))?;
    if entry.is_finished().await {
        return Err(TaskError::NotFound(id));
    }
    Ok(entry)
}

fn validate_request(request: &TaskRequest) -> Result<Duration, TaskError> {
    if request.steps.is_empty() {
        return Err(TaskError::InvalidArgument(
            "a task needs at least one step".to_owned(),
        ));
    }
    delay_from_secs(request.delay_secs, true)
}

fn delay_from_secs(seconds: f64, allow_zero: bool) -> Result<Duration, TaskError> {
    let out_of_range = if allow_zero {
        seconds < 0.0
    } else {
        seconds <= 0.0
    };
    if !seconds.is_finite() || out_of_range {
        return Err(TaskError::InvalidArgument(format!(
            "delay must be a {} number of seconds, got {seconds}",
            if allow_zero { "non-negative" } else { "positive" }
        )));
    }

    Duration::try_from_secs_f64(seconds)
        .map_err(|e| TaskError::InvalidArgument(format!("delay {seconds}: {e}")))
}
