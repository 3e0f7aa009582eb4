//! Task identity, status, and runtime state.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Opaque task identifier, allocated from a monotonic counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Paused,
    Stopping,
    Stopped,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Returns true when the task cannot transition any further.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Completed | Self::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable progress of one task.
///
/// Only the task's runner writes this; everyone else takes snapshots.
#[derive(Debug)]
pub struct TaskState {
    status: TaskStatus,
    cursor: usize,
    delivered: usize,
    failed_steps: usize,
    last_error: Option<String>,
}

impl Default for TaskState {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskState {
    /// Creates state for a freshly started task.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            status: TaskStatus::Running,
            cursor: 0,
            delivered: 0,
            failed_steps: 0,
            last_error: None,
        }
    }

    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Index of the next step to attempt.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub const fn delivered(&self) -> usize {
        self.delivered
    }

    #[must_use]
    pub const fn failed_steps(&self) -> usize {
        self.failed_steps
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Moves the cursor past the step just attempted, never beyond `total`.
    pub fn advance(&mut self, total: usize) {
        if self.cursor < total {
            self.cursor += 1;
        }
    }

    pub fn record_delivered(&mut self) {
        self.delivered += 1;
    }

    pub fn record_step_failure(&mut self, reason: String) {
        self.failed_steps += 1;
        self.last_error = Some(reason);
    }

    /// Records a terminal status. A task that already finished keeps its
    /// first terminal status.
    pub fn finish(&mut self, status: TaskStatus, reason: Option<String>) {
        debug_assert!(status.is_terminal());
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        if reason.is_some() {
            self.last_error = reason;
        }
    }
}

/// Point-in-time view of a task, used for status listings.
#[derive(Debug, Clone, Serialize)]
pub struct TaskInfo {
    pub id: TaskId,
    pub status: TaskStatus,
    pub target: String,
    pub cursor: usize,
    pub total_steps: usize,
    pub delivered: usize,
    pub failed_steps: usize,
    pub delay: Duration,
    pub started_at: DateTime<Local>,
    pub last_error: Option<String>,
}
