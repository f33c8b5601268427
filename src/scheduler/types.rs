// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the wave scheduler.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use super::recovery::RecoveryStep;
use crate::graph::{TaskId, TaskState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    Timeout,
    Execution,
    Cancelled,
}

impl std::fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Execution => write!(f, "execution error"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Final error for a task whose recovery chain was exhausted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskError {
    pub kind: TaskErrorKind,
    /// Error from the last attempt
    pub message: String,
    /// Text handed to dependents in place of a real result
    pub placeholder: String,
}

/// One attempt in a task's recovery chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub step: RecoveryStep,
    pub elapsed: Duration,
    /// Served from the subtasks cache without running the executor
    pub cache_hit: bool,
    /// `None` on success
    pub error: Option<TaskErrorKind>,
    pub message: Option<String>,
}

impl AttemptRecord {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything [`super::WaveScheduler::execute`] produces.
///
/// Partial success is normal: `results` and `errors` partition the task ids.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
    /// Output of every `Completed` or `Recovered` task
    pub results: HashMap<TaskId, String>,
    /// Tasks that exhausted their recovery chain
    pub errors: HashMap<TaskId, TaskError>,
    pub states: HashMap<TaskId, TaskState>,
    /// Attempt log per task, in execution order
    pub attempts: HashMap<TaskId, Vec<AttemptRecord>>,
    pub waves: Vec<Vec<TaskId>>,
}

impl ExecutionReport {
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Attempts beyond the primary one for `id`.
    #[must_use]
    pub fn recovery_attempts(&self, id: TaskId) -> usize {
        self.attempts
            .get(&id)
            .map_or(0, |a| a.iter().filter(|r| r.step != RecoveryStep::Primary).count())
    }
}

/// Cumulative scheduler counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub executions: u64,
    pub waves: u64,
    pub tasks_completed: u64,
    pub tasks_recovered: u64,
    pub tasks_failed: u64,
    pub cache_hits: u64,
    pub wave_timeouts: u64,
    /// Cycle edges broken at build time plus tasks forced during planning
    pub forced_resolutions: u64,
}
