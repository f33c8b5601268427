// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use serde::{Deserialize, Serialize};

pub type TaskId = u32;

/// Lifecycle of a task within one execution.
///
/// ```text
/// Pending ──► Ready ──► Running ──┬──► Completed
///                                 └──► Failed ──┬──► Recovered
///                                               └──► Failed (chain exhausted)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
    /// Succeeded on a recovery step rather than the primary attempt
    Recovered,
}

impl TaskState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Recovered)
    }

    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Completed | Self::Recovered)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Ready => write!(f, "ready"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Recovered => write!(f, "recovered"),
        }
    }
}

/// One sub-task produced by an external decomposition step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    /// Opaque hints for the executor (e.g. document ids to retrieve)
    #[serde(default)]
    pub context_requirements: Vec<String>,
    #[serde(default = "default_estimated_cost")]
    pub estimated_cost: f64,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_state")]
    pub state: TaskState,
}

fn default_estimated_cost() -> f64 {
    1.0
}

fn default_confidence_threshold() -> f64 {
    0.7
}

fn default_state() -> TaskState {
    TaskState::Pending
}

impl Task {
    pub fn new(id: TaskId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            depends_on: Vec::new(),
            context_requirements: Vec::new(),
            estimated_cost: default_estimated_cost(),
            confidence_threshold: default_confidence_threshold(),
            state: default_state(),
        }
    }

    #[must_use]
    pub fn depends_on(mut self, deps: impl IntoIterator<Item = TaskId>) -> Self {
        self.depends_on = deps.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_context(mut self, requirements: impl IntoIterator<Item = String>) -> Self {
        self.context_requirements = requirements.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_cost(mut self, estimated_cost: f64) -> Self {
        self.estimated_cost = estimated_cost;
        self
    }
}
