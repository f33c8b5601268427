// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::BTreeMap;
use std::future::Future;

use async_trait::async_trait;
use thiserror::Error;

use super::cancellation::CancellationToken;
use crate::graph::{Task, TaskId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("task execution failed: {0}")]
    Failed(String),
    #[error("task cancelled")]
    Cancelled,
}

/// What an executor sees besides the task itself.
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    /// Results of declared dependencies, keyed by producer id. A failed
    /// dependency contributes its placeholder text.
    pub dependencies: BTreeMap<TaskId, String>,
    pub cancel: CancellationToken,
}

/// Runs one sub-task. Supplied by the caller (e.g. an LLM call).
///
/// Implementations should return [`ExecutorError::Cancelled`] promptly once
/// `ctx.cancel` fires.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &Task, ctx: &TaskContext) -> Result<String, ExecutorError>;
}

/// Adapts an async closure into a [`TaskExecutor`].
///
/// ```
/// use recall_engine::scheduler::{FnExecutor, TaskExecutor};
///
/// let executor = FnExecutor::new(|task, _ctx| async move {
///     Ok(format!("done: {}", task.text))
/// });
/// # let _: &dyn TaskExecutor = &executor;
/// ```
pub struct FnExecutor<F> {
    f: F,
}

impl<F, Fut> FnExecutor<F>
where
    F: Fn(Task, TaskContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, ExecutorError>> + Send,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> TaskExecutor for FnExecutor<F>
where
    F: Fn(Task, TaskContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, ExecutorError>> + Send,
{
    async fn execute(&self, task: &Task, ctx: &TaskContext) -> Result<String, ExecutorError> {
        (self.f)(task.clone(), ctx.clone()).await
    }
}
