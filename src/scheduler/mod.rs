// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Dependency-aware wave scheduler.
//!
//! # Architecture
//!
//! ```text
//! execute(tasks)
//!   │
//!   ├─ DependencyGraph::build ──► plan ──► waves
//!   │
//!   └─ for each wave (strictly in order):
//!        ├─ JoinSet::spawn(task chain) for every task
//!        │     └─ attempt: signature ──► get_or_compute("subtasks") ──► executor
//!        │        on error/timeout: next RecoveryStep
//!        ├─ wave timeout ──► cancel token ──► grace ──► abort
//!        │     └─ aborted chains resume at their first untried step
//!        └─ fold: results | errors(+placeholder) ──► dependency context
//! ```
//!
//! Per-attempt timeout is `min(cap, base * wave_size)`; the wave as a whole
//! gets `wave_timeout_factor` times that.

pub mod cancellation;
pub mod executor;
pub mod recovery;
mod types;

pub use cancellation::CancellationToken;
pub use executor::{ExecutorError, FnExecutor, TaskContext, TaskExecutor};
pub use recovery::{recovery_chain, PlannedAttempt, RecoveryStep};
pub use types::{AttemptRecord, ExecutionReport, SchedulerStats, TaskError, TaskErrorKind};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::cache::{Computed, TieredCacheManager};
use crate::config::{RecallEngineConfig, SUBTASKS_CACHE};
use crate::graph::{DependencyGraph, Task, TaskId, TaskState};
use crate::metrics;
use crate::signature::SignatureBuilder;

/// Longest slice of task text quoted in a placeholder.
const PLACEHOLDER_TEXT_CHARS: usize = 80;

/// Where one task is in its recovery chain. Shared with the spawned task so
/// an aborted chain can resume without repeating a step.
struct TaskProgress {
    chain: Vec<PlannedAttempt>,
    next: usize,
    running: Option<(RecoveryStep, Instant)>,
    attempts: Vec<AttemptRecord>,
}

impl TaskProgress {
    fn new(text: &str) -> Self {
        Self {
            chain: recovery_chain(text),
            next: 0,
            running: None,
            attempts: Vec::new(),
        }
    }

    /// Take the next untried step, marking it as running.
    fn claim(&mut self) -> Option<PlannedAttempt> {
        let planned = self.chain.get(self.next)?.clone();
        self.next += 1;
        self.running = Some((planned.step, Instant::now()));
        Some(planned)
    }

    fn finish(&mut self, record: AttemptRecord) {
        self.running = None;
        self.attempts.push(record);
    }

    /// Close out a step whose future was aborted or panicked.
    fn abandon(&mut self, kind: TaskErrorKind, message: &str) {
        if let Some((step, started)) = self.running.take() {
            self.attempts.push(AttemptRecord {
                step,
                elapsed: started.elapsed(),
                cache_hit: false,
                error: Some(kind),
                message: Some(message.to_string()),
            });
        }
    }

    fn last_error(&self) -> (TaskErrorKind, String) {
        self.attempts
            .iter()
            .rev()
            .find_map(|a| a.error.map(|kind| (kind, a.message.clone().unwrap_or_default())))
            .unwrap_or((TaskErrorKind::Execution, "no attempt completed".to_string()))
    }
}

enum ChainOutcome {
    Succeeded { step: RecoveryStep, output: String },
    Exhausted,
    /// Stopped by the wave's cancel token with steps possibly left
    Interrupted,
}

/// Everything a spawned task chain owns.
#[derive(Clone)]
struct TaskJob {
    task: Task,
    dependencies: BTreeMap<TaskId, String>,
    executor: Arc<dyn TaskExecutor>,
    cache: Arc<TieredCacheManager>,
    signatures: Arc<SignatureBuilder>,
    threshold: f64,
    attempt_timeout: Duration,
    cancel: CancellationToken,
    progress: Arc<Mutex<TaskProgress>>,
}

impl TaskJob {
    async fn run(self) -> (TaskId, ChainOutcome) {
        let id = self.task.id;
        loop {
            let claimed = { self.progress.lock().claim() };
            let Some(planned) = claimed else {
                return (id, ChainOutcome::Exhausted);
            };
            if planned.step != RecoveryStep::Primary {
                metrics::record_recovery_attempt(planned.step.as_str());
                debug!(task = id, step = %planned.step, "Trying recovery step");
            }

            let started = Instant::now();
            let result = self.attempt(&planned.text).await;
            let elapsed = started.elapsed();

            match result {
                Ok((output, cache_hit)) => {
                    self.progress.lock().finish(AttemptRecord {
                        step: planned.step,
                        elapsed,
                        cache_hit,
                        error: None,
                        message: None,
                    });
                    return (id, ChainOutcome::Succeeded { step: planned.step, output });
                }
                Err((TaskErrorKind::Cancelled, _)) if self.cancel.is_cancelled() => {
                    // `running` stays set; the wave records it when resuming
                    return (id, ChainOutcome::Interrupted);
                }
                Err((kind, message)) => {
                    warn!(task = id, step = %planned.step, error = %kind, message = %message, "Task attempt failed");
                    self.progress.lock().finish(AttemptRecord {
                        step: planned.step,
                        elapsed,
                        cache_hit: false,
                        error: Some(kind),
                        message: Some(message),
                    });
                }
            }
        }
    }

    /// One attempt with `text`, memoized in the subtasks cache.
    /// Returns the output and whether it came from cache.
    async fn attempt(&self, text: &str) -> Result<(String, bool), (TaskErrorKind, String)> {
        let ctx = TaskContext {
            dependencies: self.dependencies.clone(),
            cancel: self.cancel.clone(),
        };
        let mut task = self.task.clone();
        task.text = text.to_string();
        task.state = TaskState::Running;
        let executed = AtomicBool::new(false);

        let run = async {
            match self.signatures.build(&memo_text(text, &self.dependencies)).await {
                Ok(signature) => {
                    let payload = self
                        .cache
                        .get_or_compute(SUBTASKS_CACHE, signature, self.threshold, None, || async {
                            executed.store(true, Ordering::Relaxed);
                            let output = self.executor.execute(&task, &ctx).await?;
                            Ok::<_, ExecutorError>(Computed::new(output, task.estimated_cost))
                        })
                        .await?;
                    let cache_hit = !executed.load(Ordering::Relaxed);
                    Ok::<_, ExecutorError>((String::from_utf8_lossy(&payload).into_owned(), cache_hit))
                }
                Err(e) => {
                    debug!(task = task.id, error = %e, "No signature, running uncached");
                    metrics::record_embedding_unavailable(self.signatures.embedder_name());
                    let output = self.executor.execute(&task, &ctx).await?;
                    Ok::<_, ExecutorError>((output, false))
                }
            }
        };

        match timeout(self.attempt_timeout, run).await {
            Ok(Ok(done)) => Ok(done),
            Ok(Err(ExecutorError::Cancelled)) => Err((TaskErrorKind::Cancelled, "cancelled".to_string())),
            Ok(Err(ExecutorError::Failed(message))) => Err((TaskErrorKind::Execution, message)),
            Err(_) => Err((
                TaskErrorKind::Timeout,
                format!("attempt exceeded {}ms", self.attempt_timeout.as_millis()),
            )),
        }
    }
}

/// Memo key text: the attempt text plus any dependency results it was given,
/// so the same question over different inputs is not conflated.
fn memo_text(text: &str, dependencies: &BTreeMap<TaskId, String>) -> String {
    if dependencies.is_empty() {
        return text.to_string();
    }
    let mut memo = text.to_string();
    for result in dependencies.values() {
        memo.push_str("\n\n");
        memo.push_str(result);
    }
    memo
}

fn placeholder(task: &Task, attempts: usize, kind: TaskErrorKind, message: &str) -> String {
    let quoted: String = task.text.chars().take(PLACEHOLDER_TEXT_CHARS).collect();
    format!(
        "[unavailable: task {} \"{}\" failed after {} attempt(s): {}: {}]",
        task.id, quoted, attempts, kind, message
    )
}

async fn drain(
    join_set: &mut JoinSet<(TaskId, ChainOutcome)>,
    finished: &mut BTreeMap<TaskId, ChainOutcome>,
) {
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((id, outcome)) => {
                finished.insert(id, outcome);
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => error!(error = %e, "Task chain panicked"),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    executions: AtomicU64,
    waves: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_recovered: AtomicU64,
    tasks_failed: AtomicU64,
    cache_hits: AtomicU64,
    wave_timeouts: AtomicU64,
    forced_resolutions: AtomicU64,
}

pub struct WaveScheduler {
    config: RecallEngineConfig,
    cache: Arc<TieredCacheManager>,
    signatures: Arc<SignatureBuilder>,
    counters: Counters,
}

impl WaveScheduler {
    pub fn new(
        config: RecallEngineConfig,
        cache: Arc<TieredCacheManager>,
        signatures: Arc<SignatureBuilder>,
    ) -> Self {
        if let Err(e) = config.validate() {
            warn!(error = %e, "Scheduler config failed validation, clamping out-of-range values");
        }
        Self {
            config,
            cache,
            signatures,
            counters: Counters::default(),
        }
    }

    /// Run decomposed tasks wave by wave.
    ///
    /// Never fails: tasks that exhaust their recovery chain land in
    /// `errors` with a placeholder, everything else in `results`.
    pub async fn execute(&self, tasks: Vec<Task>, executor: Arc<dyn TaskExecutor>) -> ExecutionReport {
        self.counters.executions.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        let graph = DependencyGraph::build(tasks);
        let plan = graph.plan();
        let forced = graph.resolutions.len() + plan.forced.len();
        self.counters
            .forced_resolutions
            .fetch_add(forced as u64, Ordering::Relaxed);
        info!(tasks = graph.len(), waves = plan.len(), forced, "Executing task graph");

        let mut report = ExecutionReport {
            waves: plan.waves.clone(),
            ..Default::default()
        };
        for (id, task) in &graph.nodes {
            report.states.insert(*id, task.state);
        }

        let mut context: BTreeMap<TaskId, String> = BTreeMap::new();
        for (index, wave) in plan.waves.iter().enumerate() {
            self.run_wave(index, wave, &graph, &executor, &mut context, &mut report)
                .await;
        }

        info!(
            completed = report.results.len(),
            failed = report.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Task graph finished"
        );
        report
    }

    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let c = &self.counters;
        SchedulerStats {
            executions: c.executions.load(Ordering::Relaxed),
            waves: c.waves.load(Ordering::Relaxed),
            tasks_completed: c.tasks_completed.load(Ordering::Relaxed),
            tasks_recovered: c.tasks_recovered.load(Ordering::Relaxed),
            tasks_failed: c.tasks_failed.load(Ordering::Relaxed),
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            wave_timeouts: c.wave_timeouts.load(Ordering::Relaxed),
            forced_resolutions: c.forced_resolutions.load(Ordering::Relaxed),
        }
    }

    async fn run_wave(
        &self,
        index: usize,
        wave: &[TaskId],
        graph: &DependencyGraph,
        executor: &Arc<dyn TaskExecutor>,
        context: &mut BTreeMap<TaskId, String>,
        report: &mut ExecutionReport,
    ) {
        let started = Instant::now();
        let attempt_timeout = self.config.task_timeout(wave.len());
        let wave_timeout = self.config.wave_timeout(wave.len());
        debug!(wave = index, size = wave.len(), ?attempt_timeout, ?wave_timeout, "Starting wave");

        let cancel = CancellationToken::new();
        let mut jobs: BTreeMap<TaskId, TaskJob> = BTreeMap::new();
        for id in wave {
            let Some(task) = graph.nodes.get(id) else { continue };
            let dependencies = graph
                .dependencies(*id)
                .iter()
                .filter_map(|d| context.get(d).map(|r| (*d, r.clone())))
                .collect();
            jobs.insert(
                *id,
                TaskJob {
                    task: task.clone(),
                    dependencies,
                    executor: executor.clone(),
                    cache: self.cache.clone(),
                    signatures: self.signatures.clone(),
                    threshold: self.config.subtask_similarity_threshold,
                    attempt_timeout,
                    cancel: cancel.clone(),
                    progress: Arc::new(Mutex::new(TaskProgress::new(&task.text))),
                },
            );
        }

        let mut finished: BTreeMap<TaskId, ChainOutcome> = BTreeMap::new();
        let mut join_set = JoinSet::new();
        for (id, job) in &jobs {
            report.states.insert(*id, TaskState::Running);
            join_set.spawn(job.clone().run());
        }

        let timed_out = timeout(wave_timeout, drain(&mut join_set, &mut finished)).await.is_err();
        if timed_out {
            self.counters.wave_timeouts.fetch_add(1, Ordering::Relaxed);
            metrics::record_wave_timeout();
            warn!(
                wave = index,
                outstanding = jobs.len() - finished.len(),
                timeout_ms = wave_timeout.as_millis() as u64,
                "Wave timed out, cancelling outstanding tasks"
            );
            cancel.cancel();
            let _ = timeout(self.config.cancel_grace(), drain(&mut join_set, &mut finished)).await;
            join_set.abort_all();
            drain(&mut join_set, &mut finished).await;
        }

        // Interrupted, aborted or panicked chains pick up at their first
        // untried step. Each round claims at least one step per chain.
        let mut aborted = timed_out;
        loop {
            let resume: Vec<TaskId> = jobs
                .keys()
                .copied()
                .filter(|id| {
                    !matches!(
                        finished.get(id),
                        Some(ChainOutcome::Succeeded { .. } | ChainOutcome::Exhausted)
                    )
                })
                .collect();
            if resume.is_empty() {
                break;
            }
            debug!(wave = index, tasks = ?resume, "Resuming recovery for interrupted tasks");

            let token = CancellationToken::new();
            let mut join_set = JoinSet::new();
            for id in &resume {
                let Some(job) = jobs.get(id) else { continue };
                let (kind, reason) = match finished.remove(id) {
                    Some(_) => (TaskErrorKind::Timeout, "cancelled by wave timeout"),
                    None if aborted => (TaskErrorKind::Timeout, "aborted by wave timeout"),
                    None => (TaskErrorKind::Execution, "attempt panicked"),
                };
                job.progress.lock().abandon(kind, reason);
                let mut job = job.clone();
                job.cancel = token.clone();
                join_set.spawn(job.run());
            }
            drain(&mut join_set, &mut finished).await;
            aborted = false;
        }

        for (id, job) in &jobs {
            let progress = job.progress.lock();
            report.attempts.insert(*id, progress.attempts.clone());

            match finished.remove(id) {
                Some(ChainOutcome::Succeeded { step, output }) => {
                    let state = if step == RecoveryStep::Primary {
                        self.counters.tasks_completed.fetch_add(1, Ordering::Relaxed);
                        TaskState::Completed
                    } else {
                        self.counters.tasks_recovered.fetch_add(1, Ordering::Relaxed);
                        info!(task = id, step = %step, "Task recovered");
                        TaskState::Recovered
                    };
                    if progress.attempts.last().is_some_and(|a| a.cache_hit) {
                        self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                    }
                    metrics::record_task_outcome(&state.to_string());
                    report.states.insert(*id, state);
                    context.insert(*id, output.clone());
                    report.results.insert(*id, output);
                }
                _ => {
                    let (kind, message) = progress.last_error();
                    let placeholder = placeholder(&job.task, progress.attempts.len(), kind, &message);
                    warn!(task = id, error = %kind, message = %message, "Task failed after exhausting recovery");
                    self.counters.tasks_failed.fetch_add(1, Ordering::Relaxed);
                    metrics::record_task_outcome("failed");
                    report.states.insert(*id, TaskState::Failed);
                    context.insert(*id, placeholder.clone());
                    report.errors.insert(*id, TaskError { kind, message, placeholder });
                }
            }
        }

        self.counters.waves.fetch_add(1, Ordering::Relaxed);
        metrics::record_wave(wave.len(), started.elapsed());
        debug!(wave = index, elapsed_ms = started.elapsed().as_millis() as u64, "Wave complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use std::sync::atomic::AtomicUsize;

    fn test_config(base_ms: u64) -> RecallEngineConfig {
        RecallEngineConfig {
            task_timeout_base_ms: base_ms,
            task_timeout_cap_ms: base_ms * 10,
            cancel_grace_ms: 10,
            ..Default::default()
        }
    }

    async fn scheduler(config: RecallEngineConfig) -> WaveScheduler {
        let cache = Arc::new(TieredCacheManager::new(config.clone()).await);
        let signatures = Arc::new(SignatureBuilder::new(Arc::new(HashingEmbedder::new(64)), 100, 10));
        WaveScheduler::new(config, cache, signatures)
    }

    #[tokio::test]
    async fn test_waves_follow_dependencies() {
        let scheduler = scheduler(test_config(500)).await;
        let executor = Arc::new(FnExecutor::new(|task: Task, ctx: TaskContext| async move {
            let inputs: Vec<String> = ctx.dependencies.values().cloned().collect();
            Ok(format!("{}[{}]", task.text, inputs.join(",")))
        }));

        let report = scheduler
            .execute(
                vec![
                    Task::new(1, "Find the population of Lyon"),
                    Task::new(2, "Compare it with Marseille").depends_on([1]),
                    Task::new(3, "Name the river through Paris"),
                ],
                executor,
            )
            .await;

        assert_eq!(report.waves, vec![vec![1, 3], vec![2]]);
        assert_eq!(report.results[&1], "Find the population of Lyon[]");
        assert_eq!(
            report.results[&2],
            "Compare it with Marseille[Find the population of Lyon[]]"
        );
        assert!(report.is_complete_success());
        assert!(report.states.values().all(|s| *s == TaskState::Completed));

        let stats = scheduler.stats();
        assert_eq!(stats.waves, 2);
        assert_eq!(stats.tasks_completed, 3);
    }

    #[tokio::test]
    async fn test_hanging_task_fails_with_placeholder_while_sibling_completes() {
        let scheduler = scheduler(test_config(20)).await;
        let executor = Arc::new(FnExecutor::new(|task: Task, _ctx: TaskContext| async move {
            if task.id == 1 {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
            Ok("ok".to_string())
        }));

        let report = scheduler
            .execute(
                vec![
                    Task::new(
                        1,
                        "Summarize the quarterly revenue figures. Then explain the variance against forecast.",
                    ),
                    Task::new(2, "List the regions"),
                ],
                executor,
            )
            .await;

        assert_eq!(report.states[&1], TaskState::Failed);
        assert_eq!(report.recovery_attempts(1), 2);
        assert_eq!(report.attempts[&1].len(), 3);
        assert!(report.attempts[&1].iter().all(|a| a.error == Some(TaskErrorKind::Timeout)));

        let error = &report.errors[&1];
        assert_eq!(error.kind, TaskErrorKind::Timeout);
        assert!(error.placeholder.starts_with("[unavailable: task 1"));
        assert!(!report.results.contains_key(&1));

        assert_eq!(report.results[&2], "ok");
        assert_eq!(report.states[&2], TaskState::Completed);

        let stats = scheduler.stats();
        assert_eq!(stats.tasks_failed, 1);
        assert_eq!(stats.tasks_completed, 1);
        assert!(stats.wave_timeouts <= 1);
    }

    #[tokio::test]
    async fn test_hanging_one_sentence_task_still_tries_every_step() {
        let scheduler = scheduler(test_config(20)).await;
        let executor = Arc::new(FnExecutor::new(|task: Task, _ctx: TaskContext| async move {
            if task.id == 1 {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
            Ok("ok".to_string())
        }));

        let report = scheduler
            .execute(
                vec![Task::new(1, "Summarize revenue"), Task::new(2, "List the regions")],
                executor,
            )
            .await;

        assert_eq!(report.states[&1], TaskState::Failed);
        assert_eq!(report.recovery_attempts(1), 2);
        let steps: Vec<_> = report.attempts[&1].iter().map(|a| a.step).collect();
        assert_eq!(steps, vec![RecoveryStep::Primary, RecoveryStep::Simplified, RecoveryStep::KeyTerms]);
        assert!(report.errors[&1].placeholder.starts_with("[unavailable: task 1"));
        assert_eq!(report.states[&2], TaskState::Completed);
    }

    #[tokio::test]
    async fn test_simplified_prompt_recovers() {
        let scheduler = scheduler(test_config(500)).await;
        let executor = Arc::new(FnExecutor::new(|task: Task, _ctx: TaskContext| async move {
            if task.text.contains("Then") {
                Err(ExecutorError::Failed("prompt too long".into()))
            } else {
                Ok(format!("answer to: {}", task.text))
            }
        }));

        let report = scheduler
            .execute(
                vec![Task::new(1, "Define entropy. Then relate it to information theory.")],
                executor,
            )
            .await;

        assert_eq!(report.states[&1], TaskState::Recovered);
        assert_eq!(report.results[&1], "answer to: Define entropy.");
        assert_eq!(report.recovery_attempts(1), 1);
        assert_eq!(scheduler.stats().tasks_recovered, 1);
    }

    #[tokio::test]
    async fn test_identical_subtasks_are_memoized() {
        let scheduler = scheduler(test_config(500)).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let executor: Arc<dyn TaskExecutor> = Arc::new(FnExecutor::new(move |task: Task, _ctx: TaskContext| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(format!("result of {}", task.text))
            }
        }));
        let tasks = vec![
            Task::new(1, "What is the boiling point of water at sea level?"),
            Task::new(2, "Who wrote the novel Middlemarch?"),
        ];

        let first = scheduler.execute(tasks.clone(), executor.clone()).await;
        let second = scheduler.execute(tasks, executor).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(first.results, second.results);
        assert!(second.attempts[&1][0].cache_hit);
        let stats = scheduler.stats();
        assert_eq!(stats.cache_hits, 2);
        assert_eq!(stats.executions, 2);
    }

    #[tokio::test]
    async fn test_cycle_is_broken_and_both_tasks_run() {
        let scheduler = scheduler(test_config(500)).await;
        let executor = Arc::new(FnExecutor::new(|task: Task, _ctx: TaskContext| async move {
            Ok(task.text)
        }));

        let report = scheduler
            .execute(
                vec![
                    Task::new(1, "Draft the outline").depends_on([2]),
                    Task::new(2, "Review the draft").depends_on([1]),
                ],
                executor,
            )
            .await;

        assert_eq!(report.waves, vec![vec![1], vec![2]]);
        assert_eq!(report.results.len(), 2);
        assert_eq!(scheduler.stats().forced_resolutions, 1);
    }

    #[tokio::test]
    async fn test_failed_dependency_passes_placeholder() {
        let scheduler = scheduler(test_config(500)).await;
        let executor = Arc::new(FnExecutor::new(|task: Task, ctx: TaskContext| async move {
            match task.id {
                1 => Err(ExecutorError::Failed("upstream down".into())),
                _ => Ok(ctx.dependencies.get(&1).cloned().unwrap_or_default()),
            }
        }));

        let report = scheduler
            .execute(
                vec![
                    Task::new(1, "Fetch the figures"),
                    Task::new(2, "Chart the figures").depends_on([1]),
                ],
                executor,
            )
            .await;

        assert_eq!(report.states[&1], TaskState::Failed);
        assert_eq!(report.errors[&1].kind, TaskErrorKind::Execution);
        assert_eq!(report.errors[&1].message, "upstream down");
        assert_eq!(report.results[&2], report.errors[&1].placeholder);
    }

    #[test]
    fn test_memo_text_includes_dependencies() {
        assert_eq!(memo_text("q", &BTreeMap::new()), "q");
        let deps = BTreeMap::from([(2, "two".to_string()), (1, "one".to_string())]);
        assert_eq!(memo_text("q", &deps), "q\n\none\n\ntwo");
    }
}
