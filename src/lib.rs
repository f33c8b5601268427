//! # Recall Engine
//!
//! A similarity-keyed result cache with adaptive eviction, plus a
//! dependency-aware wave scheduler that memoizes sub-task results through it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WaveScheduler                          │
//! │  • DependencyGraph: validate, break cycles, plan waves      │
//! │  • Waves run in order, tasks within a wave concurrently     │
//! │  • Per-attempt + per-wave timeouts, recovery chain          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                   (get_or_compute "subtasks")
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   TieredCacheManager                        │
//! │  • ContentSignature lookup: exact fingerprint, then         │
//! │    best composite similarity ≥ threshold                    │
//! │  • Single-flight per fingerprint                            │
//! │  • Global byte budget, value-based eviction at watermark    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                      (one store per named cache)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      FallbackStore                          │
//! │  • Redis when configured and reachable                      │
//! │  • In-memory DashMap otherwise, degrading on errors         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use recall_engine::{
//!     FnExecutor, HashingEmbedder, RecallEngineConfig, SignatureBuilder, Task,
//!     TieredCacheManager, WaveScheduler,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RecallEngineConfig::default();
//!     let cache = Arc::new(TieredCacheManager::new(config.clone()).await);
//!     let signatures = Arc::new(SignatureBuilder::new(
//!         Arc::new(HashingEmbedder::new(config.embedding_dimensions)),
//!         config.signature_cache_capacity,
//!         config.signature_cache_evict_batch,
//!     ));
//!     let scheduler = WaveScheduler::new(config, cache.clone(), signatures);
//!
//!     let executor = Arc::new(FnExecutor::new(|task: Task, _ctx| async move {
//!         Ok(format!("answer: {}", task.text))
//!     }));
//!     let report = scheduler
//!         .execute(
//!             vec![
//!                 Task::new(1, "List the planets"),
//!                 Task::new(2, "Rank them by mass").depends_on([1]),
//!             ],
//!             executor,
//!         )
//!         .await;
//!
//!     println!("{:?}", report.results);
//!     println!("{}", cache.stats());
//!     cache.shutdown().await;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`cache`]: The [`TieredCacheManager`] and `get_or_compute`
//! - [`signature`]: Content signatures and the memoizing [`SignatureBuilder`]
//! - [`similarity`]: Composite scoring and dynamic thresholds
//! - [`embedding`]: The [`Embedder`] seam and a deterministic fallback
//! - [`eviction`]: Value-based victim selection
//! - [`storage`]: Cache stores (Redis, memory, fallback wrapper)
//! - [`graph`]: Task graph validation and wave planning
//! - [`scheduler`]: The [`WaveScheduler`]
//! - [`resilience`]: Retry with backoff for backend connections

pub mod cache;
pub mod cache_entry;
pub mod config;
pub mod embedding;
pub mod eviction;
pub mod graph;
pub mod metrics;
pub mod resilience;
pub mod scheduler;
pub mod signature;
pub mod similarity;
pub mod storage;

pub use cache::{CacheStats, Computed, TieredCacheManager};
pub use cache_entry::CacheEntry;
pub use config::{ConfigError, RecallEngineConfig, EMBEDDINGS_CACHE, RESULTS_CACHE, SUBTASKS_CACHE};
pub use embedding::{CachedEmbedder, Embedder, EmbeddingError, HashingEmbedder};
pub use eviction::{EvictionCandidate, EvictionPolicy};
pub use graph::{DependencyGraph, Task, TaskId, TaskState, WavePlan};
pub use metrics::LatencyTimer;
pub use resilience::RetryConfig;
pub use scheduler::{
    CancellationToken, ExecutionReport, ExecutorError, FnExecutor, RecoveryStep, SchedulerStats,
    TaskContext, TaskError, TaskErrorKind, TaskExecutor, WaveScheduler,
};
pub use signature::{ContentSignature, SignatureBuilder};
pub use similarity::{SimilarityScore, SimilarityScorer};
pub use storage::{CacheStore, StorageError};
