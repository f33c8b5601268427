// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for recall-engine.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host process chooses the exporter (Prometheus, OTEL, etc.).
//!
//! # Metric Naming Convention
//! - `recall_engine_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//! - `_bytes` suffix for size gauges
//!
//! # Labels
//! - `cache`: logical cache name (results, subtasks, embeddings, ...)
//! - `backend`: memory, redis
//! - `outcome`: hit, miss, completed, recovered, failed

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

// ═══════════════════════════════════════════════════════════════════════════
// CACHE - Lookups, writes and eviction
// ═══════════════════════════════════════════════════════════════════════════

/// Record a cache lookup outcome
pub fn record_lookup(cache: &str, hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    counter!(
        "recall_engine_lookups_total",
        "cache" => cache.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record lookup latency (find_similar scan + bookkeeping)
pub fn record_lookup_latency(cache: &str, duration: Duration) {
    histogram!(
        "recall_engine_lookup_seconds",
        "cache" => cache.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a single-flight computation that actually ran
pub fn record_computation(cache: &str) {
    counter!(
        "recall_engine_computations_total",
        "cache" => cache.to_string()
    )
    .increment(1);
}

/// Record a caller that waited on another caller's computation
pub fn record_coalesced(cache: &str) {
    counter!(
        "recall_engine_coalesced_total",
        "cache" => cache.to_string()
    )
    .increment(1);
}

/// Record eviction event
pub fn record_eviction(count: usize, bytes: usize) {
    counter!("recall_engine_evictions_total").increment(count as u64);
    counter!("recall_engine_evicted_bytes_total").increment(bytes as u64);
}

/// Set estimated bytes in use across all logical caches
pub fn set_cache_bytes(bytes: usize) {
    gauge!("recall_engine_cache_bytes").set(bytes as f64);
}

/// Set number of tracked entries across all logical caches
pub fn set_cache_entries(count: usize) {
    gauge!("recall_engine_cache_entries").set(count as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// BACKENDS - Health and fallback
// ═══════════════════════════════════════════════════════════════════════════

/// Record a durable backend failure that forced the in-memory fallback
pub fn record_backend_fallback(cache: &str, operation: &str) {
    counter!(
        "recall_engine_backend_fallbacks_total",
        "cache" => cache.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Set backend health (1 = healthy)
pub fn set_backend_healthy(backend: &str, healthy: bool) {
    gauge!(
        "recall_engine_backend_healthy",
        "backend" => backend.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}

/// Record embedding provider failure (the call degrades to an uncached compute)
pub fn record_embedding_unavailable(provider: &str) {
    counter!(
        "recall_engine_embedding_unavailable_total",
        "provider" => provider.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// SCHEDULER - Waves and task outcomes
// ═══════════════════════════════════════════════════════════════════════════

/// Record a finished wave
pub fn record_wave(size: usize, duration: Duration) {
    histogram!("recall_engine_wave_size").record(size as f64);
    histogram!("recall_engine_wave_seconds").record(duration.as_secs_f64());
}

/// Record a wave that hit its aggregate timeout
pub fn record_wave_timeout() {
    counter!("recall_engine_wave_timeouts_total").increment(1);
}

/// Record final task outcome
pub fn record_task_outcome(outcome: &str) {
    counter!(
        "recall_engine_tasks_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a recovery step attempt
pub fn record_recovery_attempt(step: &str) {
    counter!(
        "recall_engine_recovery_attempts_total",
        "step" => step.to_string()
    )
    .increment(1);
}

/// Record forced cycle resolutions
pub fn record_cycle_resolution(count: usize) {
    counter!("recall_engine_cycle_resolutions_total").increment(count as u64);
}

/// A timing guard that records lookup latency on drop
pub struct LatencyTimer {
    cache: String,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(cache: &str) -> Self {
        Self {
            cache: cache.to_string(),
            start: Instant::now(),
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_lookup_latency(&self.cache, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // No recorder is installed, so these only prove the calls don't panic.

    #[test]
    fn test_cache_metrics() {
        record_lookup("results", true);
        record_lookup("results", false);
        record_computation("subtasks");
        record_coalesced("subtasks");
        record_eviction(3, 4096);
        set_cache_bytes(1024);
        set_cache_entries(7);
    }

    #[test]
    fn test_backend_metrics() {
        record_backend_fallback("results", "put");
        set_backend_healthy("redis", false);
        record_embedding_unavailable("hashing");
    }

    #[test]
    fn test_scheduler_metrics() {
        record_wave(4, Duration::from_millis(12));
        record_wave_timeout();
        record_task_outcome("completed");
        record_recovery_attempt("simplified");
        record_cycle_resolution(1);
    }

    #[test]
    fn test_latency_timer() {
        let timer = LatencyTimer::new("results");
        std::thread::sleep(Duration::from_micros(10));
        assert!(timer.elapsed() >= Duration::from_micros(10));
        // recorded on drop
    }
}
