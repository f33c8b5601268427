// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the recall engine.
//!
//! # Example
//!
//! ```
//! use recall_engine::RecallEngineConfig;
//!
//! // Minimal config (in-memory only, defaults everywhere)
//! let config = RecallEngineConfig::default();
//! assert_eq!(config.memory_budget_bytes, 256 * 1024 * 1024); // 256 MB
//! assert_eq!(config.eviction_watermark, 0.8);
//!
//! // Durable backend plus a smaller budget
//! let config = RecallEngineConfig {
//!     redis_url: Some("redis://localhost:6379".into()),
//!     memory_budget_bytes: 64 * 1024 * 1024,
//!     ..Default::default()
//! };
//! assert!(config.redis_url.is_some());
//! ```

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Logical cache for final query results.
pub const RESULTS_CACHE: &str = "results";
/// Logical cache for memoized sub-task outputs.
pub const SUBTASKS_CACHE: &str = "subtasks";
/// Logical cache for embedding vectors.
pub const EMBEDDINGS_CACHE: &str = "embeddings";

/// Largest accepted `wave_timeout_factor`.
pub const MAX_WAVE_TIMEOUT_FACTOR: f64 = 100.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid config document: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Configuration for the cache manager and wave scheduler.
///
/// All fields have defaults. Without `redis_url` every logical cache
/// lives in process memory.
#[derive(Debug, Clone, Deserialize)]
pub struct RecallEngineConfig {
    /// Redis connection string (e.g., "redis://localhost:6379")
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Key namespace inside Redis; the logical cache name is appended.
    #[serde(default = "default_redis_prefix")]
    pub redis_prefix: String,

    /// Memory budget shared by every logical cache (default: 256 MB)
    #[serde(default = "default_memory_budget_bytes")]
    pub memory_budget_bytes: usize,

    /// Fraction of the budget that triggers eviction and is the post-eviction target
    #[serde(default = "default_eviction_watermark")]
    pub eviction_watermark: f64,

    /// TTL applied to new entries, 0 = never expire
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Signature cache bound and how many of the oldest to drop on overflow
    #[serde(default = "default_signature_cache_capacity")]
    pub signature_cache_capacity: usize,
    #[serde(default = "default_signature_cache_evict_batch")]
    pub signature_cache_evict_batch: usize,

    /// Dimensions of the built-in hashing embedder
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,

    /// Minimum composite similarity for a sub-task memo hit
    #[serde(default = "default_subtask_similarity_threshold")]
    pub subtask_similarity_threshold: f64,

    /// Per-task timeout = min(cap, base * wave_size)
    #[serde(default = "default_task_timeout_base_ms")]
    pub task_timeout_base_ms: u64,
    #[serde(default = "default_task_timeout_cap_ms")]
    pub task_timeout_cap_ms: u64,

    /// Wave timeout = factor * per-task timeout
    #[serde(default = "default_wave_timeout_factor")]
    pub wave_timeout_factor: f64,

    /// How long cancelled executors get to return before being aborted
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,

    /// Logical caches created in addition to results/subtasks/embeddings
    #[serde(default)]
    pub extra_caches: Vec<String>,
}

fn default_redis_prefix() -> String { "recall:".to_string() }
fn default_memory_budget_bytes() -> usize { 256 * 1024 * 1024 } // 256 MB
fn default_eviction_watermark() -> f64 { 0.8 }
fn default_ttl_secs() -> u64 { 3600 }
fn default_signature_cache_capacity() -> usize { 1000 }
fn default_signature_cache_evict_batch() -> usize { 100 }
fn default_embedding_dimensions() -> usize { 256 }
fn default_subtask_similarity_threshold() -> f64 { 0.95 }
fn default_task_timeout_base_ms() -> u64 { 10_000 }
fn default_task_timeout_cap_ms() -> u64 { 30_000 }
fn default_wave_timeout_factor() -> f64 { 2.0 }
fn default_cancel_grace_ms() -> u64 { 250 }

impl Default for RecallEngineConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            redis_prefix: default_redis_prefix(),
            memory_budget_bytes: default_memory_budget_bytes(),
            eviction_watermark: default_eviction_watermark(),
            default_ttl_secs: default_ttl_secs(),
            signature_cache_capacity: default_signature_cache_capacity(),
            signature_cache_evict_batch: default_signature_cache_evict_batch(),
            embedding_dimensions: default_embedding_dimensions(),
            subtask_similarity_threshold: default_subtask_similarity_threshold(),
            task_timeout_base_ms: default_task_timeout_base_ms(),
            task_timeout_cap_ms: default_task_timeout_cap_ms(),
            wave_timeout_factor: default_wave_timeout_factor(),
            cancel_grace_ms: default_cancel_grace_ms(),
            extra_caches: Vec::new(),
        }
    }
}

impl RecallEngineConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(doc: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(doc)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.eviction_watermark > 0.0 && self.eviction_watermark <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "eviction_watermark",
                reason: format!("{} is outside (0, 1]", self.eviction_watermark),
            });
        }
        if self.embedding_dimensions == 0 {
            return Err(ConfigError::Invalid {
                field: "embedding_dimensions",
                reason: "must be at least 1".into(),
            });
        }
        if self.signature_cache_evict_batch == 0 {
            return Err(ConfigError::Invalid {
                field: "signature_cache_evict_batch",
                reason: "must be at least 1".into(),
            });
        }
        if !(self.wave_timeout_factor >= 1.0 && self.wave_timeout_factor <= MAX_WAVE_TIMEOUT_FACTOR) {
            return Err(ConfigError::Invalid {
                field: "wave_timeout_factor",
                reason: format!("{} is outside [1, {}]", self.wave_timeout_factor, MAX_WAVE_TIMEOUT_FACTOR),
            });
        }
        Ok(())
    }

    /// Every logical cache name this config asks for, built-ins first.
    #[must_use]
    pub fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = [RESULTS_CACHE, SUBTASKS_CACHE, EMBEDDINGS_CACHE]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        for extra in &self.extra_caches {
            if !names.contains(extra) {
                names.push(extra.clone());
            }
        }
        names
    }

    /// Per-attempt timeout for a task in a wave of `wave_size` tasks.
    #[must_use]
    pub fn task_timeout(&self, wave_size: usize) -> Duration {
        let scaled = self.task_timeout_base_ms.saturating_mul(wave_size.max(1) as u64);
        Duration::from_millis(scaled.min(self.task_timeout_cap_ms))
    }

    /// Aggregate timeout for a whole wave.
    ///
    /// An unvalidated factor is clamped to `[1, MAX_WAVE_TIMEOUT_FACTOR]`,
    /// NaN falls back to the default.
    #[must_use]
    pub fn wave_timeout(&self, wave_size: usize) -> Duration {
        let factor = if self.wave_timeout_factor.is_nan() {
            default_wave_timeout_factor()
        } else {
            self.wave_timeout_factor.clamp(1.0, MAX_WAVE_TIMEOUT_FACTOR)
        };
        let secs = self.task_timeout(wave_size).as_secs_f64() * factor;
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    #[must_use]
    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RecallEngineConfig::default();
        assert!(config.redis_url.is_none());
        assert_eq!(config.signature_cache_capacity, 1000);
        assert_eq!(config.signature_cache_evict_batch, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_task_timeout_scales_with_wave_width() {
        let config = RecallEngineConfig::default();
        assert_eq!(config.task_timeout(1), Duration::from_secs(10));
        assert_eq!(config.task_timeout(2), Duration::from_secs(20));
        // capped at 30s
        assert_eq!(config.task_timeout(3), Duration::from_secs(30));
        assert_eq!(config.task_timeout(50), Duration::from_secs(30));
        // an empty wave still gets one slot
        assert_eq!(config.task_timeout(0), Duration::from_secs(10));
    }

    #[test]
    fn test_wave_timeout_uses_factor() {
        let config = RecallEngineConfig::default();
        assert_eq!(config.wave_timeout(1), Duration::from_secs(20));
    }

    #[test]
    fn test_wave_timeout_clamps_unvalidated_factor() {
        let mut config = RecallEngineConfig::default();
        for factor in [f64::NAN, -3.0, 0.0] {
            config.wave_timeout_factor = factor;
            assert!(config.validate().is_err());
            assert!(config.wave_timeout(1) >= config.task_timeout(1));
        }
        config.wave_timeout_factor = f64::NAN;
        assert_eq!(config.wave_timeout(1), Duration::from_secs(20));

        config.wave_timeout_factor = f64::INFINITY;
        assert!(config.validate().is_err());
        assert_eq!(config.wave_timeout(1), Duration::from_secs(1000));

        config.task_timeout_cap_ms = u64::MAX;
        config.task_timeout_base_ms = u64::MAX;
        config.wave_timeout_factor = MAX_WAVE_TIMEOUT_FACTOR;
        assert!(config.wave_timeout(4) > config.task_timeout(4));
    }

    #[test]
    fn test_from_toml_rejects_nan_factor() {
        let err = RecallEngineConfig::from_toml_str("wave_timeout_factor = nan").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "wave_timeout_factor", .. }));
    }

    #[test]
    fn test_from_toml_partial_document() {
        let config = RecallEngineConfig::from_toml_str(
            r#"
            redis_url = "redis://cache:6379"
            memory_budget_bytes = 1048576
            extra_caches = ["verdicts"]
            "#,
        )
        .unwrap();

        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.memory_budget_bytes, 1_048_576);
        assert_eq!(config.default_ttl_secs, 3600);
        assert_eq!(
            config.cache_names(),
            vec!["results", "subtasks", "embeddings", "verdicts"]
        );
    }

    #[test]
    fn test_from_toml_rejects_bad_watermark() {
        let err = RecallEngineConfig::from_toml_str("eviction_watermark = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "eviction_watermark", .. }));
    }

    #[test]
    fn test_cache_names_deduplicates_builtins() {
        let config = RecallEngineConfig {
            extra_caches: vec!["results".into(), "verdicts".into()],
            ..Default::default()
        };
        assert_eq!(config.cache_names().len(), 4);
    }
}
