// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the tiered cache manager.

use serde::Serialize;

/// Output of a compute closure passed to
/// [`super::TieredCacheManager::get_or_compute`].
#[derive(Debug, Clone, PartialEq)]
pub struct Computed {
    pub payload: Vec<u8>,
    /// Cost the cached entry saves on every later hit (seconds, tokens, ...)
    pub cost: f64,
}

impl Computed {
    #[must_use]
    pub fn new(payload: impl Into<Vec<u8>>, cost: f64) -> Self {
        Self {
            payload: payload.into(),
            cost,
        }
    }
}

/// Point-in-time counters for the cache manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Compute closures actually run (coalesced waiters excluded)
    pub computations: u64,
    pub evictions: u64,
    pub evicted_bytes: u64,
    pub avg_lookup_micros: f64,
    /// Estimated bytes across every logical cache
    pub used_bytes: usize,
    pub budget_bytes: usize,
    pub entries: usize,
    /// True once any logical cache fell back to memory
    pub degraded: bool,
}

impl CacheStats {
    /// Fraction of lookups served from cache, 0.0 with no lookups.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "hits={} misses={} computations={} evictions={} used={}/{}B entries={}{}",
            self.hits,
            self.misses,
            self.computations,
            self.evictions,
            self.used_bytes,
            self.budget_bytes,
            self.entries,
            if self.degraded { " (degraded)" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let mut stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
        stats.hits = 3;
        stats.misses = 1;
        assert!((stats.hit_rate() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_display_marks_degraded() {
        let stats = CacheStats { degraded: true, ..Default::default() };
        assert!(stats.to_string().ends_with("(degraded)"));
    }
}
