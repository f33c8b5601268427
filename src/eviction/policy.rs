// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::cmp::Ordering;

use crate::cache_entry::CacheEntry;

/// Entry metadata for eviction scoring.
///
/// A copy of the fields the policy needs, so scoring never clones payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct EvictionCandidate {
    pub key: String,
    pub size_bytes: usize,
    /// epoch millis
    pub created_at: u64,
    /// epoch millis
    pub last_accessed_at: u64,
    pub access_count: u64,
    pub importance: f64,
}

impl From<&CacheEntry> for EvictionCandidate {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            key: entry.key.clone(),
            size_bytes: entry.size_bytes(),
            created_at: entry.created_at,
            last_accessed_at: entry.last_accessed_at,
            access_count: entry.access_count,
            importance: entry.importance,
        }
    }
}

/// Frequency + recency + importance eviction policy.
///
/// `priority = w_f * ln(1 + access_count) + w_r * exp(-idle / half_life) + w_i * importance`
///
/// Higher priority survives longer. Eviction starts once usage passes the
/// watermark fraction of the budget and stops at that same line.
#[derive(Debug, Clone)]
pub struct EvictionPolicy {
    /// Recency decay constant (seconds)
    pub recency_decay_secs: f64,
    /// Weights (frequency, recency, importance)
    pub weights: (f64, f64, f64),
    /// Trigger and target fraction of the budget
    pub watermark: f64,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            recency_decay_secs: 3600.0, // 1 hour
            weights: (0.4, 0.3, 0.3),
            watermark: 0.8,
        }
    }
}

impl EvictionPolicy {
    #[must_use]
    /// Out-of-range watermarks are clamped to `[0, 1]`; NaN keeps the default.
    pub fn with_watermark(watermark: f64) -> Self {
        let defaults = Self::default();
        Self {
            watermark: if watermark.is_nan() { defaults.watermark } else { watermark.clamp(0.0, 1.0) },
            ..defaults
        }
    }

    /// Keep-priority of an entry at `now_ms`.
    #[must_use]
    pub fn priority(&self, entry: &EvictionCandidate, now_ms: u64) -> f64 {
        let idle_secs = now_ms.saturating_sub(entry.last_accessed_at) as f64 / 1000.0;
        let frequency = (entry.access_count as f64).ln_1p();
        let recency = (-idle_secs / self.recency_decay_secs).exp();

        frequency * self.weights.0 + recency * self.weights.1 + entry.importance * self.weights.2
    }

    /// Byte line above which eviction runs, and down to which it evicts.
    #[must_use]
    pub fn watermark_bytes(&self, budget_bytes: usize) -> usize {
        (budget_bytes as f64 * self.watermark) as usize
    }

    #[must_use]
    pub fn needs_eviction(&self, used_bytes: usize, budget_bytes: usize) -> bool {
        used_bytes > self.watermark_bytes(budget_bytes)
    }

    /// Bytes to free to get back to the watermark (0 when already below).
    #[must_use]
    pub fn bytes_to_free(&self, used_bytes: usize, budget_bytes: usize) -> usize {
        used_bytes.saturating_sub(self.watermark_bytes(budget_bytes))
    }

    /// Select the minimal lowest-priority prefix whose sizes cover `bytes_to_free`.
    ///
    /// Sorted ascending by priority; ties go to the oldest `created_at`, then
    /// the key, so selection is deterministic.
    #[must_use]
    pub fn select_victims(
        &self,
        entries: &[EvictionCandidate],
        bytes_to_free: usize,
        now_ms: u64,
    ) -> Vec<String> {
        if bytes_to_free == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(&EvictionCandidate, f64)> = entries
            .iter()
            .map(|e| (e, self.priority(e, now_ms)))
            .collect();

        scored.sort_by(|(a, pa), (b, pb)| {
            pa.partial_cmp(pb)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.key.cmp(&b.key))
        });

        let mut freed = 0usize;
        let mut victims = Vec::new();
        for (entry, _) in scored {
            if freed >= bytes_to_free {
                break;
            }
            freed += entry.size_bytes;
            victims.push(entry.key.clone());
        }
        victims
    }
}
