// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Tiered cache manager.
//!
//! Named logical caches (`results`, `subtasks`, `embeddings`, plus any
//! configured extras) share one memory budget and one eviction policy.
//!
//! ```text
//! get_or_compute(cache, sig)
//!     │
//!     ├─ find_similar ≥ threshold ──► hit: bump access stats, return payload
//!     │
//!     └─ miss ──► single-flight lock(cache/fingerprint)
//!                   ├─ re-check get + find_similar ──► coalesced result
//!                   └─ compute() once ──► put ──► evict to watermark
//! ```
//!
//! The manager is an explicit dependency: build it once from
//! [`RecallEngineConfig`] and share it as `Arc<TieredCacheManager>`.
//! Call [`shutdown`](TieredCacheManager::shutdown) before exit to flush.

mod api;
mod types;

pub use types::{CacheStats, Computed};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache_entry::{now_millis, CacheEntry};
use crate::config::RecallEngineConfig;
use crate::eviction::{EvictionCandidate, EvictionPolicy};
use crate::metrics;
use crate::similarity::SimilarityScorer;
use crate::storage::redis::RedisStore;
use crate::storage::{CacheStore, FallbackStore};

/// Ledger row: which store holds the entry, plus what eviction scores.
#[derive(Debug, Clone)]
struct LedgerSlot {
    cache: String,
    key: String,
    /// Written while the cache's durable backend was still in use
    in_durable: bool,
    candidate: EvictionCandidate,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
    evictions: AtomicU64,
    evicted_bytes: AtomicU64,
    lookups: AtomicU64,
    lookup_micros: AtomicU64,
}

pub struct TieredCacheManager {
    config: RecallEngineConfig,
    stores: BTreeMap<String, Arc<FallbackStore>>,
    scorer: SimilarityScorer,
    policy: EvictionPolicy,
    /// Entry metadata across all logical caches, keyed "cache/key"
    ledger: DashMap<String, LedgerSlot>,
    used_bytes: AtomicUsize,
    /// Single-flight lock table, keyed "cache/fingerprint"
    inflight: DashMap<String, Arc<Mutex<()>>>,
    /// Serializes eviction passes against store writes that update the ledger
    evict_lock: Mutex<()>,
    counters: Counters,
}

impl TieredCacheManager {
    /// Build the manager, connecting to Redis when `redis_url` is set.
    ///
    /// A connection failure is not an error: every logical cache runs from
    /// memory instead and [`CacheStats::degraded`] reports it.
    pub async fn new(config: RecallEngineConfig) -> Self {
        let names = config.cache_names();
        let mut stores = BTreeMap::new();

        match config.redis_url.as_deref() {
            Some(url) => match RedisStore::open(url).await {
                Ok(connection) => {
                    info!(prefix = %config.redis_prefix, caches = names.len(), "Connected to Redis");
                    metrics::set_backend_healthy("redis", true);
                    for name in &names {
                        let prefix = format!("{}{}:", config.redis_prefix, name);
                        let durable: Arc<dyn CacheStore> =
                            Arc::new(RedisStore::with_connection(connection.clone(), &prefix));
                        stores.insert(name.clone(), Arc::new(FallbackStore::new(name, durable)));
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Redis unavailable at startup, caching in memory only");
                    metrics::set_backend_healthy("redis", false);
                    for name in &names {
                        metrics::record_backend_fallback(name, "connect");
                        stores.insert(name.clone(), Arc::new(FallbackStore::unavailable(name)));
                    }
                }
            },
            None => {
                for name in &names {
                    stores.insert(name.clone(), Arc::new(FallbackStore::memory_only(name)));
                }
            }
        }

        let manager = Self::assemble(config, stores);
        manager.warm_ledger().await;
        manager
    }

    /// Build the manager over caller-supplied durable stores, one per cache
    /// name. Configured caches without a store get a memory store.
    pub async fn with_stores(
        config: RecallEngineConfig,
        durable: Vec<(String, Arc<dyn CacheStore>)>,
    ) -> Self {
        let mut stores: BTreeMap<String, Arc<FallbackStore>> = durable
            .into_iter()
            .map(|(name, store)| {
                let wrapped = Arc::new(FallbackStore::new(&name, store));
                (name, wrapped)
            })
            .collect();
        for name in config.cache_names() {
            stores
                .entry(name.clone())
                .or_insert_with(|| Arc::new(FallbackStore::memory_only(&name)));
        }

        let manager = Self::assemble(config, stores);
        manager.warm_ledger().await;
        manager
    }

    fn assemble(config: RecallEngineConfig, stores: BTreeMap<String, Arc<FallbackStore>>) -> Self {
        if let Err(e) = config.validate() {
            warn!(error = %e, "Cache config failed validation, clamping out-of-range values");
        }
        let policy = EvictionPolicy::with_watermark(config.eviction_watermark);
        Self {
            config,
            stores,
            scorer: SimilarityScorer::default(),
            policy,
            ledger: DashMap::new(),
            used_bytes: AtomicUsize::new(0),
            inflight: DashMap::new(),
            evict_lock: Mutex::new(()),
            counters: Counters::default(),
        }
    }

    /// Seed the ledger from entries already in the stores (durable restarts).
    async fn warm_ledger(&self) {
        for (name, store) in &self.stores {
            match store.entries().await {
                Ok(entries) => {
                    if !entries.is_empty() {
                        debug!(cache = %name, count = entries.len(), "Warming eviction ledger");
                    }
                    for entry in &entries {
                        self.track(name, &entry.key, entry);
                    }
                }
                Err(e) => warn!(cache = %name, error = %e, "Failed to list entries for ledger warmup"),
            }
        }
        self.evict().await;
    }

    #[must_use]
    pub fn config(&self) -> &RecallEngineConfig {
        &self.config
    }

    #[must_use]
    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    /// Logical cache names in sorted order.
    pub fn cache_names(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }

    pub(crate) fn store(&self, cache: &str) -> Option<&Arc<FallbackStore>> {
        self.stores.get(cache)
    }

    /// Live entries in one logical cache, `None` for an unknown name.
    pub async fn cache_len(&self, cache: &str) -> Option<usize> {
        let store = self.stores.get(cache)?;
        match store.size().await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(cache, error = %e, "Failed to size cache");
                None
            }
        }
    }

    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.used_bytes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.forget_abandoned();
        let lookups = self.counters.lookups.load(Ordering::Relaxed);
        let micros = self.counters.lookup_micros.load(Ordering::Relaxed);
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            computations: self.counters.computations.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            evicted_bytes: self.counters.evicted_bytes.load(Ordering::Relaxed),
            avg_lookup_micros: if lookups == 0 { 0.0 } else { micros as f64 / lookups as f64 },
            used_bytes: self.used_bytes(),
            budget_bytes: self.config.memory_budget_bytes,
            entries: self.ledger.len(),
            degraded: self.stores.values().any(|s| s.is_degraded()),
        }
    }

    /// Flush every store and log final stats.
    pub async fn shutdown(&self) {
        info!("Shutting down cache manager");
        for (name, store) in &self.stores {
            if let Err(e) = store.flush().await {
                warn!(cache = %name, error = %e, "Flush failed during shutdown");
            }
        }
        let stats = self.stats();
        info!(
            hits = stats.hits,
            misses = stats.misses,
            computations = stats.computations,
            evictions = stats.evictions,
            used_bytes = stats.used_bytes,
            degraded = stats.degraded,
            "Cache manager stopped"
        );
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Ledger + eviction
    // ═══════════════════════════════════════════════════════════════════════

    fn ledger_key(cache: &str, key: &str) -> String {
        format!("{}/{}", cache, key)
    }

    /// Insert or refresh the ledger row for an entry, keeping `used_bytes` in step.
    fn track(&self, cache: &str, key: &str, entry: &CacheEntry) {
        self.forget_abandoned();
        let in_durable = self.stores.get(cache).is_some_and(|s| !s.is_degraded());
        let mut candidate = EvictionCandidate::from(entry);
        let ledger_key = Self::ledger_key(cache, key);
        candidate.key = ledger_key.clone();
        let new_size = candidate.size_bytes;

        let previous = self.ledger.insert(
            ledger_key,
            LedgerSlot {
                cache: cache.to_string(),
                key: key.to_string(),
                in_durable,
                candidate,
            },
        );
        match previous {
            Some(old) if old.candidate.size_bytes > new_size => {
                self.used_bytes.fetch_sub(old.candidate.size_bytes - new_size, Ordering::Relaxed);
            }
            Some(old) => {
                self.used_bytes.fetch_add(new_size - old.candidate.size_bytes, Ordering::Relaxed);
            }
            None => {
                self.used_bytes.fetch_add(new_size, Ordering::Relaxed);
            }
        }
    }

    /// Drop ledger rows for entries stranded in a durable backend that has
    /// just been abandoned. They can no longer be read or evicted, so they
    /// must not count against the budget.
    fn forget_abandoned(&self) {
        for (name, store) in &self.stores {
            if !store.take_abandoned() {
                continue;
            }
            let mut count = 0usize;
            let mut freed = 0usize;
            self.ledger.retain(|_, slot| {
                let stranded = slot.cache == *name && slot.in_durable;
                if stranded {
                    count += 1;
                    freed += slot.candidate.size_bytes;
                }
                !stranded
            });
            self.used_bytes.fetch_sub(freed, Ordering::Relaxed);
            metrics::set_cache_bytes(self.used_bytes());
            metrics::set_cache_entries(self.ledger.len());
            warn!(cache = %name, entries = count, bytes = freed, "Forgot entries left in abandoned durable store");
        }
    }

    fn untrack(&self, cache: &str, key: &str) -> Option<usize> {
        let (_, slot) = self.ledger.remove(&Self::ledger_key(cache, key))?;
        self.used_bytes.fetch_sub(slot.candidate.size_bytes, Ordering::Relaxed);
        Some(slot.candidate.size_bytes)
    }

    /// Evict down to the watermark if usage is above it.
    pub(crate) async fn evict(&self) {
        let _pass = self.evict_lock.lock().await;
        self.forget_abandoned();
        let budget = self.config.memory_budget_bytes;
        let used = self.used_bytes();
        if !self.policy.needs_eviction(used, budget) {
            metrics::set_cache_bytes(used);
            metrics::set_cache_entries(self.ledger.len());
            return;
        }

        let to_free = self.policy.bytes_to_free(used, budget);
        let candidates: Vec<EvictionCandidate> =
            self.ledger.iter().map(|r| r.value().candidate.clone()).collect();
        let victims = self.policy.select_victims(&candidates, to_free, now_millis());

        let mut count = 0usize;
        let mut freed = 0usize;
        for ledger_key in victims {
            let slot = match self.ledger.get(&ledger_key) {
                Some(r) => r.value().clone(),
                None => continue,
            };
            if let Some(store) = self.stores.get(&slot.cache) {
                if let Err(e) = store.delete(&slot.key).await {
                    warn!(cache = %slot.cache, key = %slot.key, error = %e, "Failed to delete evicted entry");
                }
            }
            if let Some(size) = self.untrack(&slot.cache, &slot.key) {
                count += 1;
                freed += size;
            }
        }

        self.counters.evictions.fetch_add(count as u64, Ordering::Relaxed);
        self.counters.evicted_bytes.fetch_add(freed as u64, Ordering::Relaxed);
        metrics::record_eviction(count, freed);
        metrics::set_cache_bytes(self.used_bytes());
        metrics::set_cache_entries(self.ledger.len());
        debug!(
            evicted = count,
            freed_bytes = freed,
            used_bytes = self.used_bytes(),
            budget_bytes = budget,
            "Eviction pass complete"
        );
    }
}
