// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Lookup and write API: get_or_compute, exact-key access.

use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Computed, TieredCacheManager};
use crate::cache_entry::{now_millis, CacheEntry};
use crate::metrics::{self, LatencyTimer};
use crate::signature::{ContentSignature, SignatureBuilder};
use crate::storage::{CacheStore, FallbackStore};

impl TieredCacheManager {
    /// Return a cached payload similar enough to `signature`, or run
    /// `compute` once and cache its output.
    ///
    /// Concurrent callers missing on the same fingerprint are coalesced:
    /// the first runs `compute`, the rest wait on the key lock and receive
    /// the stored result. A compute error is returned as-is and nothing is
    /// cached. An unknown `cache` name skips caching entirely.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        cache: &str,
        signature: Arc<ContentSignature>,
        threshold: f64,
        importance: Option<f64>,
        compute: F,
    ) -> Result<Vec<u8>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Computed, E>>,
    {
        let Some(store) = self.store(cache).cloned() else {
            warn!(cache, "Unknown logical cache, computing without caching");
            return self.compute_uncached(compute).await;
        };

        if let Some(payload) = self.timed_lookup(cache, &store, &signature, threshold).await {
            self.evict().await;
            return Ok(payload);
        }

        let slot = InflightSlot::claim(&self.inflight, Self::ledger_key(cache, &signature.fingerprint));
        let result = {
            let _guard = slot.lock.lock().await;

            // Someone else may have filled it while we waited
            match self.recheck(cache, &store, &signature, threshold).await {
                Some(payload) => {
                    metrics::record_coalesced(cache);
                    debug!(cache, fingerprint = %signature.fingerprint, "Coalesced onto in-flight computation");
                    Ok(payload)
                }
                None => {
                    self.counters.computations.fetch_add(1, Ordering::Relaxed);
                    metrics::record_computation(cache);
                    match compute().await {
                        Ok(computed) => {
                            let entry = self.new_entry(
                                signature.fingerprint.clone(),
                                signature.clone(),
                                computed,
                                importance,
                            );
                            let payload = entry.payload.clone();
                            self.store_entry(cache, &store, entry).await;
                            Ok(payload)
                        }
                        Err(e) => Err(e),
                    }
                }
            }
        };

        drop(slot);
        self.evict().await;
        result
    }

    /// [`get_or_compute`](Self::get_or_compute) from raw text.
    ///
    /// If the signature cannot be built (embedder down) the cache is skipped
    /// and `compute` runs directly.
    pub async fn get_or_compute_text<F, Fut, E>(
        &self,
        cache: &str,
        builder: &SignatureBuilder,
        text: &str,
        threshold: f64,
        importance: Option<f64>,
        compute: F,
    ) -> Result<Vec<u8>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Computed, E>>,
    {
        match builder.build(text).await {
            Ok(signature) => {
                self.get_or_compute(cache, signature, threshold, importance, compute)
                    .await
            }
            Err(e) => {
                warn!(cache, provider = builder.embedder_name(), error = %e, "Embedding unavailable, bypassing cache");
                metrics::record_embedding_unavailable(builder.embedder_name());
                self.compute_uncached(compute).await
            }
        }
    }

    /// Exact-key read. Counts as a lookup and refreshes access stats on a hit.
    pub async fn get_exact(&self, cache: &str, key: &str) -> Option<Vec<u8>> {
        let store = self.store(cache)?.clone();
        let timer = LatencyTimer::new(cache);
        let found = match store.get(key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(cache, key, error = %e, "Exact lookup failed");
                None
            }
        };

        let payload = match found {
            Some(entry) => Some(self.touch(cache, &store, entry).await),
            None => {
                // expired or evicted elsewhere
                self.untrack(cache, key);
                None
            }
        };
        self.record_lookup(cache, payload.is_some(), timer.elapsed());
        if payload.is_some() {
            self.evict().await;
        }
        payload
    }

    /// Exact-key write, then eviction. Storage failures are logged, not returned.
    pub async fn put_exact(
        &self,
        cache: &str,
        key: &str,
        signature: Arc<ContentSignature>,
        payload: Vec<u8>,
        cost: f64,
        importance: Option<f64>,
    ) {
        let Some(store) = self.store(cache).cloned() else {
            warn!(cache, key, "Unknown logical cache, dropping write");
            return;
        };
        let entry = self.new_entry(key.to_string(), signature, Computed { payload, cost }, importance);
        self.store_entry(cache, &store, entry).await;
        self.evict().await;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Internals
    // ═══════════════════════════════════════════════════════════════════════

    async fn compute_uncached<F, Fut, E>(&self, compute: F) -> Result<Vec<u8>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Computed, E>>,
    {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        self.counters.computations.fetch_add(1, Ordering::Relaxed);
        compute().await.map(|c| c.payload)
    }

    async fn timed_lookup(
        &self,
        cache: &str,
        store: &FallbackStore,
        signature: &ContentSignature,
        threshold: f64,
    ) -> Option<Vec<u8>> {
        let timer = LatencyTimer::new(cache);
        let found = self.recheck(cache, store, signature, threshold).await;
        self.record_lookup(cache, found.is_some(), timer.elapsed());
        found
    }

    /// Exact fingerprint first, then the similarity scan.
    async fn recheck(
        &self,
        cache: &str,
        store: &FallbackStore,
        signature: &ContentSignature,
        threshold: f64,
    ) -> Option<Vec<u8>> {
        match store.get(&signature.fingerprint).await {
            Ok(Some(entry)) => return Some(self.touch(cache, store, entry).await),
            Ok(None) => {}
            Err(e) => warn!(cache, error = %e, "Fingerprint lookup failed"),
        }
        match store.find_similar(signature, threshold, &self.scorer).await {
            Ok(Some(found)) => {
                debug!(cache, key = %found.key, score = found.score, "Similarity hit");
                Some(self.touch(cache, store, found.entry).await)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(cache, error = %e, "Similarity lookup failed");
                None
            }
        }
    }

    /// Record a hit on `entry`: bump access stats, write back, refresh the ledger.
    ///
    /// Runs under the eviction lock so a pass cannot delete the entry
    /// between the write-back and the ledger update.
    async fn touch(&self, cache: &str, store: &FallbackStore, mut entry: CacheEntry) -> Vec<u8> {
        entry.record_access(now_millis());
        let _pass = self.evict_lock.lock().await;
        match store.put(&entry.key, &entry).await {
            Ok(()) => self.track(cache, &entry.key, &entry),
            Err(e) => warn!(cache, key = %entry.key, error = %e, "Failed to write back access stats"),
        }
        entry.payload
    }

    fn new_entry(
        &self,
        key: String,
        signature: Arc<ContentSignature>,
        computed: Computed,
        importance: Option<f64>,
    ) -> CacheEntry {
        let entry = CacheEntry::new(
            key,
            signature,
            computed.payload,
            computed.cost,
            self.config.default_ttl_secs,
        );
        match importance {
            Some(importance) => entry.with_importance(importance),
            None => entry,
        }
    }

    async fn store_entry(&self, cache: &str, store: &FallbackStore, entry: CacheEntry) {
        let _pass = self.evict_lock.lock().await;
        match store.put(&entry.key, &entry).await {
            Ok(()) => self.track(cache, &entry.key, &entry),
            Err(e) => warn!(cache, key = %entry.key, error = %e, "Failed to store entry"),
        }
    }

    fn record_lookup(&self, cache: &str, hit: bool, elapsed: Duration) {
        let counter = if hit { &self.counters.hits } else { &self.counters.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        self.counters.lookups.fetch_add(1, Ordering::Relaxed);
        self.counters
            .lookup_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        metrics::record_lookup(cache, hit);
    }
}

/// Claim on one single-flight lock. Dropping it, on completion or when the
/// caller's future is cancelled mid-wait, removes the table entry if no
/// other caller holds it.
struct InflightSlot<'a> {
    table: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    lock: Arc<Mutex<()>>,
}

impl<'a> InflightSlot<'a> {
    fn claim(table: &'a DashMap<String, Arc<Mutex<()>>>, key: String) -> Self {
        let lock = table.entry(key.clone()).or_default().value().clone();
        Self { table, key, lock }
    }
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        // table + this claim
        self.table
            .remove_if(&self.key, |_, l| Arc::ptr_eq(l, &self.lock) && Arc::strong_count(l) == 2);
    }
}
