//! Integration Tests for Recall Engine
//!
//! Tests against a real Redis via testcontainers - no external
//! docker-compose required.
//!
//! # Running Tests
//! ```bash
//! # Run all integration tests (requires Docker)
//! cargo test --test integration -- --ignored
//!
//! # Run only happy-path tests
//! cargo test --test integration happy -- --ignored
//! ```
//!
//! # Test Organization
//! - `happy_*` - Normal operation: lookups, TTL, eviction, restart warmup
//! - `failure_*` - Failure scenarios: unreachable Redis, malformed rows

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use recall_engine::storage::redis::RedisStore;
use recall_engine::storage::CacheStore;
use recall_engine::{
    CacheEntry, CachedEmbedder, Computed, ContentSignature, Embedder, FnExecutor, HashingEmbedder,
    RecallEngineConfig, SignatureBuilder, Task, TaskContext, TieredCacheManager, WaveScheduler,
    RESULTS_CACHE,
};

use testcontainers::{clients::Cli, core::WaitFor, Container, GenericImage};

// =============================================================================
// Container Helpers
// =============================================================================

/// Create a Redis container with health check
fn redis_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379)
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));
    docker.run(image)
}

fn redis_config(port: u16) -> RecallEngineConfig {
    RecallEngineConfig {
        redis_url: Some(format!("redis://127.0.0.1:{}", port)),
        // isolate runs sharing a container
        redis_prefix: format!("test-{}:", uuid::Uuid::new_v4()),
        ..Default::default()
    }
}

fn signatures() -> SignatureBuilder {
    SignatureBuilder::new(Arc::new(HashingEmbedder::new(64)), 100, 10)
}

async fn signature(text: &str) -> Arc<ContentSignature> {
    signatures().build(text).await.expect("hashing embedder is infallible")
}

async fn lookup(
    manager: &TieredCacheManager,
    text: &str,
    counter: &AtomicUsize,
) -> String {
    let payload = manager
        .get_or_compute(RESULTS_CACHE, signature(text).await, 0.9, None, || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::io::Error>(Computed::new(format!("answer to {}", text), 2.0))
        })
        .await
        .expect("compute never fails here");
    String::from_utf8(payload).expect("utf8 payload")
}

// =============================================================================
// Happy Path Tests
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn happy_redis_store_roundtrip() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let url = format!("redis://127.0.0.1:{}", redis.get_host_port_ipv4(6379));

    let store = RedisStore::connect(&url, "roundtrip:").await.expect("connect");
    assert!(store.healthy().await);
    assert_eq!(store.backend_name(), "redis");

    let sig = signature("What is the capital of France?").await;
    let entry = CacheEntry::new(sig.fingerprint.clone(), sig.clone(), b"Paris".to_vec(), 1.0, 0);
    store.put(&entry.key, &entry).await.expect("put");

    let back = store.get(&entry.key).await.expect("get").expect("present");
    assert_eq!(back.payload, b"Paris");
    assert_eq!(back.signature.fingerprint, sig.fingerprint);
    assert_eq!(store.size().await.expect("size"), 1);

    let similar = signature("what is the capital of france").await;
    let found = store
        .find_similar(&similar, 0.8, &Default::default())
        .await
        .expect("scan")
        .expect("similar entry");
    assert_eq!(found.key, entry.key);

    store.delete(&entry.key).await.expect("delete");
    assert!(store.get(&entry.key).await.expect("get").is_none());
    assert_eq!(store.size().await.expect("size"), 0);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn happy_manager_hits_through_redis() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let manager = TieredCacheManager::new(redis_config(redis.get_host_port_ipv4(6379))).await;
    let computed = AtomicUsize::new(0);

    let first = lookup(&manager, "How tall is Mount Everest?", &computed).await;
    let second = lookup(&manager, "how tall is mount everest", &computed).await;

    assert_eq!(first, second);
    assert_eq!(computed.load(Ordering::SeqCst), 1);
    let stats = manager.stats();
    assert!(!stats.degraded);
    assert_eq!(stats.hits, 1);
    assert_eq!(manager.cache_len(RESULTS_CACHE).await, Some(1));

    manager.shutdown().await;
}

#[tokio::test]
#[ignore] // Requires Docker
async fn happy_ttl_expires_in_redis() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let url = format!("redis://127.0.0.1:{}", redis.get_host_port_ipv4(6379));
    let store = RedisStore::connect(&url, "ttl:").await.expect("connect");

    let sig = signature("short lived").await;
    let entry = CacheEntry::new("short".into(), sig, b"x".to_vec(), 1.0, 1);
    store.put("short", &entry).await.expect("put");
    assert!(store.get("short").await.expect("get").is_some());

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert!(store.get("short").await.expect("get").is_none());
    // index pruned on the miss
    assert_eq!(store.size().await.expect("size"), 0);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn happy_restart_warms_budget_ledger() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let config = redis_config(redis.get_host_port_ipv4(6379));
    let computed = AtomicUsize::new(0);

    let first = TieredCacheManager::new(config.clone()).await;
    for text in ["Define osmosis", "List prime numbers below 20", "Who discovered penicillin?"] {
        lookup(&first, text, &computed).await;
    }
    let used = first.used_bytes();
    assert!(used > 0);
    first.shutdown().await;
    drop(first);

    // same prefix: the new manager sees the persisted entries
    let second = TieredCacheManager::new(config).await;
    assert_eq!(second.used_bytes(), used);
    assert_eq!(second.stats().entries, 3);
    lookup(&second, "Define osmosis", &computed).await;
    assert_eq!(computed.load(Ordering::SeqCst), 3);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn happy_budget_evicts_from_redis() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let mut config = redis_config(redis.get_host_port_ipv4(6379));
    let computed = AtomicUsize::new(0);

    // measure one entry, then size the budget for about three
    let probe = TieredCacheManager::new(config.clone()).await;
    lookup(&probe, "probe entry for sizing", &computed).await;
    let one = probe.used_bytes();
    drop(probe);

    config.redis_prefix = format!("budget-{}:", uuid::Uuid::new_v4());
    config.memory_budget_bytes = one * 4;
    let manager = TieredCacheManager::new(config).await;
    let topics = [
        "Photosynthesis in desert plants",
        "History of the printing press",
        "Rules of competitive chess",
        "Migration routes of arctic terns",
        "Fermentation of sourdough bread",
        "Orbital mechanics of geostationary satellites",
    ];
    for topic in topics {
        lookup(&manager, topic, &computed).await;
    }

    let stats = manager.stats();
    assert!(stats.evictions > 0);
    assert!(stats.used_bytes <= stats.budget_bytes);
    assert_eq!(manager.cache_len(RESULTS_CACHE).await, Some(stats.entries));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn happy_embeddings_cached_in_redis() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let manager = Arc::new(TieredCacheManager::new(redis_config(redis.get_host_port_ipv4(6379))).await);

    let embedder = CachedEmbedder::new(Arc::new(HashingEmbedder::new(32)), manager.clone());
    let a = embedder.embed("vectors survive restarts").await.expect("embed");
    let b = embedder.embed("vectors survive restarts").await.expect("embed");
    assert_eq!(a, b);
    assert_eq!(manager.stats().hits, 1);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn happy_scheduler_memoizes_through_redis() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let config = redis_config(redis.get_host_port_ipv4(6379));
    let cache = Arc::new(TieredCacheManager::new(config.clone()).await);
    let scheduler = WaveScheduler::new(config, cache, Arc::new(signatures()));

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let executor = Arc::new(FnExecutor::new(move |task: Task, ctx: TaskContext| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{} ({} inputs)", task.text, ctx.dependencies.len()))
        }
    }));
    let tasks = vec![
        Task::new(1, "Gather rainfall data for 2023"),
        Task::new(2, "Gather temperature data for 2023"),
        Task::new(3, "Correlate rainfall with temperature").depends_on([1, 2]),
    ];

    let first = scheduler.execute(tasks.clone(), executor.clone()).await;
    let second = scheduler.execute(tasks, executor).await;

    assert!(first.is_complete_success());
    assert_eq!(first.results, second.results);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(scheduler.stats().cache_hits, 3);
}

// =============================================================================
// Failure Scenario Tests
// =============================================================================

#[tokio::test]
async fn failure_unreachable_redis_degrades_to_memory() {
    let config = RecallEngineConfig {
        redis_url: Some("redis://127.0.0.1:1".into()),
        ..Default::default()
    };
    let manager = TieredCacheManager::new(config).await;
    let computed = AtomicUsize::new(0);

    lookup(&manager, "Largest desert on Earth", &computed).await;
    lookup(&manager, "Largest desert on Earth", &computed).await;

    assert_eq!(computed.load(Ordering::SeqCst), 1);
    assert!(manager.stats().degraded);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn failure_corrupted_redis_entry() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let url = format!("redis://127.0.0.1:{}", redis.get_host_port_ipv4(6379));

    let client = redis::Client::open(url.as_str()).expect("client");
    let mut conn = client
        .get_multiplexed_async_connection()
        .await
        .expect("connection");
    let _: () = redis::cmd("SET")
        .arg("corrupt:garbage")
        .arg(b"{{{{not valid json at all!!!!")
        .query_async(&mut conn)
        .await
        .expect("set");
    let _: () = redis::cmd("SADD")
        .arg("corrupt:__keys")
        .arg("garbage")
        .query_async(&mut conn)
        .await
        .expect("sadd");

    let store = RedisStore::connect(&url, "corrupt:").await.expect("connect");
    let sig = signature("after corruption").await;
    let entry = CacheEntry::new("fine".into(), sig, b"ok".to_vec(), 1.0, 0);
    store.put("fine", &entry).await.expect("put");

    // The scan skips the bad row instead of failing, and deletes it
    let all = store.entries().await.expect("scan survives a malformed row");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].key, "fine");
    assert_eq!(store.size().await.expect("size"), 1);
    let exists: bool = redis::cmd("EXISTS")
        .arg("corrupt:garbage")
        .query_async(&mut conn)
        .await
        .expect("exists");
    assert!(!exists);

    // A malformed value read by key is absent, not an error
    let _: () = redis::cmd("SET")
        .arg("corrupt:garbage")
        .arg(b"[1, 2")
        .query_async(&mut conn)
        .await
        .expect("set");
    assert!(store.get("garbage").await.expect("get").is_none());
    assert!(store.get("fine").await.expect("get").is_some());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn failure_malformed_row_keeps_manager_on_redis() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let port = redis.get_host_port_ipv4(6379);
    let config = redis_config(port);

    let client = redis::Client::open(format!("redis://127.0.0.1:{}", port)).expect("client");
    let mut conn = client
        .get_multiplexed_async_connection()
        .await
        .expect("connection");
    let prefix = format!("{}{}:", config.redis_prefix, RESULTS_CACHE);
    let _: () = redis::cmd("SET")
        .arg(format!("{}junk", prefix))
        .arg(b"not json")
        .query_async(&mut conn)
        .await
        .expect("set");
    let _: () = redis::cmd("SADD")
        .arg(format!("{}__keys", prefix))
        .arg("junk")
        .query_async(&mut conn)
        .await
        .expect("sadd");

    let manager = TieredCacheManager::new(config).await;
    let computed = AtomicUsize::new(0);
    lookup(&manager, "Boiling point of ethanol", &computed).await;
    lookup(&manager, "Boiling point of ethanol", &computed).await;

    assert_eq!(computed.load(Ordering::SeqCst), 1);
    assert!(!manager.stats().degraded);
    assert_eq!(manager.cache_len(RESULTS_CACHE).await, Some(1));
}
