// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Storage backends for cache entries.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ traits.rs   - CacheStore contract, SimilarMatch, errors  │
//! │ memory.rs   - DashMap store with lazy TTL expiry         │
//! │ redis.rs    - JSON + SET EX, key index for scans         │
//! │ fallback.rs - durable store degrading to memory          │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod fallback;
pub mod memory;
pub mod redis;
pub mod traits;

pub use fallback::FallbackStore;
pub use memory::InMemoryStore;
pub use traits::{best_match, CacheStore, SimilarMatch, StorageError};
