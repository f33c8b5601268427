// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Eviction policy for the shared cache budget.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Eviction Module                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  policy.rs   - Priority scoring + victim selection           │
//! │  └─ EvictionCandidate: entry metadata for scoring            │
//! │  └─ EvictionPolicy: frequency + recency + importance → score │
//! │  └─ watermark: trigger above 80% of budget, evict back to it │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Eviction is driven by [`TieredCacheManager`](crate::cache::TieredCacheManager)
//! after each write. It collects candidates from every logical cache and
//! calls [`EvictionPolicy::select_victims`] with the bytes over the watermark.

pub mod policy;

pub use policy::{EvictionCandidate, EvictionPolicy};
