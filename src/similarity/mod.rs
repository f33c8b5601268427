// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Similarity scoring between content signatures.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Similarity Module                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  scorer.rs          - Composite multi-signal score           │
//! │  └─ lexical:    0.7 * jaccard(tokens) + 0.3 * edit ratio     │
//! │  └─ semantic:   cosine(embedding)                            │
//! │  └─ intent:     cosine(intent vector)                        │
//! │  └─ structural: overlap of structural tokens                 │
//! │  └─ cross_modal: only when either side is mixed              │
//! ├──────────────────────────────────────────────────────────────┤
//! │  threshold.rs       - Category/complexity-aware thresholds   │
//! ├──────────────────────────────────────────────────────────────┤
//! │  signature_cache.rs - Bounded content-hash → signature map   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod scorer;
pub mod threshold;
pub mod signature_cache;

pub use scorer::{Signal, SimilarityScore, SimilarityScorer, SimilarityWeights};
pub use threshold::{category_offset, dynamic_threshold};
pub use signature_cache::SignatureCache;
