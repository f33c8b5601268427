// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Serialize;

use crate::signature::{ContentSignature, Modality};

/// Independent similarity signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Lexical,
    Semantic,
    Intent,
    Structural,
    CrossModal,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexical => write!(f, "lexical"),
            Self::Semantic => write!(f, "semantic"),
            Self::Intent => write!(f, "intent"),
            Self::Structural => write!(f, "structural"),
            Self::CrossModal => write!(f, "cross_modal"),
        }
    }
}

/// Per-signal weights of the composite score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityWeights {
    pub lexical: f64,
    pub semantic: f64,
    pub intent: f64,
    pub structural: f64,
    pub cross_modal: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            lexical: 0.15,
            semantic: 0.40,
            intent: 0.20,
            structural: 0.15,
            cross_modal: 0.10,
        }
    }
}

impl SimilarityWeights {
    /// Complexity above which weights shift toward semantic and intent.
    pub const COMPLEX_THRESHOLD: f64 = 0.7;

    /// Weights for complex inputs: meaning matters more than wording.
    #[must_use]
    pub fn complex() -> Self {
        Self {
            lexical: 0.10,
            semantic: 0.45,
            intent: 0.25,
            ..Self::default()
        }
    }

    fn weight(&self, signal: Signal) -> f64 {
        match signal {
            Signal::Lexical => self.lexical,
            Signal::Semantic => self.semantic,
            Signal::Intent => self.intent,
            Signal::Structural => self.structural,
            Signal::CrossModal => self.cross_modal,
        }
    }
}

/// Composite similarity plus the per-signal breakdown it was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityScore {
    pub composite: f64,
    pub per_signal: BTreeMap<Signal, f64>,
}

/// Multi-signal similarity between two signatures.
///
/// Pure: the score depends only on the two signatures and the weights.
/// `score(a, b) == score(b, a)` and `score(a, a) == 1.0`.
#[derive(Debug, Clone, Default)]
pub struct SimilarityScorer {
    weights: SimilarityWeights,
}

impl SimilarityScorer {
    #[must_use]
    pub fn new(weights: SimilarityWeights) -> Self {
        Self { weights }
    }

    #[must_use]
    pub fn weights(&self) -> SimilarityWeights {
        self.weights
    }

    /// Score with the configured weights.
    #[must_use]
    pub fn score(&self, a: &ContentSignature, b: &ContentSignature) -> SimilarityScore {
        Self::score_weighted(a, b, &self.weights)
    }

    /// Score with complexity-dependent weights; above 0.7 the complex
    /// weight set replaces the configured one.
    #[must_use]
    pub fn score_with_complexity(
        &self,
        a: &ContentSignature,
        b: &ContentSignature,
        complexity: f64,
    ) -> SimilarityScore {
        if complexity > SimilarityWeights::COMPLEX_THRESHOLD {
            Self::score_weighted(a, b, &SimilarityWeights::complex())
        } else {
            self.score(a, b)
        }
    }

    fn score_weighted(
        a: &ContentSignature,
        b: &ContentSignature,
        weights: &SimilarityWeights,
    ) -> SimilarityScore {
        let mut per_signal = BTreeMap::new();

        let lexical = 0.7 * jaccard(&a.lexical_tokens, &b.lexical_tokens)
            + 0.3 * strsim::normalized_levenshtein(&a.normalized_text, &b.normalized_text);
        let semantic = cosine(&a.semantic_embedding, &b.semantic_embedding);
        per_signal.insert(Signal::Lexical, lexical);
        per_signal.insert(Signal::Semantic, semantic);
        per_signal.insert(Signal::Intent, cosine(&a.intent_vector, &b.intent_vector));
        per_signal.insert(
            Signal::Structural,
            jaccard(
                &a.structural_tokens().collect(),
                &b.structural_tokens().collect(),
            ),
        );

        if a.modality == Modality::Mixed || b.modality == Modality::Mixed {
            let cross = if a.modality == b.modality { semantic } else { semantic * 0.5 };
            per_signal.insert(Signal::CrossModal, cross);
        }

        // Renormalize over the signals actually present
        let total_weight: f64 = per_signal.keys().map(|s| weights.weight(*s)).sum();
        let composite = if total_weight > 0.0 {
            per_signal
                .iter()
                .map(|(s, v)| weights.weight(*s) * v)
                .sum::<f64>()
                / total_weight
        } else {
            0.0
        };

        SimilarityScore {
            composite: composite.clamp(0.0, 1.0),
            per_signal,
        }
    }
}

/// Jaccard index; two empty sets are identical.
fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Cosine similarity clamped to [0, 1]. Inputs are normalized here, so
/// producers that skip unit-length normalization still score correctly.
/// Two all-zero (or empty) vectors agree and score 1; a zero vector against a
/// non-zero one, or a length mismatch, scores 0.
fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    match (na <= f64::EPSILON, nb <= f64::EPSILON) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        (false, false) => {}
    }
    (dot / (na.sqrt() * nb.sqrt())).clamp(0.0, 1.0)
}
