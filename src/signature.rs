// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Content signatures: the comparable form of a piece of text.
//!
//! A [`ContentSignature`] carries every signal the similarity scorer needs:
//! lexical tokens, a semantic embedding, an intent vector over a closed set
//! of categories, a structural pattern and the modality. Signatures are built
//! once per distinct normalized text by [`SignatureBuilder`] and shared as
//! `Arc<ContentSignature>`.
//!
//! # Example
//!
//! ```
//! use recall_engine::signature::{Modality, SignatureBuilder};
//! use recall_engine::embedding::HashingEmbedder;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let builder = SignatureBuilder::new(Arc::new(HashingEmbedder::new(64)), 1000, 100);
//! let sig = builder.build("What is the capital of France?").await.unwrap();
//!
//! assert!(sig.structural_pattern.contains("question"));
//! assert_eq!(sig.modality, Modality::Text);
//! assert_eq!(sig.fingerprint.len(), 64); // sha256 hex
//! # }
//! ```

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error};

use crate::embedding::{Embedder, EmbeddingError};
use crate::similarity::SignatureCache;

/// Closed set of intent categories, in intent-vector order.
pub const INTENT_CATEGORIES: [&str; 7] = [
    "factual",
    "comparison",
    "procedural",
    "causal",
    "definition",
    "analytical",
    "creative",
];

/// Whether content is plain prose or mixes in code, links or tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Mixed,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Mixed => write!(f, "mixed"),
        }
    }
}

/// Derived, immutable representation of a text used for similarity lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSignature {
    /// sha256 hex of `normalized_text`; the direct cache key
    pub fingerprint: String,
    pub normalized_text: String,
    pub lexical_tokens: BTreeSet<String>,
    pub semantic_embedding: Vec<f32>,
    pub intent_vector: Vec<f32>,
    /// Sorted structural tokens joined with `|`
    pub structural_pattern: String,
    pub modality: Modality,
}

impl ContentSignature {
    /// Derive every signal except the embedding, which comes from an [`Embedder`].
    #[must_use]
    pub fn from_parts(text: &str, semantic_embedding: Vec<f32>) -> Self {
        let normalized_text = normalize_text(text);
        Self {
            fingerprint: content_hash(&normalized_text),
            lexical_tokens: lexical_tokens(&normalized_text),
            intent_vector: intent_vector(&normalized_text),
            structural_pattern: structural_pattern(text),
            modality: detect_modality(text),
            normalized_text,
            semantic_embedding,
        }
    }

    /// Structural tokens as a set.
    pub fn structural_tokens(&self) -> impl Iterator<Item = &str> {
        self.structural_pattern.split('|').filter(|s| !s.is_empty())
    }

    /// Name of the strongest intent category, if any pattern matched.
    #[must_use]
    pub fn dominant_intent(&self) -> Option<&'static str> {
        self.intent_vector
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 0.0)
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| INTENT_CATEGORIES[i])
    }

    /// Approximate heap footprint, used for budget accounting.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.fingerprint.len()
            + self.normalized_text.len()
            + self.lexical_tokens.iter().map(String::len).sum::<usize>()
            + (self.semantic_embedding.len() + self.intent_vector.len()) * std::mem::size_of::<f32>()
            + self.structural_pattern.len()
    }
}

/// sha256 hex digest of a string.
#[must_use]
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Lowercase, trim and collapse whitespace.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

const WORD_PATTERN: &str = r"[\p{L}\p{N}_]+";

fn word_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| compile(WORD_PATTERN)).as_ref()
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            error!(pattern, error = %e, "Signature pattern failed to compile");
            None
        }
    }
}

/// Word tokens of `text`: regex matches, or a plain alphanumeric split if
/// the pattern is unavailable.
fn words(text: &str) -> Vec<&str> {
    match word_regex() {
        Some(re) => re.find_iter(text).map(|m| m.as_str()).collect(),
        None => text
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|w| !w.is_empty())
            .collect(),
    }
}

/// Alphanumeric word tokens of a normalized text.
#[must_use]
pub fn lexical_tokens(normalized: &str) -> BTreeSet<String> {
    words(normalized).into_iter().map(str::to_string).collect()
}

struct IntentPatterns {
    /// One per intent category; `None` scores zero
    patterns: Vec<Option<Regex>>,
}

fn intent_patterns() -> &'static IntentPatterns {
    static PATTERNS: OnceLock<IntentPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        // Same order as INTENT_CATEGORIES
        let sources = [
            r"\b(what|who|when|where|which|how many|how much|list|name)\b",
            r"\b(compare|comparison|versus|vs\.?|difference|differences|better|worse|between)\b",
            r"\b(how (do|to|can|should)|steps?|guide|install|configure|setup|set up)\b",
            r"\b(why|because|cause|causes|caused|reason|effect|impact|leads? to)\b",
            r"\b(define|definition|meaning|what is|what are|stands for)\b",
            r"\b(analy[sz]e|analysis|evaluate|assess|implications?|trade-?offs?|pros and cons)\b",
            r"\b(write|imagine|story|poem|creative|invent|brainstorm|design)\b",
        ];
        IntentPatterns {
            patterns: sources.iter().map(|s| compile(s)).collect(),
        }
    })
}

/// Pattern-match score per intent category. Each entry is the number of
/// matches for that category, squashed to `[0, 1)` as `n / (n + 1)`.
#[must_use]
pub fn intent_vector(normalized: &str) -> Vec<f32> {
    intent_patterns()
        .patterns
        .iter()
        .map(|re| {
            let n = re.as_ref().map_or(0, |re| re.find_iter(normalized).count()) as f32;
            n / (n + 1.0)
        })
        .collect()
}

/// Structural tokens: question, comparison, enumeration, negation,
/// conditional, numeric, imperative, multi_clause. Texts with none of these
/// get `statement`.
#[must_use]
pub fn structural_pattern(text: &str) -> String {
    let lower = text.to_lowercase();
    let first_word = lower.split_whitespace().next().unwrap_or("");
    let mut tokens: BTreeSet<&'static str> = BTreeSet::new();

    let question_words = ["what", "why", "how", "when", "where", "who", "which", "is", "are", "can", "does", "do", "should"];
    if lower.trim_end().ends_with('?') || question_words.contains(&first_word) {
        tokens.insert("question");
    }
    if [" vs ", " vs. ", " versus ", "compare", "difference between", "better than"]
        .iter()
        .any(|p| lower.contains(p))
    {
        tokens.insert("comparison");
    }
    if lower.lines().filter(|l| {
        let t = l.trim_start();
        t.starts_with("- ")
            || t.starts_with("* ")
            || (t.chars().next().is_some_and(|c| c.is_ascii_digit()) && t.contains(". "))
    }).count() >= 2
    {
        tokens.insert("enumeration");
    }
    let word_list = words(&lower);
    if word_list.iter().any(|w| ["not", "no", "never", "without", "none"].contains(w)) || lower.contains("n't") {
        tokens.insert("negation");
    }
    if word_list.iter().any(|w| ["if", "unless", "when", "whenever", "provided"].contains(w)) && first_word != "when" {
        tokens.insert("conditional");
    }
    if lower.chars().any(|c| c.is_ascii_digit()) {
        tokens.insert("numeric");
    }
    if ["explain", "describe", "list", "write", "give", "show", "find", "summarize", "compare", "calculate"]
        .contains(&first_word)
    {
        tokens.insert("imperative");
    }
    let clause_breaks = lower.matches([',', ';']).count()
        + word_list.iter().filter(|w| ["and", "but", "while", "whereas", "although"].contains(w)).count();
    if clause_breaks >= 2 {
        tokens.insert("multi_clause");
    }
    if tokens.is_empty() {
        tokens.insert("statement");
    }
    tokens.into_iter().collect::<Vec<_>>().join("|")
}

/// Mixed when the text embeds code fences, links or table rows.
#[must_use]
pub fn detect_modality(text: &str) -> Modality {
    let has_code = text.contains("```");
    let has_url = text.contains("http://") || text.contains("https://");
    let has_table = text.lines().filter(|l| {
        let t = l.trim();
        t.starts_with('|') && t.ends_with('|') && t.len() > 2
    }).count() >= 2;
    if has_code || has_url || has_table {
        Modality::Mixed
    } else {
        Modality::Text
    }
}

/// Builds signatures, memoizing them by content hash in a bounded cache.
pub struct SignatureBuilder {
    embedder: Arc<dyn Embedder>,
    cache: SignatureCache,
}

impl SignatureBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, capacity: usize, evict_batch: usize) -> Self {
        Self {
            embedder,
            cache: SignatureCache::new(capacity, evict_batch),
        }
    }

    /// Build (or fetch) the signature for `text`.
    ///
    /// Fails only when the embedder does; callers treat that as an
    /// unconditional cache miss.
    pub async fn build(&self, text: &str) -> Result<Arc<ContentSignature>, EmbeddingError> {
        let normalized = normalize_text(text);
        let hash = content_hash(&normalized);
        if let Some(sig) = self.cache.get(&hash) {
            return Ok(sig);
        }

        let embedding = self.embedder.embed(&normalized).await?;
        let sig = Arc::new(ContentSignature::from_parts(text, embedding));
        debug!(fingerprint = %sig.fingerprint, modality = %sig.modality, "Built content signature");
        self.cache.insert(hash, sig.clone());
        Ok(sig)
    }

    #[must_use]
    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    /// Signature cache (hits, misses, len).
    #[must_use]
    pub fn cache_stats(&self) -> (u64, u64, usize) {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_pattern_compiles() {
        assert!(word_regex().is_some());
        let patterns = &intent_patterns().patterns;
        assert_eq!(patterns.len(), INTENT_CATEGORIES.len());
        assert!(patterns.iter().all(Option::is_some));
    }
    use crate::embedding::HashingEmbedder;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use async_trait::async_trait;

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0, 0.0])
        }
        fn dimensions(&self) -> usize { 2 }
        fn name(&self) -> &str { "counting" }
    }

    #[test]
    fn test_normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize_text("  Capital   of\nFRANCE "), "capital of france");
    }

    #[test]
    fn test_fingerprint_ignores_formatting() {
        let a = ContentSignature::from_parts("Capital of France", vec![]);
        let b = ContentSignature::from_parts("  capital  OF france", vec![]);
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn test_lexical_tokens() {
        let tokens = lexical_tokens("what is the capital of france?");
        assert!(tokens.contains("capital"));
        assert!(tokens.contains("france"));
        assert!(!tokens.iter().any(|t| t.contains('?')));
    }

    #[test]
    fn test_intent_vector_has_fixed_length() {
        let v = intent_vector("compare rust versus go");
        assert_eq!(v.len(), INTENT_CATEGORIES.len());
        assert!(v[1] > 0.0, "comparison intent should fire");
        assert!(v.iter().all(|x| (0.0..1.0).contains(x)));
    }

    #[test]
    fn test_dominant_intent() {
        let sig = ContentSignature::from_parts("Why does ice float? What is the cause?", vec![]);
        assert_eq!(sig.dominant_intent(), Some("causal"));

        let plain = ContentSignature::from_parts("zzz", vec![]);
        assert_eq!(plain.dominant_intent(), None);
    }

    #[test]
    fn test_structural_pattern_tokens() {
        assert!(structural_pattern("What is Rust?").contains("question"));
        assert!(structural_pattern("Compare Rust versus Go").contains("comparison"));
        assert!(structural_pattern("Do not panic").contains("negation"));
        assert!(structural_pattern("Explain the borrow checker").contains("imperative"));
        assert_eq!(structural_pattern("The sky is blue"), "statement");

        let p = structural_pattern("What changed in 2024?");
        assert_eq!(p, "numeric|question");
    }

    #[test]
    fn test_modality_detection() {
        assert_eq!(detect_modality("plain prose"), Modality::Text);
        assert_eq!(detect_modality("see https://example.com"), Modality::Mixed);
        assert_eq!(detect_modality("```rust\nfn main() {}\n```"), Modality::Mixed);
        assert_eq!(detect_modality("| a | b |\n| 1 | 2 |"), Modality::Mixed);
    }

    #[tokio::test]
    async fn test_builder_caches_by_content_hash() {
        let embedder = Arc::new(CountingEmbedder { calls: AtomicUsize::new(0) });
        let builder = SignatureBuilder::new(embedder.clone(), 10, 2);

        let a = builder.build("Hello World").await.unwrap();
        let b = builder.build("hello   world").await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        let (hits, misses, len) = builder.cache_stats();
        assert_eq!((hits, misses, len), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_builder_uses_embedder() {
        let builder = SignatureBuilder::new(Arc::new(HashingEmbedder::new(32)), 10, 2);
        let sig = builder.build("rust ownership").await.unwrap();
        assert_eq!(sig.semantic_embedding.len(), 32);
        assert!(sig.size_bytes() > 32 * 4);
    }
}
