// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-task recovery chain.
//!
//! A failed or timed-out attempt moves to the next step with a reduced
//! prompt. Each step runs at most once:
//!
//! ```text
//! Primary (full text)
//!   └─► Simplified (first sentence, ≤ 200 chars)
//!         └─► KeyTerms (≤ 10 distinct content words)
//!               └─► Failed + placeholder
//! ```
//!
//! Every step is always planned. When a reduction yields nothing new (a
//! one-sentence task has no shorter first sentence), the step retries the
//! previous step's text: a timed-out attempt still deserves its retry.

use serde::Serialize;

use crate::signature::normalize_text;

/// Longest simplified prompt, in characters.
pub const SIMPLIFIED_MAX_CHARS: usize = 200;
/// Most terms kept by the key-terms step.
pub const MAX_KEY_TERMS: usize = 10;
const MIN_TERM_CHARS: usize = 4;

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "also", "been", "before", "being", "below", "between",
    "both", "could", "does", "doing", "down", "during", "each", "from", "further", "have",
    "having", "here", "into", "just", "more", "most", "much", "only", "other", "over", "please",
    "same", "should", "some", "such", "than", "that", "their", "them", "then", "there", "these",
    "they", "this", "those", "through", "under", "until", "very", "were", "what", "when",
    "where", "which", "while", "whom", "will", "with", "would", "your",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStep {
    Primary,
    Simplified,
    KeyTerms,
}

impl RecoveryStep {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Simplified => "simplified",
            Self::KeyTerms => "key_terms",
        }
    }
}

impl std::fmt::Display for RecoveryStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned attempt: which step and the text it sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAttempt {
    pub step: RecoveryStep,
    pub text: String,
}

/// Ordered attempts for `text`: primary, simplified, key terms.
///
/// A reduction that comes out empty falls back to the previous step's text.
#[must_use]
pub fn recovery_chain(text: &str) -> Vec<PlannedAttempt> {
    let simplified = non_empty_or(simplify(text), text);
    let terms = non_empty_or(key_terms(text), &simplified);
    vec![
        PlannedAttempt { step: RecoveryStep::Primary, text: text.to_string() },
        PlannedAttempt { step: RecoveryStep::Simplified, text: simplified },
        PlannedAttempt { step: RecoveryStep::KeyTerms, text: terms },
    ]
}

fn non_empty_or(reduced: String, previous: &str) -> String {
    if normalize_text(&reduced).is_empty() {
        previous.to_string()
    } else {
        reduced
    }
}

/// First sentence of `text`, cut to [`SIMPLIFIED_MAX_CHARS`].
#[must_use]
pub fn simplify(text: &str) -> String {
    let trimmed = text.trim();
    let mut end = trimmed.len();
    let mut chars = trimmed.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '?' | '!') {
            let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_boundary {
                end = i + c.len_utf8();
                break;
            }
        }
    }
    trimmed[..end].chars().take(SIMPLIFIED_MAX_CHARS).collect::<String>().trim().to_string()
}

/// Up to [`MAX_KEY_TERMS`] distinct lowercase content words, in order of
/// first appearance.
#[must_use]
pub fn key_terms(text: &str) -> String {
    let mut terms: Vec<String> = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if terms.len() == MAX_KEY_TERMS {
            break;
        }
        let word = word.to_lowercase();
        if word.chars().count() < MIN_TERM_CHARS || STOPWORDS.contains(&word.as_str()) {
            continue;
        }
        if !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms.join(" ")
}
