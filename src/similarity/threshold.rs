// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Category- and complexity-aware match thresholds.
//!
//! Harder inputs accept looser matches: each unit of complexity lowers the
//! threshold by 0.1, and open-ended categories start lower than factual ones.

/// Lower bound of any dynamic threshold.
pub const MIN_THRESHOLD: f64 = 0.5;
/// Upper bound of any dynamic threshold.
pub const MAX_THRESHOLD: f64 = 0.99;

/// Offset added to the baseline for an intent category.
#[must_use]
pub fn category_offset(category: &str) -> f64 {
    match category {
        "factual" => 0.03,
        "definition" => 0.02,
        "procedural" => 0.0,
        "comparison" => -0.02,
        "causal" => -0.03,
        "analytical" => -0.05,
        "creative" => -0.08,
        _ => 0.0,
    }
}

/// `clamp(baseline + offset(category) - 0.1 * complexity, 0.5, 0.99)`
///
/// ```
/// use recall_engine::similarity::dynamic_threshold;
///
/// assert!((dynamic_threshold("factual", 0.0, 0.90) - 0.93).abs() < 1e-9);
/// assert!((dynamic_threshold("creative", 1.0, 0.90) - 0.72).abs() < 1e-9);
/// assert_eq!(dynamic_threshold("factual", 0.0, 1.0), 0.99);
/// ```
#[must_use]
pub fn dynamic_threshold(category: &str, complexity: f64, baseline: f64) -> f64 {
    let complexity = complexity.clamp(0.0, 1.0);
    (baseline + category_offset(category) - 0.1 * complexity).clamp(MIN_THRESHOLD, MAX_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complexity_lowers_threshold() {
        let easy = dynamic_threshold("procedural", 0.0, 0.9);
        let hard = dynamic_threshold("procedural", 0.8, 0.9);
        assert!((easy - 0.9).abs() < 1e-9);
        assert!((hard - 0.82).abs() < 1e-9);
    }

    #[test]
    fn test_clamped_to_bounds() {
        assert_eq!(dynamic_threshold("creative", 1.0, 0.4), MIN_THRESHOLD);
        assert_eq!(dynamic_threshold("factual", 0.0, 0.99), MAX_THRESHOLD);
    }

    #[test]
    fn test_unknown_category_has_no_offset() {
        assert_eq!(category_offset("astrology"), 0.0);
        assert!((dynamic_threshold("astrology", 0.0, 0.85) - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_complexity_is_clamped() {
        assert_eq!(
            dynamic_threshold("procedural", 5.0, 0.9),
            dynamic_threshold("procedural", 1.0, 0.9)
        );
    }
}
