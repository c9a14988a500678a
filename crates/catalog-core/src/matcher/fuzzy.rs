//! Edit-distance matcher.
//!
//! Each field is scored by the fewest edits needed to turn the query into some
//! substring of the field (Sellers' approximate substring match), divided by
//! the query length. Field distances combine as a weighted geometric mean, so
//! one near-perfect field on a heavy key dominates weak matches elsewhere.

use super::{MatchConfig, Matcher, WeightedField};

/// Floor for a field distance before weighting; a perfect match in one field
/// must still let other matched fields order the results.
const MIN_FIELD_DISTANCE: f64 = 0.001;

/// Minimum edits to turn `pattern` into any substring of `text`.
///
/// Runs in `O(pattern.len() * text.len())` time and `O(pattern.len())` space.
pub fn substring_edit_distance(pattern: &[char], text: &[char]) -> usize {
    let m = pattern.len();
    if m == 0 {
        return 0;
    }

    // col[i] = edits aligning pattern[..i] to a substring ending at the current text position
    let mut col: Vec<usize> = (0..=m).collect();
    let mut best = col[m];

    for &tc in text {
        let mut diag = col[0];
        col[0] = 0;
        for i in 1..=m {
            let left = col[i];
            let cost = usize::from(pattern[i - 1] != tc);
            col[i] = (diag + cost).min(left + 1).min(col[i - 1] + 1);
            diag = left;
        }
        best = best.min(col[m]);
        if best == 0 {
            break;
        }
    }

    best
}

fn normalize(text: &str) -> Vec<char> {
    text.trim().to_lowercase().chars().collect()
}

/// Case-insensitive typo-tolerant matcher.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    threshold: f64,
    min_match_len: usize,
    max_query_len: usize,
}

impl FuzzyMatcher {
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            threshold: config.threshold,
            min_match_len: config.min_match_len.max(1),
            max_query_len: config.max_query_len.max(1),
        }
    }

    fn field_distance(&self, query: &[char], text: &str) -> Option<f64> {
        let text = normalize(text);
        if text.is_empty() {
            return None;
        }

        let edits = substring_edit_distance(query, &text);
        if query.len().saturating_sub(edits) < self.min_match_len {
            return None;
        }

        let distance = edits as f64 / query.len() as f64;
        (distance <= self.threshold).then_some(distance)
    }
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(&MatchConfig::default())
    }
}

impl Matcher for FuzzyMatcher {
    fn score(&self, query: &str, fields: &[WeightedField<'_>]) -> Option<f64> {
        let mut query = normalize(query);
        query.truncate(self.max_query_len);
        if query.len() < self.min_match_len {
            return None;
        }

        let mut combined = 1.0;
        let mut matched = false;
        for field in fields.iter().filter(|f| f.weight > 0.0) {
            if let Some(d) = self.field_distance(&query, field.text) {
                combined *= d.max(MIN_FIELD_DISTANCE).powf(field.weight);
                matched = true;
            }
        }

        matched.then_some(combined)
    }
}
