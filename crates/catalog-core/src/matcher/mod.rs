//! Weighted approximate matching over a snapshot of the mirror.
//!
//! A [`Matcher`] turns a query and a record's weighted fields into a distance
//! (`0.0` = perfect, `None` = no match). [`Ranker`] applies a matcher to every
//! record of a snapshot and orders the survivors:
//!
//! 1. ascending distance
//! 2. descending `popularity_count`
//! 3. ascending id
//!
//! Every query scans the whole snapshot. That is linear in catalog size and
//! fine for the 10^5 to 10^6 records a client mirror holds.

mod fuzzy;

use crate::error::{CatalogError, Result};
use crate::models::CatalogRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

pub use fuzzy::{substring_edit_distance, FuzzyMatcher};

/// A field's text with its normalized weight (weights of all configured
/// fields sum to 1).
#[derive(Debug, Clone, Copy)]
pub struct WeightedField<'a> {
    pub text: &'a str,
    pub weight: f64,
}

/// Distance function between a query and a set of weighted fields.
pub trait Matcher: Send + Sync {
    /// Distance in `[0, 1]`, or `None` if no field matches.
    fn score(&self, query: &str, fields: &[WeightedField<'_>]) -> Option<f64>;
}

/// Relative importance of each searchable field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct FieldWeights {
    pub primary_name: f64,
    pub secondary_name: f64,
    pub descriptive_text: f64,
    pub grouping_name: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            primary_name: 0.5,
            secondary_name: 0.2,
            descriptive_text: 0.2,
            grouping_name: 0.1,
        }
    }
}

impl FieldWeights {
    fn total(&self) -> f64 {
        self.primary_name + self.secondary_name + self.descriptive_text + self.grouping_name
    }

    /// The record's present, non-empty fields with normalized weights.
    pub fn fields<'a>(&self, record: &'a CatalogRecord) -> Vec<WeightedField<'a>> {
        let total = self.total();
        if total <= 0.0 {
            return Vec::new();
        }

        [
            (Some(record.primary_name.as_str()), self.primary_name),
            (record.secondary_name.as_deref(), self.secondary_name),
            (record.descriptive_text.as_deref(), self.descriptive_text),
            (record.grouping_name.as_deref(), self.grouping_name),
        ]
        .into_iter()
        .filter_map(|(text, weight)| match text {
            Some(text) if weight > 0.0 && !text.trim().is_empty() => Some(WeightedField {
                text,
                weight: weight / total,
            }),
            _ => None,
        })
        .collect()
    }
}

/// Search ranking settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct MatchConfig {
    pub weights: FieldWeights,
    /// Per-field distance above which a field does not match (0 = exact only, 1 = anything).
    pub threshold: f64,
    /// Queries and matched spans shorter than this never match.
    pub min_match_len: usize,
    /// Longer queries are truncated to this many characters.
    pub max_query_len: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            weights: FieldWeights::default(),
            threshold: 0.4,
            min_match_len: 2,
            max_query_len: 64,
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(CatalogError::Config {
                message: format!("matching.threshold must be within [0, 1], got {}", self.threshold),
            });
        }
        let w = &self.weights;
        let all = [w.primary_name, w.secondary_name, w.descriptive_text, w.grouping_name];
        if all.iter().any(|v| !v.is_finite() || *v < 0.0) || w.total() <= 0.0 {
            return Err(CatalogError::Config {
                message: "matching.weights must be non-negative with a positive sum".to_string(),
            });
        }
        if self.min_match_len == 0 || self.max_query_len < self.min_match_len {
            return Err(CatalogError::Config {
                message: "matching.min_match_len must be >= 1 and <= max_query_len".to_string(),
            });
        }
        Ok(())
    }
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: CatalogRecord,
    pub distance: f64,
}

fn compare_hits(a: &ScoredRecord, b: &ScoredRecord) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| b.record.popularity_count.cmp(&a.record.popularity_count))
        .then_with(|| a.record.id.cmp(&b.record.id))
}

/// Applies a [`Matcher`] to snapshots.
#[derive(Clone)]
pub struct Ranker {
    matcher: Arc<dyn Matcher>,
    weights: FieldWeights,
}

impl Ranker {
    pub fn new(matcher: Arc<dyn Matcher>, weights: FieldWeights) -> Self {
        Self { matcher, weights }
    }

    /// Default fuzzy matcher configured from `config`.
    pub fn from_config(config: &MatchConfig) -> Self {
        Self::new(Arc::new(FuzzyMatcher::new(config)), config.weights.clone())
    }

    /// Score every record and return the best `limit`, best first.
    pub fn rank(&self, query: &str, snapshot: Vec<CatalogRecord>, limit: usize) -> Vec<ScoredRecord> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut hits: Vec<ScoredRecord> = snapshot
            .into_iter()
            .filter_map(|record| {
                let distance = {
                    let fields = self.weights.fields(&record);
                    self.matcher.score(query, &fields)?
                };
                Some(ScoredRecord { record, distance })
            })
            .collect();

        if hits.len() > limit {
            hits.select_nth_unstable_by(limit - 1, compare_hits);
            hits.truncate(limit);
        }
        hits.sort_by(compare_hits);
        hits
    }
}

impl Default for Ranker {
    fn default() -> Self {
        Self::from_config(&MatchConfig::default())
    }
}
