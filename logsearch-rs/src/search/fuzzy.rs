//! Fuzzy post-filter
//!
//! When a request declares fuzziness, the backend query fetches the full
//! structurally filtered set and this module narrows and re-ranks it
//! in-process. Rows below the match threshold are dropped, so fuzzy search
//! is a filter-and-rank step, not a rank-only step.

use super::types::{FieldMatch, HitDoc, TextSearch};
use crate::error::Result;
use crate::storage::EventRow;

/// Fields considered for approximate matching
pub const SEARCHABLE_FIELDS: [&str; 4] = ["message", "source", "device_id", "category"];

/// Pluggable similarity function over two strings.
///
/// Implementations return a score in `[0, 1]` where 1 is an exact match.
pub trait FuzzyMatcher: Send + Sync {
    fn similarity(&self, query: &str, candidate: &str) -> Result<f64>;
}

/// Case-insensitive Jaro-Winkler similarity
#[derive(Debug, Default)]
pub struct JaroWinklerMatcher;

impl FuzzyMatcher for JaroWinklerMatcher {
    fn similarity(&self, query: &str, candidate: &str) -> Result<f64> {
        Ok(strsim::jaro_winkler(
            &query.to_lowercase(),
            &candidate.to_lowercase(),
        ))
    }
}

/// Minimum similarity a field must reach to count as a match. Higher
/// fuzziness loosens the threshold.
pub fn match_threshold(fuzziness: u32) -> f64 {
    (0.85 - 0.1 * fuzziness as f64).clamp(0.5, 0.95)
}

/// Score rows against the searchable fields, dropping rows where no field
/// reaches the threshold. Survivors are sorted by best score, descending.
pub fn rank(
    matcher: &dyn FuzzyMatcher,
    rows: &[EventRow],
    search: &TextSearch,
) -> Result<Vec<HitDoc>> {
    let threshold = match_threshold(search.fuzziness);
    let mut hits = Vec::new();

    for row in rows {
        let mut matches = Vec::new();
        let mut best = 0.0f64;

        for field in SEARCHABLE_FIELDS {
            let Some(text) = row.get(field).and_then(|v| v.as_str()) else {
                continue;
            };
            let score = best_similarity(matcher, &search.query, text)?;
            if score >= threshold {
                if score > best {
                    best = score;
                }
                matches.push(FieldMatch {
                    field: field.to_string(),
                    score,
                });
            }
        }

        if !matches.is_empty() {
            let mut hit = HitDoc::from_row(row.clone());
            hit.score = Some(best);
            hit.matches = Some(matches);
            hits.push(hit);
        }
    }

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(hits)
}

/// Best of whole-value similarity and per-word similarity, so a short query
/// can still match one word inside a longer message.
fn best_similarity(matcher: &dyn FuzzyMatcher, query: &str, candidate: &str) -> Result<f64> {
    let mut best = matcher.similarity(query, candidate)?;
    for word in candidate.split_whitespace() {
        let score = matcher.similarity(query, word)?;
        if score > best {
            best = score;
        }
    }
    Ok(best)
}
