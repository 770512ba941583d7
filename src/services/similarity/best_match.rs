//! Picks the catalog entry that best matches a recommendation

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::{text::text_similarity, title::title_similarity};
use crate::models::{parse_leading_year, AiRecommendation, ContentRecord};

const TITLE_WEIGHT: f64 = 0.6;
const YEAR_WEIGHT: f64 = 0.2;
const PLOT_WEIGHT: f64 = 0.2;

/// Years apart at which year similarity bottoms out
const YEAR_DECAY_WINDOW: f64 = 10.0;

/// What we know about the item we are trying to find
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MatchQuery {
    pub title: String,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub synopsis: Option<String>,
}

impl From<&AiRecommendation> for MatchQuery {
    fn from(rec: &AiRecommendation) -> Self {
        Self {
            title: rec.title.clone(),
            year: rec.year.clone(),
            synopsis: rec.reason.clone(),
        }
    }
}

/// A candidate with its composite score, alive for one selection call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommendationCandidate<'a> {
    pub record: &'a ContentRecord,
    pub score: f64,
}

/// 1 for the same year, decaying linearly to 0 over ten years.
/// 0 when either year is missing or unparseable.
pub fn year_similarity(year_a: Option<&str>, year_b: Option<&str>) -> f64 {
    let (Some(a), Some(b)) = (
        year_a.and_then(parse_leading_year),
        year_b.and_then(parse_leading_year),
    ) else {
        return 0.0;
    };

    if a == b {
        return 1.0;
    }
    1.0 - ((a - b).abs() as f64 / YEAR_DECAY_WINDOW).min(1.0)
}

/// Composite of title (60%), year (20%) and plot (20%) similarity
pub fn composite_score(query: &MatchQuery, candidate: &ContentRecord) -> f64 {
    let title_sim = title_similarity(&query.title, &candidate.title);
    let year_sim = year_similarity(query.year.as_deref(), candidate.year.as_deref());
    let plot_sim = match query.synopsis.as_deref() {
        Some(synopsis) if !candidate.plot.is_empty() => text_similarity(synopsis, &candidate.plot),
        _ => 0.0,
    };

    title_sim * TITLE_WEIGHT + year_sim * YEAR_WEIGHT + plot_sim * PLOT_WEIGHT
}

/// Scores every candidate and orders them best first.
///
/// The sort is stable, so equal scores keep their input order.
pub fn rank_candidates<'a>(
    query: &MatchQuery,
    candidates: &'a [ContentRecord],
) -> Vec<RecommendationCandidate<'a>> {
    let mut ranked: Vec<RecommendationCandidate<'a>> = candidates
        .iter()
        .map(|record| RecommendationCandidate {
            record,
            score: composite_score(query, record),
        })
        .collect();

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    ranked
}

/// Best candidate for the query, or `None` when there are no candidates
pub fn select_best<'a>(
    query: &MatchQuery,
    candidates: &'a [ContentRecord],
) -> Option<RecommendationCandidate<'a>> {
    rank_candidates(query, candidates).into_iter().next()
}
