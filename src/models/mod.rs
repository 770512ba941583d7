use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Kind of content a record describes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Movie,
    Series,
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::Series => write!(f, "series"),
        }
    }
}

impl FromStr for MediaKind {
    type Err = std::convert::Infallible;

    /// Unknown kinds are treated as movies
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "series" | "tv_series" | "tv" => MediaKind::Series,
            _ => MediaKind::Movie,
        })
    }
}

/// A movie or series in the canonical internal shape
///
/// This is the only shape the similarity engine sees. Provider payloads are
/// converted into it at the ingestion boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ContentRecord {
    /// Stable external identifier (e.g. an IMDB id)
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub kind: MediaKind,
    /// Raw release year as supplied by the catalog; may be a range like "2014–2019"
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub directors: Vec<String>,
    #[serde(default)]
    pub cast: Vec<String>,
    #[serde(default)]
    pub plot: String,
}

impl ContentRecord {
    /// Leading release year, if the raw year field holds one
    pub fn release_year(&self) -> Option<i32> {
        self.year.as_deref().and_then(parse_leading_year)
    }

    /// Text sent to the vector index for this record
    pub fn embedding_text(&self) -> String {
        let mut parts = vec![self.title.clone()];
        if !self.genres.is_empty() {
            parts.push(self.genres.join(", "));
        }
        if !self.plot.trim().is_empty() {
            parts.push(self.plot.clone());
        }
        parts.join(". ")
    }
}

/// Extracts the first year from strings like "2014", "2014–2019" or "2014-".
///
/// Returns `None` for anything that does not start with four digits.
pub fn parse_leading_year(raw: &str) -> Option<i32> {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    if digits.len() != 4 {
        return None;
    }
    digits.parse().ok()
}

/// Splits a comma-joined provider field into trimmed names.
///
/// OMDB uses "N/A" for missing values; that yields an empty list.
pub fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("n/a"))
        .map(str::to_string)
        .collect()
}

/// Directed similarity relationship between two records
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarityEdge {
    pub source_id: String,
    pub target_id: String,
    /// Always within [0, 1]
    pub score: f64,
    pub updated_at: DateTime<Utc>,
}

impl SimilarityEdge {
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>, score: f64) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            score: clamp_unit(score),
            updated_at: Utc::now(),
        }
    }
}

fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

// ============================================================================
// Feedback
// ============================================================================

/// A user's reaction to a recommended item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackEvent {
    /// `None` for anonymous users
    pub user_id: Option<String>,
    pub content_id: String,
    /// Item the recommendation was made from, if known
    pub source_content_id: Option<String>,
    pub is_positive: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Progress snapshots
// ============================================================================

/// Progress of a batch import, returned to the caller instead of kept in a global
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImportProgress {
    pub total: usize,
    pub imported: usize,
    pub failed: Vec<String>,
    pub cancelled: bool,
}

impl ImportProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn processed(&self) -> usize {
        self.imported + self.failed.len()
    }
}

/// Outcome of a full pairwise recalculation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecalculationProgress {
    pub items: usize,
    pub pairs_compared: usize,
    pub edges_found: usize,
    pub edges_written: usize,
    pub edges_failed: usize,
    pub cancelled: bool,
}

// ============================================================================
// External service types
// ============================================================================

/// One recommendation returned by the generative model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiRecommendation {
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_loose_year")]
    pub year: Option<String>,
    #[serde(default)]
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Models return years as strings or numbers; accept both
fn deserialize_loose_year<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Result of asking the model to pick the best search result for a recommendation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiMatch {
    #[serde(default)]
    pub matched_id: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Nearest-neighbour hit from the vector index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

// ============================================================================
// OMDB API Types
// ============================================================================

/// Title details from the OMDB `?i=` endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OmdbTitle {
    pub title: String,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(rename = "Type", default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub actors: Option<String>,
    #[serde(default)]
    pub plot: Option<String>,
    #[serde(rename = "imdbID")]
    pub imdb_id: String,
}

impl From<OmdbTitle> for ContentRecord {
    fn from(omdb: OmdbTitle) -> Self {
        let plot = omdb
            .plot
            .filter(|p| !p.eq_ignore_ascii_case("n/a"))
            .unwrap_or_default();

        ContentRecord {
            id: omdb.imdb_id,
            title: omdb.title,
            kind: omdb
                .media_type
                .as_deref()
                .and_then(|t| t.parse().ok())
                .unwrap_or_default(),
            year: omdb.year.filter(|y| !y.eq_ignore_ascii_case("n/a")),
            genres: omdb.genre.as_deref().map(split_names).unwrap_or_default(),
            directors: omdb.director.as_deref().map(split_names).unwrap_or_default(),
            cast: omdb.actors.as_deref().map(split_names).unwrap_or_default(),
            plot,
        }
    }
}

/// Entry in an OMDB `?s=` search response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OmdbSearchItem {
    pub title: String,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(rename = "imdbID")]
    pub imdb_id: String,
    #[serde(rename = "Type", default)]
    pub media_type: Option<String>,
}

impl From<OmdbSearchItem> for ContentRecord {
    fn from(item: OmdbSearchItem) -> Self {
        ContentRecord {
            id: item.imdb_id,
            title: item.title,
            kind: item
                .media_type
                .as_deref()
                .and_then(|t| t.parse().ok())
                .unwrap_or_default(),
            year: item.year,
            ..ContentRecord::default()
        }
    }
}
