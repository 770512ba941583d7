//! Content similarity scoring
//!
//! Everything in this module is pure and synchronous: no I/O, no shared state.
//! Persistence and external calls live in the orchestration services.

pub mod attributes;
pub mod best_match;
pub mod feedback;
pub mod text;
pub mod title;

pub use attributes::{attribute_score, score_breakdown, ScoreBreakdown};
pub use best_match::{rank_candidates, select_best, MatchQuery, RecommendationCandidate};
pub use feedback::adjust_score;
pub use text::text_similarity;
pub use title::title_similarity;
