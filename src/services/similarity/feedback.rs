//! Score adjustment from explicit user feedback

/// Score assumed for a pair that has no stored edge yet
pub const NEUTRAL_PRIOR: f64 = 0.5;
pub const FEEDBACK_STEP: f64 = 0.1;
/// Negative feedback weakens a relation but never removes it
pub const MIN_FEEDBACK_SCORE: f64 = 0.1;
pub const MAX_FEEDBACK_SCORE: f64 = 1.0;

/// New score for a pair after one piece of feedback, in [0.1, 1.0]
pub fn adjust_score(existing: Option<f64>, is_positive: bool) -> f64 {
    let base = existing.filter(|s| s.is_finite()).unwrap_or(NEUTRAL_PRIOR);
    let delta = if is_positive {
        FEEDBACK_STEP
    } else {
        -FEEDBACK_STEP
    };

    (base + delta).clamp(MIN_FEEDBACK_SCORE, MAX_FEEDBACK_SCORE)
}
