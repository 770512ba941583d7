//! Title normalization and comparison

/// Lowercases, strips everything except letters, digits and whitespace, and
/// collapses runs of whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity of two titles in [0, 1].
///
/// Exact match after normalization scores 1.0, containment scores
/// `0.7 + 0.3 * shorter/longer`, anything else falls back to the Levenshtein
/// ratio. A title that normalizes to nothing never matches.
pub fn title_similarity(title_a: &str, title_b: &str) -> f64 {
    let a = normalize_title(title_a);
    let b = normalize_title(title_b);

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    if a == b {
        return 1.0;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();
    let longest = len_a.max(len_b) as f64;

    if a.contains(&b) || b.contains(&a) {
        let shortest = len_a.min(len_b) as f64;
        return 0.7 + 0.3 * (shortest / longest);
    }

    let distance = strsim::levenshtein(&a, &b) as f64;
    (1.0 - distance / longest).max(0.0)
}
