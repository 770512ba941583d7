use std::fmt::Write;

use crate::models::{AiRecommendation, ContentRecord};

pub const RECOMMENDATION_SYSTEM_PROMPT: &str = "You are a film and television expert. \
Reply with JSON only, shaped as {\"recommendations\": [{\"title\": string, \"year\": string, \
\"imdb_id\": string | null, \"reason\": string}]}.";

pub const MATCH_SYSTEM_PROMPT: &str = "You match a recommended title to one entry of a search \
result list. Reply with JSON only, shaped as {\"matched_id\": string | null, \"confidence\": \
number between 0 and 1, \"reason\": string}. Use null when no entry is the same work.";

fn describe(record: &ContentRecord) -> String {
    let mut out = format!("\"{}\"", record.title);
    if let Some(year) = &record.year {
        let _ = write!(out, " ({})", year);
    }
    let _ = write!(out, ", {}", record.kind);
    if !record.genres.is_empty() {
        let _ = write!(out, "; genres: {}", record.genres.join(", "));
    }
    if !record.directors.is_empty() {
        let _ = write!(out, "; directed by {}", record.directors.join(", "));
    }
    if !record.cast.is_empty() {
        let _ = write!(out, "; starring {}", record.cast.join(", "));
    }
    out
}

pub fn build_recommendation_prompt(source: &ContentRecord, count: usize) -> String {
    let mut prompt = format!(
        "Recommend {} titles for someone who enjoyed {}.",
        count,
        describe(source)
    );
    if !source.plot.trim().is_empty() {
        let _ = write!(prompt, "\nPlot: {}", source.plot.trim());
    }
    prompt.push_str(&format!(
        "\nDo not include {} itself. Include the IMDb id when you are sure of it.",
        source.title
    ));
    prompt
}

pub fn build_match_prompt(original: &AiRecommendation, candidates: &[ContentRecord]) -> String {
    let mut prompt = format!("Recommended title: \"{}\"", original.title);
    if let Some(year) = &original.year {
        let _ = write!(prompt, " ({})", year);
    }
    if let Some(reason) = &original.reason {
        let _ = write!(prompt, "\nWhy it was recommended: {}", reason);
    }

    prompt.push_str("\n\nSearch results:");
    for candidate in candidates {
        let _ = write!(prompt, "\n- id {}: {}", candidate.id, describe(candidate));
    }
    prompt
}
