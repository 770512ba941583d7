//! Best-effort extraction of recommendations from free-text model replies.
//!
//! Only used when a reply is not the JSON we asked for. Handles numbered lists
//! such as:
//!
//! ```text
//! 1. **Mother** (2009) - Another slow-burn Bong Joon Ho thriller. tt1216496
//! 2) Memories of Murder (2003): detectives chase a serial killer
//! 3. Burning
//! ```

use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

use crate::models::AiRecommendation;

static NUMBERED_LINE: OnceLock<Option<Regex>> = OnceLock::new();
static YEAR_PAREN: OnceLock<Option<Regex>> = OnceLock::new();
static IMDB_ID: OnceLock<Option<Regex>> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(error = %e, pattern, "Failed to compile fallback parser regex");
            None
        }
    })
    .as_ref()
}

fn clean_title(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '*' || c == '"' || c == '_' || c.is_whitespace())
        .to_string()
}

fn clean_reason(raw: &str) -> Option<String> {
    let reason = raw
        .trim()
        .trim_start_matches(|c: char| matches!(c, '-' | '–' | '—' | ':') || c.is_whitespace())
        .trim();
    (!reason.is_empty()).then(|| reason.to_string())
}

/// Parses one entry per numbered line; lines that are not numbered are ignored
pub fn parse_numbered_list(text: &str) -> Vec<AiRecommendation> {
    let (Some(numbered), Some(year_paren), Some(imdb)) = (
        compiled(&NUMBERED_LINE, r"^\s*\d+[.)]\s+(.+)$"),
        compiled(&YEAR_PAREN, r"\((\d{4})[^)]*\)"),
        compiled(&IMDB_ID, r"\btt\d{7,9}\b"),
    ) else {
        return Vec::new();
    };

    let mut recommendations = Vec::new();

    for line in text.lines() {
        let Some(caps) = numbered.captures(line) else {
            continue;
        };
        let body = caps[1].trim();

        let imdb_id = imdb.find(body).map(|m| m.as_str().to_string());
        let without_id = imdb.replace_all(body, "");

        let (title, year, rest) = match year_paren.captures(&without_id) {
            Some(year_caps) => {
                let whole = year_caps.get(0).map(|m| (m.start(), m.end()));
                let (start, end) = whole.unwrap_or((without_id.len(), without_id.len()));
                (
                    clean_title(&without_id[..start]),
                    Some(year_caps[1].to_string()),
                    without_id[end..].to_string(),
                )
            }
            None => {
                let split_at = [" - ", " – ", " — ", ": "]
                    .iter()
                    .filter_map(|sep| without_id.find(sep))
                    .min();
                match split_at {
                    Some(idx) => (
                        clean_title(&without_id[..idx]),
                        None,
                        without_id[idx..].to_string(),
                    ),
                    None => (clean_title(&without_id), None, String::new()),
                }
            }
        };

        if title.is_empty() {
            continue;
        }

        recommendations.push(AiRecommendation {
            title,
            year,
            imdb_id,
            reason: clean_reason(&rest),
        });
    }

    recommendations
}
