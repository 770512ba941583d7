//! Lexical similarity between free-text passages (TF-IDF + cosine)

use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Common English stop words dropped before stemming
static STOP_WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();

/// Porter2 stemmer for English text
static STEMMER: OnceLock<Stemmer> = OnceLock::new();

fn get_stop_words() -> &'static HashSet<&'static str> {
    STOP_WORDS.get_or_init(|| {
        [
            "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into",
            "is", "it", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then",
            "there", "these", "they", "this", "to", "was", "will", "with",
        ]
        .iter()
        .copied()
        .collect()
    })
}

fn get_stemmer() -> &'static Stemmer {
    STEMMER.get_or_init(|| Stemmer::create(Algorithm::English))
}

/// Lowercases, splits on non-alphanumeric characters, drops stop words and stems
pub fn tokenize(text: &str) -> Vec<String> {
    let stop_words = get_stop_words();
    let stemmer = get_stemmer();

    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .filter(|s| !stop_words.contains(s))
        .map(|s| stemmer.stem(s).into_owned())
        .collect()
}

fn term_frequencies(tokens: &[String]) -> HashMap<&str, f64> {
    let mut freqs = HashMap::new();
    for token in tokens {
        *freqs.entry(token.as_str()).or_insert(0.0) += 1.0;
    }
    freqs
}

/// Weight of a term given how many of the `total_docs` documents contain it.
///
/// `1 + ln(N / (1 + df))` stays positive for the two-document corpus, so a term
/// shared by both texts still contributes to the dot product.
fn inverse_document_frequency(total_docs: usize, doc_freq: usize) -> f64 {
    1.0 + (total_docs as f64 / (1.0 + doc_freq as f64)).ln()
}

pub fn cosine_similarity(vec_a: &HashMap<&str, f64>, vec_b: &HashMap<&str, f64>) -> f64 {
    let mut dot_product = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (term, weight) in vec_a {
        norm_a += weight * weight;
        if let Some(weight_b) = vec_b.get(term) {
            dot_product += weight * weight_b;
        }
    }

    for weight in vec_b.values() {
        norm_b += weight * weight;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

/// TF-IDF weights for one document of the two-document corpus
fn weigh<'a>(tf: &HashMap<&'a str, f64>, other: &HashMap<&str, f64>) -> HashMap<&'a str, f64> {
    tf.iter()
        .map(|(&term, &count)| {
            let doc_freq = if other.contains_key(term) { 2 } else { 1 };
            (term, count * inverse_document_frequency(2, doc_freq))
        })
        .collect()
}

/// TF-IDF cosine similarity of two texts over the corpus `{text_a, text_b}`.
///
/// Returns 0.0 when either side is blank or has no indexable terms.
pub fn text_similarity(text_a: &str, text_b: &str) -> f64 {
    if text_a.trim().is_empty() || text_b.trim().is_empty() {
        return 0.0;
    }

    let tokens_a = tokenize(text_a);
    let tokens_b = tokenize(text_b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let tf_a = term_frequencies(&tokens_a);
    let tf_b = term_frequencies(&tokens_b);

    let vec_a = weigh(&tf_a, &tf_b);
    let vec_b = weigh(&tf_b, &tf_a);

    cosine_similarity(&vec_a, &vec_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_tokenize_stems_and_filters() {
        let tokens = tokenize("The families are living in Seoul");
        assert_eq!(tokens, tokenize("family lives Seoul"));
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_tokenize_splits_punctuation() {
        let tokens = tokenize("hacker/rebel: Neo's war!");
        assert!(tokens.contains(&"hacker".to_string()));
        assert!(tokens.contains(&"rebel".to_string()));
        assert!(tokens.contains(&"war".to_string()));
    }

    #[test]
    fn test_identical_text_scores_one() {
        let plot = "A computer hacker learns about the true nature of reality.";
        assert!((text_similarity(plot, plot) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_empty_text_scores_zero() {
        assert_eq!(text_similarity("A hacker fights machines", ""), 0.0);
        assert_eq!(text_similarity("", "A hacker fights machines"), 0.0);
        assert_eq!(text_similarity("   ", "\t\n"), 0.0);
    }

    #[test]
    fn test_stop_words_only_scores_zero() {
        assert_eq!(text_similarity("the and of", "the and of"), 0.0);
    }

    #[test]
    fn test_symmetry() {
        let a = "A young girl and her family move to the countryside.";
        let b = "A family moves to a haunted house in the countryside.";
        let forward = text_similarity(a, b);
        let backward = text_similarity(b, a);
        assert!((forward - backward).abs() < EPSILON);
    }

    #[test]
    fn test_partial_overlap_is_between_bounds() {
        let a = "A young girl and her family move to the countryside.";
        let b = "A family moves to a haunted house in the countryside.";
        let score = text_similarity(a, b);
        assert!(score > 0.0 && score < 1.0, "score was {}", score);
    }

    #[test]
    fn test_stemming_matches_inflections() {
        let score = text_similarity("detectives investigating murders", "detective investigates murder");
        assert!((score - 1.0).abs() < EPSILON, "score was {}", score);
    }

    #[test]
    fn test_disjoint_texts_score_zero() {
        assert_eq!(text_similarity("space pirates", "baking competition"), 0.0);
    }

    #[test]
    fn test_weigh_keeps_borrowed_terms_and_discounts_shared() {
        let tokens_a = tokenize("heist crew vault");
        let tokens_b = tokenize("heist romance");
        let tf_a = term_frequencies(&tokens_a);
        let tf_b = term_frequencies(&tokens_b);

        let weights = weigh(&tf_a, &tf_b);
        assert_eq!(weights.len(), tf_a.len());
        let shared = weights[tokens_a[0].as_str()];
        let unique = weights[tokens_a[1].as_str()];
        assert!(shared > 0.0);
        assert!(shared < unique);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let a: HashMap<&str, f64> = HashMap::new();
        let mut b = HashMap::new();
        b.insert("term", 1.0);
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
