//! Weighted multi-factor similarity between two content records

use serde::Serialize;
use std::collections::HashSet;

use super::text::text_similarity;
use crate::models::ContentRecord;

/// Points available across all factors; missing data never shrinks it
pub const MAX_SCORE: f64 = 6.0;

const GENRE_WEIGHT: f64 = 3.0;
const DIRECTOR_POINTS: f64 = 1.0;
const ACTOR_POINTS: f64 = 0.25;
const CAST_CAP: f64 = 0.5;
const YEAR_POINTS: f64 = 0.5;
const YEAR_WINDOW: i32 = 5;
const PLOT_WEIGHT: f64 = 1.0;

/// Points contributed by each factor, before normalization
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub genre: f64,
    pub director: f64,
    pub cast: f64,
    pub year: f64,
    pub plot: f64,
}

impl ScoreBreakdown {
    pub fn points(&self) -> f64 {
        self.genre + self.director + self.cast + self.year + self.plot
    }

    /// Final score in [0, 1]
    pub fn normalized(&self) -> f64 {
        (self.points() / MAX_SCORE).clamp(0.0, 1.0)
    }
}

fn name_set(names: &[String]) -> HashSet<&str> {
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect()
}

/// Jaccard similarity of two genre lists; 0 when either is empty
pub fn genre_overlap(genres_a: &[String], genres_b: &[String]) -> f64 {
    let a = name_set(genres_a);
    let b = name_set(genres_b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

fn shared_names(names_a: &[String], names_b: &[String]) -> usize {
    let a = name_set(names_a);
    let b = name_set(names_b);
    a.intersection(&b).count()
}

/// Computes every factor for a pair of records
pub fn score_breakdown(item_a: &ContentRecord, item_b: &ContentRecord) -> ScoreBreakdown {
    let genre = genre_overlap(&item_a.genres, &item_b.genres) * GENRE_WEIGHT;

    let director = if shared_names(&item_a.directors, &item_b.directors) > 0 {
        DIRECTOR_POINTS
    } else {
        0.0
    };

    let cast = (shared_names(&item_a.cast, &item_b.cast) as f64 * ACTOR_POINTS).min(CAST_CAP);

    let year = match (item_a.release_year(), item_b.release_year()) {
        (Some(a), Some(b)) if (a - b).abs() <= YEAR_WINDOW => YEAR_POINTS,
        _ => 0.0,
    };

    let plot = text_similarity(&item_a.plot, &item_b.plot) * PLOT_WEIGHT;

    ScoreBreakdown {
        genre,
        director,
        cast,
        year,
        plot,
    }
}

/// Attribute similarity of two records in [0, 1]. Symmetric.
pub fn attribute_score(item_a: &ContentRecord, item_b: &ContentRecord) -> f64 {
    score_breakdown(item_a, item_b).normalized()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;

    const EPSILON: f64 = 1e-9;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn record(
        id: &str,
        genres: &[&str],
        directors: &[&str],
        cast: &[&str],
        year: Option<&str>,
        plot: &str,
    ) -> ContentRecord {
        ContentRecord {
            id: id.to_string(),
            title: id.to_string(),
            kind: MediaKind::Series,
            year: year.map(str::to_string),
            genres: strings(genres),
            directors: strings(directors),
            cast: strings(cast),
            plot: plot.to_string(),
        }
    }

    fn full_record() -> ContentRecord {
        record(
            "tt0133093",
            &["Action", "Sci-Fi"],
            &["Lana Wachowski", "Lilly Wachowski"],
            &["Keanu Reeves", "Laurence Fishburne", "Carrie-Anne Moss"],
            Some("1999"),
            "A computer hacker learns about the true nature of his reality.",
        )
    }

    #[test]
    fn test_self_similarity_is_maximal() {
        let a = full_record();
        assert!((attribute_score(&a, &a) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_symmetry() {
        let a = full_record();
        let b = record(
            "tt0234215",
            &["Action", "Sci-Fi", "Thriller"],
            &["Lilly Wachowski"],
            &["Keanu Reeves", "Monica Bellucci"],
            Some("2003"),
            "Neo and the rebel leaders estimate they have 72 hours until the machines reach Zion.",
        );
        assert!((attribute_score(&a, &b) - attribute_score(&b, &a)).abs() < EPSILON);
    }

    #[test]
    fn test_genre_jaccard() {
        let a = strings(&["Drama", "Family"]);
        let b = strings(&["Family", "Drama", "Comedy"]);
        assert!((genre_overlap(&a, &b) - 2.0 / 3.0).abs() < EPSILON);
        assert_eq!(genre_overlap(&a, &[]), 0.0);
    }

    #[test]
    fn test_genre_order_is_irrelevant() {
        let a = strings(&["Drama", "Family"]);
        let b = strings(&["Family", "Drama"]);
        assert_eq!(genre_overlap(&a, &b), 1.0);
    }

    #[test]
    fn test_cast_factor_caps_at_two_actors() {
        let a = record("a", &[], &[], &["A", "B", "C", "D"], None, "");
        let b = record("b", &[], &[], &["A", "B", "C", "D"], None, "");
        assert_eq!(score_breakdown(&a, &b).cast, 0.5);

        let c = record("c", &[], &[], &["A", "X"], None, "");
        assert_eq!(score_breakdown(&a, &c).cast, 0.25);
    }

    #[test]
    fn test_director_factor_is_binary() {
        let a = record("a", &[], &["Bong Joon Ho", "Park Chan-wook"], &[], None, "");
        let b = record("b", &[], &["Park Chan-wook", "Bong Joon Ho"], &[], None, "");
        assert_eq!(score_breakdown(&a, &b).director, 1.0);
    }

    #[test]
    fn test_year_threshold() {
        let a = record("a", &[], &[], &[], Some("2010"), "");
        let within = record("b", &[], &[], &[], Some("2015"), "");
        let outside = record("c", &[], &[], &[], Some("2016"), "");
        let range = record("d", &[], &[], &[], Some("2012–2019"), "");
        assert_eq!(score_breakdown(&a, &within).year, 0.5);
        assert_eq!(score_breakdown(&a, &outside).year, 0.0);
        assert_eq!(score_breakdown(&a, &range).year, 0.5);
    }

    #[test]
    fn test_missing_fields_pull_toward_zero() {
        let a = full_record();
        let sparse = ContentRecord {
            id: "sparse".to_string(),
            title: "Sparse".to_string(),
            genres: a.genres.clone(),
            ..ContentRecord::default()
        };
        // only the genre factor can contribute: 3 / 6
        assert!((attribute_score(&a, &sparse) - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_non_numeric_year_is_skipped() {
        let a = record("a", &[], &[], &[], Some("N/A"), "");
        let b = record("b", &[], &[], &[], Some("N/A"), "");
        assert_eq!(score_breakdown(&a, &b).year, 0.0);
    }

    #[test]
    fn test_related_dramas_score_in_expected_band() {
        let a = record(
            "tt8000001",
            &["Drama", "Family"],
            &["Kim Won-seok"],
            &["Lee Sun-kyun", "IU"],
            Some("2018"),
            "A man in his forties endures the weight of life and befriends a young woman whose life has been hard.",
        );
        let b = record(
            "tt4000001",
            &["Drama", "Family"],
            &["Kim Won-seok"],
            &["Yoo Ah-in", "Kim Hye-soo"],
            Some("2014"),
            "A young man endures the weight of a hard office life as a contract worker.",
        );

        let score = attribute_score(&a, &b);
        assert!((0.4..=0.9).contains(&score), "score was {}", score);
        assert!(score > 0.3);
    }

    #[test]
    fn test_unrelated_items_score_near_zero() {
        let a = record(
            "a",
            &["Horror"],
            &["John Carpenter"],
            &["Kurt Russell"],
            Some("1982"),
            "Researchers in Antarctica are hunted by a shape-shifting alien.",
        );
        let b = record(
            "b",
            &["Romance", "Musical"],
            &["Damien Chazelle"],
            &["Emma Stone"],
            Some("2016"),
            "A jazz pianist falls for an aspiring actress in Los Angeles.",
        );

        let score = attribute_score(&a, &b);
        assert!(score < 0.05, "score was {}", score);
    }
}
