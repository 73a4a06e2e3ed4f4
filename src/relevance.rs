//! Tag-relevance scoring and ranking.
//!
//! # Scoring
//!
//! For a search over terms `T` and a candidate with tags `A`:
//!
//! ```text
//! match_count     = |{ t ∈ T : t ∈ A }|   (each term counted once)
//! relevance_score = match_count / |T| × 100
//! ```
//!
//! Results are sorted by score descending. The sort is stable, so candidates
//! with equal scores keep the order the document store returned them in.
//! Zero-score candidates are kept.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::models::PostDocument;

/// Anything carrying a set of detected tags.
pub trait Tagged {
    /// Whether `tag` is among the item's tags (exact, case-sensitive).
    fn has_tag(&self, tag: &str) -> bool;
}

impl Tagged for PostDocument {
    fn has_tag(&self, tag: &str) -> bool {
        self.ai_tags().any(|t| t == tag)
    }
}

/// A candidate plus its computed relevance. The score is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scored<T> {
    #[serde(flatten)]
    pub item: T,
    /// Percentage of search terms present in the item's tags, `0.0..=100.0`.
    pub relevance_score: f64,
}

/// A stored post ranked against a search.
pub type ScoredPost = Scored<PostDocument>;

/// Percentage of `search_terms` carried by `item`.
///
/// Callers guarantee `search_terms` is non-empty.
pub fn relevance_score<S: AsRef<str>, T: Tagged + ?Sized>(search_terms: &[S], item: &T) -> f64 {
    let matches = search_terms
        .iter()
        .filter(|term| item.has_tag((*term).as_ref()))
        .count();
    matches as f64 / search_terms.len() as f64 * 100.0
}

/// Score every candidate against `search_terms` and return copies sorted by
/// relevance, highest first.
///
/// # Errors
///
/// Returns an error if `search_terms` is empty.
pub fn score_and_rank<S, T>(search_terms: &[S], candidates: &[T]) -> Result<Vec<Scored<T>>>
where
    S: AsRef<str>,
    T: Tagged + Clone,
{
    if search_terms.is_empty() {
        bail!("search terms must not be empty");
    }

    let mut scored: Vec<Scored<T>> = candidates
        .iter()
        .map(|candidate| Scored {
            relevance_score: relevance_score(search_terms, candidate),
            item: candidate.clone(),
        })
        .collect();

    // `sort_by` is stable: equal scores keep upstream order.
    scored.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));

    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Candidate {
        id: &'static str,
        tags: Vec<String>,
    }

    impl Tagged for Candidate {
        fn has_tag(&self, tag: &str) -> bool {
            self.tags.iter().any(|t| t == tag)
        }
    }

    fn candidate(id: &'static str, tags: &[&str]) -> Candidate {
        Candidate {
            id,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_dog_cat_scenario() {
        let candidates = vec![
            candidate("a", &["Dog"]),
            candidate("b", &["Dog", "Cat"]),
            candidate("c", &[]),
        ];
        let ranked = score_and_rank(&["Dog", "Cat"], &candidates).unwrap();

        let ids: Vec<&str> = ranked.iter().map(|s| s.item.id).collect();
        let scores: Vec<f64> = ranked.iter().map(|s| s.relevance_score).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(scores, vec![100.0, 50.0, 0.0]);
    }

    #[test]
    fn test_empty_terms_rejected() {
        let candidates = vec![candidate("a", &["Dog"])];
        let empty: [&str; 0] = [];
        let err = score_and_rank(&empty, &candidates).unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn test_duplicate_tags_count_once() {
        let candidates = vec![candidate("a", &["Dog", "Dog", "Dog"])];
        let ranked = score_and_rank(&["Dog", "Cat"], &candidates).unwrap();
        assert_eq!(ranked[0].relevance_score, 50.0);
    }

    #[test]
    fn test_stable_for_ties() {
        let candidates = vec![
            candidate("first", &["Cat"]),
            candidate("second", &["Dog"]),
            candidate("top", &["Cat", "Dog"]),
            candidate("third", &["Dog", "Pet"]),
        ];
        let ranked = score_and_rank(&["Cat", "Dog"], &candidates).unwrap();
        let ids: Vec<&str> = ranked.iter().map(|s| s.item.id).collect();
        assert_eq!(ids, vec!["top", "first", "second", "third"]);
    }

    #[test]
    fn test_length_range_and_order() {
        let candidates = vec![
            candidate("a", &["Puppy"]),
            candidate("b", &[]),
            candidate("c", &["Dog", "Puppy", "Mammal"]),
            candidate("d", &["Mammal"]),
            candidate("e", &["Dog"]),
        ];
        let terms = ["Dog", "Puppy", "Mammal"];
        let ranked = score_and_rank(&terms, &candidates).unwrap();

        assert_eq!(ranked.len(), candidates.len());
        for s in &ranked {
            assert!((0.0..=100.0).contains(&s.relevance_score));
        }
        for pair in ranked.windows(2) {
            assert!(pair[0].relevance_score >= pair[1].relevance_score);
        }
    }

    #[test]
    fn test_input_untouched_and_idempotent() {
        let candidates = vec![candidate("a", &["Cat"]), candidate("b", &["Dog", "Cat"])];
        let before = candidates.clone();
        let first = score_and_rank(&["Cat", "Dog"], &candidates).unwrap();
        let second = score_and_rank(&["Cat", "Dog"], &candidates).unwrap();
        assert_eq!(candidates, before);
        assert_eq!(first, second);
    }

    #[test]
    fn test_exact_match_only() {
        let dog = candidate("a", &["Dog"]);
        assert_eq!(relevance_score(&["dog"], &dog), 0.0);
        assert_eq!(relevance_score(&["Dog"], &dog), 100.0);
    }

    #[test]
    fn test_scored_post_is_stored_document_plus_score() {
        let stored = serde_json::json!({
            "$id": "p1",
            "ai_tags": ["Cat"],
            "creator": { "$id": "u1", "name": "Ana" },
            "likes": 3,
        });
        let doc = PostDocument::try_from(stored.clone()).unwrap();
        let ranked = score_and_rank(&["Cat", "Dog"], &[doc]).unwrap();

        let mut expected = stored;
        expected["relevance_score"] = serde_json::json!(50.0);
        assert_eq!(serde_json::to_value(&ranked[0]).unwrap(), expected);
    }
}
