//! Animal label filtering.
//!
//! The labeling service returns every label it sees in a photo ("Grass",
//! "Couch", "Dog", ...). Only animal-related labels are kept as a post's
//! `ai_tags`. A label is kept when its own name is on the allow-list, or
//! when any of its parent categories is (so a "Beagle" whose parent is
//! "Dog" survives even though "Beagle" itself is not listed).

use std::collections::HashSet;
use std::sync::LazyLock;

use crate::models::RawLabel;

/// Label names considered relevant to pet listings. Matching is exact and
/// case-sensitive, as returned by the labeling service.
pub const ANIMAL_RELATED_TAGS: &[&str] = &[
    "Animal",
    "Pet",
    "Dog",
    "Puppy",
    "Cat",
    "Kitten",
    "Mammal",
    "Canine",
    "Feline",
    "Golden Retriever",
    "Labrador Retriever",
    "German Shepherd",
    "Poodle",
    "Bulldog",
    "Siamese Cat",
    "Persian Cat",
    "Maine Coon",
    "Tabby Cat",
];

static ANIMAL_TAG_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ANIMAL_RELATED_TAGS.iter().copied().collect());

/// The production allow-list as a set.
pub fn animal_tags() -> &'static HashSet<&'static str> {
    &ANIMAL_TAG_SET
}

/// Keep the names of labels that are on `allow_list` or have a parent on it.
///
/// Source order is preserved and duplicates are not removed.
pub fn filter_relevant_labels(raw_labels: &[RawLabel], allow_list: &HashSet<&str>) -> Vec<String> {
    raw_labels
        .iter()
        .filter(|label| {
            allow_list.contains(label.name.as_str())
                || label
                    .parents
                    .iter()
                    .any(|parent| allow_list.contains(parent.name.as_str()))
        })
        .map(|label| label.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow(names: &[&'static str]) -> HashSet<&'static str> {
        names.iter().copied().collect()
    }

    #[test]
    fn test_keeps_own_name_match_only() {
        let labels = vec![
            RawLabel::new("Dog", 99.0, &[]),
            RawLabel::new("Rock", 80.0, &["Mineral"]),
        ];
        let kept = filter_relevant_labels(&labels, &allow(&["Dog", "Animal"]));
        assert_eq!(kept, vec!["Dog".to_string()]);
    }

    #[test]
    fn test_keeps_parent_match() {
        let labels = vec![
            RawLabel::new("Beagle", 91.0, &["Dog", "Pet", "Animal"]),
            RawLabel::new("Grass", 88.0, &["Plant"]),
        ];
        let kept = filter_relevant_labels(&labels, animal_tags());
        assert_eq!(kept, vec!["Beagle".to_string()]);
    }

    #[test]
    fn test_empty_input() {
        assert!(filter_relevant_labels(&[], animal_tags()).is_empty());
    }

    #[test]
    fn test_order_and_duplicates_preserved() {
        let labels = vec![
            RawLabel::new("Cat", 97.0, &[]),
            RawLabel::new("Sofa", 90.0, &["Furniture"]),
            RawLabel::new("Dog", 85.0, &[]),
            RawLabel::new("Cat", 80.0, &[]),
        ];
        let kept = filter_relevant_labels(&labels, animal_tags());
        assert_eq!(kept, vec!["Cat", "Dog", "Cat"]);
    }

    #[test]
    fn test_case_sensitive() {
        let labels = vec![RawLabel::new("dog", 95.0, &["animal"])];
        assert!(filter_relevant_labels(&labels, animal_tags()).is_empty());
    }

    #[test]
    fn test_output_is_subset_of_input_and_allowed() {
        let labels = vec![
            RawLabel::new("Kitten", 99.0, &["Cat", "Animal"]),
            RawLabel::new("Siamese", 90.0, &["Cat"]),
            RawLabel::new("Box", 80.0, &["Cardboard"]),
            RawLabel::new("Pet", 78.0, &[]),
        ];
        let allow_list = animal_tags();
        let kept = filter_relevant_labels(&labels, allow_list);
        for name in &kept {
            let source = labels.iter().find(|l| &l.name == name).unwrap();
            assert!(
                allow_list.contains(name.as_str())
                    || source
                        .parents
                        .iter()
                        .any(|p| allow_list.contains(p.name.as_str())),
                "{} is neither allowed nor has an allowed parent",
                name
            );
        }
        assert_eq!(kept, vec!["Kitten", "Siamese", "Pet"]);
    }

    #[test]
    fn test_idempotent() {
        let labels = vec![
            RawLabel::new("Puppy", 93.0, &["Dog"]),
            RawLabel::new("Leash", 77.0, &[]),
        ];
        let first = filter_relevant_labels(&labels, animal_tags());
        let second = filter_relevant_labels(&labels, animal_tags());
        assert_eq!(first, second);
    }

    #[test]
    fn test_allow_list_contents() {
        let tags = animal_tags();
        assert_eq!(tags.len(), ANIMAL_RELATED_TAGS.len());
        assert!(tags.contains("Maine Coon"));
        assert!(!tags.contains("Bird"));
    }
}
