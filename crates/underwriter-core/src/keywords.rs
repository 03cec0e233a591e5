use aho_corasick::AhoCorasick;
use anyhow::{Context, Result};

/// Case-insensitive substring matcher over a fixed list of terms.
///
/// Matching is overlapping, so `"unclean"` hits both `unclean` and `clean`. Each term is
/// reported at most once per text regardless of how often it occurs.
#[derive(Debug, Clone)]
pub struct KeywordSet {
    automaton: AhoCorasick,
    terms: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms: Vec<String> = terms
            .into_iter()
            .map(|term| term.as_ref().to_lowercase())
            .collect();
        let automaton =
            AhoCorasick::new(&terms).context("failed to build keyword automaton from lexicon")?;
        Ok(Self { automaton, terms })
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Terms present in `text`, in lexicon order.
    pub fn matches(&self, text: &str) -> Vec<&str> {
        self.hit_mask(text)
            .into_iter()
            .zip(&self.terms)
            .filter_map(|(hit, term)| hit.then_some(term.as_str()))
            .collect()
    }

    /// Number of distinct lexicon entries present in `text`.
    pub fn count_matches(&self, text: &str) -> usize {
        self.hit_mask(text).into_iter().filter(|hit| *hit).count()
    }

    pub fn matches_any(&self, text: &str) -> bool {
        self.hit_mask(text).into_iter().any(|hit| hit)
    }

    fn hit_mask(&self, text: &str) -> Vec<bool> {
        let mut mask = vec![false; self.terms.len()];
        if self.terms.is_empty() || text.is_empty() {
            return mask;
        }
        let lowered = text.to_lowercase();
        for mat in self.automaton.find_overlapping_iter(&lowered) {
            if let Some(slot) = mask.get_mut(mat.pattern().as_usize()) {
                *slot = true;
            }
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_are_case_insensitive_and_ordered_by_lexicon() {
        let set = KeywordSet::new(["clean", "friendly", "Fresh"]).unwrap();
        assert_eq!(
            set.matches("FRESH bread, Friendly staff, clean tables"),
            vec!["clean", "friendly", "fresh"]
        );
    }

    #[test]
    fn overlapping_terms_are_all_reported() {
        let set = KeywordSet::new(["clean", "unclean", "health code", "code"]).unwrap();
        assert_eq!(
            set.matches("Unclean floors and a health code notice"),
            vec!["clean", "unclean", "health code", "code"]
        );
        assert_eq!(set.count_matches("unclean"), 2);
    }

    #[test]
    fn repeated_occurrences_count_once() {
        let set = KeywordSet::new(["slow"]).unwrap();
        assert_eq!(set.count_matches("slow, slow, slow service"), 1);
    }

    #[test]
    fn substring_matches_inside_words() {
        let set = KeywordSet::new(["club", "bar"]).unwrap();
        assert!(set.matches_any("nightclub"));
        assert_eq!(set.matches("sushi bars"), vec!["bar"]);
    }

    #[test]
    fn empty_inputs_match_nothing() {
        let empty = KeywordSet::new(Vec::<String>::new()).unwrap();
        assert!(!empty.matches_any("anything"));
        let set = KeywordSet::new(["café"]).unwrap();
        assert!(!set.matches_any(""));
        assert!(set.matches_any("Little CAFÉ"));
    }
}
