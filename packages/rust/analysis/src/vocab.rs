//! Vocabulary tables loaded from `data/*.txt`.
//!
//! Format: one entry per line, `#` starts a comment line, blank lines are
//! ignored. In dictionary files a leading `=` marks an entry that only
//! matches with its exact casing.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

pub(crate) static TECHNOLOGIES: LazyLock<Vocabulary> =
    LazyLock::new(|| Vocabulary::parse(include_str!("../data/technologies.txt")));

pub(crate) static LOCATIONS: LazyLock<Vocabulary> =
    LazyLock::new(|| Vocabulary::parse(include_str!("../data/locations.txt")));

pub(crate) static LEGAL_SUFFIXES: LazyLock<Vec<&'static str>> =
    LazyLock::new(|| entries(include_str!("../data/legal_suffixes.txt")).collect());

pub(crate) static PRODUCT_TIERS: LazyLock<Vec<&'static str>> =
    LazyLock::new(|| entries(include_str!("../data/product_tiers.txt")).collect());

pub(crate) static SERVICE_KEYWORDS: LazyLock<HashSet<String>> =
    LazyLock::new(|| lowercase_set(include_str!("../data/service_keywords.txt")));

pub(crate) static LOCATION_PREPOSITIONS: LazyLock<HashSet<String>> =
    LazyLock::new(|| lowercase_set(include_str!("../data/location_prepositions.txt")));

pub(crate) static STOP_WORDS: LazyLock<HashSet<String>> =
    LazyLock::new(|| lowercase_set(include_str!("../data/stop_words.txt")));

/// Non-comment, non-blank, trimmed lines.
fn entries(src: &'static str) -> impl Iterator<Item = &'static str> {
    src.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
}

fn lowercase_set(src: &'static str) -> HashSet<String> {
    entries(src).map(str::to_lowercase).collect()
}

pub(crate) fn is_stop_word(lower: &str) -> bool {
    STOP_WORDS.contains(lower)
}

pub(crate) fn is_legal_suffix(word: &str) -> bool {
    LEGAL_SUFFIXES.iter().any(|s| *s == word)
}

/// Phrase dictionary mapping surface forms to a canonical spelling.
pub(crate) struct Vocabulary {
    folded: HashMap<String, &'static str>,
    exact: HashMap<&'static str, &'static str>,
    max_words: usize,
}

impl Vocabulary {
    fn parse(src: &'static str) -> Self {
        let mut folded = HashMap::new();
        let mut exact = HashMap::new();
        let mut max_words = 1;

        for entry in entries(src) {
            let (term, case_sensitive) = match entry.strip_prefix('=') {
                Some(t) => (t.trim(), true),
                None => (entry, false),
            };
            max_words = max_words.max(term.split_whitespace().count());
            if case_sensitive {
                exact.insert(term, term);
            } else {
                folded.insert(term.to_lowercase(), term);
            }
        }

        Self {
            folded,
            exact,
            max_words,
        }
    }

    /// Canonical spelling of `phrase`, if it is in the dictionary.
    pub(crate) fn lookup(&self, phrase: &str) -> Option<&'static str> {
        self.exact
            .get(phrase)
            .or_else(|| self.folded.get(&phrase.to_lowercase()))
            .copied()
    }

    /// Longest entry, in words.
    pub(crate) fn max_words(&self) -> usize {
        self.max_words
    }
}
