//! Rule-based entity recognition.
//!
//! Each category has its own matcher; [`extract_entities`] runs all of them
//! and collects the results into an [`EntityCollection`].

use std::sync::LazyLock;

use regex::Regex;
use sitekb_shared::{EntityCategory, EntityCollection, StructuredSignals};

use crate::tokens::{Token, is_capitalized, is_unbroken, join_words, tokenize};
use crate::vocab::{
    LEGAL_SUFFIXES, LOCATION_PREPOSITIONS, LOCATIONS, PRODUCT_TIERS, SERVICE_KEYWORDS,
    TECHNOLOGIES, Vocabulary, is_legal_suffix, is_stop_word,
};

/// Up to four capitalized words followed by a legal-form suffix.
static COMPANY_RE: LazyLock<Regex> = LazyLock::new(|| {
    let suffixes = alternation(&LEGAL_SUFFIXES);
    Regex::new(&format!(
        r"\b((?:[A-Z][\w&'-]* +){{0,3}}[A-Z][\w&'-]*),? +({suffixes})\b"
    ))
    .expect("valid regex")
});

/// Up to three capitalized words followed by a dotted version or a tier keyword.
static PRODUCT_RE: LazyLock<Regex> = LazyLock::new(|| {
    let tiers = alternation(&PRODUCT_TIERS);
    Regex::new(&format!(
        r"\b((?:[A-Z][\w-]* +){{0,2}}[A-Z][\w-]*) +(v?\d+(?:\.\d+)+|(?:{tiers})\b)"
    ))
    .expect("valid regex")
});

/// Maximum number of modifier words kept in front of a service keyword.
const MAX_SERVICE_MODIFIERS: usize = 2;

/// Maximum words in a location found after a preposition.
const MAX_LOCATION_WORDS: usize = 3;

fn alternation(words: &[&str]) -> String {
    words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|")
}

/// Run every category matcher over `text`.
pub fn extract_entities(text: &str, signals: &StructuredSignals) -> EntityCollection {
    let tokens = tokenize(text);
    let mut entities = EntityCollection::new();

    for category in EntityCategory::ALL {
        for value in match_category(category, text, &tokens, signals) {
            entities.insert(category, &value);
        }
    }

    entities
}

fn match_category(
    category: EntityCategory,
    text: &str,
    tokens: &[Token<'_>],
    signals: &StructuredSignals,
) -> Vec<String> {
    match category {
        EntityCategory::Companies => match_companies(text),
        EntityCategory::Technologies => match_technologies(tokens),
        EntityCategory::Locations => match_locations(tokens),
        EntityCategory::Products => match_products(text),
        EntityCategory::Services => match_services(tokens),
        EntityCategory::ContactInfo => signals
            .emails
            .iter()
            .chain(signals.phones.iter())
            .cloned()
            .collect(),
    }
}

/// Drop leading stop words such as "The" or "Our" from a captured name.
fn strip_leading_stop_words(name: &str) -> Option<String> {
    let words: Vec<&str> = name
        .split_whitespace()
        .skip_while(|w| is_stop_word(&w.to_lowercase()))
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn match_companies(text: &str) -> Vec<String> {
    COMPANY_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let name = strip_leading_stop_words(&caps[1])?;
            Some(format!("{name} {}", &caps[2]))
        })
        .collect()
}

/// Longest-first dictionary scan. Phrases never span a boundary and never
/// start with a lowercase letter.
fn scan_vocabulary(tokens: &[Token<'_>], vocab: &Vocabulary) -> Vec<(usize, usize, &'static str)> {
    let mut found = Vec::new();
    let mut i = 0;

    'outer: while i < tokens.len() {
        let starts_lower = tokens[i]
            .word
            .chars()
            .next()
            .is_some_and(char::is_lowercase);
        if !starts_lower {
            let longest = vocab.max_words().min(tokens.len() - i);
            for n in (1..=longest).rev() {
                if !is_unbroken(tokens, i, i + n) {
                    continue;
                }
                if let Some(canonical) = vocab.lookup(&join_words(tokens, i, i + n)) {
                    found.push((i, n, canonical));
                    i += n;
                    continue 'outer;
                }
            }
        }
        i += 1;
    }

    found
}

fn match_technologies(tokens: &[Token<'_>]) -> Vec<String> {
    scan_vocabulary(tokens, &TECHNOLOGIES)
        .into_iter()
        .map(|(_, _, name)| name.to_string())
        .collect()
}

fn match_locations(tokens: &[Token<'_>]) -> Vec<String> {
    let mut found: Vec<String> = scan_vocabulary(tokens, &LOCATIONS)
        .into_iter()
        .filter(|&(start, _, _)| is_capitalized(tokens[start].word))
        .map(|(_, _, name)| name.to_string())
        .collect();

    for (i, token) in tokens.iter().enumerate() {
        if token.break_after || !LOCATION_PREPOSITIONS.contains(&token.lower) {
            continue;
        }

        let start = i + 1;
        let mut end = start;
        while end < tokens.len() && end - start < MAX_LOCATION_WORDS {
            let candidate = &tokens[end];
            if !is_capitalized(candidate.word)
                || !candidate.word.chars().all(|c| c.is_alphabetic() || c == '-')
                || is_stop_word(&candidate.lower)
                || is_legal_suffix(candidate.word)
            {
                break;
            }
            end += 1;
            if candidate.break_after {
                break;
            }
        }
        if end == start {
            continue;
        }

        // "at Contoso Ltd" names a company, not a place.
        let continues_into_suffix = !tokens[end - 1].break_after
            && tokens
                .get(end)
                .is_some_and(|next| is_legal_suffix(next.word));
        let phrase = join_words(tokens, start, end);
        if continues_into_suffix || TECHNOLOGIES.lookup(&phrase).is_some() {
            continue;
        }

        found.push(phrase);
    }

    found
}

fn match_products(text: &str) -> Vec<String> {
    PRODUCT_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let name = strip_leading_stop_words(&caps[1])?;
            let product = format!("{name} {}", &caps[2]);
            if names_technology(&name) || TECHNOLOGIES.lookup(&product).is_some() {
                return None;
            }
            Some(product)
        })
        .collect()
}

/// `true` if the name, or a trailing part of it, is a known technology.
fn names_technology(name: &str) -> bool {
    let words: Vec<&str> = name.split_whitespace().collect();
    (0..words.len()).any(|k| TECHNOLOGIES.lookup(&words[k..].join(" ")).is_some())
}

fn match_services(tokens: &[Token<'_>]) -> Vec<String> {
    let mut found = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        if !SERVICE_KEYWORDS.contains(&token.lower) {
            continue;
        }

        let mut start = i;
        while start > 0 && i - start < MAX_SERVICE_MODIFIERS {
            let prev = &tokens[start - 1];
            if prev.break_after
                || is_stop_word(&prev.lower)
                || !prev.word.chars().all(|c| c.is_alphabetic() || c == '-')
            {
                break;
            }
            start -= 1;
        }

        if start < i {
            found.push(join_words(tokens, start, i + 1));
        }
    }

    found
}
