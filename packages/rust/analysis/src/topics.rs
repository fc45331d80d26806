//! Key-phrase ranking.
//!
//! Candidates are 1–3 word runs of content words inside a sentence. A
//! candidate scores its frequency, boosted for length and for appearing near
//! the start or end of the page. Shorter candidates already covered by a
//! higher-ranked phrase are dropped.

use std::collections::HashMap;

use sitekb_shared::text::{split_paragraphs, split_sentences};

use crate::tokens::tokenize;
use crate::vocab::is_stop_word;

/// Longest candidate phrase, in words.
pub const MAX_TERM_WORDS: usize = 3;

/// Score multiplier per extra word beyond the first.
const LENGTH_BONUS: f64 = 0.5;

/// Multiplier for candidates seen in the leading or trailing sentences.
const POSITION_BONUS: f64 = 1.5;

/// Sentences at each end of the page that count for the position bonus.
const EDGE_SENTENCES: usize = 2;

/// Shortest content word, in characters.
const MIN_WORD_CHARS: usize = 3;

#[derive(Debug)]
struct Candidate {
    display: String,
    words: usize,
    count: usize,
    first_seen: usize,
    on_edge: bool,
}

impl Candidate {
    fn score(&self) -> f64 {
        let length = 1.0 + LENGTH_BONUS * (self.words - 1) as f64;
        let position = if self.on_edge { POSITION_BONUS } else { 1.0 };
        self.count as f64 * length * position
    }
}

fn is_content_word(word: &str, lower: &str) -> bool {
    word.chars().count() >= MIN_WORD_CHARS
        && word.chars().any(char::is_alphabetic)
        && word
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '\'')
        && !is_stop_word(lower)
}

/// The `top_n` highest-ranked topics of `text`, in rank order.
pub fn extract_topics(text: &str, top_n: usize) -> Vec<String> {
    let sentences: Vec<&str> = split_paragraphs(text)
        .into_iter()
        .flat_map(split_sentences)
        .collect();
    let total = sentences.len();

    let mut candidates: HashMap<String, Candidate> = HashMap::new();
    let mut order = 0;

    for (index, sentence) in sentences.iter().enumerate() {
        let on_edge = index < EDGE_SENTENCES || index + EDGE_SENTENCES >= total;

        // Runs of consecutive content words with no punctuation between them.
        let mut runs: Vec<Vec<(&str, String)>> = vec![Vec::new()];
        for token in tokenize(sentence) {
            let boundary = token.break_after;
            if is_content_word(token.word, &token.lower) {
                if let Some(run) = runs.last_mut() {
                    run.push((token.word, token.lower));
                }
                if boundary {
                    runs.push(Vec::new());
                }
            } else if runs.last().is_some_and(|r| !r.is_empty()) {
                runs.push(Vec::new());
            }
        }

        for run in runs.iter().filter(|r| !r.is_empty()) {
            for start in 0..run.len() {
                for n in 1..=MAX_TERM_WORDS.min(run.len() - start) {
                    let slice = &run[start..start + n];
                    let key = slice
                        .iter()
                        .map(|(_, lower)| lower.as_str())
                        .collect::<Vec<_>>()
                        .join(" ");
                    let entry = candidates.entry(key).or_insert_with(|| {
                        order += 1;
                        Candidate {
                            display: slice.iter().map(|(w, _)| *w).collect::<Vec<_>>().join(" "),
                            words: n,
                            count: 0,
                            first_seen: order,
                            on_edge: false,
                        }
                    });
                    entry.count += 1;
                    entry.on_edge |= on_edge;
                }
            }
        }
    }

    let mut ranked: Vec<(String, Candidate)> = candidates.into_iter().collect();
    ranked.sort_by(|(_, a), (_, b)| {
        b.score()
            .total_cmp(&a.score())
            .then(a.first_seen.cmp(&b.first_seen))
    });

    let mut selected: Vec<(String, String)> = Vec::new();
    for (key, candidate) in ranked {
        if selected.len() >= top_n {
            break;
        }
        if selected.iter().any(|(chosen, _)| contains_phrase(chosen, &key)) {
            continue;
        }
        selected.push((key, candidate.display));
    }

    selected.into_iter().map(|(_, display)| display).collect()
}

/// `true` if `inner` occurs in `outer` as a contiguous run of whole words.
fn contains_phrase(outer: &str, inner: &str) -> bool {
    let outer: Vec<&str> = outer.split(' ').collect();
    let inner: Vec<&str> = inner.split(' ').collect();
    inner.len() <= outer.len() && outer.windows(inner.len()).any(|w| w == inner.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "Data pipelines move records between systems. \
        Teams build data pipelines with care. \
        Monitoring keeps data pipelines healthy.\n\n\
        Storage matters too. Good data pipelines need testing.";

    #[test]
    fn frequent_phrase_ranks_first() {
        let topics = extract_topics(TEXT, 10);
        assert_eq!(topics[0], "Data pipelines");
    }

    #[test]
    fn subsumed_terms_are_dropped() {
        let topics = extract_topics(TEXT, 10);
        let lowered: Vec<String> = topics.iter().map(|t| t.to_lowercase()).collect();
        assert!(!lowered.contains(&"data".to_string()));
        assert!(!lowered.contains(&"pipelines".to_string()));
    }

    #[test]
    fn respects_top_n() {
        assert_eq!(extract_topics(TEXT, 3).len(), 3);
        assert!(extract_topics(TEXT, 0).is_empty());
    }

    #[test]
    fn stop_words_and_short_words_never_appear() {
        let topics = extract_topics("It is what it is. We do it so we can.", 10);
        assert!(topics.is_empty());
    }

    #[test]
    fn same_input_same_output() {
        assert_eq!(extract_topics(TEXT, 10), extract_topics(TEXT, 10));
    }

    #[test]
    fn empty_text_has_no_topics() {
        assert!(extract_topics("", 10).is_empty());
    }

    #[test]
    fn phrase_containment_is_word_based() {
        assert!(contains_phrase("data pipelines", "data"));
        assert!(!contains_phrase("database tools", "data"));
        assert!(!contains_phrase("data", "data pipelines"));
    }
}
