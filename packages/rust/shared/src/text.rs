//! Text primitives shared by the extractor, analyzer and chunker.
//!
//! Paragraphs are separated by blank lines. Sentence segmentation is a
//! punctuation scan with an abbreviation guard; it is deterministic and
//! never drops characters other than surrounding whitespace.

/// Words that end in a period without ending a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "e.g", "i.e", "no", "fig",
    "approx", "dept", "est", "mt", "u.s", "u.k",
];

/// Collapse every run of whitespace into a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of whitespace-separated words.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Approximate token count: one token per four characters, rounded up.
///
/// Every component uses this so chunk sums and knowledge-base totals agree.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Split text into non-empty, trimmed paragraphs on blank lines.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut paragraphs = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                paragraphs.push(text[s..end].trim());
            }
        } else {
            if start.is_none() {
                start = Some(line_start);
            }
            end = offset;
        }
    }
    if let Some(s) = start {
        paragraphs.push(text[s..end].trim());
    }

    paragraphs.retain(|p| !p.is_empty());
    paragraphs
}

/// Split a paragraph into trimmed sentences.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (_, c) = chars[i];
        if !matches!(c, '.' | '!' | '?') {
            i += 1;
            continue;
        }

        // Absorb runs like "?!", "..." and closing quotes/brackets.
        let mut j = i + 1;
        while j < chars.len() && is_terminal_trailer(chars[j].1) {
            j += 1;
        }

        let at_end = j >= chars.len();
        if at_end || chars[j].1.is_whitespace() {
            let end = if at_end { text.len() } else { chars[j].0 };
            let candidate = &text[start..end];
            let abbreviated = c == '.' && ends_with_abbreviation(candidate);
            let next_starts_sentence = at_end || next_non_space(&chars, j).is_none_or(opens_sentence);

            if !abbreviated && next_starts_sentence {
                let sentence = candidate.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = end;
            }
        }
        i = j;
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

fn is_terminal_trailer(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '"' | '\'' | ')' | ']' | '\u{201d}' | '\u{2019}')
}

fn opens_sentence(c: char) -> bool {
    c.is_uppercase() || c.is_numeric() || matches!(c, '"' | '\'' | '(' | '[' | '\u{201c}' | '\u{2018}')
}

fn next_non_space(chars: &[(usize, char)], from: usize) -> Option<char> {
    chars[from..]
        .iter()
        .map(|(_, c)| *c)
        .find(|c| !c.is_whitespace())
}

fn ends_with_abbreviation(candidate: &str) -> bool {
    let Some(last) = candidate.split_whitespace().last() else {
        return false;
    };
    let word = last
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .trim_end_matches('.')
        .to_lowercase();

    // Single-letter initials ("J. Smith").
    if word.chars().count() == 1 && word.chars().all(char::is_alphabetic) {
        return true;
    }
    ABBREVIATIONS.contains(&word.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace() {
        assert_eq!(collapse_whitespace("  a \t b\n\nc  "), "a b c");
    }

    #[test]
    fn token_estimate_is_deterministic() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(1000)), 250);
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let text = "First para line one.\nline two.\n\n\n  Second para.  \n\nThird.";
        let paras = split_paragraphs(text);
        assert_eq!(
            paras,
            vec!["First para line one.\nline two.", "Second para.", "Third."]
        );
        assert!(split_paragraphs("   \n\n ").is_empty());
    }

    #[test]
    fn sentences_split_on_terminators() {
        let s = split_sentences("Hello world. How are you? I am fine! Thanks");
        assert_eq!(s, vec!["Hello world.", "How are you?", "I am fine!", "Thanks"]);
    }

    #[test]
    fn abbreviations_do_not_end_sentences() {
        let s = split_sentences("Talk to Dr. Smith about it. Use tools e.g. Cargo today.");
        assert_eq!(s, vec!["Talk to Dr. Smith about it.", "Use tools e.g. Cargo today."]);

        let s = split_sentences("Written by J. R. Tolkien. Next sentence.");
        assert_eq!(s, vec!["Written by J. R. Tolkien.", "Next sentence."]);
    }

    #[test]
    fn decimals_and_lowercase_continuations_stay_together() {
        let s = split_sentences("Version 2.5 costs $9.99 per month. Call us.");
        assert_eq!(s, vec!["Version 2.5 costs $9.99 per month.", "Call us."]);

        let s = split_sentences("Acme Inc. provides hosting. It is fast.");
        assert_eq!(s, vec!["Acme Inc. provides hosting.", "It is fast."]);
    }

    #[test]
    fn quotes_and_ellipses_are_absorbed() {
        let s = split_sentences("He said \"stop.\" Then... Nothing happened?! End");
        assert_eq!(
            s,
            vec!["He said \"stop.\"", "Then...", "Nothing happened?!", "End"]
        );
    }

    #[test]
    fn sentences_cover_the_paragraph() {
        let text = "One two three. Four five six! Seven eight nine? Ten.";
        let rejoined = split_sentences(text).join(" ");
        assert_eq!(rejoined, text);
    }
}
