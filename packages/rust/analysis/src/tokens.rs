//! Word tokenizer for the entity and topic heuristics.

/// One word with surrounding punctuation removed.
#[derive(Debug, Clone)]
pub(crate) struct Token<'a> {
    pub word: &'a str,
    pub lower: String,
    /// Punctuation or a line end follows, so no phrase continues past this word.
    pub break_after: bool,
}

const LEADING: &[char] = &['(', '[', '{', '"', '\'', '\u{201c}', '\u{2018}'];
const TRAILING: &[char] = &[
    ',', ';', ':', '!', '?', '.', ')', ']', '}', '"', '\'', '\u{201d}', '\u{2019}',
];

/// Split text into tokens, marking phrase boundaries at punctuation and line ends.
pub(crate) fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens: Vec<Token<'_>> = Vec::new();

    for line in text.lines() {
        for raw in line.split_whitespace() {
            let lead_trimmed = raw.trim_start_matches(LEADING);
            let word = lead_trimmed.trim_end_matches(TRAILING);

            if lead_trimmed.len() != raw.len() || word.is_empty() {
                if let Some(prev) = tokens.last_mut() {
                    prev.break_after = true;
                }
            }
            if word.is_empty() || !word.chars().any(char::is_alphanumeric) {
                continue;
            }

            tokens.push(Token {
                word,
                lower: word.to_lowercase(),
                break_after: word.len() != lead_trimmed.len(),
            });
        }
        if let Some(prev) = tokens.last_mut() {
            prev.break_after = true;
        }
    }

    tokens
}

/// `true` if the word starts with an uppercase letter.
pub(crate) fn is_capitalized(word: &str) -> bool {
    word.chars().next().is_some_and(char::is_uppercase)
}

/// `true` if no boundary falls strictly inside `tokens[start..end]`.
pub(crate) fn is_unbroken(tokens: &[Token<'_>], start: usize, end: usize) -> bool {
    tokens[start..end - 1].iter().all(|t| !t.break_after)
}

/// Space-joined words of `tokens[start..end]`.
pub(crate) fn join_words(tokens: &[Token<'_>], start: usize, end: usize) -> String {
    tokens[start..end]
        .iter()
        .map(|t| t.word)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_punctuation_and_marks_breaks() {
        let tokens = tokenize("We use (Node.js, C++) and C#. Done");
        let words: Vec<_> = tokens.iter().map(|t| t.word).collect();
        assert_eq!(words, vec!["We", "use", "Node.js", "C++", "and", "C#", "Done"]);

        let breaks: Vec<_> = tokens.iter().map(|t| t.break_after).collect();
        assert_eq!(breaks, vec![false, true, true, true, false, true, true]);
    }

    #[test]
    fn line_ends_are_boundaries() {
        let tokens = tokenize("About us\n\nNorthwind builds");
        assert!(tokens[1].break_after);
        assert!(!tokens[2].break_after);
    }

    #[test]
    fn dashes_become_boundaries() {
        let tokens = tokenize("fast - reliable");
        assert_eq!(tokens.len(), 2);
        assert!(tokens[0].break_after);
    }
}
