//! Pattern-matched structured signals: emails, phones, prices, dates.
//!
//! Matching is best-effort. Both misses and false positives are expected.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use sitekb_shared::StructuredSignals;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid regex")
});

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+\d{1,3}[\s.-]?)?(?:\(\d{1,4}\)[\s.-]?)?\d{2,4}[\s.-]\d{3,4}(?:[\s.-]\d{2,4})?\b")
        .expect("valid regex")
});

static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:[$€£¥]\s?\d[\d,]*(?:\.\d{1,2})?|\b\d[\d,]*(?:\.\d{1,2})?\s?(?:USD|EUR|GBP|JPY|dollars|euros|pounds)\b)",
    )
    .expect("valid regex")
});

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    const MONTH: &str = r"(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec)[a-z]*\.?";
    Regex::new(&format!(
        r"\b\d{{4}}-\d{{2}}-\d{{2}}\b|\b\d{{1,2}}/\d{{1,2}}/\d{{2,4}}\b|\b{MONTH}\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+\d{{4}}\b|\b\d{{1,2}}(?:st|nd|rd|th)?\s+{MONTH},?\s+\d{{4}}\b"
    ))
    .expect("valid regex")
});

/// Phone candidates must carry a plausible number of digits.
const PHONE_DIGITS: std::ops::RangeInclusive<usize> = 7..=15;

/// Run every signal matcher over cleaned text.
pub fn extract_signals(text: &str) -> StructuredSignals {
    StructuredSignals {
        emails: distinct(EMAIL_RE.find_iter(text).map(|m| m.as_str())),
        phones: distinct(
            PHONE_RE
                .find_iter(text)
                .map(|m| m.as_str().trim())
                .filter(|p| PHONE_DIGITS.contains(&p.chars().filter(char::is_ascii_digit).count())),
        ),
        prices: distinct(PRICE_RE.find_iter(text).map(|m| m.as_str().trim())),
        dates: distinct(DATE_RE.find_iter(text).map(|m| m.as_str())),
    }
}

/// Append `extra` values not already present (case-insensitive).
pub(crate) fn append_distinct(target: &mut Vec<String>, extra: &[String]) {
    let mut seen: HashSet<String> = target.iter().map(|v| v.to_lowercase()).collect();
    for value in extra {
        if seen.insert(value.to_lowercase()) {
            target.push(value.clone());
        }
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out = Vec::new();
    append_distinct(
        &mut out,
        &values.map(str::to_string).collect::<Vec<_>>(),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_emails() {
        let s = extract_signals("Write to info@acme.io or INFO@acme.io, or sales@acme.co.uk.");
        assert_eq!(s.emails, vec!["info@acme.io", "sales@acme.co.uk"]);
    }

    #[test]
    fn finds_phones_in_several_formats() {
        let s = extract_signals("Call +1 (555) 123-4567, 555-123-4567 or 020 7946 0958 today.");
        assert_eq!(
            s.phones,
            vec!["+1 (555) 123-4567", "555-123-4567", "020 7946 0958"]
        );
    }

    #[test]
    fn short_numbers_are_not_phones() {
        let s = extract_signals("Room 12 34 is on floor 3.");
        assert!(s.phones.is_empty());
    }

    #[test]
    fn finds_prices() {
        let s = extract_signals("Starter is $9.99, Pro is €1,200 and Enterprise is 499 USD.");
        assert_eq!(s.prices, vec!["$9.99", "€1,200", "499 USD"]);
    }

    #[test]
    fn finds_dates() {
        let s = extract_signals(
            "Released 2024-03-15, updated 3/4/2024, again on January 5th, 2025 and 12 Feb 2025.",
        );
        assert_eq!(
            s.dates,
            vec!["2024-03-15", "3/4/2024", "January 5th, 2025", "12 Feb 2025"]
        );
    }

    #[test]
    fn empty_text_has_no_signals() {
        assert!(extract_signals("").is_empty());
    }
}
