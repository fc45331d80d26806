//! HTML content extraction.
//!
//! Turns a raw HTML document into cleaned plain text, a title, the list of
//! outbound links and pattern-matched structured signals. Script, style,
//! noscript and comment nodes are dropped before any text is read.

mod content;
mod links;
mod signals;

use scraper::Html;
use tracing::{debug, instrument};
use url::Url;

use sitekb_shared::text::count_words;
use sitekb_shared::{PageLink, StructuredSignals};

pub use signals::extract_signals;

/// Everything the extractor derives from one HTML document.
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    /// `<title>` text, falling back to the first heading.
    pub title: Option<String>,
    /// Visible text; paragraphs separated by a blank line.
    pub text: String,
    /// Absolute outbound links in document order.
    pub links: Vec<PageLink>,
    /// Emails, phones, prices and dates.
    pub signals: StructuredSignals,
    pub word_count: usize,
    pub char_count: usize,
}

/// Extract text, title, links and signals from `html`.
///
/// Relative links resolve against `base_url`, which should be the final
/// (post-redirect) URL of the page.
#[instrument(skip(html), fields(url = %base_url, html_len = html.len()))]
pub fn extract(html: &str, base_url: &Url) -> ExtractedPage {
    let doc = Html::parse_document(html);

    let text = content::visible_text(&doc);
    let title = content::title(&doc);
    let anchors = links::harvest(&doc, base_url);

    let mut signals = extract_signals(&text);
    signals::append_distinct(&mut signals.emails, &anchors.emails);
    signals::append_distinct(&mut signals.phones, &anchors.phones);

    let page = ExtractedPage {
        title,
        word_count: count_words(&text),
        char_count: text.chars().count(),
        text,
        links: anchors.links,
        signals,
    };

    debug!(
        title = page.title.as_deref().unwrap_or(""),
        words = page.word_count,
        links = page.links.len(),
        "extraction complete"
    );

    page
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn base() -> Url {
        Url::parse("https://example.com/about").unwrap()
    }

    #[test]
    fn extracts_company_page_fixture() {
        let page = extract(&load_fixture("company.html"), &base());

        assert_eq!(page.title.as_deref(), Some("About Northwind Analytics"));
        assert!(page.text.contains("Northwind Analytics Inc. builds data pipelines"));
        assert!(!page.text.contains("trackPageView"));
        assert!(!page.text.contains("font-family"));
        assert!(!page.text.contains("Enable JavaScript"));
        assert!(page.text.contains("\n\n"));

        assert!(page.signals.emails.contains(&"hello@northwind.example".to_string()));
        assert!(page.signals.emails.contains(&"jobs@northwind.example".to_string()));
        assert!(page.signals.prices.contains(&"$49".to_string()));
        assert!(page.signals.dates.contains(&"2023-09-01".to_string()));
        assert!(!page.signals.phones.is_empty());

        let urls: Vec<_> = page.links.iter().map(|l| l.url.as_str()).collect();
        assert!(urls.contains(&"https://example.com/pricing"));
        assert!(urls.contains(&"https://partner.example.org/"));
    }

    #[test]
    fn counts_match_text() {
        let page = extract("<p>one two three</p><p>four</p>", &base());
        assert_eq!(page.text, "one two three\n\nfour");
        assert_eq!(page.word_count, 4);
        assert_eq!(page.char_count, page.text.chars().count());
    }

    #[test]
    fn empty_document_yields_empty_page() {
        let page = extract("<html><head><script>x()</script></head><body></body></html>", &base());
        assert!(page.text.is_empty());
        assert_eq!(page.word_count, 0);
        assert_eq!(page.char_count, 0);
        assert!(page.links.is_empty());
        assert!(page.signals.is_empty());
    }
}
