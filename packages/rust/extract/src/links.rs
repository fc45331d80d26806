//! Anchor harvesting.

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

use sitekb_shared::PageLink;
use sitekb_shared::text::collapse_whitespace;

/// Everything pulled out of `<a href>` elements.
#[derive(Debug, Default)]
pub(crate) struct Anchors {
    /// Absolute http(s) links, fragment stripped, first occurrence kept.
    pub links: Vec<PageLink>,
    /// Addresses from `mailto:` hrefs.
    pub emails: Vec<String>,
    /// Numbers from `tel:` hrefs.
    pub phones: Vec<String>,
}

/// Extract all anchors from a document, resolved against the page's final URL.
pub(crate) fn harvest(doc: &Html, base_url: &Url) -> Anchors {
    let link_sel = Selector::parse("a[href]").expect("valid selector");
    let mut anchors = Anchors::default();
    let mut seen = HashSet::new();

    for el in doc.select(&link_sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let href = href.trim();

        if let Some(addr) = strip_scheme(href, "mailto:") {
            let addr = addr.split('?').next().unwrap_or_default().trim();
            if !addr.is_empty() {
                anchors.emails.push(addr.to_string());
            }
            continue;
        }
        if let Some(number) = strip_scheme(href, "tel:") {
            let number = number.trim();
            if !number.is_empty() {
                anchors.phones.push(number.to_string());
            }
            continue;
        }

        // Skip anchors, javascript:, data: and empty hrefs
        if href.is_empty()
            || href.starts_with('#')
            || strip_scheme(href, "javascript:").is_some()
            || strip_scheme(href, "data:").is_some()
        {
            continue;
        }

        let Ok(mut resolved) = base_url.join(href) else {
            continue;
        };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }
        resolved.set_fragment(None);

        let url = resolved.to_string();
        if seen.insert(url.clone()) {
            anchors.links.push(PageLink {
                url,
                text: collapse_whitespace(&el.text().collect::<String>()),
            });
        }
    }

    anchors
}

fn strip_scheme<'a>(href: &'a str, scheme: &str) -> Option<&'a str> {
    let head = href.get(..scheme.len())?;
    head.eq_ignore_ascii_case(scheme).then(|| &href[scheme.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_and_filters_links() {
        let html = r##"<html><body>
            <a href="/page2">Page 2</a>
            <a href="https://external.com">External</a>
            <a href="#section">Anchor</a>
            <a href="relative/path#frag">Relative</a>
            <a href="javascript:void(0)">JS</a>
            <a href="/page2#again">Page 2 again</a>
            <a href="ftp://files.example.com/x">FTP</a>
        </body></html>"##;

        let doc = Html::parse_document(html);
        let base = Url::parse("https://docs.example.com/dir/page1").unwrap();
        let anchors = harvest(&doc, &base);
        let urls: Vec<_> = anchors.links.iter().map(|l| l.url.as_str()).collect();

        assert_eq!(
            urls,
            vec![
                "https://docs.example.com/page2",
                "https://external.com/",
                "https://docs.example.com/dir/relative/path",
            ]
        );
        assert_eq!(anchors.links[0].text, "Page 2");
    }

    #[test]
    fn mailto_and_tel_feed_signals() {
        let html = r#"<a href="mailto:Sales@Example.com?subject=hi">Mail</a><a href="tel:+1-555-010-9999">Call</a>"#;
        let doc = Html::parse_document(html);
        let base = Url::parse("https://example.com/").unwrap();
        let anchors = harvest(&doc, &base);

        assert!(anchors.links.is_empty());
        assert_eq!(anchors.emails, vec!["Sales@Example.com"]);
        assert_eq!(anchors.phones, vec!["+1-555-010-9999"]);
    }
}
