//! Visible-text extraction from a parsed document.
//!
//! Walks the DOM once, skipping non-content subtrees and comment nodes,
//! collapsing whitespace inside a block and starting a new paragraph at
//! every block-level boundary.

use scraper::{ElementRef, Html, Node, Selector};

use sitekb_shared::text::collapse_whitespace;

/// Subtrees whose text is never visible content.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "iframe", "head", "canvas", "object",
    "embed",
];

/// Elements that open and close a paragraph.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "br", "caption", "dd", "details",
    "dialog", "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p", "pre",
    "section", "summary", "table", "tr", "ul",
];

/// Elements separated from their siblings by a space.
const CELL_TAGS: &[&str] = &["td", "th"];

/// Accumulates paragraphs with whitespace normalisation.
#[derive(Default)]
struct TextBuilder {
    paragraphs: Vec<String>,
    current: String,
    pending_space: bool,
}

impl TextBuilder {
    fn push_text(&mut self, text: &str) {
        for c in text.chars() {
            if c.is_whitespace() {
                self.pending_space = true;
                continue;
            }
            if self.pending_space && !self.current.is_empty() {
                self.current.push(' ');
            }
            self.pending_space = false;
            self.current.push(c);
        }
    }

    fn soft_break(&mut self) {
        self.pending_space = true;
    }

    fn paragraph_break(&mut self) {
        if !self.current.is_empty() {
            self.paragraphs.push(std::mem::take(&mut self.current));
        }
        self.pending_space = false;
    }

    fn finish(mut self) -> String {
        self.paragraph_break();
        self.paragraphs.join("\n\n")
    }
}

/// Cleaned visible text: paragraphs separated by a blank line, whitespace
/// collapsed within each paragraph.
pub(crate) fn visible_text(doc: &Html) -> String {
    let mut builder = TextBuilder::default();
    walk(doc.root_element(), &mut builder);
    builder.finish()
}

fn walk(element: ElementRef<'_>, out: &mut TextBuilder) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_text(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_TAGS.contains(&name);
                let cell = CELL_TAGS.contains(&name);
                if block {
                    out.paragraph_break();
                } else if cell {
                    out.soft_break();
                }
                walk(child_el, out);
                if block {
                    out.paragraph_break();
                } else if cell {
                    out.soft_break();
                }
            }
            // Comments, doctypes and processing instructions carry no content.
            _ => {}
        }
    }
}

/// Document title, falling back to the first heading.
pub(crate) fn title(doc: &Html) -> Option<String> {
    let title_sel = Selector::parse("title").expect("valid selector");
    let heading_sel = Selector::parse("h1, h2, h3, h4, h5, h6").expect("valid selector");

    let from = |sel: &Selector| {
        doc.select(sel)
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .find(|t| !t.is_empty())
    };

    from(&title_sel).or_else(|| from(&heading_sel))
}
