//! Knowledge-base serializations.
//!
//! - `json`: one pretty-printed document
//! - `jsonl`: a leading summary record, then one chunk object per line
//! - `text`: the human-readable scrape report

use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use sitekb_shared::{
    EntityCollection, KbId, KnowledgeBase, PageFailure, PageRecord, Result, SiteKbError,
};

const RULE_WIDTH: usize = 80;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Jsonl,
    Text,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Jsonl => "jsonl",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = SiteKbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "jsonl" | "ndjson" => Ok(Self::Jsonl),
            "text" | "txt" => Ok(Self::Text),
            other => Err(SiteKbError::config(format!(
                "unknown output format '{other}' (expected json, jsonl or text)"
            ))),
        }
    }
}

/// First line of the JSON Lines output.
#[derive(Serialize)]
struct SummaryRecord<'a> {
    record: &'static str,
    schema_version: u32,
    id: &'a KbId,
    root_url: &'a str,
    total_pages: usize,
    total_chunks: usize,
    total_tokens: usize,
    total_words: usize,
    entities: &'a EntityCollection,
    topics: &'a [String],
    created_at: DateTime<Utc>,
    pages: &'a [PageRecord],
    failures: &'a [PageFailure],
}

impl<'a> From<&'a KnowledgeBase> for SummaryRecord<'a> {
    fn from(kb: &'a KnowledgeBase) -> Self {
        Self {
            record: "summary",
            schema_version: kb.schema_version,
            id: &kb.id,
            root_url: &kb.root_url,
            total_pages: kb.total_pages,
            total_chunks: kb.total_chunks,
            total_tokens: kb.total_tokens,
            total_words: kb.total_words,
            entities: &kb.entities,
            topics: &kb.topics,
            created_at: kb.created_at,
            pages: &kb.pages,
            failures: &kb.failures,
        }
    }
}

/// Pretty-printed JSON document.
pub fn to_json(kb: &KnowledgeBase) -> Result<String> {
    Ok(serde_json::to_string_pretty(kb)?)
}

/// Summary record followed by one chunk per line.
pub fn to_jsonl(kb: &KnowledgeBase) -> Result<String> {
    let mut out = serde_json::to_string(&SummaryRecord::from(kb))?;
    out.push('\n');
    for chunk in &kb.chunks {
        out.push_str(&serde_json::to_string(chunk)?);
        out.push('\n');
    }
    Ok(out)
}

/// Multi-page scrape report.
pub fn render_report(kb: &KnowledgeBase, include_links: bool) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let total_chars: usize = kb.pages.iter().map(|p| p.char_count).sum();

    let mut out = String::new();
    let _ = writeln!(out, "DEEP SCRAPE RESULTS");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Root URL: {}", kb.root_url);
    let _ = writeln!(out, "Total Pages Scraped: {}", kb.total_pages);
    let _ = writeln!(out, "Total Words: {}", kb.total_words);
    let _ = writeln!(out, "Total Characters: {total_chars}");
    let _ = writeln!(out, "Total Chunks: {}", kb.total_chunks);
    let _ = writeln!(out, "Total Tokens: {}", kb.total_tokens);
    if !kb.failures.is_empty() {
        let _ = writeln!(out, "Failed Pages: {}", kb.failures.len());
    }
    let _ = writeln!(out, "{rule}\n");

    for (i, page) in kb.pages.iter().enumerate() {
        let _ = writeln!(out, "\n{rule}");
        let _ = writeln!(out, "PAGE {} (Depth {})", i + 1, page.depth);
        let _ = writeln!(out, "{rule}");
        write_page_body(&mut out, page, include_links);
    }

    if !kb.failures.is_empty() {
        let _ = writeln!(out, "\n{rule}");
        let _ = writeln!(out, "FAILURES");
        let _ = writeln!(out, "{rule}");
        for failure in &kb.failures {
            let _ = writeln!(
                out,
                "{} (depth {}): {:?}: {}",
                failure.url, failure.depth, failure.kind, failure.message
            );
        }
    }

    out
}

/// Single-page report.
pub fn render_page_report(page: &PageRecord, include_links: bool) -> String {
    let mut out = String::new();
    write_page_body(&mut out, page, include_links);
    out
}

fn write_page_body(out: &mut String, page: &PageRecord, include_links: bool) {
    let dashes = "-".repeat(RULE_WIDTH);

    let _ = writeln!(out, "URL: {}", page.url);
    if page.final_url != page.url {
        let _ = writeln!(out, "Final URL: {}", page.final_url);
    }
    if let Some(title) = &page.title {
        let _ = writeln!(out, "Title: {title}");
    }
    let _ = writeln!(out, "Word Count: {}", page.word_count);
    let _ = writeln!(out, "Character Count: {}", page.char_count);
    if !page.topics.is_empty() {
        let _ = writeln!(out, "Topics: {}", page.topics.join(", "));
    }
    let _ = writeln!(out, "\nTEXT CONTENT:");
    let _ = writeln!(out, "{dashes}");
    let _ = writeln!(out, "{}", page.text);

    if include_links && !page.links.is_empty() {
        let _ = writeln!(out, "\nLINKS:");
        let _ = writeln!(out, "{dashes}");
        for link in &page.links {
            let _ = writeln!(out, "Text: {}\nURL: {}\n", link.text, link.url);
        }
    }
}

/// Render in the requested format.
pub fn render(kb: &KnowledgeBase, format: OutputFormat, include_links: bool) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(kb),
        OutputFormat::Jsonl => to_jsonl(kb),
        OutputFormat::Text => Ok(render_report(kb, include_links)),
    }
}

/// Write rendered output to `path` via a temp file and rename.
pub fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SiteKbError::io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| SiteKbError::validation(format!("not a file path: {}", path.display())))?;
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| SiteKbError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| SiteKbError::io(path, e))?;

    debug!(path = %path.display(), bytes = content.len(), "Wrote output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KnowledgeBaseBuilder;
    use crate::tests::{chunk, page};
    use sitekb_shared::{Chunk, FailureKind, PageLink};

    fn sample_kb() -> KnowledgeBase {
        let mut builder = KnowledgeBaseBuilder::new("https://example.com");
        let mut root = page("https://example.com/", 3, &["crawling"]);
        root.links.push(PageLink {
            url: "https://example.com/about".into(),
            text: "About".into(),
        });
        builder.add_page(
            root,
            vec![chunk("https://example.com/", 0, 2, 4), chunk("https://example.com/", 1, 2, 4)],
        );
        builder.add_failure(PageFailure {
            url: "https://example.com/slow".into(),
            depth: 1,
            kind: FailureKind::Timeout,
            message: "timed out after 30000 ms".into(),
        });
        builder.build().knowledge_base
    }

    fn temp_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("sitekb-output-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn parses_formats() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("JSONL".parse::<OutputFormat>().unwrap(), OutputFormat::Jsonl);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn json_document_roundtrips() {
        let kb = sample_kb();
        let json = to_json(&kb).unwrap();
        let parsed: KnowledgeBase = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.total_chunks, 2);
        assert_eq!(parsed.chunks[1].chunk_index, 1);
        assert_eq!(parsed.failures.len(), 1);
    }

    #[test]
    fn jsonl_leads_with_summary_then_chunks() {
        let kb = sample_kb();
        let jsonl = to_jsonl(&kb).unwrap();
        let lines: Vec<&str> = jsonl.lines().collect();
        assert_eq!(lines.len(), 3);

        let summary: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(summary["record"], "summary");
        assert_eq!(summary["total_chunks"], 2);
        assert_eq!(summary["failures"][0]["kind"], "timeout");

        for (i, line) in lines[1..].iter().enumerate() {
            let chunk: Chunk = serde_json::from_str(line).unwrap();
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.content, kb.chunks[i].content);
        }
    }

    #[test]
    fn text_report_lists_pages_and_links() {
        let kb = sample_kb();
        let report = render_report(&kb, true);
        assert!(report.starts_with("DEEP SCRAPE RESULTS"));
        assert!(report.contains("Root URL: https://example.com"));
        assert!(report.contains("PAGE 1 (Depth 0)"));
        assert!(report.contains("Text: About\nURL: https://example.com/about"));
        assert!(report.contains("FAILURES"));

        let without_links = render_report(&kb, false);
        assert!(!without_links.contains("LINKS:"));
    }

    #[test]
    fn write_output_leaves_no_temp_file() {
        let tmp = temp_dir();
        let path = tmp.join("out").join("kb.json");
        write_output(&path, "{}").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
        for entry in std::fs::read_dir(path.parent().unwrap()).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.starts_with('.'), "temp file left behind: {name}");
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
