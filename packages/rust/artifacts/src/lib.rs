//! Knowledge-base assembly and output serialization.
//!
//! [`KnowledgeBaseBuilder`] merges per-page results into one
//! [`KnowledgeBase`]; [`output`] renders it as JSON, JSON Lines or a text
//! report. Building never fails: records that would break the knowledge
//! base's invariants are dropped with a [`Warning`].

pub mod output;

pub use output::{
    OutputFormat, render, render_page_report, render_report, to_json, to_jsonl, write_output,
};

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::{info, instrument, warn};

use sitekb_shared::{
    CURRENT_SCHEMA_VERSION, Chunk, EntityCollection, KbId, KnowledgeBase, PageFailure, PageRecord,
    Warning, WarningKind,
};

/// A built knowledge base plus the records that were dropped on the way.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub knowledge_base: KnowledgeBase,
    pub warnings: Vec<Warning>,
}

/// Accumulates pages, chunks and failures for one crawl.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBaseBuilder {
    root_url: String,
    pages: Vec<PageRecord>,
    chunks: Vec<Chunk>,
    failures: Vec<PageFailure>,
}

impl KnowledgeBaseBuilder {
    pub fn new(root_url: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into(),
            ..Self::default()
        }
    }

    /// Add a page together with its chunks. Pages keep insertion order.
    pub fn add_page(&mut self, page: PageRecord, chunks: Vec<Chunk>) {
        self.pages.push(page);
        self.chunks.extend(chunks);
    }

    pub fn add_failure(&mut self, failure: PageFailure) {
        self.failures.push(failure);
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[instrument(skip_all, fields(root_url = %self.root_url, pages = self.pages.len(), chunks = self.chunks.len()))]
    pub fn build(self) -> BuildOutput {
        let mut warnings = Vec::new();

        let mut pages = Vec::with_capacity(self.pages.len());
        let mut page_urls: HashSet<String> = HashSet::new();
        for page in self.pages {
            if page.url.trim().is_empty() {
                warnings.push(malformed(None, "page without a URL dropped".to_string()));
                continue;
            }
            if !page_urls.insert(page.url.clone()) {
                warnings.push(malformed(
                    Some(&page.url),
                    "duplicate page record dropped".to_string(),
                ));
                continue;
            }
            pages.push(page);
        }

        let mut chunks = Vec::with_capacity(self.chunks.len());
        let mut seen: HashMap<String, HashSet<usize>> = HashMap::new();
        for chunk in self.chunks {
            let url = chunk.metadata.source_url.as_str();
            if !page_urls.contains(url) {
                warnings.push(malformed(
                    Some(url),
                    format!("chunk {} has no matching page", chunk.chunk_index),
                ));
                continue;
            }
            if chunk.chunk_index >= chunk.total_chunks {
                warnings.push(malformed(
                    Some(url),
                    format!(
                        "chunk index {} out of range for {} chunks",
                        chunk.chunk_index, chunk.total_chunks
                    ),
                ));
                continue;
            }
            if !seen.entry(url.to_string()).or_default().insert(chunk.chunk_index) {
                warnings.push(malformed(
                    Some(url),
                    format!("duplicate chunk index {}", chunk.chunk_index),
                ));
                continue;
            }
            chunks.push(chunk);
        }

        let mut entities = EntityCollection::new();
        for page in &pages {
            entities.merge(&page.entities);
        }

        let topics = merge_topics(pages.iter().map(|p| p.topics.as_slice()));

        for warning in &warnings {
            warn!(url = ?warning.url, message = %warning.message, "Dropped malformed record");
        }

        let knowledge_base = KnowledgeBase {
            schema_version: CURRENT_SCHEMA_VERSION,
            id: KbId::new(),
            root_url: self.root_url,
            total_pages: pages.len(),
            total_chunks: chunks.len(),
            total_tokens: chunks.iter().map(|c| c.token_count).sum(),
            total_words: pages.iter().map(|p| p.word_count).sum(),
            entities,
            topics,
            created_at: Utc::now(),
            pages,
            failures: self.failures,
            chunks,
        };

        info!(
            total_pages = knowledge_base.total_pages,
            total_chunks = knowledge_base.total_chunks,
            total_tokens = knowledge_base.total_tokens,
            dropped = warnings.len(),
            "Knowledge base built"
        );

        BuildOutput {
            knowledge_base,
            warnings,
        }
    }
}

/// Union of per-page topic lists in first-appearance order, compared
/// case-insensitively after trimming. Per-page ranks are not re-scored.
pub fn merge_topics<'a>(lists: impl IntoIterator<Item = &'a [String]>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for topic in lists.into_iter().flatten() {
        let trimmed = topic.trim();
        if !trimmed.is_empty() && seen.insert(trimmed.to_lowercase()) {
            merged.push(trimmed.to_string());
        }
    }
    merged
}

fn malformed(url: Option<&str>, message: String) -> Warning {
    Warning {
        url: url.map(str::to_string),
        kind: WarningKind::MalformedRecord,
        message,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use sitekb_shared::{
        ChunkMetadata, EntityCategory, FailureKind, FetchStatus, StructuredSignals,
    };

    pub(crate) fn page(url: &str, words: usize, topics: &[&str]) -> PageRecord {
        PageRecord {
            url: url.into(),
            final_url: url.into(),
            depth: 0,
            title: Some("Title".into()),
            text: "Some page text.".into(),
            word_count: words,
            char_count: 15,
            content_hash: "hash".into(),
            links: vec![],
            signals: StructuredSignals::default(),
            http_status: Some(200),
            fetched_at: Utc::now(),
            status: FetchStatus::Ok,
            topics: topics.iter().map(|t| t.to_string()).collect(),
            entities: EntityCollection::new(),
        }
    }

    pub(crate) fn chunk(url: &str, index: usize, total: usize, tokens: usize) -> Chunk {
        Chunk {
            chunk_id: format!("{url}-{index}"),
            content: "Some page text.".into(),
            metadata: ChunkMetadata {
                source_url: url.into(),
                title: None,
                depth: 0,
                word_count: 3,
                char_count: 15,
                timestamp: Utc::now(),
                entities: EntityCollection::new(),
                topics: vec![],
            },
            chunk_index: index,
            total_chunks: total,
            token_count: tokens,
        }
    }

    #[test]
    fn sums_totals() {
        let mut builder = KnowledgeBaseBuilder::new("https://example.com");
        builder.add_page(
            page("https://example.com/", 10, &[]),
            vec![chunk("https://example.com/", 0, 2, 5), chunk("https://example.com/", 1, 2, 7)],
        );
        builder.add_page(page("https://example.com/a", 4, &[]), vec![chunk("https://example.com/a", 0, 1, 3)]);

        let out = builder.build();
        let kb = out.knowledge_base;
        assert!(out.warnings.is_empty());
        assert_eq!(kb.total_pages, 2);
        assert_eq!(kb.total_chunks, 3);
        assert_eq!(kb.total_tokens, 15);
        assert_eq!(kb.total_words, 14);
        assert_eq!(kb.schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn orphan_and_out_of_range_chunks_are_skipped() {
        let mut builder = KnowledgeBaseBuilder::new("https://example.com");
        builder.add_page(
            page("https://example.com/", 10, &[]),
            vec![chunk("https://example.com/", 0, 1, 5), chunk("https://example.com/", 3, 1, 5)],
        );
        builder.add_page(page("", 1, &[]), vec![chunk("https://example.com/ghost", 0, 1, 5)]);

        let out = builder.build();
        assert_eq!(out.knowledge_base.total_pages, 1);
        assert_eq!(out.knowledge_base.total_chunks, 1);
        assert_eq!(out.warnings.len(), 3);
        assert!(out.warnings.iter().all(|w| w.kind == WarningKind::MalformedRecord));
    }

    #[test]
    fn every_chunk_has_a_page() {
        let mut builder = KnowledgeBaseBuilder::new("https://example.com");
        builder.add_page(page("https://example.com/", 1, &[]), vec![chunk("https://example.com/", 0, 1, 1)]);
        builder.add_page(page("https://example.com/b", 1, &[]), vec![chunk("https://example.com/c", 0, 1, 1)]);

        let kb = builder.build().knowledge_base;
        for c in &kb.chunks {
            assert!(kb.pages.iter().any(|p| p.url == c.metadata.source_url));
        }
    }

    #[test]
    fn entities_merge_case_insensitively() {
        let mut a = page("https://example.com/", 1, &[]);
        a.entities.insert(EntityCategory::Technologies, "Rust");
        a.entities.insert(EntityCategory::Locations, "Berlin");
        let mut b = page("https://example.com/b", 1, &[]);
        b.entities.insert(EntityCategory::Technologies, " rust ");
        b.entities.insert(EntityCategory::Companies, "Acme Inc");

        let mut builder = KnowledgeBaseBuilder::new("https://example.com");
        builder.add_page(a, vec![]);
        builder.add_page(b, vec![]);
        let kb = builder.build().knowledge_base;

        assert_eq!(kb.entities.get(EntityCategory::Technologies).unwrap().len(), 1);
        assert_eq!(kb.entities.total(), 3);
    }

    #[test]
    fn topics_union_keeps_first_appearance_order() {
        let mut builder = KnowledgeBaseBuilder::new("https://example.com");
        builder.add_page(page("https://example.com/", 1, &["Data pipelines", "pricing"]), vec![]);
        builder.add_page(page("https://example.com/b", 1, &["data pipelines ", "hosting"]), vec![]);
        let kb = builder.build().knowledge_base;
        assert_eq!(kb.topics, vec!["Data pipelines", "pricing", "hosting"]);
    }

    #[test]
    fn topics_shared_by_many_pages_are_not_reranked() {
        let mut builder = KnowledgeBaseBuilder::new("https://example.com");
        builder.add_page(page("https://example.com/", 1, &["pricing", "hosting"]), vec![]);
        builder.add_page(page("https://example.com/b", 1, &["support", "Hosting"]), vec![]);
        builder.add_page(page("https://example.com/c", 1, &["hosting"]), vec![]);
        let kb = builder.build().knowledge_base;
        assert_eq!(kb.topics, vec!["pricing", "hosting", "support"]);
    }

    #[test]
    fn global_entities_come_from_pages() {
        let mut p = page("https://example.com/", 1, &[]);
        p.entities.insert(EntityCategory::Technologies, "Rust");
        let mut c = chunk("https://example.com/", 0, 1, 1);
        c.metadata.entities.insert(EntityCategory::Technologies, "rust");
        c.metadata.entities.insert(EntityCategory::Locations, "Nowhere");

        let mut builder = KnowledgeBaseBuilder::new("https://example.com");
        builder.add_page(p, vec![c]);
        let kb = builder.build().knowledge_base;

        assert_eq!(kb.entities.total(), 1);
        assert!(kb.entities.get(EntityCategory::Locations).is_none_or(|s| s.is_empty()));
    }

    #[test]
    fn failures_are_carried_through() {
        let mut builder = KnowledgeBaseBuilder::new("https://example.com");
        builder.add_failure(PageFailure {
            url: "https://example.com/slow".into(),
            depth: 1,
            kind: FailureKind::Timeout,
            message: "timed out".into(),
        });
        let kb = builder.build().knowledge_base;
        assert_eq!(kb.failures.len(), 1);
        assert_eq!(kb.total_pages, 0);
    }
}
