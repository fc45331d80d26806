//! Per-page processing: fetch → extract → analyze → chunk.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use sitekb_analysis::Analyzer;
use sitekb_chunker::{ChunkOptions, Chunker, PageContext};
use sitekb_shared::{Chunk, CrawlJob, FetchError, FetchStatus, PageRecord, Result, Warning};

use crate::fetcher::{FetchedDocument, Fetcher};

/// A page turned into its record and chunks.
#[derive(Debug, Clone)]
pub struct ProcessedPage {
    pub record: PageRecord,
    pub chunks: Vec<Chunk>,
    pub warnings: Vec<Warning>,
    /// Parsed outbound links, in document order.
    pub links: Vec<Url>,
    pub final_url: Url,
}

/// Runs the per-page pipeline. Cheap to clone; workers each hold one.
#[derive(Clone)]
pub struct PageProcessor {
    fetcher: Arc<dyn Fetcher>,
    analyzer: Analyzer,
    chunker: Chunker,
    fetch_timeout: Duration,
}

impl PageProcessor {
    pub fn new(job: &CrawlJob, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        Ok(Self {
            fetcher,
            analyzer: Analyzer::new(job.top_topics),
            chunker: Chunker::new(ChunkOptions::from_job(job))?,
            fetch_timeout: job.fetch_timeout,
        })
    }

    pub fn fetcher_name(&self) -> &str {
        self.fetcher.name()
    }

    pub async fn shutdown(&self) {
        self.fetcher.shutdown().await;
    }

    /// Fetch under the per-request timeout.
    pub async fn fetch(&self, url: &Url) -> std::result::Result<FetchedDocument, FetchError> {
        match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.fetch_timeout.as_millis() as u64)),
        }
    }

    /// Extract, analyze and chunk a fetched document.
    pub fn transform(&self, url: &Url, depth: u32, doc: FetchedDocument) -> ProcessedPage {
        let extracted = sitekb_extract::extract(&doc.html, &doc.final_url);
        let analysis = self.analyzer.analyze(&extracted.text, &extracted.signals);
        let fetched_at = Utc::now();

        let links: Vec<Url> = extracted
            .links
            .iter()
            .filter_map(|l| Url::parse(&l.url).ok())
            .collect();

        let record = PageRecord {
            url: url.to_string(),
            final_url: doc.final_url.to_string(),
            depth,
            title: extracted.title,
            word_count: extracted.word_count,
            char_count: extracted.char_count,
            content_hash: compute_hash(&extracted.text),
            text: extracted.text,
            links: extracted.links,
            signals: extracted.signals,
            http_status: doc.status,
            fetched_at,
            status: FetchStatus::Ok,
            topics: analysis.topics,
            entities: analysis.entities,
        };

        let output = self.chunker.chunk(
            &record.text,
            &PageContext {
                url: &record.url,
                title: record.title.as_deref(),
                depth,
                timestamp: fetched_at,
                entities: &record.entities,
                topics: &record.topics,
            },
        );

        debug!(
            %url,
            words = record.word_count,
            chunks = output.chunks.len(),
            links = links.len(),
            "Processed page"
        );

        ProcessedPage {
            record,
            chunks: output.chunks,
            warnings: output.warnings,
            links,
            final_url: doc.final_url,
        }
    }

    /// Fetch and transform one page with no politeness gate.
    pub async fn process(&self, url: &Url, depth: u32) -> std::result::Result<ProcessedPage, FetchError> {
        let doc = self.fetch(url).await?;
        Ok(self.transform(url, depth, doc))
    }
}

/// SHA-256 of the cleaned text, hex-encoded.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
