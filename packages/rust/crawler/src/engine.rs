//! Breadth-first, scope-aware crawl orchestrator.
//!
//! The crawler owns the frontier and visited set, paces requests through a
//! shared [`PolitenessGate`], and drives each page through
//! fetch → extract → analyze → chunk. Pages are processed in batches of up to
//! `workers` concurrent tasks; results are folded back in dequeue order so
//! discovery order stays deterministic.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use sitekb_artifacts::KnowledgeBaseBuilder;
use sitekb_shared::{
    CrawlJob, FetchError, FetchStatus, KnowledgeBase, PageFailure, Result, Warning,
};

use crate::fetcher::Fetcher;
use crate::frontier::{CrawlScope, Frontier, FrontierEntry, is_non_content_url, normalize_url};
use crate::gate::PolitenessGate;
use crate::page::{PageProcessor, ProcessedPage};
use crate::progress::{CrawlState, PageProgress, ProgressReporter};

/// Why the crawl loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    FrontierExhausted,
    PageLimit,
    Cancelled,
    Deadline,
}

/// Everything a finished (or stopped) crawl produced.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Exactly the pages that succeeded, plus per-page failures.
    pub knowledge_base: KnowledgeBase,
    /// Degraded extraction and dropped records.
    pub warnings: Vec<Warning>,
    pub state: CrawlState,
    pub termination: Termination,
    /// Entries discarded without producing a page or a failure.
    pub pages_skipped: usize,
    pub duration: Duration,
}

/// Crawls one [`CrawlJob`].
pub struct Crawler {
    job: CrawlJob,
    processor: PageProcessor,
    scope: CrawlScope,
    gate: Arc<PolitenessGate>,
    state: CrawlState,
}

impl Crawler {
    /// Validates the job; an invalid job never starts.
    pub fn new(job: CrawlJob, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        job.validate()?;
        let processor = PageProcessor::new(&job, fetcher)?;
        let scope = CrawlScope::new(&job.root_url, &job.include_patterns, &job.exclude_patterns);
        let gate = Arc::new(PolitenessGate::new(job.delay));

        Ok(Self {
            job,
            processor,
            scope,
            gate,
            state: CrawlState::Idle,
        })
    }

    pub fn job(&self) -> &CrawlJob {
        &self.job
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    fn set_state(&mut self, state: CrawlState, progress: &dyn ProgressReporter) {
        self.state = state;
        progress.state_changed(state);
    }

    /// Run the crawl to completion, cancellation or deadline.
    ///
    /// Per-page failures are recorded and never abort the crawl. On
    /// cancellation the pages finished so far are still returned.
    #[instrument(skip_all, fields(root = %self.job.root_url, fetcher = self.processor.fetcher_name()))]
    pub async fn crawl(
        &mut self,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> CrawlReport {
        let started = Instant::now();
        let deadline = self.job.deadline.map(|d| started + d);
        let max_pages = self.job.max_pages;
        let max_depth = self.job.max_depth;

        let mut frontier = Frontier::new(self.job.root_url.clone());
        let mut builder = KnowledgeBaseBuilder::new(self.job.root_url.as_str());
        let mut warnings: Vec<Warning> = Vec::new();
        let mut pages_scraped = 0usize;
        let mut pages_skipped = 0usize;
        let mut failures = 0usize;

        info!(
            max_depth,
            max_pages,
            delay_ms = self.job.delay.as_millis() as u64,
            workers = self.job.workers,
            "Starting crawl"
        );
        self.set_state(CrawlState::Running, progress);

        let termination = loop {
            if cancel.is_cancelled() {
                break Termination::Cancelled;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break Termination::Deadline;
            }
            if pages_scraped >= max_pages {
                break Termination::PageLimit;
            }
            if frontier.is_empty() {
                break Termination::FrontierExhausted;
            }

            // Never schedule more work than the remaining page budget.
            let slots = self.job.workers.min(max_pages - pages_scraped);
            let mut batch: Vec<FrontierEntry> = Vec::with_capacity(slots);
            while batch.len() < slots {
                let Some(entry) = frontier.pop() else {
                    break;
                };
                if entry.depth > max_depth || frontier.is_visited(&entry.url) {
                    pages_skipped += 1;
                    continue;
                }
                if is_non_content_url(&entry.url) {
                    debug!(url = %entry.url, "Non-content URL, skipping");
                    pages_skipped += 1;
                    continue;
                }
                frontier.mark_visited(&entry.url);
                batch.push(entry);
            }
            if batch.is_empty() {
                continue;
            }

            let handles: Vec<_> = batch
                .iter()
                .cloned()
                .map(|entry| {
                    let processor = self.processor.clone();
                    let gate = Arc::clone(&self.gate);
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        debug!(url = %entry.url, depth = entry.depth, "Fetching");
                        gate.wait(&cancel).await?;
                        let fetched = processor.fetch(&entry.url).await;
                        gate.complete().await;
                        Ok::<ProcessedPage, FetchError>(processor.transform(
                            &entry.url,
                            entry.depth,
                            fetched?,
                        ))
                    })
                })
                .collect();
            let results = futures::future::join_all(handles).await;

            for (entry, joined) in batch.into_iter().zip(results) {
                let outcome = joined.unwrap_or_else(|e| {
                    Err(FetchError::Network(format!("page worker failed: {e}")))
                });

                match outcome {
                    Ok(page) => {
                        if !self.scope.in_scope(&page.final_url) {
                            debug!(url = %entry.url, final_url = %page.final_url, "Redirected out of scope, skipping");
                            pages_skipped += 1;
                            progress.page_done(&skipped(&entry, &frontier, pages_scraped, "redirected out of scope"));
                            continue;
                        }
                        // A redirect target already taken by this or an earlier batch.
                        let redirected = normalize_url(&page.final_url) != normalize_url(&entry.url);
                        if redirected && !frontier.mark_visited(&page.final_url) {
                            debug!(url = %entry.url, final_url = %page.final_url, "Redirect target already visited, skipping");
                            pages_skipped += 1;
                            progress.page_done(&skipped(&entry, &frontier, pages_scraped, "redirect target already visited"));
                            continue;
                        }
                        pages_scraped += 1;

                        if entry.depth < max_depth {
                            for link in &page.links {
                                if self.scope.in_scope(link) {
                                    frontier.push(link.clone(), entry.depth + 1);
                                }
                            }
                        }

                        progress.page_done(&PageProgress {
                            url: page.record.url.clone(),
                            depth: entry.depth,
                            status: FetchStatus::Ok,
                            chunks: page.chunks.len(),
                            pages_scraped,
                            queued: frontier.len(),
                            error: None,
                        });
                        warnings.extend(page.warnings);
                        builder.add_page(page.record, page.chunks);
                    }
                    Err(FetchError::Cancelled) => {
                        pages_skipped += 1;
                    }
                    Err(FetchError::UnsupportedContent(content_type)) => {
                        debug!(url = %entry.url, %content_type, "Non-text response, skipping");
                        pages_skipped += 1;
                        progress.page_done(&skipped(
                            &entry,
                            &frontier,
                            pages_scraped,
                            &format!("unsupported content type {content_type}"),
                        ));
                    }
                    Err(e) => {
                        warn!(url = %entry.url, depth = entry.depth, error = %e, "Page failed");
                        failures += 1;
                        progress.page_done(&PageProgress {
                            url: entry.url.to_string(),
                            depth: entry.depth,
                            status: FetchStatus::Failed,
                            chunks: 0,
                            pages_scraped,
                            queued: frontier.len(),
                            error: Some(e.to_string()),
                        });
                        builder.add_failure(PageFailure {
                            url: entry.url.to_string(),
                            depth: entry.depth,
                            kind: e.kind(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        };

        self.processor.shutdown().await;
        let built = builder.build();
        warnings.extend(built.warnings);

        let final_state = if pages_scraped == 0 && failures > 0 {
            CrawlState::Failed
        } else {
            CrawlState::Completed
        };
        self.set_state(final_state, progress);

        let duration = started.elapsed();
        info!(
            pages_scraped,
            pages_skipped,
            failures,
            chunks = built.knowledge_base.total_chunks,
            termination = ?termination,
            duration_ms = duration.as_millis() as u64,
            "Crawl finished"
        );

        CrawlReport {
            knowledge_base: built.knowledge_base,
            warnings,
            state: final_state,
            termination,
            pages_skipped,
            duration,
        }
    }
}

fn skipped(entry: &FrontierEntry, frontier: &Frontier, pages_scraped: usize, reason: &str) -> PageProgress {
    PageProgress {
        url: entry.url.to_string(),
        depth: entry.depth,
        status: FetchStatus::Skipped,
        chunks: 0,
        pages_scraped,
        queued: frontier.len(),
        error: Some(reason.to_string()),
    }
}
