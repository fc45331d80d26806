//! Crawl progress events.
//!
//! The crawler reports through [`ProgressReporter`] after every page and on
//! every state change. Nothing in the crawl depends on anyone listening.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use sitekb_shared::FetchStatus;

/// Lifecycle of one crawl: `Idle -> Running -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    Idle,
    Running,
    Completed,
    /// No page could be scraped.
    Failed,
}

/// Outcome of one frontier entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageProgress {
    pub url: String,
    pub depth: u32,
    pub status: FetchStatus,
    pub chunks: usize,
    /// Pages scraped so far, this one included.
    pub pages_scraped: usize,
    /// Entries still waiting in the frontier.
    pub queued: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Progress callback.
pub trait ProgressReporter: Send + Sync {
    fn state_changed(&self, state: CrawlState);
    fn page_done(&self, page: &PageProgress);
}

/// No-op reporter for headless and test use.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn state_changed(&self, _state: CrawlState) {}
    fn page_done(&self, _page: &PageProgress) {}
}

/// Event sent by [`ChannelProgress`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CrawlEvent {
    State { state: CrawlState },
    Page(PageProgress),
}

/// Forwards progress into an unbounded channel. A dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: UnboundedSender<CrawlEvent>,
}

impl ChannelProgress {
    pub fn new(tx: UnboundedSender<CrawlEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressReporter for ChannelProgress {
    fn state_changed(&self, state: CrawlState) {
        let _ = self.tx.send(CrawlEvent::State { state });
    }

    fn page_done(&self, page: &PageProgress) {
        let _ = self.tx.send(CrawlEvent::Page(page.clone()));
    }
}
