//! Site crawler.
//!
//! - [`engine`]: breadth-first, scope-aware crawl producing a knowledge base
//! - [`fetcher`]: the [`Fetcher`] seam and the plain HTTP implementation
//! - `rendered`: headless-browser fetcher (feature `rendered`)
//! - [`page`]: per-page fetch, extract, analyze and chunk

pub mod engine;
pub mod fetcher;
pub mod frontier;
pub mod gate;
pub mod page;
pub mod progress;
#[cfg(feature = "rendered")]
pub mod rendered;

use std::sync::Arc;

use sitekb_shared::{CrawlJob, FetchMode, Result};

pub use engine::{CrawlReport, Crawler, Termination};
pub use fetcher::{FetchedDocument, Fetcher, StaticFetcher};
pub use frontier::{CrawlScope, Frontier, FrontierEntry, is_non_content_url, normalize_url};
pub use gate::PolitenessGate;
pub use page::{PageProcessor, ProcessedPage};
pub use progress::{
    ChannelProgress, CrawlEvent, CrawlState, PageProgress, ProgressReporter, SilentProgress,
};
#[cfg(feature = "rendered")]
pub use rendered::RenderedFetcher;

/// Build the fetcher selected by the job's fetch mode.
pub fn fetcher_for(job: &CrawlJob) -> Result<Arc<dyn Fetcher>> {
    match job.fetch_mode {
        FetchMode::Static => Ok(Arc::new(StaticFetcher::new(job)?)),
        #[cfg(feature = "rendered")]
        FetchMode::Rendered => Ok(Arc::new(RenderedFetcher::new(job))),
        #[cfg(not(feature = "rendered"))]
        FetchMode::Rendered => Err(sitekb_shared::SiteKbError::config(
            "rendered fetching requires the 'rendered' feature",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn static_mode_builds_http_fetcher() {
        let job = CrawlJob::new(Url::parse("https://example.com").unwrap());
        let fetcher = fetcher_for(&job).unwrap();
        assert_eq!(fetcher.name(), "static");
    }

    #[cfg(feature = "rendered")]
    #[test]
    fn rendered_mode_builds_browser_fetcher_lazily() {
        let mut job = CrawlJob::new(Url::parse("https://example.com").unwrap());
        job.fetch_mode = FetchMode::Rendered;
        // No browser is launched until the first fetch.
        let fetcher = fetcher_for(&job).unwrap();
        assert_eq!(fetcher.name(), "rendered");
    }
}
