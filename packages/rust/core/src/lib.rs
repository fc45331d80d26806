//! End-to-end sitekb workflows.
//!
//! Ties configuration, fetcher selection, the crawler and output writing
//! together into [`pipeline::run_crawl`] and [`pipeline::scrape_page`].

pub mod pipeline;

pub use pipeline::{
    JobOverrides, OutputTarget, PageScrape, build_job, emit, run_crawl, scrape_page,
    write_knowledge_base,
};
