//! Crawl and scrape pipelines: URL + config → job → fetcher → crawl → output.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use sitekb_artifacts::OutputFormat;
use sitekb_crawler::{CrawlReport, Crawler, PageProcessor, ProgressReporter, fetcher_for};
use sitekb_shared::{
    AppConfig, Chunk, CrawlJob, FetchMode, KnowledgeBase, PageRecord, Result, SiteKbError,
    Warning, parse_root_url,
};

/// Command-line values that win over the config file.
///
/// `None` (or an empty list) keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct JobOverrides {
    pub max_depth: Option<u32>,
    pub max_pages: Option<usize>,
    pub delay_ms: Option<u64>,
    pub fetch_mode: Option<FetchMode>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub workers: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub deadline_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub mime_check: bool,
    /// Show the browser window in rendered mode.
    pub headed: bool,
}

/// Merge defaults, config file and CLI overrides into a validated job.
pub fn build_job(url: &str, config: &AppConfig, overrides: &JobOverrides) -> Result<CrawlJob> {
    let mut job = CrawlJob::from_config(parse_root_url(url)?, config);

    if let Some(v) = overrides.max_depth {
        job.max_depth = v;
    }
    if let Some(v) = overrides.max_pages {
        job.max_pages = v;
    }
    if let Some(v) = overrides.delay_ms {
        job.delay = Duration::from_millis(v);
    }
    if let Some(v) = overrides.fetch_mode {
        job.fetch_mode = v;
    }
    if let Some(v) = overrides.chunk_size {
        job.chunk_size = v;
    }
    if let Some(v) = overrides.chunk_overlap {
        job.chunk_overlap = v;
    }
    if let Some(v) = overrides.workers {
        job.workers = v;
    }
    if let Some(v) = overrides.timeout_secs {
        job.fetch_timeout = Duration::from_secs(v);
    }
    if let Some(v) = overrides.deadline_secs {
        job.deadline = Some(Duration::from_secs(v));
    }
    if let Some(v) = &overrides.user_agent {
        job.user_agent = v.clone();
    }
    if !overrides.include_patterns.is_empty() {
        job.include_patterns = overrides.include_patterns.clone();
    }
    if !overrides.exclude_patterns.is_empty() {
        job.exclude_patterns = overrides.exclude_patterns.clone();
    }
    if overrides.mime_check {
        job.mime_check = true;
    }
    if overrides.headed {
        job.browser.headless = false;
    }

    job.validate()?;
    Ok(job)
}

/// Crawl the job's site. Configuration errors fail here, before any fetch;
/// per-page failures end up in the report's knowledge base.
#[instrument(skip_all, fields(root = %job.root_url, mode = ?job.fetch_mode))]
pub async fn run_crawl(
    job: CrawlJob,
    progress: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> Result<CrawlReport> {
    let fetcher = fetcher_for(&job)?;
    let mut crawler = Crawler::new(job, fetcher)?;
    Ok(crawler.crawl(progress, cancel).await)
}

/// One page, fetched and processed without traversal.
#[derive(Debug, Clone)]
pub struct PageScrape {
    pub record: PageRecord,
    pub chunks: Vec<Chunk>,
    pub warnings: Vec<Warning>,
}

/// Fetch only the job's root URL and run it through the page pipeline.
#[instrument(skip_all, fields(url = %job.root_url))]
pub async fn scrape_page(job: &CrawlJob) -> Result<PageScrape> {
    job.validate()?;
    let fetcher = fetcher_for(job)?;
    let processor = PageProcessor::new(job, fetcher)?;

    let outcome = processor.process(&job.root_url, 0).await;
    processor.shutdown().await;
    let page = outcome?;

    info!(
        words = page.record.word_count,
        chunks = page.chunks.len(),
        "Scraped page"
    );

    Ok(PageScrape {
        record: page.record,
        chunks: page.chunks,
        warnings: page.warnings,
    })
}

/// Where serialized output goes.
#[derive(Debug, Clone, Default)]
pub enum OutputTarget {
    #[default]
    Stdout,
    File(PathBuf),
}

/// Render the knowledge base and write it to the target.
pub fn write_knowledge_base(
    kb: &KnowledgeBase,
    format: OutputFormat,
    include_links: bool,
    target: &OutputTarget,
) -> Result<()> {
    let content = sitekb_artifacts::render(kb, format, include_links)?;
    emit(&content, target)?;
    if let OutputTarget::File(path) = target {
        info!(path = %path.display(), format = %format, "Wrote knowledge base");
    }
    Ok(())
}

/// Write already-rendered output to the target.
pub fn emit(content: &str, target: &OutputTarget) -> Result<()> {
    match target {
        OutputTarget::File(path) => sitekb_artifacts::write_output(path, content),
        OutputTarget::Stdout => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(content.as_bytes())
                .and_then(|()| stdout.flush())
                .map_err(|e| SiteKbError::io("<stdout>", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitekb_crawler::{CrawlState, SilentProgress, Termination};
    use sitekb_shared::{FetchError, FetchStatus};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast(server: &MockServer) -> CrawlJob {
        let overrides = JobOverrides {
            delay_ms: Some(0),
            timeout_secs: Some(5),
            ..Default::default()
        };
        build_job(&server.uri(), &AppConfig::default(), &overrides).unwrap()
    }

    #[test]
    fn overrides_win_over_config() {
        let mut config = AppConfig::default();
        config.crawl.max_depth = 2;
        config.crawl.max_pages = 40;
        config.chunking.chunk_size = 600;

        let overrides = JobOverrides {
            max_pages: Some(7),
            fetch_mode: Some(FetchMode::Rendered),
            deadline_secs: Some(90),
            headed: true,
            include_patterns: vec!["/docs/**".into()],
            ..Default::default()
        };
        let job = build_job("example.com/docs", &config, &overrides).unwrap();

        assert_eq!(job.root_url.as_str(), "https://example.com/docs");
        assert_eq!(job.max_depth, 2);
        assert_eq!(job.max_pages, 7);
        assert_eq!(job.chunk_size, 600);
        assert_eq!(job.fetch_mode, FetchMode::Rendered);
        assert_eq!(job.deadline, Some(Duration::from_secs(90)));
        assert!(!job.browser.headless);
        assert_eq!(job.include_patterns, vec!["/docs/**".to_string()]);
    }

    #[test]
    fn invalid_overrides_fail_validation() {
        let overrides = JobOverrides {
            chunk_size: Some(100),
            chunk_overlap: Some(100),
            ..Default::default()
        };
        let err = build_job("https://example.com", &AppConfig::default(), &overrides).unwrap_err();
        assert!(matches!(err, SiteKbError::Config { .. }));

        let err = build_job("http://", &AppConfig::default(), &JobOverrides::default())
            .unwrap_err();
        assert!(matches!(err, SiteKbError::Config { .. }));
    }

    #[tokio::test]
    async fn crawl_and_write_jsonl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><head><title>Home</title></head><body>
                <p>Contoso Ltd builds data tools in London.</p><a href="/about">About</a>
                </body></html>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/about"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><body><p>We write Rust services.</p></body></html>",
            ))
            .mount(&server)
            .await;

        let report = run_crawl(fast(&server), &SilentProgress, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.state, CrawlState::Completed);
        assert_eq!(report.termination, Termination::FrontierExhausted);
        assert_eq!(report.knowledge_base.total_pages, 2);

        let path = std::env::temp_dir().join(format!("sitekb-{}.jsonl", uuid::Uuid::now_v7()));
        write_knowledge_base(
            &report.knowledge_base,
            OutputFormat::Jsonl,
            false,
            &OutputTarget::File(path.clone()),
        )
        .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let lines: Vec<serde_json::Value> = written
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["record"], "summary");
        assert_eq!(lines.len(), 1 + report.knowledge_base.total_chunks);
    }

    #[tokio::test]
    async fn scrape_fetches_only_the_given_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><p>Single page.</p><a href="/next">Next</a></body></html>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/next"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let scrape = scrape_page(&fast(&server)).await.unwrap();
        assert_eq!(scrape.record.status, FetchStatus::Ok);
        assert_eq!(scrape.record.links.len(), 1);
        assert_eq!(scrape.chunks.len(), 1);
    }

    #[tokio::test]
    async fn scrape_surfaces_fetch_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = scrape_page(&fast(&server)).await.unwrap_err();
        assert!(matches!(err, SiteKbError::Fetch(FetchError::Status(404))));
    }
}
