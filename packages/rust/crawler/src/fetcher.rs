//! Page fetching.
//!
//! [`Fetcher`] is the single capability the crawler needs: turn a URL into
//! HTML plus the URL it finally resolved to. [`StaticFetcher`] does a plain
//! HTTP GET; the rendered variant lives in [`crate::rendered`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};
use url::Url;

use sitekb_shared::{CrawlJob, FetchError, Result, SiteKbError};

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 10;

/// Raw page as returned by a [`Fetcher`].
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub html: String,
    /// URL after redirects. Used for link resolution and de-duplication.
    pub final_url: Url,
    /// HTTP status, when the transport exposes one.
    pub status: Option<u16>,
}

/// Retrieves raw HTML for a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> std::result::Result<FetchedDocument, FetchError>;

    /// Short name for logs.
    fn name(&self) -> &str;

    /// Release long-lived resources. Called once when a crawl ends.
    async fn shutdown(&self) {}
}

/// Plain HTTP fetcher. No script execution.
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    client: Client,
    timeout: Duration,
    mime_check: bool,
}

impl StaticFetcher {
    pub fn new(job: &CrawlJob) -> Result<Self> {
        let client = Client::builder()
            .user_agent(job.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(job.fetch_timeout)
            .build()
            .map_err(|e| SiteKbError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout: job.fetch_timeout,
            mime_check: job.mime_check,
        })
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> std::result::Result<FetchedDocument, FetchError> {
        debug!("GET");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if self.mime_check {
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            if let Some(ct) = content_type.filter(|ct| !is_text_content_type(ct)) {
                return Err(FetchError::UnsupportedContent(ct));
            }
        }

        let final_url = response.url().clone();
        let html = response.text().await.map_err(|e| self.classify(e))?;

        Ok(FetchedDocument {
            html,
            final_url,
            status: Some(status.as_u16()),
        })
    }

    fn name(&self) -> &str {
        "static"
    }
}

impl StaticFetcher {
    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout.as_millis() as u64)
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// `true` for HTML, XHTML and other `text/*` media types.
fn is_text_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("text/") || mime == "application/xhtml+xml"
}
