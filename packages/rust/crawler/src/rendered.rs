//! Headless-browser fetching.
//!
//! One browser is launched lazily on first use and shared by every fetch.
//! Each fetch opens a tab, waits for navigation to finish plus a short settle
//! period for late network activity, reads the DOM, then closes the tab.

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use sitekb_shared::{BrowserOptions, CrawlJob, FetchError};

use crate::fetcher::{FetchedDocument, Fetcher};

/// Fetcher that renders pages in headless Chromium before reading the HTML.
pub struct RenderedFetcher {
    browser: Mutex<Option<Arc<Browser>>>,
    options: BrowserOptions,
    user_agent: String,
}

impl RenderedFetcher {
    pub fn new(job: &CrawlJob) -> Self {
        Self {
            browser: Mutex::new(None),
            options: job.browser.clone(),
            user_agent: job.user_agent.clone(),
        }
    }

    async fn get_or_launch(&self) -> Result<Arc<Browser>, FetchError> {
        let mut guard = self.browser.lock().await;
        if let Some(browser) = guard.as_ref() {
            return Ok(Arc::clone(browser));
        }

        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={}", self.user_agent))
            .request_timeout(self.options.page_load_timeout);
        if !self.options.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| FetchError::Browser(format!("browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Browser(format!("browser launch failed: {e}")))?;

        tokio::spawn(async move { while handler.next().await.is_some() {} });

        info!(headless = self.options.headless, "Browser launched");
        let shared = Arc::new(browser);
        *guard = Some(Arc::clone(&shared));
        Ok(shared)
    }
}

#[async_trait]
impl Fetcher for RenderedFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        let browser = self.get_or_launch().await?;
        let timeout = self.options.page_load_timeout;
        let timeout_ms = timeout.as_millis() as u64;

        let page = tokio::time::timeout(timeout, browser.new_page(url.as_str()))
            .await
            .map_err(|_| FetchError::Timeout(timeout_ms))?
            .map_err(|e| FetchError::Browser(format!("failed to open page: {e}")))?;

        let settle = self.options.settle;
        let requested = url.clone();
        with_tab(
            page,
            move |page: &Page| {
                Box::pin(async move {
                    // Best effort: some pages never report navigation complete.
                    let _ = tokio::time::timeout(timeout, page.wait_for_navigation()).await;
                    if !settle.is_zero() {
                        tokio::time::sleep(settle).await;
                    }

                    let html = tokio::time::timeout(timeout, page.content())
                        .await
                        .map_err(|_| FetchError::Timeout(timeout_ms))?
                        .map_err(|e| FetchError::Browser(format!("failed to read content: {e}")))?;

                    let final_url = page
                        .url()
                        .await
                        .ok()
                        .flatten()
                        .and_then(|u| Url::parse(&u).ok())
                        .unwrap_or(requested);

                    Ok::<_, FetchError>(FetchedDocument {
                        html,
                        final_url,
                        status: None,
                    })
                })
            },
            |page: Page| {
                Box::pin(async move {
                    if let Err(e) = page.close().await {
                        debug!(error = %e, "Page close error");
                    }
                })
            },
        )
        .await
    }

    fn name(&self) -> &str {
        "rendered"
    }

    /// Close the shared browser if no fetch still holds it.
    async fn shutdown(&self) {
        let mut guard = self.browser.lock().await;
        let Some(browser) = guard.take() else {
            return;
        };
        if let Ok(mut browser) = Arc::try_unwrap(browser) {
            if let Err(e) = browser.close().await {
                warn!(error = %e, "Browser close error");
            }
        }
    }
}

/// Run `read` against an open tab, then `close` it whether or not the read
/// succeeded.
async fn with_tab<P, T>(
    tab: P,
    read: impl for<'a> FnOnce(&'a P) -> BoxFuture<'a, Result<T, FetchError>>,
    close: impl FnOnce(P) -> BoxFuture<'static, ()>,
) -> Result<T, FetchError> {
    let outcome = read(&tab).await;
    close(tab).await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Tab {
        closed: Arc<AtomicUsize>,
    }

    fn close_tab(tab: Tab) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            tab.closed.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn tab_is_closed_when_reading_fails() {
        let closed = Arc::new(AtomicUsize::new(0));
        let outcome: Result<String, FetchError> = with_tab(
            Tab { closed: Arc::clone(&closed) },
            |_tab: &Tab| Box::pin(async { Err::<String, _>(FetchError::Timeout(30_000)) }),
            close_tab,
        )
        .await;

        assert!(matches!(outcome, Err(FetchError::Timeout(30_000))));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tab_is_closed_after_a_successful_read() {
        let closed = Arc::new(AtomicUsize::new(0));
        let outcome = with_tab(
            Tab { closed: Arc::clone(&closed) },
            |_tab: &Tab| Box::pin(async { Ok::<_, FetchError>("<html></html>".to_string()) }),
            close_tab,
        )
        .await;

        assert_eq!(outcome.unwrap(), "<html></html>");
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
