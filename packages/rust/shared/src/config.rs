//! Application configuration and crawl job definition.
//!
//! User config lives at `~/.sitekb/sitekb.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SiteKbError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sitekb.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sitekb";

/// User-Agent string sent with every request unless overridden.
pub const DEFAULT_USER_AGENT: &str = concat!("sitekb/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Config structs (matching sitekb.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Traversal limits and politeness.
    #[serde(default)]
    pub crawl: CrawlSection,

    /// Chunk sizing.
    #[serde(default)]
    pub chunking: ChunkingSection,

    /// Entity/topic extraction.
    #[serde(default)]
    pub analysis: AnalysisSection,

    /// Headless browser settings for rendered fetches.
    #[serde(default)]
    pub browser: BrowserSection,
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSection {
    /// Maximum link depth from the root URL.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of successfully scraped pages.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Minimum ms between one request completing and the next starting.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Concurrent page workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-request timeout.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Optional overall job deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,

    /// User-Agent header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// URL path include patterns.
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// URL path exclude patterns.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Also reject responses whose Content-Type is not text.
    #[serde(default)]
    pub mime_check: bool,
}

impl Default for CrawlSection {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            delay_ms: default_delay_ms(),
            workers: default_workers(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            deadline_secs: None,
            user_agent: default_user_agent(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            mime_check: false,
        }
    }
}

fn default_max_depth() -> u32 {
    5
}
fn default_max_pages() -> usize {
    100
}
fn default_delay_ms() -> u64 {
    1000
}
fn default_workers() -> usize {
    1
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}

/// `[chunking]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSection {
    /// Maximum characters per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters of trailing context carried into the next chunk.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Restrict each chunk's entities to values occurring in its text.
    #[serde(default = "default_true")]
    pub filter_entities: bool,
}

impl Default for ChunkingSection {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            filter_entities: true,
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_true() -> bool {
    true
}

/// `[analysis]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSection {
    /// Number of topics kept per page.
    #[serde(default = "default_top_topics")]
    pub top_topics: usize,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            top_topics: default_top_topics(),
        }
    }
}

fn default_top_topics() -> usize {
    10
}

/// `[browser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSection {
    /// Run the browser without a visible window.
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Navigation timeout.
    #[serde(default = "default_page_load_timeout_secs")]
    pub page_load_timeout_secs: u64,

    /// Quiet period after navigation before the DOM is captured.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            headless: true,
            page_load_timeout_secs: default_page_load_timeout_secs(),
            settle_ms: default_settle_ms(),
        }
    }
}

fn default_page_load_timeout_secs() -> u64 {
    30
}
fn default_settle_ms() -> u64 {
    500
}

// ---------------------------------------------------------------------------
// CrawlJob (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// How pages are retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Plain HTTP GET, no script execution.
    #[default]
    Static,
    /// Headless-browser navigation.
    Rendered,
}

impl std::str::FromStr for FetchMode {
    type Err = SiteKbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "static" => Ok(Self::Static),
            "rendered" => Ok(Self::Rendered),
            other => Err(SiteKbError::config(format!(
                "unknown fetch mode '{other}': expected 'static' or 'rendered'"
            ))),
        }
    }
}

/// Headless browser options for [`FetchMode::Rendered`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    pub headless: bool,
    pub page_load_timeout: Duration,
    pub settle: Duration,
}

impl From<&BrowserSection> for BrowserOptions {
    fn from(section: &BrowserSection) -> Self {
        Self {
            headless: section.headless,
            page_load_timeout: Duration::from_secs(section.page_load_timeout_secs),
            settle: Duration::from_millis(section.settle_ms),
        }
    }
}

/// One crawl job. Validated once, then owned by the crawler and never mutated.
#[derive(Debug, Clone)]
pub struct CrawlJob {
    /// Crawl root; its host bounds the crawl.
    pub root_url: Url,
    /// Maximum link depth (root = 0).
    pub max_depth: u32,
    /// Upper bound on successfully scraped pages.
    pub max_pages: usize,
    /// Politeness floor between a request completing and the next starting.
    pub delay: Duration,
    /// Static or rendered fetching.
    pub fetch_mode: FetchMode,
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Overlap characters carried between consecutive chunks.
    pub chunk_overlap: usize,
    /// Restrict chunk entities to values present in the chunk text.
    pub filter_chunk_entities: bool,
    /// Number of topics kept per page.
    pub top_topics: usize,
    /// Concurrent page workers.
    pub workers: usize,
    /// Per-fetch timeout.
    pub fetch_timeout: Duration,
    /// Optional overall deadline.
    pub deadline: Option<Duration>,
    /// User-Agent header value.
    pub user_agent: String,
    /// Path include globs (empty = everything on the host).
    pub include_patterns: Vec<String>,
    /// Path exclude globs.
    pub exclude_patterns: Vec<String>,
    /// Reject non-text Content-Type responses.
    pub mime_check: bool,
    /// Headless browser options.
    pub browser: BrowserOptions,
}

impl CrawlJob {
    /// Job with every setting at its default.
    pub fn new(root_url: Url) -> Self {
        Self::from_config(root_url, &AppConfig::default())
    }

    /// Job seeded from a loaded config.
    pub fn from_config(root_url: Url, config: &AppConfig) -> Self {
        Self {
            root_url,
            max_depth: config.crawl.max_depth,
            max_pages: config.crawl.max_pages,
            delay: Duration::from_millis(config.crawl.delay_ms),
            fetch_mode: FetchMode::Static,
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
            filter_chunk_entities: config.chunking.filter_entities,
            top_topics: config.analysis.top_topics,
            workers: config.crawl.workers,
            fetch_timeout: Duration::from_secs(config.crawl.fetch_timeout_secs),
            deadline: config.crawl.deadline_secs.map(Duration::from_secs),
            user_agent: config.crawl.user_agent.clone(),
            include_patterns: config.crawl.include_patterns.clone(),
            exclude_patterns: config.crawl.exclude_patterns.clone(),
            mime_check: config.crawl.mime_check,
            browser: BrowserOptions::from(&config.browser),
        }
    }

    /// Reject invalid parameters before any work is done.
    pub fn validate(&self) -> Result<()> {
        match self.root_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(SiteKbError::config(format!(
                    "root URL scheme must be http or https, got '{other}'"
                )));
            }
        }
        if self.root_url.host_str().is_none_or(str::is_empty) {
            return Err(SiteKbError::config("root URL has no host"));
        }
        if self.max_pages == 0 {
            return Err(SiteKbError::config("max_pages must be greater than 0"));
        }
        if self.chunk_size == 0 {
            return Err(SiteKbError::config("chunk_size must be greater than 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(SiteKbError::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.workers == 0 {
            return Err(SiteKbError::config("workers must be at least 1"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(SiteKbError::config("fetch timeout must be greater than 0"));
        }
        if self.top_topics == 0 {
            return Err(SiteKbError::config("top_topics must be greater than 0"));
        }
        for pattern in self.include_patterns.iter().chain(&self.exclude_patterns) {
            if glob_to_regex(pattern).is_none() {
                return Err(SiteKbError::config(format!("invalid path pattern '{pattern}'")));
            }
        }
        Ok(())
    }
}

/// Parse a user-supplied root URL, assuming `https://` when no scheme is given.
pub fn parse_root_url(input: &str) -> Result<Url> {
    let trimmed = input.trim();
    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    Url::parse(&candidate)
        .map_err(|e| SiteKbError::config(format!("invalid root URL '{input}': {e}")))
}

/// Convert a glob-like path pattern (`*`, `**`, `?`) to an anchored regex.
pub fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", ".");
    Regex::new(&format!("^{escaped}$")).ok()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sitekb/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| SiteKbError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sitekb/sitekb.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SiteKbError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SiteKbError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SiteKbError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| SiteKbError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SiteKbError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
