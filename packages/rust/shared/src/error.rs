//! Error types for sitekb.
//!
//! Library crates use [`SiteKbError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level error type for all sitekb operations.
#[derive(Debug, thiserror::Error)]
pub enum SiteKbError {
    /// Invalid job parameters or unreadable config. Fails a job before crawling.
    #[error("config error: {message}")]
    Config { message: String },

    /// A page fetch failed.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Output serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Data validation error (malformed record, invalid URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SiteKbError>;

impl SiteKbError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for SiteKbError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Fetch errors
// ---------------------------------------------------------------------------

/// Failure of a single page fetch. Always recorded per page, never fatal to a crawl.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or body-read failure.
    #[error("network failure: {0}")]
    Network(String),

    /// The per-request timeout elapsed.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// The server answered with a non-2xx status.
    #[error("HTTP status {0}")]
    Status(u16),

    /// The response is not text/HTML.
    #[error("unsupported content type: {0}")]
    UnsupportedContent(String),

    /// Headless browser launch, navigation or session failure.
    #[error("browser error: {0}")]
    Browser(String),

    /// The crawl was cancelled before the request went out.
    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    /// Serialisable kind used in failure reports.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network(_) => FailureKind::Network,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Status(_) => FailureKind::Status,
            Self::UnsupportedContent(_) => FailureKind::UnsupportedContent,
            Self::Browser(_) => FailureKind::Browser,
            Self::Cancelled => FailureKind::Cancelled,
        }
    }
}

/// Coarse classification of a per-page failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    Timeout,
    Status,
    UnsupportedContent,
    Browser,
    Cancelled,
}
