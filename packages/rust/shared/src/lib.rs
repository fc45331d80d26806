//! Shared types, error model, configuration and text primitives for sitekb.
//!
//! This crate is the foundation depended on by all other sitekb crates.
//! It provides:
//! - [`SiteKbError`] and [`FetchError`], the error taxonomy
//! - Domain types ([`PageRecord`], [`Chunk`], [`EntityCollection`], [`KnowledgeBase`])
//! - Configuration ([`AppConfig`], [`CrawlJob`], config loading)
//! - [`text`], paragraph/sentence segmentation and the token estimator

pub mod config;
pub mod error;
pub mod text;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AnalysisSection, AppConfig, BrowserOptions, BrowserSection, ChunkingSection, CrawlJob,
    CrawlSection, DEFAULT_USER_AGENT, FetchMode, config_dir, config_file_path, glob_to_regex,
    init_config, load_config, load_config_from, parse_root_url,
};
pub use error::{FailureKind, FetchError, Result, SiteKbError};
pub use types::{
    CURRENT_SCHEMA_VERSION, Chunk, ChunkMetadata, EntityCategory, EntityCollection, EntitySet,
    FetchStatus, KbId, KnowledgeBase, PageFailure, PageLink, PageRecord, StructuredSignals,
    Warning, WarningKind, entity_key,
};
