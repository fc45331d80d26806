//! Breadth-first frontier, visited set and crawl scope.

use std::collections::{HashSet, VecDeque};

use regex::Regex;
use url::Url;

use sitekb_shared::glob_to_regex;

/// File extensions that never hold page text.
const NON_CONTENT_EXTENSIONS: &[&str] = &[
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp", "rtf", "epub",
    // images
    "jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "ico", "tif", "tiff", "avif",
    // audio and video
    "mp3", "mp4", "wav", "ogg", "webm", "avi", "mov", "mkv", "flv", "m4a", "m4v", "wmv",
    // archives
    "zip", "tar", "gz", "tgz", "bz2", "xz", "rar", "7z",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
    // executables and packages
    "exe", "msi", "dmg", "pkg", "deb", "rpm", "apk", "bin", "iso",
    // assets
    "css", "js",
];

/// Canonical form used for the visited set: no fragment, no trailing slash
/// on non-root paths. Scheme and host are already lowercased by [`Url`].
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    let path = normalized.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        normalized.set_path(path.trim_end_matches('/'));
    }

    normalized.to_string()
}

/// `true` if the URL path ends in an extension that is never page text.
pub fn is_non_content_url(url: &Url) -> bool {
    let Some(last) = url.path_segments().and_then(|mut s| s.next_back()) else {
        return false;
    };
    let Some((_, ext)) = last.rsplit_once('.') else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    NON_CONTENT_EXTENSIONS.contains(&ext.as_str())
}

/// Which discovered URLs the crawl may follow.
///
/// A URL is in scope when its host equals the root host exactly and its path
/// passes the include/exclude globs. Patterns only narrow the scope.
#[derive(Debug, Clone)]
pub struct CrawlScope {
    host: String,
    include_patterns: Vec<Regex>,
    exclude_patterns: Vec<Regex>,
}

impl CrawlScope {
    pub fn new(root: &Url, include: &[String], exclude: &[String]) -> Self {
        Self {
            host: root.host_str().unwrap_or_default().to_ascii_lowercase(),
            include_patterns: include.iter().filter_map(|p| glob_to_regex(p)).collect(),
            exclude_patterns: exclude.iter().filter_map(|p| glob_to_regex(p)).collect(),
        }
    }

    pub fn in_scope(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }
        if url.host_str().unwrap_or_default() != self.host {
            return false;
        }

        let path = url.path();
        if self.exclude_patterns.iter().any(|p| p.is_match(path)) {
            return false;
        }
        self.include_patterns.is_empty() || self.include_patterns.iter().any(|p| p.is_match(path))
    }
}

/// A URL waiting to be fetched and its link distance from the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,
    pub depth: u32,
}

/// FIFO work queue plus the visited set for one crawl.
///
/// FIFO order over depth-incrementing pushes means entries come out in
/// non-decreasing depth. The visited set only grows.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    queued: HashSet<String>,
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new(root: Url) -> Self {
        let mut frontier = Self::default();
        frontier.push(root, 0);
        frontier
    }

    /// Enqueue unless already visited or queued. Returns `true` if added.
    pub fn push(&mut self, url: Url, depth: u32) -> bool {
        let key = normalize_url(&url);
        if self.visited.contains(&key) || !self.queued.insert(key) {
            return false;
        }
        self.queue.push_back(FrontierEntry { url, depth });
        true
    }

    pub fn pop(&mut self) -> Option<FrontierEntry> {
        let entry = self.queue.pop_front()?;
        self.queued.remove(&normalize_url(&entry.url));
        Some(entry)
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(&normalize_url(url))
    }

    /// Returns `true` if the URL was not visited before.
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(normalize_url(url))
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
