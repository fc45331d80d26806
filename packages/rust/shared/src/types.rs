//! Core domain types for sitekb knowledge bases.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FailureKind;

/// Current schema version for the knowledge base document.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// KbId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for knowledge base identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KbId(pub Uuid);

impl KbId {
    /// Generate a new time-sortable identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for KbId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for KbId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

/// Outcome of processing one frontier entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Ok,
    Skipped,
    Failed,
}

/// Pattern-matched contact and commercial signals found in page text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredSignals {
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(default)]
    pub prices: Vec<String>,
    #[serde(default)]
    pub dates: Vec<String>,
}

impl StructuredSignals {
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
            && self.phones.is_empty()
            && self.prices.is_empty()
            && self.dates.is_empty()
    }
}

/// An outbound anchor, resolved to an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

/// One successfully fetched, in-scope page. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    /// URL taken off the frontier.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    /// Link depth from the root.
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Cleaned text. Carried by the chunks in serialized output.
    #[serde(default, skip_serializing)]
    pub text: String,
    pub word_count: usize,
    pub char_count: usize,
    /// SHA-256 of the cleaned text.
    pub content_hash: String,
    #[serde(default)]
    pub links: Vec<PageLink>,
    #[serde(default)]
    pub signals: StructuredSignals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub fetched_at: DateTime<Utc>,
    pub status: FetchStatus,
    #[serde(default)]
    pub topics: Vec<String>,
    /// Page-level entities before any per-chunk filtering.
    #[serde(default)]
    pub entities: EntityCollection,
}

/// A frontier entry that could not be turned into a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailure {
    pub url: String,
    pub depth: u32,
    pub kind: FailureKind,
    pub message: String,
}

/// Non-fatal degradation recorded during processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub kind: WarningKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A sentence longer than the chunk size was split mid-sentence.
    HardSplit,
    /// A record was dropped while building the knowledge base.
    MalformedRecord,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Fixed set of entity categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Companies,
    Products,
    Services,
    Technologies,
    Locations,
    ContactInfo,
}

impl EntityCategory {
    pub const ALL: [EntityCategory; 6] = [
        Self::Companies,
        Self::Products,
        Self::Services,
        Self::Technologies,
        Self::Locations,
        Self::ContactInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Companies => "companies",
            Self::Products => "products",
            Self::Services => "services",
            Self::Technologies => "technologies",
            Self::Locations => "locations",
            Self::ContactInfo => "contact_info",
        }
    }
}

/// De-duplication key for an entity value: trimmed, whitespace-collapsed, lowercased.
pub fn entity_key(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Distinct values of one category. The first spelling seen for a key is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct EntitySet(BTreeMap<String, String>);

impl EntitySet {
    /// Insert a value; returns `false` if an equivalent value was already present.
    pub fn insert(&mut self, value: &str) -> bool {
        let key = entity_key(value);
        if key.is_empty() || self.0.contains_key(&key) {
            return false;
        }
        let display = value.split_whitespace().collect::<Vec<_>>().join(" ");
        self.0.insert(key, display);
        true
    }

    pub fn contains(&self, value: &str) -> bool {
        self.0.contains_key(&entity_key(value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values in key order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }
}

impl From<Vec<String>> for EntitySet {
    fn from(values: Vec<String>) -> Self {
        let mut set = Self::default();
        for v in &values {
            set.insert(v);
        }
        set
    }
}

impl From<EntitySet> for Vec<String> {
    fn from(set: EntitySet) -> Self {
        set.0.into_values().collect()
    }
}

/// Category → distinct values. Every category is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityCollection(BTreeMap<EntityCategory, EntitySet>);

impl Default for EntityCollection {
    fn default() -> Self {
        Self(
            EntityCategory::ALL
                .iter()
                .map(|c| (*c, EntitySet::default()))
                .collect(),
        )
    }
}

impl EntityCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: EntityCategory, value: &str) -> bool {
        self.0.entry(category).or_default().insert(value)
    }

    pub fn get(&self, category: EntityCategory) -> Option<&EntitySet> {
        self.0.get(&category)
    }

    /// Union `other` into `self` without losing categories.
    pub fn merge(&mut self, other: &EntityCollection) {
        for (category, set) in &other.0 {
            let target = self.0.entry(*category).or_default();
            for value in set.values() {
                target.insert(value);
            }
        }
    }

    /// Copy keeping only values that occur (case-insensitively) in `text`.
    pub fn retain_mentioned(&self, text: &str) -> EntityCollection {
        let haystack = entity_key(text);
        let mut out = EntityCollection::new();
        for (category, set) in &self.0 {
            for value in set.values() {
                if haystack.contains(&entity_key(value)) {
                    out.insert(*category, value);
                }
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityCategory, &EntitySet)> {
        self.0.iter().map(|(c, s)| (*c, s))
    }

    /// Total number of values across all categories.
    pub fn total(&self) -> usize {
        self.0.values().map(EntitySet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

// ---------------------------------------------------------------------------
// Chunks and knowledge base
// ---------------------------------------------------------------------------

/// Provenance and analysis carried by every chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub depth: u32,
    pub word_count: usize,
    pub char_count: usize,
    pub timestamp: DateTime<Utc>,
    pub entities: EntityCollection,
    pub topics: Vec<String>,
}

/// A sentence-aligned span of page text sized for embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable id derived from the source URL and index.
    pub chunk_id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub token_count: usize,
}

/// The aggregated output of one crawl job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub schema_version: u32,
    pub id: KbId,
    pub root_url: String,
    pub total_pages: usize,
    pub total_chunks: usize,
    pub total_tokens: usize,
    pub total_words: usize,
    pub entities: EntityCollection,
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Pages in discovery order.
    pub pages: Vec<PageRecord>,
    /// Per-page failures, for observability.
    #[serde(default)]
    pub failures: Vec<PageFailure>,
    pub chunks: Vec<Chunk>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_set_dedups_case_and_whitespace() {
        let mut set = EntitySet::default();
        assert!(set.insert("Acme  Corp"));
        assert!(!set.insert(" acme corp "));
        assert!(set.insert("Globex Inc"));
        assert_eq!(set.len(), 2);
        assert!(set.contains("ACME CORP"));
        assert_eq!(set.values().collect::<Vec<_>>(), vec!["Acme Corp", "Globex Inc"]);
    }

    #[test]
    fn collection_always_has_every_category() {
        let entities = EntityCollection::new();
        let json = serde_json::to_value(&entities).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 6);
        assert!(obj.contains_key("contact_info"));
        assert!(entities.is_empty());
    }

    #[test]
    fn merge_keeps_categories_apart() {
        let mut a = EntityCollection::new();
        a.insert(EntityCategory::Technologies, "Rust");
        a.insert(EntityCategory::Locations, "Berlin");

        let mut b = EntityCollection::new();
        b.insert(EntityCategory::Technologies, "rust");
        b.insert(EntityCategory::Technologies, "PostgreSQL");
        b.insert(EntityCategory::Companies, "Acme Inc");

        a.merge(&b);
        assert_eq!(a.get(EntityCategory::Technologies).unwrap().len(), 2);
        assert_eq!(a.get(EntityCategory::Locations).unwrap().len(), 1);
        assert_eq!(a.get(EntityCategory::Companies).unwrap().len(), 1);
        assert_eq!(a.total(), 4);
    }

    #[test]
    fn retain_mentioned_filters_to_text() {
        let mut entities = EntityCollection::new();
        entities.insert(EntityCategory::Technologies, "Rust");
        entities.insert(EntityCategory::Technologies, "Kubernetes");

        let kept = entities.retain_mentioned("We write our services in   RUST.");
        let techs = kept.get(EntityCategory::Technologies).unwrap();
        assert!(techs.contains("rust"));
        assert!(!techs.contains("kubernetes"));
    }

    #[test]
    fn entity_collection_roundtrip() {
        let mut entities = EntityCollection::new();
        entities.insert(EntityCategory::ContactInfo, "hello@example.com");
        let json = serde_json::to_string(&entities).unwrap();
        let parsed: EntityCollection = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entities);
    }

    #[test]
    fn page_text_is_not_serialized() {
        let page = PageRecord {
            url: "https://example.com/".into(),
            final_url: "https://example.com/".into(),
            depth: 0,
            title: Some("Home".into()),
            text: "body text".into(),
            word_count: 2,
            char_count: 9,
            content_hash: "abc".into(),
            links: vec![],
            signals: StructuredSignals::default(),
            http_status: Some(200),
            fetched_at: Utc::now(),
            status: FetchStatus::Ok,
            topics: vec![],
            entities: EntityCollection::new(),
        };
        let json = serde_json::to_value(&page).unwrap();
        assert!(json.get("text").is_none());
        assert_eq!(json["status"], "ok");
    }
}
