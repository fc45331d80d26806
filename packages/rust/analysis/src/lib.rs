//! Entity and topic analysis for extracted page text.
//!
//! Everything here is deterministic: the same text always produces the same
//! entities and the same ranked topics.

mod entities;
mod tokens;
mod topics;
mod vocab;

pub use entities::extract_entities;
pub use topics::{MAX_TERM_WORDS, extract_topics};

use sitekb_shared::{EntityCollection, StructuredSignals};
use tracing::debug;

/// Default number of topics kept per page.
pub const DEFAULT_TOP_TOPICS: usize = 10;

/// Entities and ranked topics of one text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageAnalysis {
    pub entities: EntityCollection,
    pub topics: Vec<String>,
}

/// Runs entity extraction and topic ranking.
#[derive(Debug, Clone)]
pub struct Analyzer {
    top_topics: usize,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_TOPICS)
    }
}

impl Analyzer {
    pub fn new(top_topics: usize) -> Self {
        Self { top_topics }
    }

    /// Analyze text whose structured signals were already extracted.
    pub fn analyze(&self, text: &str, signals: &StructuredSignals) -> PageAnalysis {
        let entities = extract_entities(text, signals);
        let topics = extract_topics(text, self.top_topics);
        debug!(
            entities = entities.total(),
            topics = topics.len(),
            "Analyzed text"
        );
        PageAnalysis { entities, topics }
    }

    /// Analyze plain text, scanning it for contact signals first.
    pub fn analyze_text(&self, text: &str) -> PageAnalysis {
        let signals = sitekb_extract::extract_signals(text);
        self.analyze(text, &signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitekb_shared::EntityCategory;

    const TEXT: &str = "Northwind Analytics Inc. builds data pipelines for retail teams. \
        Our platform runs on Kubernetes and AWS. We are based in Seattle.\n\n\
        Contact hello@northwind.example or call +1 (206) 555-0142 about data pipelines.";

    #[test]
    fn analyze_text_fills_contact_info() {
        let analysis = Analyzer::default().analyze_text(TEXT);
        let contact = analysis
            .entities
            .get(EntityCategory::ContactInfo)
            .expect("category present");
        assert!(contact.contains("hello@northwind.example"));
        assert_eq!(contact.len(), 2);
    }

    #[test]
    fn analysis_is_idempotent() {
        let analyzer = Analyzer::new(5);
        let first = analyzer.analyze_text(TEXT);
        let second = analyzer.analyze_text(TEXT);
        assert_eq!(first, second);
        assert!(first.topics.len() <= 5);
    }

    #[test]
    fn top_topic_is_repeated_phrase() {
        let analysis = Analyzer::default().analyze_text(TEXT);
        assert_eq!(analysis.topics[0], "data pipelines");
    }

    #[test]
    fn empty_text_is_empty_analysis() {
        let analysis = Analyzer::default().analyze_text("");
        assert!(analysis.entities.is_empty());
        assert!(analysis.topics.is_empty());
    }
}
