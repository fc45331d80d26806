//! Sentence-aligned chunking with overlap.
//!
//! Text is segmented into paragraphs and sentences. Sentences accumulate into
//! a chunk until the next one would push it past `max_chars`; the following
//! chunk is then seeded with trailing sentences of the one just closed, up to
//! `overlap_chars`. A sentence longer than `max_chars` on its own is split at
//! character boundaries and reported as a [`WarningKind::HardSplit`].
//!
//! All lengths are counted in Unicode scalar values.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sitekb_shared::text::{count_words, estimate_tokens, split_paragraphs, split_sentences};
use sitekb_shared::{
    Chunk, ChunkMetadata, CrawlJob, EntityCollection, Result, SiteKbError, Warning, WarningKind,
};
use tracing::{debug, warn};

/// Chunk sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    pub max_chars: usize,
    pub overlap_chars: usize,
    /// Keep only page entities that occur in the chunk's own text.
    pub filter_entities: bool,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_chars: 1000,
            overlap_chars: 200,
            filter_entities: true,
        }
    }
}

impl ChunkOptions {
    pub fn from_job(job: &CrawlJob) -> Self {
        Self {
            max_chars: job.chunk_size,
            overlap_chars: job.chunk_overlap,
            filter_entities: job.filter_chunk_entities,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(SiteKbError::config("chunk size must be greater than zero"));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(SiteKbError::config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

/// Page-level data every chunk of the page inherits.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub url: &'a str,
    pub title: Option<&'a str>,
    pub depth: u32,
    pub timestamp: DateTime<Utc>,
    pub entities: &'a EntityCollection,
    pub topics: &'a [String],
}

/// Chunks of one page plus any degraded-case warnings.
#[derive(Debug, Clone, Default)]
pub struct ChunkOutput {
    pub chunks: Vec<Chunk>,
    pub warnings: Vec<Warning>,
}

/// Stable chunk id: first 16 hex digits of SHA-256(`url#index`).
pub fn chunk_id(url: &str, index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{url}#{index}").as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// A sentence and the paragraph it came from.
#[derive(Debug, Clone)]
struct Piece<'t> {
    text: &'t str,
    chars: usize,
    paragraph: usize,
}

/// Chunk under construction.
#[derive(Debug, Default)]
struct Window<'t> {
    pieces: Vec<Piece<'t>>,
    /// `true` once a sentence beyond the overlap seed has been added.
    fresh: bool,
}

impl<'t> Window<'t> {
    fn separator(prev: &Piece<'_>, next: &Piece<'_>) -> usize {
        if prev.paragraph == next.paragraph { 1 } else { 2 }
    }

    fn len(&self) -> usize {
        let separators: usize = self
            .pieces
            .windows(2)
            .map(|w| Self::separator(&w[0], &w[1]))
            .sum();
        self.pieces.iter().map(|p| p.chars).sum::<usize>() + separators
    }

    fn len_with(&self, next: &Piece<'_>) -> usize {
        match self.pieces.last() {
            Some(last) => self.len() + Self::separator(last, next) + next.chars,
            None => next.chars,
        }
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for (i, piece) in self.pieces.iter().enumerate() {
            if i > 0 {
                out.push_str(if self.pieces[i - 1].paragraph == piece.paragraph {
                    " "
                } else {
                    "\n\n"
                });
            }
            out.push_str(piece.text);
        }
        out
    }

    /// Trailing pieces whose joined length stays within `overlap`. Falls back
    /// to the last sentence alone so consecutive chunks always share context.
    fn overlap_seed(&self, overlap: usize) -> Vec<Piece<'t>> {
        if overlap == 0 {
            return Vec::new();
        }
        let mut seed: Vec<Piece<'t>> = Vec::new();
        let mut total = 0;
        for piece in self.pieces.iter().rev() {
            let added = match seed.first() {
                Some(first) => piece.chars + Self::separator(piece, first),
                None => piece.chars,
            };
            if total + added > overlap {
                break;
            }
            total += added;
            seed.insert(0, piece.clone());
        }
        if seed.is_empty() {
            if let Some(last) = self.pieces.last() {
                seed.push(last.clone());
            }
        }
        seed
    }
}

/// Splits page text into [`Chunk`]s.
#[derive(Debug, Clone)]
pub struct Chunker {
    options: ChunkOptions,
}

impl Chunker {
    /// Fails if the overlap is not smaller than the chunk size.
    pub fn new(options: ChunkOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &ChunkOptions {
        &self.options
    }

    /// Chunk one page. Empty text yields no chunks.
    pub fn chunk(&self, text: &str, page: &PageContext<'_>) -> ChunkOutput {
        let max = self.options.max_chars;
        let mut contents: Vec<String> = Vec::new();
        let mut warnings = Vec::new();
        let mut window = Window::default();

        for (paragraph, para) in split_paragraphs(text).into_iter().enumerate() {
            for sentence in split_sentences(para) {
                let piece = Piece {
                    text: sentence,
                    chars: sentence.chars().count(),
                    paragraph,
                };

                if piece.chars > max {
                    if window.fresh {
                        contents.push(window.render());
                    }
                    window = Window::default();

                    let parts = self.hard_split(sentence);
                    warn!(
                        url = page.url,
                        sentence_chars = piece.chars,
                        parts = parts.len(),
                        "Sentence longer than chunk size, splitting mid-sentence"
                    );
                    warnings.push(Warning {
                        url: Some(page.url.to_string()),
                        kind: WarningKind::HardSplit,
                        message: format!(
                            "sentence of {} characters split into {} parts",
                            piece.chars,
                            parts.len()
                        ),
                    });
                    contents.extend(parts);
                    continue;
                }

                if !window.pieces.is_empty() && window.len_with(&piece) > max {
                    contents.push(window.render());
                    let mut seeded = Window {
                        pieces: window.overlap_seed(self.options.overlap_chars),
                        fresh: false,
                    };
                    while !seeded.pieces.is_empty() && seeded.len_with(&piece) > max {
                        seeded.pieces.remove(0);
                    }
                    window = seeded;
                }

                window.pieces.push(piece);
                window.fresh = true;
            }
        }

        if window.fresh {
            contents.push(window.render());
        }

        let total = contents.len();
        let chunks: Vec<Chunk> = contents
            .into_iter()
            .enumerate()
            .map(|(index, content)| self.build_chunk(content, index, total, page))
            .collect();

        debug!(url = page.url, chunks = chunks.len(), "Chunked page");
        ChunkOutput { chunks, warnings }
    }

    /// Fixed-width windows over an over-long sentence, overlapping like chunks do.
    fn hard_split(&self, sentence: &str) -> Vec<String> {
        let chars: Vec<char> = sentence.chars().collect();
        let max = self.options.max_chars;
        let step = max - self.options.overlap_chars;
        let mut parts = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + max).min(chars.len());
            let part: String = chars[start..end].iter().collect();
            let part = part.trim();
            if !part.is_empty() {
                parts.push(part.to_string());
            }
            if end == chars.len() {
                break;
            }
            start += step;
        }

        parts
    }

    fn build_chunk(
        &self,
        content: String,
        index: usize,
        total: usize,
        page: &PageContext<'_>,
    ) -> Chunk {
        let entities = if self.options.filter_entities {
            page.entities.retain_mentioned(&content)
        } else {
            page.entities.clone()
        };

        Chunk {
            chunk_id: chunk_id(page.url, index),
            metadata: ChunkMetadata {
                source_url: page.url.to_string(),
                title: page.title.map(str::to_string),
                depth: page.depth,
                word_count: count_words(&content),
                char_count: content.chars().count(),
                timestamp: page.timestamp,
                entities,
                topics: page.topics.to_vec(),
            },
            chunk_index: index,
            total_chunks: total,
            token_count: estimate_tokens(&content),
            content,
        }
    }
}
