
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::corpus::Document;
use crate::{RagError, Result};

/// Natural boundaries in order of preference: blank line, newline, space.
const SEPARATORS: [&[char]; 3] = [&['\n', '\n'], &['\n'], &[' ']];

/// A chunk of a document ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChunk {
    /// The chunk text
    pub content: String,
    /// Title of the document this chunk was cut from
    pub source: String,
    /// Position of this chunk within its document
    pub chunk_index: usize,
}

/// Configuration for content chunking, measured in characters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum length of a chunk
    pub chunk_size: usize,
    /// Number of characters a chunk repeats from the end of its predecessor
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Split text into overlapping segments of at most `chunk_size` characters.
///
/// Each cut is placed after the last blank line, newline or space in the
/// window, in that order of preference, falling back to a hard cut at
/// `chunk_size`. Every segment after the first starts `chunk_overlap`
/// characters before the end of the previous one.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    config.validate()?;

    let chars: Vec<char> = text.trim().chars().collect();
    let mut segments = Vec::new();

    let mut start = 0;
    while start < chars.len() {
        if chars.len() - start <= config.chunk_size {
            push_segment(&mut segments, &chars[start..]);
            break;
        }

        let cut = find_cut(&chars, start, config.chunk_size, config.chunk_overlap);
        push_segment(&mut segments, &chars[start..cut]);
        start = cut - config.chunk_overlap;
    }

    Ok(segments)
}

/// Chunk a whole document, tagging each chunk with its source and position
#[inline]
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> Result<Vec<ContentChunk>> {
    let chunks: Vec<ContentChunk> = chunk_text(&document.text, config)?
        .into_iter()
        .enumerate()
        .map(|(chunk_index, content)| ContentChunk {
            content,
            source: document.title.clone(),
            chunk_index,
        })
        .collect();

    debug!(
        "Chunked document '{}' into {} chunks (avg {} chars)",
        document.title,
        chunks.len(),
        chunks
            .iter()
            .map(|c| c.content.chars().count())
            .sum::<usize>()
            / chunks.len().max(1)
    );

    Ok(chunks)
}

/// Find the end of the segment starting at `start`.
///
/// A boundary only qualifies if it ends past `start + overlap`, so the next
/// segment always starts further along than this one.
fn find_cut(chars: &[char], start: usize, size: usize, overlap: usize) -> usize {
    let window_end = start + size;
    let window = &chars[start..window_end];

    SEPARATORS
        .iter()
        .find_map(|separator| {
            window
                .windows(separator.len())
                .rposition(|candidate| candidate == *separator)
                .map(|pos| start + pos + separator.len())
                .filter(|&cut| cut > start + overlap)
        })
        .unwrap_or(window_end)
}

fn push_segment(segments: &mut Vec<String>, chars: &[char]) {
    if chars.iter().all(|c| c.is_whitespace()) {
        return;
    }
    segments.push(chars.iter().collect());
}
