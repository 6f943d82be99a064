//! Plain-text corpus loading.
//!
//! A corpus is a directory of `.txt` files, one document per file, with the
//! file stem used as the document title.


use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{RagError, Result};

const TEXT_EXTENSION: &str = "txt";

/// A raw source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Source identifier, the file stem for corpus files
    pub title: String,
    /// Full document text
    pub text: String,
}

impl Document {
    #[inline]
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }
}

/// Load a single document by file stem from the corpus directory
#[inline]
pub fn load_text_file(corpus_dir: &Path, stem: &str) -> Result<Document> {
    let file_path = corpus_dir.join(format!("{}.{}", stem, TEXT_EXTENSION));
    if !file_path.is_file() {
        return Err(RagError::NotFound(format!(
            "Text file not found: {}",
            file_path.display()
        )));
    }

    let text = fs::read_to_string(&file_path).map_err(|e| {
        RagError::Io(std::io::Error::new(
            e.kind(),
            format!("Error reading text file {}: {}", file_path.display(), e),
        ))
    })?;

    debug!("Loaded '{}' ({} bytes)", stem, text.len());
    Ok(Document::new(stem, text))
}

/// Load every `.txt` file in the corpus directory, ordered by file name
#[inline]
pub fn load_corpus(corpus_dir: &Path) -> Result<Vec<Document>> {
    if !corpus_dir.is_dir() {
        return Err(RagError::NotFound(format!(
            "Corpus directory not found: {}",
            corpus_dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(corpus_dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    paths.retain(|path| {
        path.is_file() && path.extension().is_some_and(|ext| ext == TEXT_EXTENSION)
    });
    paths.sort();

    let documents = paths
        .iter()
        .filter_map(|path| path.file_stem().and_then(|stem| stem.to_str()))
        .map(|stem| load_text_file(corpus_dir, stem))
        .collect::<Result<Vec<_>>>()?;

    info!(
        "Loaded {} documents from {}",
        documents.len(),
        corpus_dir.display()
    );
    Ok(documents)
}
