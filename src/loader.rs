//! Folder enumeration, format-aware text extraction and anchor files.

use crate::embedder::{Embedder, EmbeddingVector};
use crate::error::{BrwsError, Result};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub filename: String,
    /// Includes the leading dot, e.g. ".pdf". Empty when the file has none.
    pub extension: String,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        Self {
            path,
            filename,
            extension,
        }
    }
}

/// Regular, non-hidden files directly inside `folder` that have an extension,
/// sorted by name. Files named in `exclude` (the anchor file, the cache and its
/// temporary copy) are left out wherever they sit in the folder.
pub fn list_documents(folder: &Path, exclude: &[PathBuf]) -> Result<Vec<Document>> {
    let entries = fs::read_dir(folder).map_err(|e| BrwsError::io(folder, e))?;
    let excluded = excluded_names(folder, exclude);
    let mut documents = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| BrwsError::io(folder, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| BrwsError::io(&path, e))?;
        if !file_type.is_file() && !(file_type.is_symlink() && path.is_file()) {
            continue;
        }
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') || excluded.contains(&name) {
            continue;
        }
        let document = Document::new(path);
        if document.extension.is_empty() {
            log::debug!("Skipping {}: no extension", document.filename);
            continue;
        }
        documents.push(document);
    }
    documents.sort_by(|a, b| a.filename.cmp(&b.filename));
    log::debug!("Found {} documents in {}", documents.len(), folder.display());
    Ok(documents)
}

/// Names of the `exclude` paths that live directly inside `folder`.
fn excluded_names(folder: &Path, exclude: &[PathBuf]) -> BTreeSet<OsString> {
    let Ok(folder) = fs::canonicalize(folder) else {
        return BTreeSet::new();
    };
    exclude
        .iter()
        .filter_map(|path| {
            let name = path.file_name()?;
            let parent = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => fs::canonicalize(p).ok()?,
                _ => fs::canonicalize(".").ok()?,
            };
            (parent == folder).then(|| name.to_os_string())
        })
        .collect()
}

/// One anchor per trimmed, non-empty line. A missing file means no anchors.
pub fn read_anchors(path: &Path) -> Result<Vec<String>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::info!("No anchor file at {}, plotting without anchors", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(BrwsError::io(path, e)),
    };
    Ok(parse_anchors(&contents))
}

fn parse_anchors(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub trait TextExtractor {
    fn extract(&self, document: &Document) -> Result<String>;
}

/// PDF through `pdf-extract`; everything else is read as (lossy) UTF-8 text.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormatExtractor;

impl TextExtractor for FormatExtractor {
    fn extract(&self, document: &Document) -> Result<String> {
        match document.extension.to_ascii_lowercase().as_str() {
            ".pdf" => {
                let bytes =
                    fs::read(&document.path).map_err(|e| BrwsError::io(&document.path, e))?;
                // pdf-extract panics on some malformed inputs instead of erroring.
                let extracted =
                    std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes));
                match extracted {
                    Ok(Ok(text)) => Ok(text),
                    Ok(Err(e)) => Err(BrwsError::Extraction {
                        path: document.path.clone(),
                        message: e.to_string(),
                    }),
                    Err(_) => Err(BrwsError::Extraction {
                        path: document.path.clone(),
                        message: "PDF parser panicked".to_string(),
                    }),
                }
            }
            _ => {
                let bytes =
                    fs::read(&document.path).map_err(|e| BrwsError::io(&document.path, e))?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
        }
    }
}

/// Extract-then-embed, the work a cache miss has to do.
#[derive(Clone, Copy)]
pub struct Vectorizer<'a> {
    extractor: &'a dyn TextExtractor,
    embedder: &'a dyn Embedder,
}

impl<'a> Vectorizer<'a> {
    pub fn new(extractor: &'a dyn TextExtractor, embedder: &'a dyn Embedder) -> Self {
        Self {
            extractor,
            embedder,
        }
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    pub fn vectorize(&self, document: &Document) -> Result<EmbeddingVector> {
        let text = self.extractor.extract(document)?;
        log::debug!("Embedding {} ({} chars)", document.filename, text.len());
        self.embedder.embed(&text)
    }
}
