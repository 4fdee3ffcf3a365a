use crate::cache::VectorCache;
use crate::embedder::{Embedder, EmbeddingVector};
use crate::error::{BrwsError, Result};
use crate::loader::Document;
use std::sync::atomic::{AtomicBool, Ordering};

/// Vectors in plot-row order: anchors first, then the documents that embedded.
pub struct Embedded {
    pub vectors: Vec<EmbeddingVector>,
    pub documents: Vec<Document>,
}

/// Anchors are always embedded fresh; documents go through `cache`.
///
/// A document whose text cannot be extracted is skipped with a warning. Any
/// other failure aborts the run. `interrupted` is checked before every item;
/// once set, the run stops with [`BrwsError::Interrupted`] and the caller's
/// cache keeps whatever was fetched so far.
pub fn embed_all(
    anchors: &[String],
    documents: Vec<Document>,
    embedder: &dyn Embedder,
    cache: &mut dyn VectorCache,
    interrupted: &AtomicBool,
) -> Result<Embedded> {
    let check = || {
        if interrupted.load(Ordering::SeqCst) {
            Err(BrwsError::Interrupted)
        } else {
            Ok(())
        }
    };

    let mut vectors = Vec::with_capacity(anchors.len() + documents.len());
    for anchor in anchors {
        check()?;
        vectors.push(embedder.embed(anchor)?);
    }

    let mut kept = Vec::with_capacity(documents.len());
    for document in documents {
        check()?;
        match cache.fetch(&document) {
            Ok(vector) => {
                vectors.push(vector);
                kept.push(document);
            }
            Err(err @ BrwsError::Extraction { .. }) => {
                log::warn!("Skipping {}: {}", document.filename, err);
            }
            Err(err) => return Err(err),
        }
    }

    log::info!(
        "Embedded {} anchors and {} documents",
        anchors.len(),
        kept.len()
    );
    Ok(Embedded {
        vectors,
        documents: kept,
    })
}
