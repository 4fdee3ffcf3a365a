//! Text embedding backed by fastembed's local ONNX models.

use crate::error::{BrwsError, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::collections::BTreeSet;
use std::path::PathBuf;

pub type EmbeddingVector = Vec<f32>;

/// Maps text to a fixed-length vector. Implementations hold no cache of their own.
pub trait Embedder {
    /// Canonical model code recorded next to cached vectors; a change invalidates them.
    fn model_name(&self) -> &str;

    fn embed(&self, text: &str) -> Result<EmbeddingVector>;
}

pub struct FastEmbedder {
    name: String,
    model: TextEmbedding,
    dimensions: usize,
}

impl FastEmbedder {
    /// Resolves `name` against the supported model list and loads it.
    ///
    /// Any failure here is reported as [`BrwsError::ModelUnavailable`]; the
    /// binary treats that as fatal.
    pub fn new(name: &str, cache_dir: Option<PathBuf>) -> Result<Self> {
        let supported = TextEmbedding::list_supported_models();
        let codes: Vec<&str> = supported.iter().map(|info| info.model_code.as_str()).collect();
        let info = &supported[resolve_model(name, &codes)?];

        let model: EmbeddingModel = info.model.clone();
        let mut options = InitOptions::new(model).with_show_download_progress(true);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        log::info!("Loading embedding model {} (requested as {})", info.model_code, name);
        let model = TextEmbedding::try_new(options).map_err(|e| BrwsError::ModelUnavailable {
            model: name.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            name: info.model_code.clone(),
            model,
            dimensions: info.dim,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl Embedder for FastEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let mut vectors = self
            .model
            .embed(vec![text], None)
            .map_err(|e| BrwsError::Embedding(e.to_string()))?;
        vectors
            .pop()
            .ok_or_else(|| BrwsError::Embedding("model returned no embedding".to_string()))
    }
}

/// Full model codes accepted by `--model`, sorted and without duplicates.
pub fn supported_model_names() -> Vec<String> {
    let codes: BTreeSet<String> = TextEmbedding::list_supported_models()
        .into_iter()
        .map(|info| info.model_code)
        .collect();
    codes.into_iter().collect()
}

/// Index into `codes` of the model `name` refers to.
///
/// A full code (`Qdrant/all-MiniLM-L6-v2-onnx`, any case) wins outright. A
/// short form (`all-MiniLM-L6-v2`) is accepted only when exactly one code
/// shortens to it.
fn resolve_model(name: &str, codes: &[&str]) -> Result<usize> {
    let name = name.trim();
    if let Some(i) = codes.iter().position(|code| code.eq_ignore_ascii_case(name)) {
        return Ok(i);
    }

    let short = short_model_name(name);
    let candidates: Vec<usize> = codes
        .iter()
        .enumerate()
        .filter(|(_, code)| short_model_name(code).eq_ignore_ascii_case(&short))
        .map(|(i, _)| i)
        .collect();
    match candidates.as_slice() {
        [only] => Ok(*only),
        [] => Err(BrwsError::ModelUnavailable {
            model: name.to_string(),
            reason: "not a known fastembed model".to_string(),
        }),
        many => Err(BrwsError::ModelUnavailable {
            model: name.to_string(),
            reason: format!(
                "ambiguous, use one of: {}",
                many.iter().map(|&i| codes[i]).collect::<Vec<_>>().join(", ")
            ),
        }),
    }
}

fn short_model_name(code: &str) -> String {
    let last = code.rsplit('/').next().unwrap_or(code);
    let lower = last.to_ascii_lowercase();
    match lower.strip_suffix("-onnx") {
        Some(stripped) => last[..stripped.len()].to_string(),
        None => last.to_string(),
    }
}
