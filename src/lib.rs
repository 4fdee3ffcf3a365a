//! Semantic map of a folder: every document is embedded, cached by content
//! hash, projected to 2-D and shown in a clickable scatter plot alongside
//! optional anchor phrases.

pub mod cache;
pub mod config;
pub mod embedder;
pub mod error;
pub mod loader;
pub mod opener;
pub mod pipeline;
pub mod points;
pub mod projector;
pub mod vector_ops;
pub mod viewer;

pub use error::{BrwsError, Result};
