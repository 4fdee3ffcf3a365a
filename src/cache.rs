//! Per-folder embedding cache.
//!
//! Vectors are keyed by filename and stay valid while both the file's SHA-256
//! and the active model name are unchanged. The whole map lives in one JSON
//! file inside the scanned folder and is written back exactly once per scope,
//! either by [`VectorCache::close`] or, on early exit, by `Drop`.

use crate::embedder::EmbeddingVector;
use crate::error::{BrwsError, Result};
use crate::loader::{Document, Vectorizer};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub trait VectorCache {
    fn fetch(&mut self, document: &Document) -> Result<EmbeddingVector>;

    fn clear(&mut self) -> Result<()>;

    /// Ends the cache scope, persisting state if the variant has any.
    fn close(self: Box<Self>) -> Result<()>;
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub hash: String,
    pub vec: EmbeddingVector,
    /// Model that produced `vec`.
    pub embedding: String,
}

pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Where a flush writes before renaming over `cache_path`: the same name plus `.tmp`.
pub fn temp_path(cache_path: &Path) -> PathBuf {
    let mut name = cache_path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Always extracts and embeds; keeps nothing.
pub struct NoCache<'a> {
    vectorizer: Vectorizer<'a>,
}

impl<'a> NoCache<'a> {
    pub fn new(vectorizer: Vectorizer<'a>) -> Self {
        Self { vectorizer }
    }
}

impl VectorCache for NoCache<'_> {
    fn fetch(&mut self, document: &Document) -> Result<EmbeddingVector> {
        self.vectorizer.vectorize(document)
    }

    fn clear(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

pub struct FolderCache<'a> {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
    vectorizer: Vectorizer<'a>,
    flushed: bool,
}

impl<'a> FolderCache<'a> {
    pub fn open(folder: &Path, cache_filename: &str, vectorizer: Vectorizer<'a>) -> Result<Self> {
        let path = folder.join(cache_filename);
        let entries = Self::load(&path)?;
        log::debug!("Opened cache {} with {} entries", path.display(), entries.len());
        Ok(Self {
            path,
            entries,
            vectorizer,
            flushed: false,
        })
    }

    fn load(path: &Path) -> Result<BTreeMap<String, CacheEntry>> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(BrwsError::io(path, e)),
        };
        match serde_json::from_slice(&raw) {
            Ok(entries) => Ok(entries),
            Err(source) => {
                let err = BrwsError::CacheCorruption {
                    path: path.to_path_buf(),
                    source,
                };
                log::warn!("{}; starting with an empty cache", err);
                Ok(BTreeMap::new())
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn flush(&mut self) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;

        let json = serde_json::to_vec_pretty(&self.entries).map_err(|source| {
            BrwsError::CacheCorruption {
                path: self.path.clone(),
                source,
            }
        })?;
        let tmp = temp_path(&self.path);
        fs::write(&tmp, &json).map_err(|e| BrwsError::io(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(BrwsError::io(&self.path, e));
        }
        log::debug!("Wrote {} cache entries to {}", self.entries.len(), self.path.display());
        Ok(())
    }
}

impl VectorCache for FolderCache<'_> {
    fn fetch(&mut self, document: &Document) -> Result<EmbeddingVector> {
        let bytes = fs::read(&document.path).map_err(|e| BrwsError::io(&document.path, e))?;
        let hash = content_hash(&bytes);
        let model = self.vectorizer.model_name();

        if let Some(entry) = self.entries.get(&document.filename) {
            if entry.hash == hash && entry.embedding == model {
                log::debug!("Cache hit for {}", document.filename);
                return Ok(entry.vec.clone());
            }
        }

        log::debug!("Cache miss for {}", document.filename);
        let vec = self.vectorizer.vectorize(document)?;
        self.entries.insert(
            document.filename.clone(),
            CacheEntry {
                hash,
                vec: vec.clone(),
                embedding: model.to_string(),
            },
        );
        Ok(vec)
    }

    fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(BrwsError::io(&self.path, e)),
        }
        self.entries.clear();
        log::info!("Cleared cache {}", self.path.display());
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.flush()
    }
}

impl Drop for FolderCache<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::error!("Failed to write cache on exit: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::Embedder;
    use crate::loader::TextExtractor;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use tempfile::tempdir;

    struct SpyExtractor {
        calls: Cell<usize>,
    }

    impl SpyExtractor {
        fn new() -> Self {
            Self { calls: Cell::new(0) }
        }
    }

    impl TextExtractor for SpyExtractor {
        fn extract(&self, document: &Document) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            fs::read_to_string(&document.path).map_err(|e| BrwsError::io(&document.path, e))
        }
    }

    struct StubEmbedder {
        name: &'static str,
    }

    impl Embedder for StubEmbedder {
        fn model_name(&self) -> &str {
            self.name
        }

        fn embed(&self, text: &str) -> Result<EmbeddingVector> {
            let sum: u32 = text.bytes().map(u32::from).sum();
            Ok(vec![text.len() as f32 * 0.1, sum as f32 / 7.0, 1.0 / 3.0])
        }
    }

    fn read_entries(path: &Path) -> BTreeMap<String, CacheEntry> {
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    fn bits(v: &[f32]) -> Vec<u32> {
        v.iter().map(|x| x.to_bits()).collect()
    }

    #[test]
    fn unchanged_file_is_served_from_disk_without_extraction() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "some words").unwrap();
        let doc = Document::new(dir.path().join("a.txt"));
        let spy = SpyExtractor::new();
        let embedder = StubEmbedder { name: "m1" };

        let first = {
            let mut cache =
                FolderCache::open(dir.path(), ".brws", Vectorizer::new(&spy, &embedder)).unwrap();
            let v = cache.fetch(&doc).unwrap();
            Box::new(cache).close().unwrap();
            v
        };
        assert_eq!(spy.calls.get(), 1);

        let mut cache =
            FolderCache::open(dir.path(), ".brws", Vectorizer::new(&spy, &embedder)).unwrap();
        let second = cache.fetch(&doc).unwrap();
        assert_eq!(spy.calls.get(), 1);
        assert_eq!(bits(&first), bits(&second));
    }

    #[test]
    fn changed_content_is_recomputed_and_overwritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "before").unwrap();
        let doc = Document::new(&path);
        let spy = SpyExtractor::new();
        let embedder = StubEmbedder { name: "m1" };

        {
            let mut cache =
                FolderCache::open(dir.path(), ".brws", Vectorizer::new(&spy, &embedder)).unwrap();
            cache.fetch(&doc).unwrap();
        }

        fs::write(&path, "after, and longer").unwrap();
        {
            let mut cache =
                FolderCache::open(dir.path(), ".brws", Vectorizer::new(&spy, &embedder)).unwrap();
            let v = cache.fetch(&doc).unwrap();
            assert_eq!(v, embedder.embed("after, and longer").unwrap());
        }
        assert_eq!(spy.calls.get(), 2);

        let entries = read_entries(&dir.path().join(".brws"));
        assert_eq!(entries["a.txt"].hash, content_hash(b"after, and longer"));
    }

    #[test]
    fn model_change_forces_recompute() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "same").unwrap();
        let doc = Document::new(dir.path().join("a.txt"));
        let spy = SpyExtractor::new();
        let old = StubEmbedder { name: "m1" };
        let new = StubEmbedder { name: "m2" };

        {
            let mut cache =
                FolderCache::open(dir.path(), ".brws", Vectorizer::new(&spy, &old)).unwrap();
            cache.fetch(&doc).unwrap();
        }
        {
            let mut cache =
                FolderCache::open(dir.path(), ".brws", Vectorizer::new(&spy, &new)).unwrap();
            cache.fetch(&doc).unwrap();
        }
        assert_eq!(spy.calls.get(), 2);
        assert_eq!(read_entries(&dir.path().join(".brws"))["a.txt"].embedding, "m2");
    }

    #[test]
    fn clear_removes_file_and_entries() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "text").unwrap();
        let doc = Document::new(dir.path().join("a.txt"));
        let spy = SpyExtractor::new();
        let embedder = StubEmbedder { name: "m1" };

        {
            let mut cache =
                FolderCache::open(dir.path(), ".brws", Vectorizer::new(&spy, &embedder)).unwrap();
            cache.fetch(&doc).unwrap();
        }
        let cache_path = dir.path().join(".brws");
        assert!(cache_path.exists());

        let mut cache =
            FolderCache::open(dir.path(), ".brws", Vectorizer::new(&spy, &embedder)).unwrap();
        assert_eq!(cache.len(), 1);
        cache.clear().unwrap();
        assert!(cache.is_empty());
        assert!(!cache_path.exists());

        cache.fetch(&doc).unwrap();
        assert_eq!(spy.calls.get(), 2);
    }

    #[test]
    fn empty_scope_still_writes_the_cache_file() {
        let dir = tempdir().unwrap();
        let spy = SpyExtractor::new();
        let embedder = StubEmbedder { name: "m1" };
        {
            let _cache =
                FolderCache::open(dir.path(), ".brws", Vectorizer::new(&spy, &embedder)).unwrap();
        }
        assert!(read_entries(&dir.path().join(".brws")).is_empty());
    }

    #[test]
    fn scope_writes_exactly_once() {
        let dir = tempdir().unwrap();
        let spy = SpyExtractor::new();
        let embedder = StubEmbedder { name: "m1" };
        let cache_path = dir.path().join(".brws");

        let mut cache =
            FolderCache::open(dir.path(), ".brws", Vectorizer::new(&spy, &embedder)).unwrap();
        cache.flush().unwrap();
        assert!(cache_path.exists());
        fs::remove_file(&cache_path).unwrap();
        drop(cache);
        assert!(!cache_path.exists());
    }

    #[test]
    fn corrupt_cache_falls_back_to_empty_and_is_rewritten() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "text").unwrap();
        fs::write(dir.path().join(".brws"), "{ not json").unwrap();
        let spy = SpyExtractor::new();
        let embedder = StubEmbedder { name: "m1" };

        let mut cache =
            FolderCache::open(dir.path(), ".brws", Vectorizer::new(&spy, &embedder)).unwrap();
        assert!(cache.is_empty());
        cache.fetch(&Document::new(dir.path().join("a.txt"))).unwrap();
        Box::new(cache).close().unwrap();

        let entries = read_entries(&dir.path().join(".brws"));
        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["a.txt"]);
    }

    #[test]
    fn persisted_format_uses_hash_vec_embedding_keys() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "abc").unwrap();
        let spy = SpyExtractor::new();
        let embedder = StubEmbedder { name: "m1" };
        {
            let mut cache =
                FolderCache::open(dir.path(), ".brws", Vectorizer::new(&spy, &embedder)).unwrap();
            cache.fetch(&Document::new(dir.path().join("a.txt"))).unwrap();
        }
        let value: serde_json::Value =
            serde_json::from_slice(&fs::read(dir.path().join(".brws")).unwrap()).unwrap();
        let entry = &value["a.txt"];
        assert_eq!(entry["hash"], serde_json::json!(content_hash(b"abc")));
        assert_eq!(entry["embedding"], serde_json::json!("m1"));
        assert_eq!(entry["vec"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn no_cache_always_extracts_and_persists_nothing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "text").unwrap();
        let doc = Document::new(dir.path().join("a.txt"));
        let spy = SpyExtractor::new();
        let embedder = StubEmbedder { name: "m1" };

        let mut cache = NoCache::new(Vectorizer::new(&spy, &embedder));
        cache.fetch(&doc).unwrap();
        cache.fetch(&doc).unwrap();
        cache.clear().unwrap();
        Box::new(cache).close().unwrap();

        assert_eq!(spy.calls.get(), 2);
        assert!(!dir.path().join(".brws").exists());
    }

    #[test]
    fn flush_leaves_no_temp_file_behind() {
        let dir = tempdir().unwrap();
        let spy = SpyExtractor::new();
        let embedder = StubEmbedder { name: "m1" };
        let cache_path = dir.path().join("cache.json");

        let cache =
            FolderCache::open(dir.path(), "cache.json", Vectorizer::new(&spy, &embedder)).unwrap();
        Box::new(cache).close().unwrap();

        assert_eq!(temp_path(&cache_path), dir.path().join("cache.json.tmp"));
        assert!(cache_path.exists());
        assert!(!temp_path(&cache_path).exists());
    }

    #[test]
    fn content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
