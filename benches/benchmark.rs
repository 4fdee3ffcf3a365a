use brws::cache::{content_hash, FolderCache, VectorCache};
use brws::embedder::{Embedder, EmbeddingVector};
use brws::loader::{list_documents, TextExtractor, Vectorizer, Document};
use brws::projector::{stack_vectors, Projector};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use std::fs;

const DIMENSIONS: usize = 384; // all-MiniLM-L6-v2 output size
const NUM_FILES: usize = 200;

fn configure_criterion() -> Criterion {
    Criterion::default()
        .sample_size(10)
        .measurement_time(std::time::Duration::from_secs(30))
        .warm_up_time(std::time::Duration::from_secs(5))
        .configure_from_args()
}

fn random_vectors(count: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..DIMENSIONS).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}

fn project_vectors(c: &mut Criterion) {
    let mut group = c.benchmark_group("project");
    for &count in &[50usize, 150, 300] {
        let matrix = stack_vectors(&random_vectors(count, 42)).unwrap();
        let projector = Projector::default();
        group.bench_with_input(BenchmarkId::from_parameter(count), &matrix, |b, m| {
            b.iter(|| projector.project(m).unwrap())
        });
    }
    group.finish();
}

struct RawText;

impl TextExtractor for RawText {
    fn extract(&self, document: &Document) -> brws::Result<String> {
        Ok(fs::read_to_string(&document.path).unwrap_or_default())
    }
}

struct HashEmbedder;

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "bench"
    }

    fn embed(&self, text: &str) -> brws::Result<EmbeddingVector> {
        let seed = u64::from_str_radix(&content_hash(text.as_bytes())[..16], 16).unwrap();
        Ok(random_vectors(1, seed).remove(0))
    }
}

fn warm_cache_fetch(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..NUM_FILES {
        fs::write(dir.path().join(format!("doc{i}.txt")), format!("document number {i}")).unwrap();
    }
    let documents = list_documents(dir.path(), &[]).unwrap();

    {
        let mut cache =
            FolderCache::open(dir.path(), ".brws", Vectorizer::new(&RawText, &HashEmbedder)).unwrap();
        for doc in &documents {
            cache.fetch(doc).unwrap();
        }
    }

    c.bench_function(&format!("warm cache, {} files", NUM_FILES), |b| {
        b.iter(|| {
            let mut cache =
                FolderCache::open(dir.path(), ".brws", Vectorizer::new(&RawText, &HashEmbedder))
                    .unwrap();
            for doc in &documents {
                cache.fetch(doc).unwrap();
            }
        })
    });
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets = project_vectors, warm_cache_fetch
}
criterion_main!(benches);
