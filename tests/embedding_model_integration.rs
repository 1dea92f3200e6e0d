//! Runs the store against a real fastembed model.
//!
//! Downloads the model on first run, so it is ignored by default:
//! `cargo test --test embedding_model_integration -- --ignored`

use exemplar::{EmbeddingRegistry, ExemplarStore, Record, Settings};
use tempfile::TempDir;

#[test]
#[ignore = "downloads an embedding model"]
fn test_real_model_keeps_paraphrases_apart_from_unrelated_records() {
    let dir = TempDir::new().unwrap();
    let mut settings = Settings::default();
    settings.data_dir = dir.path().join("data");
    if let Ok(cache) = std::env::var("EX_TEST_MODEL_CACHE") {
        settings.embedding.cache_dir = cache.into();
    } else {
        settings.embedding.cache_dir = dir.path().join("models");
    }

    let registry = EmbeddingRegistry::new();
    let mut store = ExemplarStore::open(&settings, &registry, false).unwrap();
    let corpus: Vec<Record> = [
        "A cat in space",
        "A cat in space, cinematic",
        "A dragon on a mountain",
        "A bowl of ramen on a rainy night",
    ]
    .into_iter()
    .map(Record::from_raw)
    .collect();
    store.build(&corpus, true).unwrap();

    let hits = store.search("a kitten floating among the stars", 2).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0].record.raw_key().starts_with("A cat in space"));
    assert!(!hits[1].record.raw_key().starts_with("A cat in space"));

    // Second open reuses the loaded provider
    assert_eq!(registry.loaded_models(), vec![settings.embedding.model.clone()]);
    let again = ExemplarStore::open(&settings, &registry, false).unwrap();
    assert_eq!(again.generator().model_name(), store.generator().model_name());
}
