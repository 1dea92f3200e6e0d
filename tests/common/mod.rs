#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use exemplar::{EmbeddingGenerator, Record, VectorDimension, VectorError};
use parking_lot::Mutex;

/// Deterministic embedding provider for tests.
///
/// Registered texts map to fixed vectors; anything else maps to a
/// normalized byte histogram. Every embedded text is recorded.
pub struct StubGenerator {
    model: String,
    dimension: VectorDimension,
    fixed: HashMap<String, Vec<f32>>,
    failing: AtomicBool,
    seen: Mutex<Vec<String>>,
}

impl StubGenerator {
    pub fn new(dimension: usize) -> Self {
        Self::named("stub", dimension)
    }

    pub fn named(model: &str, dimension: usize) -> Self {
        Self {
            model: model.to_string(),
            dimension: VectorDimension::new(dimension).expect("valid dimension"),
            fixed: HashMap::new(),
            failing: AtomicBool::new(false),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fixed(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimension.get());
        self.fixed.insert(text.to_string(), vector);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }

    pub fn clear_seen(&self) {
        self.seen.lock().clear();
    }

    /// The vector this stub produces for `text`.
    pub fn expected(&self, text: &str) -> Vec<f32> {
        if let Some(vector) = self.fixed.get(text) {
            return vector.clone();
        }
        let dim = self.dimension.get();
        let mut embedding = vec![0.0f32; dim];
        for byte in text.bytes() {
            embedding[byte as usize % dim] += 1.0;
        }
        let magnitude = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            embedding.iter_mut().for_each(|v| *v /= magnitude);
        }
        embedding
    }
}

impl EmbeddingGenerator for StubGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(VectorError::EmbeddingFailed("stub failure".to_string()));
        }
        let mut seen = self.seen.lock();
        Ok(texts
            .iter()
            .map(|text| {
                seen.push((*text).to_string());
                self.expected(text)
            })
            .collect())
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

pub fn raw_records(raws: &[&str]) -> Vec<Record> {
    raws.iter().map(|raw| Record::from_raw(*raw)).collect()
}

pub fn raws(records: &[Record]) -> Vec<&str> {
    records.iter().map(Record::raw_key).collect()
}

pub fn write_corpus(path: &Path, records: &[Record]) {
    let lines: Vec<String> = records
        .iter()
        .map(|r| serde_json::to_string(r).expect("serialize record"))
        .collect();
    std::fs::write(path, lines.join("\n")).expect("write corpus");
}
