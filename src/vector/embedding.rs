//! Embedding generation for exemplar search texts.
//!
//! The rest of the crate consumes embeddings only through the
//! [`EmbeddingGenerator`] trait: a length- and order-preserving map from
//! texts to fixed-dimension vectors. [`FastEmbedGenerator`] is the production
//! implementation backed by a local ONNX model through `fastembed`.

use std::path::{Path, PathBuf};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::vector::{VectorDimension, VectorError};

/// Probe text used to discover the model's output dimension.
const DIMENSION_PROBE: &str = "test";

/// Trait for generating embeddings from text.
///
/// Implementations must be thread-safe. Output has the same length and order
/// as the input, and every vector has [`EmbeddingGenerator::dimension`]
/// components.
pub trait EmbeddingGenerator: Send + Sync {
    /// Generate embeddings for multiple texts.
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError>;

    /// Get the dimension of embeddings produced by this generator.
    #[must_use]
    fn dimension(&self) -> VectorDimension;

    /// Identifier of the underlying model, recorded next to persisted indexes.
    #[must_use]
    fn model_name(&self) -> &str;

    /// Generate a single embedding.
    fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, VectorError> {
        self.generate_embeddings(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| VectorError::EmbeddingFailed("No embedding returned".to_string()))
    }
}

/// Options for loading a fastembed model.
#[derive(Debug, Clone)]
pub struct ModelOptions {
    /// Model identifier, e.g. `AllMiniLML6V2`.
    pub model: String,
    /// Directory where model files are cached.
    pub cache_dir: PathBuf,
    /// Refuse to download: only a model already present in `cache_dir` loads.
    pub offline: bool,
    pub show_download_progress: bool,
}

/// FastEmbed implementation of [`EmbeddingGenerator`].
///
/// The ONNX session is not shareable across concurrent calls, so it sits
/// behind a mutex; concurrent callers are serialized.
pub struct FastEmbedGenerator {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: VectorDimension,
}

impl std::fmt::Debug for FastEmbedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedGenerator")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("model", &"<TextEmbedding>")
            .finish()
    }
}

impl FastEmbedGenerator {
    /// Load the model and probe its output dimension.
    ///
    /// # Errors
    /// Returns [`VectorError::EmbeddingFailed`] if the identifier is unknown,
    /// the model is missing in offline mode, or the model fails to load.
    pub fn new(options: &ModelOptions) -> Result<Self, VectorError> {
        let embedding_model = parse_embedding_model(&options.model)?;

        let cached = is_model_cached(&options.cache_dir, &embedding_model)?;
        if cached {
            info!(model = %options.model, cache_dir = %options.cache_dir.display(), "Loading embedding model from cache");
        } else if options.offline {
            return Err(VectorError::EmbeddingFailed(format!(
                "Model '{}' is not cached in {} and offline mode is enabled. Disable offline mode once to download it",
                options.model,
                options.cache_dir.display()
            )));
        } else {
            info!(model = %options.model, cache_dir = %options.cache_dir.display(), "Downloading embedding model (first time only)");
        }

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(embedding_model)
                .with_cache_dir(options.cache_dir.clone())
                .with_show_download_progress(options.show_download_progress),
        )
        .map_err(|e| {
            VectorError::EmbeddingFailed(format!("Failed to initialize embedding model: {e}"))
        })?;

        let probe = text_model
            .embed(vec![DIMENSION_PROBE], None)
            .map_err(|e| VectorError::EmbeddingFailed(format!("Dimension probe failed: {e}")))?;
        let dimension = probe
            .first()
            .map(Vec::len)
            .ok_or_else(|| VectorError::EmbeddingFailed("Dimension probe returned nothing".to_string()))
            .and_then(VectorDimension::new)?;

        info!(model = %options.model, dimension = dimension.get(), "Embedding model ready");

        Ok(Self {
            model: Mutex::new(text_model),
            model_name: options.model.clone(),
            dimension,
        })
    }
}

impl EmbeddingGenerator for FastEmbedGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();
        debug!(count = texts.len(), "Generating embeddings");

        let embeddings = self
            .model
            .lock()
            .embed(text_strings, None)
            .map_err(|e| {
                VectorError::EmbeddingFailed(format!("Failed to generate embeddings: {e}"))
            })?;

        if embeddings.len() != texts.len() {
            return Err(VectorError::EmbeddingFailed(format!(
                "Model returned {} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }
        for embedding in &embeddings {
            self.dimension.validate_vector(embedding)?;
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Map a configured model identifier to a fastembed model.
pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, VectorError> {
    let model = match name {
        "AllMiniLML6V2" => EmbeddingModel::AllMiniLML6V2,
        "AllMiniLML12V2" => EmbeddingModel::AllMiniLML12V2,
        "BGESmallENV15" => EmbeddingModel::BGESmallENV15,
        "BGEBaseENV15" => EmbeddingModel::BGEBaseENV15,
        "BGESmallZHV15" => EmbeddingModel::BGESmallZHV15,
        "MultilingualE5Small" => EmbeddingModel::MultilingualE5Small,
        "MultilingualE5Base" => EmbeddingModel::MultilingualE5Base,
        "ParaphraseMLMiniLML12V2" => EmbeddingModel::ParaphraseMLMiniLML12V2,
        other => {
            return Err(VectorError::EmbeddingFailed(format!(
                "Unknown embedding model '{other}'. Supported: {}",
                SUPPORTED_MODELS.join(", ")
            )));
        }
    };
    Ok(model)
}

/// Model identifiers accepted by [`parse_embedding_model`].
pub const SUPPORTED_MODELS: &[&str] = &[
    "AllMiniLML6V2",
    "AllMiniLML12V2",
    "BGESmallENV15",
    "BGEBaseENV15",
    "BGESmallZHV15",
    "MultilingualE5Small",
    "MultilingualE5Base",
    "ParaphraseMLMiniLML12V2",
];

/// Directory fastembed downloads `model` into, below `cache_dir`.
fn model_cache_path(cache_dir: &Path, model: &EmbeddingModel) -> Result<PathBuf, VectorError> {
    let info = TextEmbedding::get_model_info(model)
        .map_err(|e| VectorError::EmbeddingFailed(format!("No model info for {model:?}: {e}")))?;
    Ok(cache_dir.join(format!("models--{}", info.model_code.replace('/', "--"))))
}

/// Whether `model` itself has been downloaded into `cache_dir`.
fn is_model_cached(cache_dir: &Path, model: &EmbeddingModel) -> Result<bool, VectorError> {
    Ok(model_cache_path(cache_dir, model)?.is_dir())
}

/// Deterministic embedding generator for tests.
///
/// Texts registered with [`MockEmbeddingGenerator::with_fixed`] map to the
/// given vector; every other text maps to a normalized byte histogram.
/// Every text passed in is recorded so tests can assert what was embedded.
#[cfg(test)]
pub struct MockEmbeddingGenerator {
    dimension: VectorDimension,
    fixed: std::collections::HashMap<String, Vec<f32>>,
    fail: std::sync::atomic::AtomicBool,
    seen: Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockEmbeddingGenerator {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: VectorDimension::new(dimension).unwrap(),
            fixed: std::collections::HashMap::new(),
            fail: std::sync::atomic::AtomicBool::new(false),
            seen: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_fixed(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimension.get());
        self.fixed.insert(text.to_string(), vector);
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// All texts embedded so far, in call order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }

    pub fn clear_seen(&self) {
        self.seen.lock().clear();
    }

    pub fn histogram(&self, text: &str) -> Vec<f32> {
        let dim = self.dimension.get();
        let mut embedding = vec![0.0; dim];
        for byte in text.bytes() {
            embedding[byte as usize % dim] += 1.0;
        }
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in &mut embedding {
                *val /= magnitude;
            }
        }
        embedding
    }
}

#[cfg(test)]
impl EmbeddingGenerator for MockEmbeddingGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(VectorError::EmbeddingFailed("mock failure".to_string()));
        }
        let mut seen = self.seen.lock();
        Ok(texts
            .iter()
            .map(|text| {
                seen.push((*text).to_string());
                self.fixed
                    .get(*text)
                    .cloned()
                    .unwrap_or_else(|| self.histogram(text))
            })
            .collect())
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
