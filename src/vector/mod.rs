//! Vector layer: exact nearest-neighbor index and embedding providers.
//!
//! # Architecture
//! [`FlatIndex`] stores vectors row-major and answers queries with a full
//! scan, so rankings are exact and reproducible. Embeddings come from an
//! [`EmbeddingGenerator`]; loaded providers are shared through an
//! [`EmbeddingRegistry`] so a model is initialized once per process.

mod embedding;
mod flat;
mod registry;
mod types;

// Re-export core types for public API
#[cfg(test)]
pub use embedding::MockEmbeddingGenerator;
pub use embedding::{
    EmbeddingGenerator, FastEmbedGenerator, ModelOptions, SUPPORTED_MODELS, parse_embedding_model,
};
pub use flat::FlatIndex;
pub use registry::EmbeddingRegistry;
pub use types::{Neighbor, VECTOR_DIMENSION_384, VectorDimension, VectorError};
