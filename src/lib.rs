//! Exemplar retrieval for grounding creative prompt generation.
//!
//! A curated corpus of [`Record`]s is embedded into a flat L2 index whose
//! positions line up 1:1 with an NDJSON metadata store. Builds are
//! incremental by exact `raw` text and fall back to a full rebuild when the
//! committed state cannot be extended. Searches over-fetch candidates and
//! drop near-duplicate `raw` texts before returning ranked hits.

pub mod config;
pub mod context;
pub mod corpus;
pub mod display;
pub mod error;
pub mod io;
pub mod store;
pub mod types;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use context::build_context;
pub use corpus::{parse_corpus, read_corpus};
pub use error::{ExemplarError, ExemplarResult};
pub use store::{BuildMode, BuildReport, ExemplarStore, StoreStats};
pub use types::{Record, SearchHit};
pub use vector::{EmbeddingGenerator, EmbeddingRegistry, FlatIndex, VectorDimension, VectorError};
