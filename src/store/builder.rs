//! Full and incremental construction of the index/metadata pair.
//!
//! A full build embeds every corpus record. An incremental build keeps the
//! committed pair, finds corpus records whose `raw` text is not stored yet
//! (exact comparison) and appends only those. Either way position `i` of
//! the index holds the embedding of record `i`'s search text.

use std::collections::HashSet;

use indicatif::ProgressBar;
use serde::Serialize;
use tracing::debug;

use crate::error::{ExemplarError, ExemplarResult};
use crate::store::metadata::MetadataStore;
use crate::types::Record;
use crate::vector::{EmbeddingGenerator, FlatIndex};

/// Upper bound on texts sent to the provider in one call.
pub const MAX_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    /// Everything was embedded and the stored pair replaced.
    Full,
    /// New records were embedded and appended.
    Incremental,
    /// Nothing new; nothing was written.
    UpToDate,
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
            Self::UpToDate => "up to date",
        };
        f.write_str(name)
    }
}

/// Outcome of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub mode: BuildMode,
    /// Records in the store afterwards
    pub total: usize,
    /// Records embedded by this build
    pub added: usize,
    /// An incremental build failed and a full rebuild replaced it
    pub fell_back: bool,
}

/// Embeds records in bounded batches, in order.
pub(crate) struct Embedder<'a> {
    generator: &'a dyn EmbeddingGenerator,
    batch_size: usize,
    progress: Option<&'a ProgressBar>,
}

impl<'a> Embedder<'a> {
    pub(crate) fn new(
        generator: &'a dyn EmbeddingGenerator,
        batch_size: usize,
        progress: Option<&'a ProgressBar>,
    ) -> Self {
        Self {
            generator,
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
            progress,
        }
    }

    /// One vector per record, same order.
    pub(crate) fn embed<'r, I>(&self, records: I) -> ExemplarResult<Vec<Vec<f32>>>
    where
        I: IntoIterator<Item = &'r Record>,
    {
        let texts: Vec<String> = records.into_iter().map(Record::search_text).collect();

        if let Some(pb) = self.progress {
            pb.set_length(texts.len() as u64);
            pb.set_position(0);
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for (batch, chunk) in texts.chunks(self.batch_size).enumerate() {
            let refs: Vec<&str> = chunk.iter().map(String::as_str).collect();
            debug!(batch, size = refs.len(), "Embedding batch");

            let embedded = self.generator.generate_embeddings(&refs)?;
            if embedded.len() != refs.len() {
                return Err(ExemplarError::EmbeddingFailure(format!(
                    "provider returned {} vectors for {} texts",
                    embedded.len(),
                    refs.len()
                )));
            }
            vectors.extend(embedded);

            if let Some(pb) = self.progress {
                pb.inc(refs.len() as u64);
            }
        }

        Ok(vectors)
    }

    fn fresh_index(&self) -> FlatIndex {
        FlatIndex::new(self.generator.dimension())
    }
}

/// Builds a new pair from the whole corpus.
pub(crate) fn full_build(
    embedder: &Embedder<'_>,
    corpus: &[Record],
) -> ExemplarResult<(FlatIndex, MetadataStore)> {
    let vectors = embedder.embed(corpus)?;

    let mut index = embedder.fresh_index();
    index.add(&vectors)?;

    Ok((index, MetadataStore::from_records(corpus.to_vec())))
}

/// Corpus records whose `raw` text is not already stored, in corpus order.
///
/// Only stored records are consulted, so two new records sharing a `raw`
/// are both returned.
pub fn new_records<'c>(existing: &MetadataStore, corpus: &'c [Record]) -> Vec<&'c Record> {
    let known: HashSet<&str> = existing.records().iter().map(Record::raw_key).collect();
    corpus
        .iter()
        .filter(|record| !known.contains(record.raw_key()))
        .collect()
}

/// Embeds `additions` and appends them to the loaded pair.
pub(crate) fn append(
    embedder: &Embedder<'_>,
    mut index: FlatIndex,
    mut metadata: MetadataStore,
    additions: &[&Record],
) -> ExemplarResult<(FlatIndex, MetadataStore)> {
    let vectors = embedder.embed(additions.iter().copied())?;

    index.add(&vectors)?;
    metadata.append(additions.iter().map(|record| (*record).clone()));

    Ok((index, metadata))
}
