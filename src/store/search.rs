//! Ranked retrieval with near-duplicate suppression.

use tracing::debug;

use crate::error::ExemplarResult;
use crate::store::metadata::MetadataStore;
use crate::store::similarity::is_near_duplicate;
use crate::types::{Record, SearchHit};
use crate::vector::{EmbeddingGenerator, FlatIndex};

/// Candidates fetched per requested result before duplicates are removed.
pub const CANDIDATE_MULTIPLIER: usize = 3;

/// Default similarity above which two `raw` texts count as duplicates.
pub const DEFAULT_DEDUP_THRESHOLD: f64 = 0.6;

/// Returns up to `k` distinct records nearest to `query`.
///
/// Fetches `3 * k` neighbors and keeps them in rank order, skipping any
/// whose `raw` fingerprint is a near-duplicate of one already kept. Fewer
/// than `k` hits is a normal outcome; the window is never widened.
pub fn search(
    generator: &dyn EmbeddingGenerator,
    index: &FlatIndex,
    metadata: &MetadataStore,
    query: &str,
    k: usize,
    threshold: f64,
) -> ExemplarResult<Vec<SearchHit>> {
    let query_vector = generator.generate_embedding(query)?;
    let candidate_k = k.saturating_mul(CANDIDATE_MULTIPLIER);
    let neighbors = index.search(&query_vector, candidate_k)?;

    let candidates = neighbors.iter().filter_map(|neighbor| {
        metadata
            .get(neighbor.position)
            .map(|record| (record, neighbor.distance))
    });
    let hits = select_distinct(candidates, k, threshold);

    debug!(
        candidates = neighbors.len(),
        accepted = hits.len(),
        k,
        "Search completed"
    );
    Ok(hits)
}

/// Walks ranked candidates and keeps the first `k` that are not
/// near-duplicates of an earlier pick.
///
/// A candidate with an empty fingerprint is always kept and is not
/// compared against later candidates.
pub fn select_distinct<'r, I>(candidates: I, k: usize, threshold: f64) -> Vec<SearchHit>
where
    I: IntoIterator<Item = (&'r Record, f32)>,
{
    let mut hits = Vec::new();
    let mut fingerprints: Vec<&str> = Vec::new();

    for (record, distance) in candidates {
        if hits.len() >= k {
            break;
        }

        let fingerprint = record.fingerprint();
        if !fingerprint.is_empty() {
            if fingerprints
                .iter()
                .any(|accepted| is_near_duplicate(fingerprint, accepted, threshold))
            {
                continue;
            }
            fingerprints.push(fingerprint);
        }

        hits.push(SearchHit {
            record: record.clone(),
            distance,
        });
    }

    hits
}
