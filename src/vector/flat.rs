//! Exact (flat) nearest-neighbor index over f32 vectors.
//!
//! Every query is a full scan computing squared L2 distance to each stored
//! vector. Results are ordered by ascending distance, ties broken by
//! insertion position, so the same index and query always produce the same
//! ranking.
//!
//! # Storage Format
//!
//! - Header (16 bytes): magic `EXVI`, version, dimension, vector count
//! - Vectors: contiguous f32 arrays in little-endian format, insertion order
//!
//! Files are read through a memory map and written through a temporary file
//! that is renamed over the target, so a reader never observes a partially
//! written index.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use memmap2::{Mmap, MmapOptions};
use rayon::prelude::*;

use crate::vector::types::{Neighbor, VectorDimension, VectorError};

/// Current storage format version.
const STORAGE_VERSION: u32 = 1;

/// Size of the storage header in bytes.
const HEADER_SIZE: usize = 16;

/// Magic bytes to identify flat index files.
const MAGIC_BYTES: &[u8; 4] = b"EXVI";

/// Number of bytes per f32 value.
const BYTES_PER_F32: usize = 4;

/// Flat L2 index.
///
/// An index created with [`FlatIndex::uninitialized`] (or `Default`) has no
/// dimension yet; `add` and `search` on it fail with
/// [`VectorError::NotInitialized`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatIndex {
    dimension: Option<VectorDimension>,
    /// Row-major vector data, `len() * dimension` values.
    data: Vec<f32>,
}

impl FlatIndex {
    /// Creates an empty index for vectors of the given dimension.
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            dimension: Some(dimension),
            data: Vec::new(),
        }
    }

    /// Creates an index without a dimension.
    #[must_use]
    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// Whether the index has a dimension and accepts vectors.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.dimension.is_some()
    }

    #[must_use]
    pub fn dimension(&self) -> Option<VectorDimension> {
        self.dimension
    }

    /// Number of stored vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        match self.dimension {
            Some(dim) => self.data.len() / dim.get(),
            None => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the vector stored at `position`.
    #[must_use]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let dim = self.dimension?.get();
        let start = position.checked_mul(dim)?;
        self.data.get(start..start + dim)
    }

    /// Appends vectors in input order.
    ///
    /// All vectors are validated before any is appended, so a dimension
    /// mismatch leaves the index unchanged.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), VectorError> {
        let dimension = self.dimension.ok_or(VectorError::NotInitialized)?;

        for vector in vectors {
            dimension.validate_vector(vector)?;
        }

        self.data.reserve(vectors.len() * dimension.get());
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Returns the `k` nearest vectors to `query` by ascending squared L2
    /// distance. Ties keep insertion order. `k` larger than the index
    /// returns every vector.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, VectorError> {
        let dimension = self.dimension.ok_or(VectorError::NotInitialized)?;
        dimension.validate_vector(query)?;

        if k == 0 || self.data.is_empty() {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .par_chunks_exact(dimension.get())
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance: squared_l2(query, vector),
            })
            .collect();

        // Stable sort: equal distances stay in insertion order.
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(k);

        Ok(neighbors)
    }

    /// Writes the index to `path`, replacing any existing file atomically.
    pub fn persist(&self, path: &Path) -> Result<(), VectorError> {
        let dimension = self.dimension.ok_or(VectorError::NotInitialized)?;
        let count = u32::try_from(self.len()).map_err(|_| {
            VectorError::InvalidFormat(format!(
                "{} vectors exceed the format limit of {}",
                self.len(),
                u32::MAX
            ))
        })?;

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let temp = tempfile::NamedTempFile::new_in(parent)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            writer.write_all(MAGIC_BYTES)?;
            writer.write_all(&STORAGE_VERSION.to_le_bytes())?;
            writer.write_all(&(dimension.get() as u32).to_le_bytes())?;
            writer.write_all(&count.to_le_bytes())?;
            for &value in &self.data {
                writer.write_all(&value.to_le_bytes())?;
            }
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| VectorError::Storage(e.error))?;

        Ok(())
    }

    /// Loads an index previously written by [`FlatIndex::persist`].
    pub fn load(path: &Path) -> Result<Self, VectorError> {
        if !path.exists() {
            return Err(VectorError::NotFound(path.display().to_string()));
        }

        let file = File::open(path)?;
        let file_len = file.metadata()?.len() as usize;
        if file_len < HEADER_SIZE {
            return Err(VectorError::InvalidFormat(
                "File too small to contain header".to_string(),
            ));
        }

        let mmap = unsafe { MmapOptions::new().map(&file)? };
        let (dimension, count) = read_header(&mmap)?;

        let expected_len = count
            .checked_mul(dimension.get())
            .and_then(|values| values.checked_mul(BYTES_PER_F32))
            .and_then(|bytes| bytes.checked_add(HEADER_SIZE))
            .ok_or_else(|| VectorError::InvalidFormat("Header sizes overflow".to_string()))?;
        if mmap.len() != expected_len {
            return Err(VectorError::InvalidFormat(format!(
                "Expected {expected_len} bytes for {count} vectors of dimension {dimension}, found {}",
                mmap.len()
            )));
        }

        let data: Vec<f32> = mmap[HEADER_SIZE..]
            .chunks_exact(BYTES_PER_F32)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self {
            dimension: Some(dimension),
            data,
        })
    }
}

fn read_header(mmap: &Mmap) -> Result<(VectorDimension, usize), VectorError> {
    if &mmap[0..4] != MAGIC_BYTES {
        return Err(VectorError::InvalidFormat(
            "Invalid magic bytes".to_string(),
        ));
    }

    let version = u32::from_le_bytes([mmap[4], mmap[5], mmap[6], mmap[7]]);
    if version != STORAGE_VERSION {
        return Err(VectorError::VersionMismatch {
            expected: STORAGE_VERSION,
            actual: version,
        });
    }

    let dim_value = u32::from_le_bytes([mmap[8], mmap[9], mmap[10], mmap[11]]);
    let dimension = VectorDimension::new(dim_value as usize)?;

    let count = u32::from_le_bytes([mmap[12], mmap[13], mmap[14], mmap[15]]) as usize;

    Ok((dimension, count))
}

/// Squared Euclidean distance.
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dim(n: usize) -> VectorDimension {
        VectorDimension::new(n).unwrap()
    }

    #[test]
    fn test_uninitialized_index_rejects_operations() {
        let mut index = FlatIndex::uninitialized();
        assert!(!index.is_initialized());
        assert!(matches!(
            index.add(&[vec![1.0, 2.0]]),
            Err(VectorError::NotInitialized)
        ));
        assert!(matches!(
            index.search(&[1.0, 2.0], 1),
            Err(VectorError::NotInitialized)
        ));
    }

    #[test]
    fn test_add_appends_in_order() {
        let mut index = FlatIndex::new(dim(2));
        index.add(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        index.add(&[vec![5.0, 6.0]]).unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.vector(0), Some(&[1.0, 2.0][..]));
        assert_eq!(index.vector(2), Some(&[5.0, 6.0][..]));
        assert_eq!(index.vector(3), None);
    }

    #[test]
    fn test_dimension_mismatch_leaves_index_unchanged() {
        let mut index = FlatIndex::new(dim(3));
        index.add(&[vec![1.0, 1.0, 1.0]]).unwrap();

        let result = index.add(&[vec![2.0, 2.0, 2.0], vec![1.0, 2.0]]);
        assert!(matches!(
            result,
            Err(VectorError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_search_orders_by_distance() {
        let mut index = FlatIndex::new(dim(2));
        index
            .add(&[vec![10.0, 0.0], vec![1.0, 0.0], vec![3.0, 0.0]])
            .unwrap();

        let results = index.search(&[0.0, 0.0], 3).unwrap();
        let positions: Vec<usize> = results.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![1, 2, 0]);
        assert_eq!(results[0].distance, 1.0);
        assert_eq!(results[1].distance, 9.0);
        assert_eq!(results[2].distance, 100.0);
    }

    #[test]
    fn test_search_ties_keep_insertion_order() {
        let mut index = FlatIndex::new(dim(2));
        index
            .add(&[
                vec![0.0, 1.0],
                vec![1.0, 0.0],
                vec![0.0, -1.0],
                vec![-1.0, 0.0],
            ])
            .unwrap();

        let results = index.search(&[0.0, 0.0], 4).unwrap();
        let positions: Vec<usize> = results.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_search_k_saturates() {
        let mut index = FlatIndex::new(dim(1));
        index.add(&[vec![1.0], vec![2.0]]).unwrap();

        assert_eq!(index.search(&[0.0], 10).unwrap().len(), 2);
        assert!(index.search(&[0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_validates_query_dimension() {
        let index = FlatIndex::new(dim(3));
        assert!(matches!(
            index.search(&[1.0], 1),
            Err(VectorError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_persist_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("index.vec");

        let mut index = FlatIndex::new(dim(3));
        index
            .add(&[vec![0.1, -2.5, 3.25], vec![f32::MIN_POSITIVE, 0.0, 1e30]])
            .unwrap();
        index.persist(&path).unwrap();

        let loaded = FlatIndex::load(&path).unwrap();
        assert_eq!(loaded, index);
        assert_eq!(loaded.dimension(), Some(dim(3)));
    }

    #[test]
    fn test_persist_empty_index_keeps_dimension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.vec");

        FlatIndex::new(dim(7)).persist(&path).unwrap();
        let loaded = FlatIndex::load(&path).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.dimension(), Some(dim(7)));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = FlatIndex::load(&temp_dir.path().join("missing.vec"));
        assert!(matches!(result, Err(VectorError::NotFound(_))));
    }

    #[test]
    fn test_load_rejects_truncated_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.vec");

        let mut index = FlatIndex::new(dim(2));
        index.add(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        index.persist(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

        assert!(matches!(
            FlatIndex::load(&path),
            Err(VectorError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_load_rejects_bad_magic() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.vec");
        std::fs::write(&path, [0u8; 32]).unwrap();

        assert!(matches!(
            FlatIndex::load(&path),
            Err(VectorError::InvalidFormat(_))
        ));
    }
}
