//! Version marker for committed store generations.
//!
//! A build writes its index and metadata under a new generation number and
//! then replaces `manifest.json`. Readers follow only the manifest, so the
//! pair it names is always complete.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, ExemplarError, ExemplarResult};
use crate::store::write_atomically;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Current manifest format version
const CURRENT_VERSION: u32 = 1;

/// Seconds since the Unix epoch, UTC.
pub fn utc_timestamp() -> u64 {
    Utc::now().timestamp() as u64
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Version of the manifest format
    pub version: u32,

    /// Monotonic commit counter, part of the artifact file names
    pub generation: u64,

    /// Embedding model that produced the vectors
    pub model_name: String,

    pub dimension: usize,

    pub record_count: usize,

    /// Index file name, relative to the data directory
    pub index_file: String,

    /// Metadata file name, relative to the data directory
    pub metadata_file: String,

    /// Unix timestamp of the first commit of this store
    pub created_at: u64,

    /// Unix timestamp of the latest commit
    pub updated_at: u64,
}

impl Manifest {
    /// Manifest for `generation`.
    ///
    /// `created_at` is carried over from the previous manifest when there is
    /// one; otherwise the store is new and it is set to now.
    pub fn new(
        generation: u64,
        model_name: &str,
        dimension: usize,
        record_count: usize,
        created_at: Option<u64>,
    ) -> Self {
        let now = utc_timestamp();
        Self {
            version: CURRENT_VERSION,
            generation,
            model_name: model_name.to_string(),
            dimension,
            record_count,
            index_file: format!("index.{generation}.vec"),
            metadata_file: format!("metadata.{generation}.jsonl"),
            created_at: created_at.unwrap_or(now),
            updated_at: now,
        }
    }

    /// A generation number not used by any manifest or artifact in `data_dir`.
    pub fn next_generation(data_dir: &Path) -> u64 {
        let from_manifest = Self::load(data_dir).map(|m| m.generation).unwrap_or(0);
        let from_files = std::fs::read_dir(data_dir)
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|entry| entry.file_name().to_str().and_then(artifact_generation))
            .max()
            .unwrap_or(0);
        from_manifest.max(from_files) + 1
    }

    pub fn index_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.index_file)
    }

    pub fn metadata_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.metadata_file)
    }

    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(MANIFEST_FILE)
    }

    pub fn exists(data_dir: &Path) -> bool {
        Self::path(data_dir).is_file()
    }

    /// Replaces the manifest in `data_dir` atomically.
    pub fn save(&self, data_dir: &Path) -> ExemplarResult<()> {
        let path = Self::path(data_dir);
        write_atomically(&path, |writer| {
            serde_json::to_writer_pretty(&mut *writer, self)?;
            Ok(())
        })
        .with_path(&path)
    }

    pub fn load(data_dir: &Path) -> ExemplarResult<Self> {
        let path = Self::path(data_dir);
        let json = std::fs::read_to_string(&path).with_path(&path)?;

        let manifest: Self =
            serde_json::from_str(&json).map_err(|e| ExemplarError::CorruptState {
                path: path.clone(),
                reason: format!("invalid manifest: {e}"),
            })?;

        if manifest.version != CURRENT_VERSION {
            return Err(ExemplarError::CorruptState {
                path,
                reason: format!(
                    "manifest version {} is not supported (expected {CURRENT_VERSION})",
                    manifest.version
                ),
            });
        }

        Ok(manifest)
    }

    /// Removes artifacts in `data_dir` from generations other than this one.
    ///
    /// Best effort: failures are logged and otherwise ignored.
    pub fn remove_stale_artifacts(&self, data_dir: &Path) {
        let Ok(entries) = std::fs::read_dir(data_dir) else {
            return;
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if artifact_generation(name).is_none()
                || name == self.index_file
                || name == self.metadata_file
            {
                continue;
            }
            if let Err(e) = std::fs::remove_file(entry.path()) {
                tracing::debug!(file = name, "Failed to remove stale artifact: {e}");
            }
        }
    }
}

/// Generation number of an `index.<n>.vec` or `metadata.<n>.jsonl` file.
fn artifact_generation(name: &str) -> Option<u64> {
    let middle = name
        .strip_prefix("index.")
        .and_then(|rest| rest.strip_suffix(".vec"))
        .or_else(|| {
            name.strip_prefix("metadata.")
                .and_then(|rest| rest.strip_suffix(".jsonl"))
        });
    middle
        .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|n| n.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = Manifest::new(1, "AllMiniLML6V2", 384, 10, None);
        manifest.save(temp_dir.path()).unwrap();

        assert!(Manifest::exists(temp_dir.path()));
        let loaded = Manifest::load(temp_dir.path()).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.index_file, "index.1.vec");
        assert_eq!(loaded.metadata_file, "metadata.1.jsonl");
    }

    #[test]
    fn test_created_at_carries_over() {
        let first = Manifest::new(1, "mock", 8, 3, Some(1_700_000_000));
        assert_eq!(first.created_at, 1_700_000_000);
        assert!(first.updated_at > first.created_at);

        let second = Manifest::new(2, "mock", 8, 5, Some(first.created_at));
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.record_count, 5);
        assert_eq!(second.index_file, "index.2.vec");
    }

    #[test]
    fn test_next_generation_skips_used_numbers() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        assert_eq!(Manifest::next_generation(dir), 1);

        Manifest::new(3, "mock", 4, 0, None).save(dir).unwrap();
        assert_eq!(Manifest::next_generation(dir), 4);

        // orphan from a commit that never reached the manifest swap
        std::fs::write(dir.join("index.7.vec"), b"x").unwrap();
        assert_eq!(Manifest::next_generation(dir), 8);
    }

    #[test]
    fn test_missing_and_malformed() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!Manifest::exists(temp_dir.path()));
        assert!(matches!(
            Manifest::load(temp_dir.path()).unwrap_err(),
            ExemplarError::NotFound { .. }
        ));

        std::fs::write(Manifest::path(temp_dir.path()), "{ nope").unwrap();
        assert!(matches!(
            Manifest::load(temp_dir.path()).unwrap_err(),
            ExemplarError::CorruptState { .. }
        ));
    }

    #[test]
    fn test_remove_stale_artifacts_keeps_current_and_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        for name in [
            "index.1.vec",
            "metadata.1.jsonl",
            "index.2.vec",
            "metadata.2.jsonl",
            "notes.txt",
            "index.backup.vec",
        ] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }

        let manifest = Manifest::new(2, "mock", 4, 0, None);
        manifest.remove_stale_artifacts(dir);

        assert!(!dir.join("index.1.vec").exists());
        assert!(!dir.join("metadata.1.jsonl").exists());
        assert!(dir.join("index.2.vec").exists());
        assert!(dir.join("metadata.2.jsonl").exists());
        assert!(dir.join("notes.txt").exists());
        assert!(dir.join("index.backup.vec").exists());
    }
}
