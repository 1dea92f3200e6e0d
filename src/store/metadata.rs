//! Ordered record storage aligned with the flat index.
//!
//! Persisted as newline-delimited JSON: one record per line, UTF-8,
//! non-ASCII written as-is.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{ErrorContext, ExemplarError, ExemplarResult};
use crate::store::write_atomically;
use crate::types::Record;

/// Records in index order. Position `i` describes vector `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataStore {
    records: Vec<Record>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Appends records after the existing ones, keeping their order.
    pub fn append(&mut self, records: impl IntoIterator<Item = Record>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Record> {
        self.records.get(position)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Writes all records to `path`, replacing the file atomically.
    pub fn persist(&self, path: &Path) -> ExemplarResult<()> {
        write_atomically(path, |writer| {
            for record in &self.records {
                serde_json::to_writer(&mut *writer, record)?;
                writer.write_all(b"\n")?;
            }
            Ok(())
        })
        .with_path(path)
    }

    /// Reads records written by [`MetadataStore::persist`].
    ///
    /// Blank lines are ignored. Any line that is not a valid record makes
    /// the whole file [`ExemplarError::CorruptState`].
    pub fn load(path: &Path) -> ExemplarResult<Self> {
        let file = File::open(path).with_path(path)?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| corrupt_or_io(path, index + 1, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Record =
                serde_json::from_str(&line).map_err(|e| ExemplarError::CorruptState {
                    path: path.to_path_buf(),
                    reason: format!("line {}: {e}", index + 1),
                })?;
            records.push(record);
        }

        Ok(Self { records })
    }
}

/// Invalid UTF-8 surfaces as `InvalidData`; that is corruption, not I/O.
fn corrupt_or_io(path: &Path, line: usize, error: std::io::Error) -> ExemplarError {
    if error.kind() == std::io::ErrorKind::InvalidData {
        ExemplarError::CorruptState {
            path: path.to_path_buf(),
            reason: format!("line {line}: {error}"),
        }
    } else {
        ExemplarError::Persistence {
            path: path.to_path_buf(),
            source: error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Vec<Record> {
        vec![
            Record::from_raw("A cat in space"),
            Record {
                subject: Some("龙".to_string()),
                visual_elements: Some(vec!["山".to_string(), "云".to_string()]),
                raw: Some("一条龙在山上".to_string()),
                ..Record::default()
            },
        ]
    }

    #[test]
    fn test_persist_and_load_preserves_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metadata.jsonl");

        let mut store = MetadataStore::new();
        store.append(sample());
        store.append([Record::from_raw("last")]);
        store.persist(&path).unwrap();

        let loaded = MetadataStore::load(&path).unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.get(2).unwrap().raw.as_deref(), Some("last"));
    }

    #[test]
    fn test_one_object_per_line_unescaped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metadata.jsonl");

        MetadataStore::from_records(sample()).persist(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("一条龙在山上"));
        assert!(!lines[1].contains("\\u"));
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = MetadataStore::load(&temp_dir.path().join("absent.jsonl")).unwrap_err();
        assert!(matches!(err, ExemplarError::NotFound { .. }));
    }

    #[test]
    fn test_malformed_line_is_corrupt_state() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metadata.jsonl");
        std::fs::write(&path, "{\"raw\":\"ok\"}\n\n{not json\n").unwrap();

        match MetadataStore::load(&path).unwrap_err() {
            ExemplarError::CorruptState { reason, .. } => assert!(reason.starts_with("line 3")),
            other => panic!("Expected CorruptState, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_utf8_is_corrupt_state() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metadata.jsonl");
        std::fs::write(&path, [0xff, 0xfe, b'\n']).unwrap();

        let err = MetadataStore::load(&path).unwrap_err();
        assert!(matches!(err, ExemplarError::CorruptState { .. }));
    }
}
