//! Reading the source corpus.
//!
//! A corpus is newline-delimited JSON with one [`Record`] per line, the same
//! schema the metadata store persists. Blank lines are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::error::{ErrorContext, ExemplarError, ExemplarResult};
use crate::types::Record;

/// Reads every record of the corpus at `path`, in file order.
pub fn read_corpus(path: &Path) -> ExemplarResult<Vec<Record>> {
    let file = File::open(path).with_path(path)?;
    let records = parse_corpus(BufReader::new(file), path)?;
    debug!(path = %path.display(), records = records.len(), "Read corpus");
    Ok(records)
}

/// Parses corpus lines from `reader`. `path` is only used in errors.
pub fn parse_corpus<R: BufRead>(reader: R, path: &Path) -> ExemplarResult<Vec<Record>> {
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|e| ExemplarError::CorpusParse {
            path: path.to_path_buf(),
            line: line_no,
            reason: e.to_string(),
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record = serde_json::from_str(trimmed).map_err(|e| ExemplarError::CorpusParse {
            path: path.to_path_buf(),
            line: line_no,
            reason: e.to_string(),
        })?;
        records.push(record);
    }

    Ok(records)
}
