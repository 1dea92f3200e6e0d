//! Table formatting for build reports, store statistics and search hits.

use chrono::{DateTime, Utc};
use comfy_table::{
    Attribute, Cell, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_FULL,
};

use crate::store::{BuildMode, BuildReport, StoreStats};
use crate::types::SearchHit;

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

/// Summary of a finished build.
pub fn create_build_table(report: &BuildReport, elapsed: std::time::Duration) -> String {
    let mut table = new_table(&["Metric", "Value"]);

    let mode_color = match report.mode {
        BuildMode::Full if report.fell_back => Color::Yellow,
        BuildMode::Full => Color::Cyan,
        BuildMode::Incremental => Color::Green,
        BuildMode::UpToDate => Color::Grey,
    };
    let mode = if report.fell_back {
        format!("{} (incremental failed)", report.mode)
    } else {
        report.mode.to_string()
    };

    table.add_row(vec![
        Cell::new("Mode"),
        Cell::new(mode).fg(mode_color).add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec!["Records embedded", &report.added.to_string()]);
    table.add_row(vec!["Records in store", &report.total.to_string()]);
    table.add_row(vec!["Time", &format!("{elapsed:.2?}")]);

    table.to_string()
}

/// Statistics of the committed store.
pub fn create_stats_table(stats: &StoreStats) -> String {
    let mut table = new_table(&["Property", "Value"]);

    table.add_row(vec!["Records", &stats.records.to_string()]);
    table.add_row(vec!["Model", &stats.model_name]);
    table.add_row(vec!["Dimension", &stats.dimension.to_string()]);
    table.add_row(vec!["Generation", &stats.generation.to_string()]);
    table.add_row(vec!["Created", &format_timestamp(stats.created_at)]);
    table.add_row(vec!["Updated", &format_timestamp(stats.updated_at)]);
    table.add_row(vec!["Data directory", &stats.data_dir.display().to_string()]);

    table.to_string()
}

/// Ranked search hits, one row each.
pub fn create_results_table(hits: &[SearchHit]) -> String {
    let mut table = new_table(&["#", "Distance", "Subject", "Style", "Raw"]);

    for (i, hit) in hits.iter().enumerate() {
        let record = &hit.record;
        table.add_row(vec![
            (i + 1).to_string(),
            format!("{:.4}", hit.distance),
            record.subject.clone().unwrap_or_default(),
            record.art_style.clone().unwrap_or_default(),
            record.raw_key().trim().to_string(),
        ]);
    }

    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Record;
    use std::path::PathBuf;

    #[test]
    fn test_build_table_mentions_fallback() {
        let report = BuildReport {
            mode: BuildMode::Full,
            total: 3,
            added: 3,
            fell_back: true,
        };
        let table = create_build_table(&report, std::time::Duration::from_millis(1500));
        assert!(table.contains("full (incremental failed)"));
        assert!(table.contains("Records in store"));
    }

    #[test]
    fn test_stats_table() {
        let stats = StoreStats {
            records: 12,
            dimension: 384,
            model_name: "AllMiniLML6V2".to_string(),
            generation: 4,
            created_at: 0,
            updated_at: 86_400,
            data_dir: PathBuf::from(".exemplar/data"),
        };
        let table = create_stats_table(&stats);
        assert!(table.contains("AllMiniLML6V2"));
        assert!(table.contains("1970-01-02 00:00:00 UTC"));
    }

    #[test]
    fn test_results_table_rows() {
        let hits = vec![SearchHit {
            record: Record::from_raw(" A dragon on a mountain "),
            distance: 0.25,
        }];
        let table = create_results_table(&hits);
        assert!(table.contains("0.2500"));
        assert!(table.contains("A dragon on a mountain"));
    }
}
