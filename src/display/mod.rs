//! Terminal output for the CLI: styles, progress bars and summary tables.

pub mod progress;
pub mod tables;
pub mod theme;

pub use progress::{create_embedding_bar, create_spinner, with_spinner};
pub use tables::{create_build_table, create_results_table, create_stats_table};
pub use theme::{THEME, Theme};
