//! Styling for the CLI's status lines and search output.

use console::Style;
use is_terminal::IsTerminal;
use owo_colors::{AnsiColors, OwoColorize};
use std::fmt::Display;
use std::sync::LazyLock;

/// Theme for the current process, colored only when stdout is a terminal
/// and `NO_COLOR` is unset.
pub static THEME: LazyLock<Theme> = LazyLock::new(Theme::detect);

#[derive(Debug, Clone)]
pub struct Theme {
    colors: bool,
    rank: Style,
    distance: Style,
    hint: Style,
    path: Style,
}

impl Theme {
    pub fn detect() -> Self {
        let colors = std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal();
        Self::with_colors(colors)
    }

    pub fn with_colors(colors: bool) -> Self {
        Self {
            colors,
            rank: Style::new().cyan().bold(),
            distance: Style::new().cyan(),
            hint: Style::new().dim(),
            path: Style::new().magenta(),
        }
    }

    /// `✓ text`, for a committed build or a written config.
    pub fn done(&self, text: &str) -> String {
        self.mark("✓", AnsiColors::BrightGreen, text)
    }

    /// `⚠ text`, for a fallback rebuild or an empty result.
    pub fn warn(&self, text: &str) -> String {
        self.mark("⚠", AnsiColors::BrightYellow, text)
    }

    /// `✗ text`, for the error reported before exiting.
    pub fn fail(&self, text: &str) -> String {
        self.mark("✗", AnsiColors::BrightRed, text)
    }

    /// Recovery suggestion printed under a failure.
    pub fn hint(&self, text: &str) -> String {
        self.paint(&self.hint, text)
    }

    pub fn path(&self, path: impl Display) -> String {
        self.paint(&self.path, path)
    }

    /// `#rank distance d` above each search hit.
    pub fn hit_header(&self, rank: usize, distance: f32) -> String {
        format!(
            "{} {}",
            self.paint(&self.rank, format!("#{rank}")),
            self.paint(&self.distance, format!("distance {distance:.4}"))
        )
    }

    fn mark(&self, icon: &str, color: AnsiColors, text: &str) -> String {
        if self.colors {
            format!("{} {}", icon.color(color), text.color(color))
        } else {
            format!("{icon} {text}")
        }
    }

    fn paint(&self, style: &Style, text: impl Display) -> String {
        if self.colors {
            style.apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_theme_has_no_escapes() {
        let theme = Theme::with_colors(false);
        assert_eq!(theme.done("Store committed"), "✓ Store committed");
        assert_eq!(theme.warn("No exemplars found"), "⚠ No exemplars found");
        assert_eq!(theme.fail("manifest missing"), "✗ manifest missing");
        assert_eq!(theme.path("/srv/data"), "/srv/data");
        assert_eq!(theme.hit_header(2, 0.125), "#2 distance 0.1250");
    }

    #[test]
    fn test_colored_theme_keeps_text() {
        let theme = Theme::with_colors(true);
        let line = theme.done("Store committed");
        assert!(line.contains("Store committed"));
        assert!(line.contains('\u{1b}'));
    }
}
