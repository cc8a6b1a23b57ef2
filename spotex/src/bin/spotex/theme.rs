use colored::Color;
use comfy_table::Color as CellColor;
use once_cell::sync::Lazy;
use spotex::monitor::Severity;

/// Colors for status lines and help text.
pub struct ColorTheme {
    pub success: Color,
    pub error: Color,
    pub warning: Color,
    pub info: Color,
    pub highlight: Color,
    pub muted: Color,
    pub primary: Color,
    pub secondary: Color,
    pub key: Color,
    pub value: Color,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            success: Color::Green,
            error: Color::Red,
            warning: Color::Yellow,
            info: Color::Blue,
            highlight: Color::Cyan,
            muted: Color::BrightBlack,
            primary: Color::BrightBlue,
            secondary: Color::Magenta,
            key: Color::BrightCyan,
            value: Color::White,
        }
    }
}

pub static THEME: Lazy<ColorTheme> = Lazy::new(ColorTheme::default);

/// Table cell color for a security finding.
pub fn severity_color(severity: Severity) -> CellColor {
    match severity {
        Severity::High => CellColor::Red,
        Severity::Medium => CellColor::Yellow,
        Severity::Low => CellColor::DarkGrey,
    }
}

/// Table cell color for an opportunity status. Live loads stand out, closed ones fade.
pub fn status_color(status: &str) -> CellColor {
    match status {
        "open" => CellColor::Green,
        "bidding" => CellColor::Yellow,
        "awarded" | "in_transit" => CellColor::Cyan,
        "delivered" => CellColor::Blue,
        _ => CellColor::DarkGrey,
    }
}

pub struct Icons {
    pub success: &'static str,
    pub error: &'static str,
    pub warning: &'static str,
    pub info: &'static str,
    pub arrow: &'static str,
    pub bullet: &'static str,
    pub loading: &'static str,
    /// Marks the user's default saved search.
    pub default_search: &'static str,
    /// Joins origin and destination in a lane.
    pub lane: &'static str,
    pub hazmat: &'static str,
}

pub const ICONS: Icons = Icons {
    success: "✓",
    error: "✗",
    warning: "⚠",
    info: "ℹ",
    arrow: "→",
    bullet: "•",
    loading: "⟳",
    default_search: "★",
    lane: "⇢",
    hazmat: "☣",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_severity_is_red() {
        assert_eq!(severity_color(Severity::High), CellColor::Red);
        assert_eq!(severity_color(Severity::Low), CellColor::DarkGrey);
    }

    #[test]
    fn closed_statuses_fade() {
        assert_eq!(status_color("open"), CellColor::Green);
        assert_eq!(status_color("cancelled"), CellColor::DarkGrey);
        assert_eq!(status_color("expired"), CellColor::DarkGrey);
    }
}
