use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use super::styling::Severity;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

/// Formats a fraction in `[0, 1]` as a percentage.
pub fn format_rate(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

pub fn format_duration(seconds: f64) -> String {
    if seconds < 1.0 {
        format!("{:.0}ms", seconds * 1000.0)
    } else if seconds < 60.0 {
        format!("{seconds:.2}s")
    } else {
        let minutes = (seconds / 60.0).floor();
        format!("{minutes:.0}m {:.0}s", seconds - minutes * 60.0)
    }
}

pub fn format_change(change: Option<f64>) -> String {
    change.map_or_else(|| "N/A".to_string(), |change| format!("{change:+.1}%"))
}

pub fn color_coded_failure_cell(rate: f64) -> Cell {
    Cell::new(format_rate(rate)).fg(Severity::failure_rate(rate).table_color())
}

pub fn color_coded_flakiness_cell(rate: f64) -> Cell {
    Cell::new(format_rate(rate)).fg(Severity::flake_rate(rate).table_color())
}

pub fn color_coded_change_cell(change: Option<f64>) -> Cell {
    match change {
        Some(percent) => {
            Cell::new(format_change(change)).fg(Severity::change(percent).table_color())
        }
        None => Cell::new(format_change(None)).fg(TableColor::DarkGrey),
    }
}
