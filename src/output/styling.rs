use std::fmt::Display;

use comfy_table::Color as TableColor;
use console::{style, StyledObject};

/// Traffic-light rating shared by table cells and overview lines.
///
/// Every metric rated here is better when lower.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Good,
    Warning,
    Critical,
}

impl Severity {
    fn from_thresholds(value: f64, warning: f64, critical: f64) -> Self {
        if value >= critical {
            Self::Critical
        } else if value >= warning {
            Self::Warning
        } else {
            Self::Good
        }
    }

    /// `rate` is a fraction in `[0, 1]`.
    pub fn failure_rate(rate: f64) -> Self {
        Self::from_thresholds(rate, 0.25, 0.5)
    }

    /// `rate` is a fraction in `[0, 1]`.
    pub fn flake_rate(rate: f64) -> Self {
        Self::from_thresholds(rate, 0.05, 0.10)
    }

    /// Relative change against the previous window, in percent.
    pub fn change(percent: f64) -> Self {
        if percent <= 0.0 {
            Self::Good
        } else {
            Self::from_thresholds(percent, 0.0, 10.0)
        }
    }

    pub fn table_color(self) -> TableColor {
        match self {
            Self::Good => TableColor::Green,
            Self::Warning => TableColor::Yellow,
            Self::Critical => TableColor::Red,
        }
    }

    pub fn paint(self, text: impl Display) -> StyledObject<String> {
        let styled = style(text.to_string()).bright();
        match self {
            Self::Good => styled.green(),
            Self::Warning => styled.yellow(),
            Self::Critical => styled.red(),
        }
    }
}

pub fn bright_yellow(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn cyan(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn dim(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn bright(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright()
}

pub fn magenta_bold(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}
