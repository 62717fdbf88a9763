use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_yellow, Severity};

/// Spinner shown on stderr while a query reads rollups.
pub struct QueryProgress {
    pb: ProgressBar,
}

impl QueryProgress {
    pub fn start(message: &str) -> Self {
        eprintln!("{}  {}", bright("⚙️"), bright("Query").underlined());
        let pb = create_spinner(bright_yellow(message).to_string());
        Self { pb }
    }

    pub fn finish(self, message: &str) {
        self.pb
            .finish_with_message(Severity::Good.paint(format!("{message} ✓")).to_string());
        eprintln!();
    }

    pub fn fail(self, message: &str) {
        self.pb
            .abandon_with_message(Severity::Critical.paint(format!("{message} ✗")).to_string());
        eprintln!();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
