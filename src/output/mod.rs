mod progress;
mod styling;
mod summary;
mod tables;

pub use progress::QueryProgress;
pub use styling::{dim, magenta_bold};
pub use summary::{render_aggregates, render_flakes, render_results, render_summary, Scope};

/// Prints the testlens banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🧪 testlens"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Test analytics over precomputed rollups")
    );
}
