use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::analytics::{ListTestResults, OrderingDirection, OrderingField, TestAnalytics};
use crate::config::{Config, OutputFormat};
use crate::insights::SummaryReport;
use crate::output::{self, QueryProgress, Scope};
use crate::pagination::PageArgs;

#[derive(Parser)]
#[command(name = "testlens")]
#[command(author, version, about = "Test analytics over precomputed rollups", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file, defaults to ./testlens.{toml,json,yaml,yml}
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Overrides the configured output format
    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Args)]
struct ScopeArgs {
    #[arg(short, long, env = "TESTLENS_REPO_ID")]
    repo_id: u64,

    #[arg(short, long)]
    branch: Option<String>,

    /// Window size in days
    #[arg(short, long, default_value_t = 30)]
    interval: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// List per-test statistics, one page at a time
    Results {
        #[command(flatten)]
        scope: ScopeArgs,

        #[arg(long, value_enum, default_value_t = OrderingField::AvgDuration)]
        ordering: OrderingField,

        #[arg(long, value_enum, default_value_t = OrderingDirection::Desc)]
        direction: OrderingDirection,

        #[arg(long)]
        first: Option<usize>,

        #[arg(long)]
        after: Option<String>,

        #[arg(long)]
        last: Option<usize>,

        #[arg(long)]
        before: Option<String>,

        /// Substring of the test name
        #[arg(short, long)]
        term: Option<String>,

        #[arg(long = "testsuite")]
        testsuites: Vec<String>,

        #[arg(long = "flag")]
        flags: Vec<String>,
    },
    /// Durations, failures and slow tests compared with the previous window
    Aggregates {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Flake rate and flaky failures compared with the previous window
    Flakes {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Aggregates and flakes together
    Summary {
        #[command(flatten)]
        scope: ScopeArgs,
    },
}

/// Settings that decide how a report is written.
struct Rendering {
    format: OutputFormat,
    pretty: bool,
}

impl Cli {
    fn emit<T: Serialize>(
        &self,
        rendering: &Rendering,
        value: &T,
        render: impl FnOnce() -> String,
    ) -> Result<()> {
        let text = match rendering.format {
            OutputFormat::Json if rendering.pretty => serde_json::to_string_pretty(value)?,
            OutputFormat::Json => serde_json::to_string(value)?,
            OutputFormat::Summary => render(),
        };

        if let Some(output_path) = &self.output {
            std::fs::write(output_path, text)
                .with_context(|| format!("Failed to write report: {}", output_path.display()))?;
            info!("Report written to: {}", output_path.display());
        } else {
            println!("{text}");
        }

        Ok(())
    }

    async fn run(
        &self,
        analytics: &TestAnalytics,
        config: &Config,
        rendering: &Rendering,
    ) -> Result<()> {
        match &self.command {
            Commands::Results {
                scope,
                ordering,
                direction,
                first,
                after,
                last,
                before,
                term,
                testsuites,
                flags,
            } => {
                let branch = scope
                    .branch
                    .clone()
                    .unwrap_or_else(|| config.analytics.default_branch.clone());
                let args = ListTestResults {
                    repo_id: scope.repo_id,
                    ordering: *ordering,
                    ordering_direction: *direction,
                    interval_days: scope.interval,
                    page: PageArgs {
                        first: *first,
                        after: after.clone(),
                        last: *last,
                        before: before.clone(),
                    },
                    branch: Some(branch.clone()),
                    term: term.clone(),
                    testsuites: (!testsuites.is_empty()).then(|| testsuites.clone()),
                    flags: (!flags.is_empty()).then(|| flags.clone()),
                };

                let progress = QueryProgress::start("Loading test results");
                let connection = analytics.list_test_results(&args).await;
                let connection = finish(progress, connection, "test results")?;

                let scope = Scope {
                    repo_id: scope.repo_id,
                    branch: Some(branch.as_str()),
                    interval_days: scope.interval,
                };
                self.emit(rendering, &connection, || {
                    output::render_results(&connection, &scope)
                })
            }
            Commands::Aggregates { scope } => {
                let progress = QueryProgress::start("Computing aggregates");
                let summary = analytics
                    .test_results_aggregates(scope.repo_id, scope.interval, scope.branch.as_deref())
                    .await;
                let summary = finish(progress, summary, "aggregates")?;

                self.emit(rendering, &summary, || {
                    output::render_aggregates(summary.as_ref(), &scope.as_scope())
                })
            }
            Commands::Flakes { scope } => {
                let progress = QueryProgress::start("Computing flake statistics");
                let summary = analytics
                    .flake_aggregates(scope.repo_id, scope.interval, scope.branch.as_deref())
                    .await;
                let summary = finish(progress, summary, "flake statistics")?;

                self.emit(rendering, &summary, || {
                    output::render_flakes(summary.as_ref(), &scope.as_scope())
                })
            }
            Commands::Summary { scope } => {
                let progress = QueryProgress::start("Computing summary");
                let branch = scope.branch.as_deref();
                let result = futures::try_join!(
                    analytics.test_results_aggregates(scope.repo_id, scope.interval, branch),
                    analytics.flake_aggregates(scope.repo_id, scope.interval, branch),
                );
                let (aggregates, flakes) = finish(progress, result, "summary")?;

                let report = SummaryReport { aggregates, flakes };
                self.emit(rendering, &report, || {
                    output::render_summary(&report, &scope.as_scope())
                })
            }
        }
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;
        let rendering = Rendering {
            format: self.format.unwrap_or(config.output.format),
            pretty: self.pretty || config.output.pretty,
        };

        let analytics =
            TestAnalytics::from_config(&config).context("Failed to set up rollup storage")?;
        let result = self.run(&analytics, &config, &rendering).await;
        analytics.shutdown().await;

        result
    }
}

impl ScopeArgs {
    fn as_scope(&self) -> Scope<'_> {
        Scope {
            repo_id: self.repo_id,
            branch: self.branch.as_deref(),
            interval_days: self.interval,
        }
    }
}

fn finish<T>(
    progress: QueryProgress,
    result: crate::error::Result<T>,
    what: &str,
) -> Result<T> {
    match result {
        Ok(value) => {
            progress.finish(&format!("Loaded {what}"));
            Ok(value)
        }
        Err(e) => {
            progress.fail(&format!("Failed to load {what}"));
            Err(e.into())
        }
    }
}
