use std::fmt::Write;

use comfy_table::Cell;

use crate::analytics::TestResultRow;
use crate::insights::{AggregateSummary, FlakeSummary, SummaryReport};
use crate::pagination::Connection;

use super::styling::{bright, bright_yellow, cyan, dim, Severity};
use super::tables::{
    color_coded_change_cell, color_coded_failure_cell, color_coded_flakiness_cell,
    create_cyan_header, create_table, format_duration, format_rate,
};

/// What a query covered, echoed in the overview section.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub repo_id: u64,
    /// `None` for repository-wide rollups
    pub branch: Option<&'a str>,
    pub interval_days: u32,
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn add_overview(output: &mut String, scope: &Scope<'_>) {
    add_section_header(output, "📊", "Overview");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}",
        dim("Repository:"),
        cyan(scope.repo_id),
        dim("Branch:"),
        cyan(scope.branch.unwrap_or("all branches")),
        dim("Interval:"),
        bright_yellow(format!("last {} day(s)", scope.interval_days)),
    );
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join("\n")
    }
}

/// Renders one page of test results with its pagination state.
///
/// Color coding:
/// - Failure rate: green below 25%, yellow below 50%, red otherwise
/// - Flake rate: green below 5%, yellow below 10%, red otherwise
pub fn render_results(connection: &Connection<TestResultRow>, scope: &Scope<'_>) -> String {
    let mut output = String::new();

    add_overview(&mut output, scope);
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n",
        dim("Tests matched:"),
        bright_yellow(connection.total_count),
        dim("Showing:"),
        bright_yellow(connection.edges.len()),
    );

    if connection.edges.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow("No test results found."));
        return output;
    }

    add_section_header(&mut output, "🧪", "Test Results");

    let mut table = create_table();
    table.set_header(create_cyan_header(&[
        "Test",
        "Suites",
        "Flags",
        "Failure Rate",
        "Flake Rate",
        "Avg Duration",
        "Last Duration",
        "Pass / Fail",
        "Flaky Fails",
        "Skips",
        "Failing Commits",
        "Last Run",
    ]));

    for row in connection.nodes() {
        table.add_row(vec![
            Cell::new(&row.name),
            Cell::new(join_or_dash(&row.testsuite)),
            Cell::new(join_or_dash(&row.flags)),
            color_coded_failure_cell(row.failure_rate),
            color_coded_flakiness_cell(row.flake_rate),
            Cell::new(format_duration(row.avg_duration)),
            Cell::new(format_duration(row.last_duration)),
            Cell::new(format!("{} / {}", row.total_pass_count, row.total_fail_count)),
            Cell::new(row.total_flaky_fail_count),
            Cell::new(row.total_skip_count),
            Cell::new(row.commits_where_fail),
            Cell::new(row.updated_at.format("%Y-%m-%d %H:%M UTC")),
        ]);
    }

    let _ = writeln!(output, "{table}\n");

    if let (true, Some(cursor)) = (
        connection.page_info.has_next_page,
        connection.page_info.end_cursor.as_deref(),
    ) {
        let _ = writeln!(
            output,
            "  {} {}",
            dim("Next page:"),
            cyan(format!("--after {cursor}"))
        );
    }

    output
}

fn render_aggregates_section(output: &mut String, summary: Option<&AggregateSummary>) {
    add_section_header(output, "⏱️", "Test Aggregates");

    let Some(summary) = summary else {
        let _ = writeln!(output, "{}\n", bright_yellow("No rollup data found."));
        return;
    };

    let mut table = create_table();
    table.set_header(create_cyan_header(&["Metric", "Value", "Change"]));
    table.add_row(vec![
        Cell::new("Total duration"),
        Cell::new(format_duration(summary.total_duration)),
        color_coded_change_cell(summary.total_duration_percent_change),
    ]);
    table.add_row(vec![
        Cell::new("Slowest tests duration"),
        Cell::new(format_duration(summary.slowest_tests_duration)),
        color_coded_change_cell(summary.slowest_tests_duration_percent_change),
    ]);
    table.add_row(vec![
        Cell::new("Slow tests"),
        Cell::new(summary.total_slow_tests),
        color_coded_change_cell(summary.total_slow_tests_percent_change),
    ]);
    table.add_row(vec![
        Cell::new("Failures"),
        Cell::new(summary.total_fails),
        color_coded_change_cell(summary.total_fails_percent_change),
    ]);
    table.add_row(vec![
        Cell::new("Skips"),
        Cell::new(summary.total_skips),
        color_coded_change_cell(summary.total_skips_percent_change),
    ]);

    let _ = writeln!(output, "{table}\n");
}

fn render_flakes_section(output: &mut String, summary: Option<&FlakeSummary>) {
    add_section_header(output, "❄️", "Flaky Tests");

    let Some(summary) = summary else {
        let _ = writeln!(output, "{}\n", bright_yellow("No rollup data found."));
        return;
    };

    let mut table = create_table();
    table.set_header(create_cyan_header(&["Metric", "Value", "Change"]));
    table.add_row(vec![
        Cell::new("Flake rate"),
        color_coded_flakiness_cell(summary.flake_rate),
        color_coded_change_cell(summary.flake_rate_percent_change),
    ]);
    table.add_row(vec![
        Cell::new("Flaky failures"),
        Cell::new(summary.flake_count),
        color_coded_change_cell(summary.flake_count_percent_change),
    ]);

    let _ = writeln!(output, "{table}\n");

    let _ = writeln!(
        output,
        "  {} {}",
        dim("Overall:"),
        Severity::flake_rate(summary.flake_rate).paint(format_rate(summary.flake_rate))
    );
}

fn add_comparison_note(output: &mut String, scope: &Scope<'_>) {
    let _ = writeln!(
        output,
        "  {} {}\n",
        dim("Compared with:"),
        dim(format!("the {} day(s) before", scope.interval_days)),
    );
}

pub fn render_aggregates(summary: Option<&AggregateSummary>, scope: &Scope<'_>) -> String {
    let mut output = String::new();
    add_overview(&mut output, scope);
    add_comparison_note(&mut output, scope);
    render_aggregates_section(&mut output, summary);
    output
}

pub fn render_flakes(summary: Option<&FlakeSummary>, scope: &Scope<'_>) -> String {
    let mut output = String::new();
    add_overview(&mut output, scope);
    add_comparison_note(&mut output, scope);
    render_flakes_section(&mut output, summary);
    output
}

pub fn render_summary(report: &SummaryReport, scope: &Scope<'_>) -> String {
    let mut output = String::new();
    add_overview(&mut output, scope);
    add_comparison_note(&mut output, scope);
    render_aggregates_section(&mut output, report.aggregates.as_ref());
    render_flakes_section(&mut output, report.flakes.as_ref());
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::row::fixtures::create_row;
    use crate::pagination::{paginate, ArraySource, PageArgs};

    fn scope() -> Scope<'static> {
        Scope {
            repo_id: 42,
            branch: Some("main"),
            interval_days: 7,
        }
    }

    #[test]
    fn test_render_results_empty() {
        let output = render_results(&Connection::empty(), &scope());

        assert!(output.contains("42"));
        assert!(output.contains("Tests matched:"));
        assert!(output.contains("No test results found"));
    }

    #[test]
    fn test_render_results_with_rows() {
        let mut flaky = create_row("test_flaky_login");
        flaky.flake_rate = 0.2;
        flaky.flags = vec!["unit".to_string()];
        let rows = vec![flaky, create_row("test_stable")];

        let page = PageArgs {
            first: Some(1),
            ..PageArgs::default()
        };
        let connection = paginate(&ArraySource::new(&rows), &page).unwrap();
        let output = render_results(&connection, &scope());

        assert!(output.contains("Test Results"));
        assert!(output.contains("test_flaky_login"));
        assert!(!output.contains("test_stable"));
        assert!(output.contains("20.0%"));
        assert!(output.contains("unit"));
        assert!(output.contains("Next page:"));
    }

    #[test]
    fn test_render_aggregates() {
        let summary = AggregateSummary {
            total_duration: 500.0,
            slowest_tests_duration: 100.0,
            total_fails: 5,
            total_skips: 5,
            total_slow_tests: 1,
            total_fails_percent_change: Some(25.0),
            ..AggregateSummary::default()
        };

        let output = render_aggregates(Some(&summary), &scope());

        assert!(output.contains("Test Aggregates"));
        assert!(output.contains("8m 20s"));
        assert!(output.contains("+25.0%"));
        assert!(output.contains("N/A"));
    }

    #[test]
    fn test_render_summary_without_data() {
        let repo_wide = Scope {
            branch: None,
            ..scope()
        };
        let output = render_summary(&SummaryReport::default(), &repo_wide);

        assert!(output.contains("all branches"));
        assert!(output.contains("Test Aggregates"));
        assert!(output.contains("Flaky Tests"));
        assert_eq!(output.matches("No rollup data found").count(), 2);
    }

    #[test]
    fn test_render_flakes() {
        let summary = FlakeSummary {
            flake_rate: 0.125,
            flake_count: 3,
            flake_rate_percent_change: Some(-50.0),
            flake_count_percent_change: None,
        };

        let output = render_flakes(Some(&summary), &scope());

        assert!(output.contains("Flaky failures"));
        assert!(output.contains("12.5%"));
        assert!(output.contains("-50.0%"));
    }
}
