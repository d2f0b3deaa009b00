//! Markdown and JSON report generation.
//!
//! This module renders the analysis views and insights as a Markdown
//! document, or serializes the whole report as JSON.

use crate::analysis::aggregator::top_rows;
use crate::models::columns::{AMOUNT, TOTAL_ORDERS};
use crate::models::{
    InsightReport, Report, ReportMetadata, SessionMetrics, Stat, SummaryRow, SummaryTable,
};
use anyhow::{Context, Result};
use std::path::Path;

/// Presentation knobs taken from the `[report]` config section.
#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    /// Rows in each top-N section.
    pub top_n: usize,
    /// Whether to render every summary table in full.
    pub include_tables: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            top_n: 5,
            include_tables: true,
        }
    }
}

/// Guidance appended to every report.
pub fn default_recommendations() -> Vec<String> {
    vec![
        "Focus marketing on age groups with lower engagement.".to_string(),
        "Consider loyalty programs to increase average orders per user.".to_string(),
        "Investigate locations with lower ratings for improvement opportunities.".to_string(),
    ]
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: &ReportOptions) -> String {
    let mut output = String::new();

    output.push_str("# Session Insights Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report, options));
    output.push_str(&generate_insights_section(&report.insights));
    output.push_str(&generate_session_metrics_section(
        &report.analysis.session_metrics,
    ));

    if options.include_tables {
        output.push_str("## Summary Tables\n\n");
        for table in report.analysis.tables() {
            output.push_str(&generate_table_section(table));
        }
    }

    output.push_str(&generate_top_section(
        "Top Dishes by Revenue",
        &report.analysis.dish_analysis,
        AMOUNT,
        Stat::Sum,
        options.top_n,
    ));
    output.push_str(&generate_top_section(
        "Top Locations by Orders",
        &report.analysis.location_metrics,
        TOTAL_ORDERS,
        Stat::Sum,
        options.top_n,
    ));

    output.push_str(&generate_recommendations_section(&report.recommendations));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let counts = &metadata.counts;
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input:** `{}`\n", metadata.input_path));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Users:** {}\n", counts.users));
    section.push_str(&format!("- **Sessions:** {}\n", counts.sessions));
    section.push_str(&format!("- **Orders:** {}\n", counts.orders));
    section.push_str(&format!(
        "- **Joined Rows:** {} user-session, {} session-order\n",
        counts.user_sessions, counts.session_orders
    ));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn generate_table_of_contents(report: &Report, options: &ReportOptions) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Key Insights](#key-insights)\n");
    toc.push_str("- [Session Metrics](#session-metrics)\n");

    if options.include_tables {
        toc.push_str("- [Summary Tables](#summary-tables)\n");
        for table in report.analysis.tables() {
            toc.push_str(&format!("  - [{}](#{})\n", table.name, anchor(&table.name)));
        }
    }

    toc.push_str("- [Top Dishes by Revenue](#top-dishes-by-revenue)\n");
    toc.push_str("- [Top Locations by Orders](#top-locations-by-orders)\n");

    if !report.recommendations.is_empty() {
        toc.push_str("- [Recommendations](#recommendations)\n");
    }

    toc.push('\n');

    toc
}

fn generate_insights_section(insights: &InsightReport) -> String {
    let mut section = String::new();

    section.push_str("## Key Insights\n\n");

    if insights.insights.is_empty() {
        section.push_str("_No insights could be derived from this dataset._\n\n");
    }

    for insight in &insights.insights {
        section.push_str(&format!("### {}\n\n", insight.category));
        section.push_str(&format!("**{}**\n\n", insight.key_finding));
        for metric in &insight.metrics {
            section.push_str(&format!("- {}: {}\n", metric.name, metric.value));
        }
        section.push('\n');
    }

    if !insights.failures.is_empty() {
        section.push_str("### Unavailable Insights\n\n");
        for failure in &insights.failures {
            section.push_str(&format!("- **{}:** {}\n", failure.category, failure.error));
        }
        section.push('\n');
    }

    section
}

fn generate_session_metrics_section(metrics: &SessionMetrics) -> String {
    let mut section = String::new();

    section.push_str("## Session Metrics\n\n");
    section.push_str("| Metric | Value |\n");
    section.push_str("|:---|---:|\n");

    let rows = [
        ("Avg Session Duration", metrics.avg_session_duration),
        ("Median Session Duration", metrics.median_session_duration),
        ("Avg Session Rating", metrics.avg_session_rating),
        ("Avg Orders per User", metrics.avg_orders_per_user),
    ];
    for (name, value) in rows {
        section.push_str(&format!("| {} | {} |\n", name, format_value(value, false)));
    }
    section.push_str(&format!(
        "| Total Unique Users | {} |\n\n",
        metrics.total_unique_users
    ));

    section
}

fn generate_table_section(table: &SummaryTable) -> String {
    let mut section = String::new();

    section.push_str(&format!("### {}\n\n", table.name));

    if table.is_empty() {
        section.push_str("_No rows._\n\n");
        return section;
    }

    section.push_str(&format!("| {} |", escape_cell(&table.group_by)));
    for column in &table.columns {
        section.push_str(&format!(" {} |", escape_cell(&column.to_string())));
    }
    section.push('\n');

    section.push_str("|:---|");
    section.push_str(&"---:|".repeat(table.columns.len()));
    section.push('\n');

    for row in &table.rows {
        section.push_str(&format_row(table, row));
    }
    section.push('\n');

    section
}

fn format_row(table: &SummaryTable, row: &SummaryRow) -> String {
    let mut line = format!("| {} |", escape_cell(&row.key));
    for (column, value) in table.columns.iter().zip(&row.values) {
        line.push_str(&format!(" {} |", format_value(*value, column.stat.is_integral())));
    }
    line.push('\n');
    line
}

fn generate_top_section(
    title: &str,
    table: &SummaryTable,
    source: &str,
    stat: Stat,
    n: usize,
) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title));

    let rows = top_rows(table, source, stat, n);
    if rows.is_empty() {
        section.push_str("_Not available._\n\n");
        return section;
    }

    let idx = table.column_index(source, stat);
    section.push_str(&format!(
        "| # | {} | {} {} |\n",
        escape_cell(&table.group_by),
        escape_cell(source),
        stat
    ));
    section.push_str("|---:|:---|---:|\n");
    for (rank, row) in rows.iter().enumerate() {
        let value = idx.and_then(|i| row.values[i]);
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            rank + 1,
            escape_cell(&row.key),
            format_value(value, stat.is_integral())
        ));
    }
    section.push('\n');

    section
}

fn generate_recommendations_section(recommendations: &[String]) -> String {
    if recommendations.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Recommendations\n\n");
    for (i, rec) in recommendations.iter().enumerate() {
        section.push_str(&format!("{}. {}\n", i + 1, rec));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by session-insights v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

fn format_value(value: Option<f64>, integral: bool) -> String {
    match value {
        Some(v) if integral => format!("{:.0}", v),
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

/// Keep a value inside its Markdown table cell.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn anchor(heading: &str) -> String {
    heading.replace([' ', '_'], "-").to_lowercase()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
