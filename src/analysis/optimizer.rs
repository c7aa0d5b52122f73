//! Static checks on KQL text.
//!
//! The query is never executed; findings come from simple pattern checks on
//! the pipeline stages.

use std::fmt::Write;

const TIME_COLUMN_HINTS: &[&str] = &["timestamp", "time", "date", "datetime", "starttime", "endtime"];

const BEST_PRACTICES: &[&str] = &[
    "Filter early and specifically to reduce data processing",
    "Use time-based filters when working with time series data",
    "Only select the columns you need",
    "Use let statements for complex calculations or reused expressions",
    "Use appropriate join types and join on indexed columns when possible",
    "Be aware of the query time limit and data size limits",
];

/// Pipelines longer than this get a complexity warning.
const MAX_PIPE_STAGES: usize = 10;

/// Findings for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizationReport {
    pub optimizations: Vec<String>,
    pub warnings: Vec<String>,
}

impl OptimizationReport {
    pub fn is_clean(&self) -> bool {
        self.optimizations.is_empty() && self.warnings.is_empty()
    }

    /// Markdown report including general practices and the original query.
    pub fn render(&self, query: &str) -> String {
        let mut out = String::from("## Query Optimization Analysis\n\n");

        if self.is_clean() {
            out.push_str("No obvious optimization issues detected in the query.\n\n");
        } else {
            write_numbered(&mut out, "### Suggested Optimizations:", &self.optimizations);
            write_numbered(&mut out, "### Potential Issues:", &self.warnings);
        }

        out.push_str("### General KQL Best Practices:\n\n");
        for (i, practice) in BEST_PRACTICES.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, practice);
        }
        let _ = write!(out, "\nYour query:\n```\n{}\n```", query);
        out
    }
}

fn write_numbered(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = write!(out, "{}\n\n", heading);
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, item);
    }
    out.push('\n');
}

/// Run every check against `query`.
pub fn analyze_query(query: &str) -> OptimizationReport {
    let mut report = OptimizationReport::default();
    let clean = query.trim().to_lowercase();
    let stages: Vec<&str> = clean.split('|').map(str::trim).collect();

    // Column selection
    let has_project = stages
        .iter()
        .any(|s| s.contains("project ") && !s.contains(" * "));
    let selects_everything = clean.contains("| project *") || clean.contains("| extend *");
    if selects_everything
        || (!has_project && !clean.contains("| project-away") && stages.len() > 2)
    {
        report.optimizations.push(
            "Consider explicitly selecting only the columns you need with '| project' instead of retrieving all columns"
                .to_string(),
        );
    }

    if stages.len() > MAX_PIPE_STAGES {
        report.warnings.push(
            "This query has many pipe operations which may impact performance. Consider simplifying or using let statements for complex intermediate calculations"
                .to_string(),
        );
    }

    // Filtering in the first few stages
    let has_early_filter = stages
        .iter()
        .take(3)
        .any(|s| s.contains("where ") || s.contains("limit "));
    if !has_early_filter && stages.len() > 2 {
        report.optimizations.push(
            "Consider adding filters ('where' clauses) early in your query to reduce the amount of data processed"
                .to_string(),
        );
    }

    let mentions_time = TIME_COLUMN_HINTS.iter().any(|hint| clean.contains(hint));
    let has_time_filter = clean.contains("ago(") || clean.contains("datetime");
    if mentions_time && !has_time_filter {
        report.warnings.push(
            "This query appears to work with time data but doesn't have a time range filter. Consider adding a time filter for better performance"
                .to_string(),
        );
    }

    // Only the first join is inspected.
    if let Some((_, after_join)) = clean.split_once("| join") {
        let first_join = after_join.split("| join").next().unwrap_or(after_join);
        if !first_join.contains("kind=") {
            report.optimizations.push(
                "Specify a join kind (e.g., 'kind=inner') to potentially improve join performance"
                    .to_string(),
            );
        }
    }

    let has_sort = clean.contains("sort by") || clean.contains("order by");
    let has_limit = clean.contains("limit ") || clean.contains("top ");
    if has_sort && !has_limit {
        report.optimizations.push(
            "Queries with 'sort by' or 'order by' should usually include a 'limit' or 'top' clause to avoid sorting the entire result set"
                .to_string(),
        );
    }

    report
}
