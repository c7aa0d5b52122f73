//! Tool input types with JSON Schema generation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output format for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Aligned plain-text table (default).
    #[default]
    Text,
    /// Markdown table.
    Markdown,
    /// CSV.
    Csv,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = InvalidChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "table" => Ok(OutputFormat::Text),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(InvalidChoiceError::new("output format", s, "text, markdown, csv")),
        }
    }
}

/// Kind of analysis performed by `analyze_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisType {
    /// Shape, columns, describe and a sample.
    #[default]
    Summary,
    /// Numeric statistics and correlations.
    Stats,
    /// Column roles for charting and a sample.
    PlotReady,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Summary => "summary",
            AnalysisType::Stats => "stats",
            AnalysisType::PlotReady => "plot_ready",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AnalysisType {
    type Err = InvalidChoiceError;

    // Exact names only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summary" => Ok(AnalysisType::Summary),
            "stats" => Ok(AnalysisType::Stats),
            "plot_ready" => Ok(AnalysisType::PlotReady),
            _ => Err(InvalidChoiceError::new(
                "analysis type",
                s,
                "summary, stats, plot_ready",
            )),
        }
    }
}

/// Error returned when a string names none of the allowed choices.
#[derive(Debug, Clone)]
pub struct InvalidChoiceError {
    what: &'static str,
    value: String,
    valid: &'static str,
}

impl InvalidChoiceError {
    fn new(what: &'static str, value: &str, valid: &'static str) -> Self {
        Self {
            what,
            value: value.to_string(),
            valid,
        }
    }

    /// The allowed values, comma separated.
    pub fn valid(&self) -> &'static str {
        self.valid
    }
}

impl fmt::Display for InvalidChoiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid {} '{}'. Valid values: {}",
            self.what, self.value, self.valid
        )
    }
}

impl std::error::Error for InvalidChoiceError {}

/// Input for the `connect` tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ConnectInput {
    /// Cluster URL.
    #[schemars(
        description = "Kusto cluster URL, e.g. https://mycluster.westeurope.kusto.windows.net (default: current cluster)"
    )]
    #[serde(default)]
    pub cluster: Option<String>,

    /// Database name.
    #[schemars(description = "Database name (default: current database)")]
    #[serde(default)]
    pub database: Option<String>,
}

/// Input for the `execute_query` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteQueryInput {
    /// KQL query.
    #[schemars(description = "The KQL query to execute")]
    pub query: String,

    /// Output format.
    #[schemars(description = "Output format: 'text', 'markdown' or 'csv' (default: text)")]
    #[serde(default)]
    pub format: Option<String>,
}

/// Input for the `analyze_data` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeDataInput {
    /// KQL query.
    #[schemars(description = "The KQL query whose results are analyzed")]
    pub query: String,

    /// Analysis type.
    #[schemars(description = "Type of analysis: summary, stats or plot_ready (default: summary)")]
    #[serde(default = "default_analysis_type")]
    pub analysis_type: String,
}

fn default_analysis_type() -> String {
    AnalysisType::default().as_str().to_string()
}

/// Input for the `optimize_query` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OptimizeQueryInput {
    #[schemars(description = "The KQL query to review; it is not executed")]
    pub query: String,
}

/// Input for the `describe_table` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    #[schemars(description = "Name of the table in the current database")]
    pub table: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("MD".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        let err = "xml".parse::<OutputFormat>().unwrap_err();
        assert!(err.to_string().contains("text, markdown, csv"));
    }

    #[test]
    fn test_analysis_type_parse_is_exact() {
        assert_eq!(
            "plot_ready".parse::<AnalysisType>().unwrap(),
            AnalysisType::PlotReady
        );
        assert!("Summary".parse::<AnalysisType>().is_err());
        assert_eq!(
            "histogram".parse::<AnalysisType>().unwrap_err().valid(),
            "summary, stats, plot_ready"
        );
    }

    #[test]
    fn test_analyze_input_defaults() {
        let input: AnalyzeDataInput = serde_json::from_str(r#"{"query": "T"}"#).unwrap();
        assert_eq!(input.analysis_type, "summary");
    }

    #[test]
    fn test_connect_input_is_optional() {
        let input: ConnectInput = serde_json::from_str("{}").unwrap();
        assert!(input.cluster.is_none());
        assert!(input.database.is_none());
    }
}
