//! MCP tools for Kusto operations.
//!
//! - `connect`: Connect to a cluster and database
//! - `connection_status`: Show the current connection
//! - `execute_query`: Run a KQL query
//! - `analyze_data`: Run a query and summarize its results
//! - `optimize_query`: Review KQL text without running it
//! - `list_tables`: List tables of the current database
//! - `describe_table`: Show the columns of a table
//!
//! Every tool reports failures as text inside a successful result, prefixed
//! with ❌. The rendering functions are plain async functions over
//! [`KustoService`] so they can be tested without the protocol layer.

mod inputs;

pub use inputs::*;

use crate::analysis::{analyze_query, correlation_matrix, describe, describe_numeric, Frame};
use crate::config::DisplayConfig;
use crate::constants::{ANALYSIS_SAMPLE_ROWS, LOG_QUERY_MAX_LEN};
use crate::database::auth::truncate_for_log;
use crate::database::{KustoTable, QueryOutcome};
use crate::prompter::{ConsolePrompter, HostPrompter, PrompterMode};
use crate::resources::format_schema_markdown;
use crate::server::KustoMcpServer;
use crate::service::KustoService;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content};
use rmcp::{tool, tool_router, ErrorData as McpError};
use tracing::{debug, info};

const EMPTY_QUERY_MESSAGE: &str = "❌ Query cannot be empty. Please provide a valid KQL query.";

#[tool_router]
impl KustoMcpServer {
    #[tool(
        description = "Connect to a Kusto cluster and database. Omitted values default to the current connection."
    )]
    async fn connect(
        &self,
        Parameters(input): Parameters<ConnectInput>,
    ) -> Result<CallToolResult, McpError> {
        let output = render_connect(&self.service, self.config.prompter, &input).await;
        Ok(text_result(output))
    }

    #[tool(description = "Show the current Kusto connection status.")]
    async fn connection_status(&self) -> Result<CallToolResult, McpError> {
        Ok(text_result(render_connection_status(&self.service)))
    }

    #[tool(description = "Execute a KQL query against the current Kusto database.")]
    async fn execute_query(
        &self,
        Parameters(input): Parameters<ExecuteQueryInput>,
    ) -> Result<CallToolResult, McpError> {
        let output = render_execute_query(&self.service, &self.config.display, &input).await;
        Ok(text_result(output))
    }

    #[tool(
        description = "Execute a KQL query and analyze the results. analysis_type is one of summary, stats or plot_ready."
    )]
    async fn analyze_data(
        &self,
        Parameters(input): Parameters<AnalyzeDataInput>,
    ) -> Result<CallToolResult, McpError> {
        let output = render_analysis(&self.service, &input).await;
        Ok(text_result(output))
    }

    #[tool(description = "Analyze a KQL query and suggest optimizations. The query is not executed.")]
    async fn optimize_query(
        &self,
        Parameters(input): Parameters<OptimizeQueryInput>,
    ) -> Result<CallToolResult, McpError> {
        Ok(text_result(render_optimization(&input.query)))
    }

    #[tool(description = "List the tables of the current Kusto database.")]
    async fn list_tables(&self) -> Result<CallToolResult, McpError> {
        Ok(text_result(render_table_list(&self.service).await))
    }

    #[tool(description = "Show the columns and types of a table in the current database.")]
    async fn describe_table(
        &self,
        Parameters(input): Parameters<DescribeTableInput>,
    ) -> Result<CallToolResult, McpError> {
        Ok(text_result(render_table_schema(&self.service, &input.table).await))
    }
}

/// Tool router for [`KustoMcpServer`].
pub(crate) fn create_tool_router() -> ToolRouter<KustoMcpServer> {
    KustoMcpServer::tool_router()
}

fn text_result(text: String) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text)])
}

/// Connect to the supplied pair, prompting for missing values according to `mode`.
pub async fn render_connect(
    service: &KustoService,
    mode: PrompterMode,
    input: &ConnectInput,
) -> String {
    let cluster = input.cluster.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let database = input.database.as_deref().map(str::trim).filter(|d| !d.is_empty());

    let (ok, message) = match (cluster, database, mode) {
        (Some(cluster), Some(database), _) => service.connect(cluster, database).await,
        (_, _, PrompterMode::Console) => {
            service.connect_with_prompter(&ConsolePrompter).await
        }
        _ => {
            service
                .connect_with_prompter(&HostPrompter::for_connect(cluster, database))
                .await
        }
    };

    if ok {
        info!("{}", message);
        format!("✅ {}", message)
    } else {
        format!("❌ Failed to connect: {}", message)
    }
}

pub fn render_connection_status(service: &KustoService) -> String {
    if !service.is_connected() {
        return "❌ Not connected to any Kusto cluster.\n\nUse the `connect` tool to establish a connection."
            .to_string();
    }

    let (cluster, database) = service.get_connection_details();
    format!(
        "✅ Currently connected to:\n\n- **Cluster**: {}\n- **Database**: {}\n",
        cluster, database
    )
}

pub async fn render_execute_query(
    service: &KustoService,
    display: &DisplayConfig,
    input: &ExecuteQueryInput,
) -> String {
    if input.query.trim().is_empty() {
        return EMPTY_QUERY_MESSAGE.to_string();
    }

    let format = match input.format.as_deref() {
        None => OutputFormat::default(),
        Some(f) => match f.parse::<OutputFormat>() {
            Ok(format) => format,
            Err(e) => return format!("❌ {}", e),
        },
    };

    debug!(
        "execute_query: {}",
        truncate_for_log(&input.query, LOG_QUERY_MAX_LEN)
    );

    let response = match service.execute_query(&input.query).await {
        QueryOutcome::Success(response) => response,
        QueryOutcome::Failure(e) => return format!("❌ Query execution failed: {}", e),
    };

    match response.first_primary() {
        Some(table) => format_query_result(table, display, format),
        None => "✅ Query executed successfully, but returned no results.".to_string(),
    }
}

/// Full result for small tables, a summary with a preview for large ones.
pub fn format_query_result(table: &KustoTable, display: &DisplayConfig, format: OutputFormat) -> String {
    let rows = table.row_count();

    if rows > display.max_display_rows {
        let preview = render_rows(table, display.preview_rows, format);
        return format!(
            "✅ Query executed successfully.\n\n\
             **Results summary:**\n\
             - Number of rows: {}\n\
             - Number of columns: {}\n\
             - Column names: {}\n\n\
             *Note: Result set is large. Showing first {} rows:*\n\n\
             ```\n{}\n```\n\n\
             *To see more results or analyze the data further, consider using 'analyze_data' with a more specific query.*",
            rows,
            table.column_count(),
            table.column_names().join(", "),
            display.preview_rows,
            preview
        );
    }

    format!(
        "✅ Query executed successfully.\n\n**Results:**\n```\n{}\n```",
        render_rows(table, rows, format)
    )
}

fn render_rows(table: &KustoTable, limit: usize, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => table.to_text_table(limit),
        OutputFormat::Markdown | OutputFormat::Csv => {
            let head = KustoTable::new(
                table.name.clone(),
                table.columns.clone(),
                table.rows.iter().take(limit).cloned().collect(),
            );
            if format == OutputFormat::Csv {
                head.to_csv().trim_end().to_string()
            } else {
                head.to_markdown_table()
            }
        }
    }
}

pub async fn render_analysis(service: &KustoService, input: &AnalyzeDataInput) -> String {
    // The type is checked before anything is sent to the cluster.
    let analysis_type = match input.analysis_type.parse::<AnalysisType>() {
        Ok(t) => t,
        Err(e) => return format!("❌ Invalid analysis type. Supported types: {}", e.valid()),
    };

    if input.query.trim().is_empty() {
        return EMPTY_QUERY_MESSAGE.to_string();
    }

    let response = match service.execute_query(&input.query).await {
        QueryOutcome::Success(response) => response,
        QueryOutcome::Failure(e) => return format!("❌ Query execution failed: {}", e),
    };

    match response.first_primary() {
        Some(table) if !table.is_empty() => analyze_table(table, analysis_type),
        _ => "✅ Query executed successfully, but returned no results to analyze.".to_string(),
    }
}

/// Analysis text for a non-empty table.
pub fn analyze_table(table: &KustoTable, analysis_type: AnalysisType) -> String {
    let frame = Frame::new(table);
    let (rows, columns) = frame.shape();

    match analysis_type {
        AnalysisType::Summary => format!(
            "✅ Data Summary:\n\n\
             - Number of rows: {}\n\
             - Number of columns: {}\n\
             - Column names: {}\n\n\
             **Numeric Column Statistics:**\n```\n{}\n```\n\n\
             **Data Sample (First {} rows):**\n```\n{}\n```",
            rows,
            columns,
            frame.column_names().join(", "),
            describe(&frame).render(),
            ANALYSIS_SAMPLE_ROWS,
            frame.head(ANALYSIS_SAMPLE_ROWS)
        ),
        AnalysisType::Stats => {
            let numeric = frame.numeric_columns();
            if numeric.is_empty() {
                return "✅ No numeric columns found for statistical analysis.".to_string();
            }

            let mut out = format!(
                "✅ Statistical Analysis:\n\n**Numeric Column Statistics:**\n```\n{}\n```\n\n",
                describe_numeric(&frame, &numeric).render()
            );
            if numeric.len() >= 2 {
                out.push_str(&format!(
                    "\n**Correlation Matrix:**\n```\n{}\n```\n",
                    correlation_matrix(&frame, &numeric).render()
                ));
            }
            out
        }
        AnalysisType::PlotReady => {
            let join_or_none = |names: Vec<&str>| {
                if names.is_empty() {
                    "None".to_string()
                } else {
                    names.join(", ")
                }
            };
            format!(
                "✅ Plot-Ready Data Analysis:\n\n\
                 **Data Structure:**\n\
                 - Number of rows: {}\n\
                 - Numeric columns: {}\n\
                 - Categorical columns: {}\n\n\
                 **Sample Data (First {} rows):**\n```\n{}\n```\n\n\
                 To plot this data, you can use the numeric columns for values and categorical columns for grouping or dimensions.",
                rows,
                join_or_none(frame.names_of(&frame.numeric_columns())),
                join_or_none(frame.names_of(&frame.categorical_columns())),
                ANALYSIS_SAMPLE_ROWS,
                frame.head(ANALYSIS_SAMPLE_ROWS)
            )
        }
    }
}

pub fn render_optimization(query: &str) -> String {
    if query.trim().is_empty() {
        return EMPTY_QUERY_MESSAGE.to_string();
    }
    analyze_query(query).render(query)
}

pub async fn render_table_list(service: &KustoService) -> String {
    if !service.is_connected() {
        return "❌ Not connected to any Kusto cluster.\n\nUse the `connect` tool to establish a connection."
            .to_string();
    }

    let tables = service.get_tables().await;
    if tables.is_empty() {
        return "❌ No tables found, or the table list could not be retrieved.".to_string();
    }

    let (_, database) = service.get_connection_details();
    let mut out = format!("✅ Tables in {} ({}):\n\n", database, tables.len());
    for table in &tables {
        out.push_str(&format!("- {}\n", table));
    }
    out
}

pub async fn render_table_schema(service: &KustoService, table: &str) -> String {
    if table.trim().is_empty() {
        return "❌ Table name cannot be empty.".to_string();
    }

    match service.get_table_schema(table).await {
        Some(schema) => format!("✅ {}", format_schema_markdown(table, &schema)),
        None => format!(
            "❌ Schema for table '{}' not found or not accessible.",
            table
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::KustoColumn;
    use serde_json::json;

    fn numbers(rows: usize) -> KustoTable {
        KustoTable::new(
            "t",
            vec![
                KustoColumn::new("name", "string"),
                KustoColumn::new("a", "long"),
                KustoColumn::new("b", "real"),
            ],
            (0..rows)
                .map(|i| vec![json!(format!("row{}", i)), json!(i), json!(i as f64 * 2.0)])
                .collect(),
        )
    }

    #[test]
    fn test_small_result_is_shown_in_full() {
        let text = format_query_result(&numbers(3), &DisplayConfig::default(), OutputFormat::Text);
        assert!(text.starts_with("✅ Query executed successfully.\n\n**Results:**"));
        assert!(text.contains("row2"));
    }

    #[test]
    fn test_large_result_is_summarized() {
        let display = DisplayConfig {
            max_display_rows: 100,
            preview_rows: 10,
        };
        let text = format_query_result(&numbers(101), &display, OutputFormat::Text);
        assert!(text.contains("- Number of rows: 101"));
        assert!(text.contains("- Number of columns: 3"));
        assert!(text.contains("- Column names: name, a, b"));
        assert!(text.contains("row9"));
        assert!(!text.contains("row10"));
    }

    #[test]
    fn test_exactly_max_rows_is_not_summarized() {
        let text = format_query_result(&numbers(100), &DisplayConfig::default(), OutputFormat::Csv);
        assert!(text.contains("**Results:**"));
        assert!(text.contains("name,a,b"));
    }

    #[test]
    fn test_analysis_summary() {
        let text = analyze_table(&numbers(6), AnalysisType::Summary);
        assert!(text.starts_with("✅ Data Summary:"));
        assert!(text.contains("- Number of rows: 6"));
        assert!(text.contains("mean"));
        assert!(text.contains("row4"));
        assert!(!text.contains("row5"));
    }

    #[test]
    fn test_analysis_stats_includes_correlation() {
        let text = analyze_table(&numbers(4), AnalysisType::Stats);
        assert!(text.contains("**Correlation Matrix:**"));
        assert!(text.contains("1.00"));
    }

    #[test]
    fn test_analysis_stats_without_numbers() {
        let table = KustoTable::new(
            "t",
            vec![KustoColumn::new("s", "string")],
            vec![vec![json!("x")]],
        );
        assert_eq!(
            analyze_table(&table, AnalysisType::Stats),
            "✅ No numeric columns found for statistical analysis."
        );
    }

    #[test]
    fn test_analysis_plot_ready() {
        let text = analyze_table(&numbers(2), AnalysisType::PlotReady);
        assert!(text.contains("- Numeric columns: a, b"));
        assert!(text.contains("- Categorical columns: name"));
    }

    #[test]
    fn test_optimization_rejects_empty_query() {
        assert_eq!(render_optimization("  "), EMPTY_QUERY_MESSAGE);
        assert!(render_optimization("T | take 1").starts_with("## Query Optimization Analysis"));
    }
}
