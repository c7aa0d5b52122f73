//! MCP Resources for Kusto metadata.
//!
//! Resources are read-only views of the current connection. They never
//! change state.
//!
//! ## URI Scheme
//!
//! - `kusto://tables` - Tables in the current database
//! - `kusto://schema/{table}` - Column listing for one table
//! - `kusto://sample` - An annotated sample KQL query
//! - `kusto://connection` - The active cluster and database

use crate::database::TableSchema;
use crate::error::KustoError;
use crate::security::validate_identifier;
use crate::service::KustoService;
use rmcp::model::{
    AnnotateAble, RawResource, RawResourceTemplate, ReadResourceResult, Resource, ResourceContents,
    ResourceTemplate,
};
use serde_json::json;
use std::fmt::Write;

const SCHEME: &str = "kusto://";

/// Build the list of static resources.
pub fn build_resource_list() -> Vec<Resource> {
    vec![
        create_resource(
            "kusto://tables",
            "Tables",
            "List all available tables in the current Kusto database",
            "text/markdown",
        ),
        create_resource(
            "kusto://sample",
            "Sample Query",
            "A sample KQL query with a part-by-part explanation",
            "application/json",
        ),
        create_resource(
            "kusto://connection",
            "Connection",
            "Information about the current Kusto connection",
            "text/markdown",
        ),
    ]
}

/// Build resource templates for dynamic resources.
pub fn build_resource_templates() -> Vec<ResourceTemplate> {
    vec![create_resource_template(
        "kusto://schema/{table}",
        "Table Schema",
        "Get the schema for a specific Kusto table",
        "text/markdown",
    )]
}

/// Read a resource by URI.
pub async fn read_resource(
    service: &KustoService,
    uri: &str,
) -> Result<ReadResourceResult, KustoError> {
    let parsed = parse_resource_uri(uri).map_err(|e| KustoError::invalid_input(e.to_string()))?;

    let content = match parsed {
        ResourceUri::Tables => read_tables(service).await,
        ResourceUri::Schema { table } => read_schema(service, &table).await,
        ResourceUri::Sample => read_sample(),
        ResourceUri::Connection => read_connection(service),
    };

    Ok(ReadResourceResult {
        contents: vec![ResourceContents::text(content, uri.to_string())],
    })
}

// =========================================================================
// Resource URI Parsing
// =========================================================================

#[derive(Debug, PartialEq, Eq)]
enum ResourceUri {
    Tables,
    Schema { table: String },
    Sample,
    Connection,
}

#[derive(Debug)]
struct ResourceParseError {
    uri: String,
    reason: ParseErrorReason,
}

#[derive(Debug)]
enum ParseErrorReason {
    InvalidScheme,
    EmptyPath,
    UnknownResourceType { segment: String },
    InvalidIdentifier { identifier: String, reason: String },
    MissingComponent { expected: &'static str },
    TooManySegments { expected: usize, got: usize },
}

impl std::fmt::Display for ResourceParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid resource URI '{}': ", self.uri)?;
        match &self.reason {
            ParseErrorReason::InvalidScheme => write!(f, "URI must start with '{}'", SCHEME),
            ParseErrorReason::EmptyPath => write!(f, "URI path is empty"),
            ParseErrorReason::UnknownResourceType { segment } => write!(
                f,
                "unknown resource type '{}'. Valid types: tables, schema, sample, connection",
                segment
            ),
            ParseErrorReason::InvalidIdentifier { identifier, reason } => {
                write!(f, "invalid table name '{}': {}", identifier, reason)
            }
            ParseErrorReason::MissingComponent { expected } => {
                write!(f, "missing required component: {}", expected)
            }
            ParseErrorReason::TooManySegments { expected, got } => write!(
                f,
                "too many path segments (expected {}, got {})",
                expected, got
            ),
        }
    }
}

impl std::error::Error for ResourceParseError {}

fn parse_resource_uri(uri: &str) -> Result<ResourceUri, ResourceParseError> {
    let fail = |reason| ResourceParseError {
        uri: uri.to_string(),
        reason,
    };

    let path = uri
        .strip_prefix(SCHEME)
        .ok_or_else(|| fail(ParseErrorReason::InvalidScheme))?;

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        [] => Err(fail(ParseErrorReason::EmptyPath)),
        ["tables"] => Ok(ResourceUri::Tables),
        ["sample"] => Ok(ResourceUri::Sample),
        ["connection"] => Ok(ResourceUri::Connection),
        ["schema"] => Err(fail(ParseErrorReason::MissingComponent {
            expected: "table name (use kusto://schema/{table})",
        })),
        ["schema", table] => match validate_identifier(table) {
            Ok(()) => Ok(ResourceUri::Schema {
                table: table.to_string(),
            }),
            Err(e) => Err(fail(ParseErrorReason::InvalidIdentifier {
                identifier: table.to_string(),
                reason: e.to_string(),
            })),
        },
        ["schema", ..] => Err(fail(ParseErrorReason::TooManySegments {
            expected: 2,
            got: segments.len(),
        })),
        [first, ..] => Err(fail(ParseErrorReason::UnknownResourceType {
            segment: first.to_string(),
        })),
    }
}

// =========================================================================
// Resource readers
// =========================================================================

async fn read_tables(service: &KustoService) -> String {
    let mut tables = service.get_tables().await;
    if tables.is_empty() {
        return "No tables available. Please ensure you're connected to a Kusto database."
            .to_string();
    }
    tables.sort();

    let mut out = String::from("# Available Kusto Tables\n\n");
    for table in &tables {
        let _ = writeln!(out, "- {}", table);
    }
    out.push_str("\nTo view a table schema, access the resource: `kusto://schema/{table}`");
    out
}

async fn read_schema(service: &KustoService, table: &str) -> String {
    match service.get_table_schema(table).await {
        Some(schema) => format_schema_markdown(table, &schema),
        None => format!("Schema for table '{}' not found or not accessible.", table),
    }
}

/// Markdown column table for one schema. Missing descriptions render as `-`.
pub fn format_schema_markdown(table: &str, schema: &TableSchema) -> String {
    let mut out = format!("# Schema for Kusto Table: {}\n\n", table);
    out.push_str("## Columns\n\n");
    out.push_str("| Name | Type | Description |\n");
    out.push_str("| ---- | ---- | ----------- |\n");

    for column in &schema.ordered_columns {
        let description = column
            .description
            .as_deref()
            .map(|d| d.replace('\n', " "))
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "| {} | {} | {} |",
            column.name,
            column.display_type(),
            description
        );
    }
    out
}

fn read_sample() -> String {
    let sample = json!({
        "query": "StormEvents | where StartTime >= datetime(2007-11-01) and StartTime < datetime(2007-12-01) | where State == 'FLORIDA' | count",
        "explanation": "This query filters the StormEvents table to find events in Florida during November 2007, then counts the total number of matching events.",
        "queryParts": [
            {"part": "StormEvents", "explanation": "The source table containing storm data"},
            {"part": "where StartTime >= datetime(2007-11-01) and StartTime < datetime(2007-12-01)", "explanation": "Filters events to a specific date range"},
            {"part": "where State == 'FLORIDA'", "explanation": "Further filters to only include events in Florida"},
            {"part": "count", "explanation": "Counts the total number of matching records"}
        ],
        "commonOperators": [
            {"operator": "where", "description": "Filters a table to the subset of rows that satisfy a predicate"},
            {"operator": "summarize", "description": "Produces a table that aggregates the content of the input table"},
            {"operator": "join", "description": "Merges the rows of two tables to form a new table"},
            {"operator": "project", "description": "Selects a subset of columns to include in results"}
        ]
    });
    serde_json::to_string_pretty(&sample).unwrap_or_else(|_| sample.to_string())
}

fn read_connection(service: &KustoService) -> String {
    if !service.is_connected() {
        return "Not connected to any Kusto cluster. Use the `connect` tool to establish a connection."
            .to_string();
    }
    let (cluster, database) = service.get_connection_details();
    format!(
        "# Kusto Connection Information\n\n\
         - **Cluster:** {}\n\
         - **Database:** {}\n\n\
         To change the connection, use the `connect` tool.\n",
        cluster, database
    )
}

fn create_resource(uri: &str, name: &str, description: &str, mime_type: &str) -> Resource {
    let mut resource = RawResource::new(uri, name);
    resource.description = Some(description.to_string());
    resource.mime_type = Some(mime_type.to_string());
    resource.no_annotation()
}

fn create_resource_template(
    uri_template: &str,
    name: &str,
    description: &str,
    mime_type: &str,
) -> ResourceTemplate {
    RawResourceTemplate {
        uri_template: uri_template.to_string(),
        name: name.to_string(),
        title: None,
        description: Some(description.to_string()),
        mime_type: Some(mime_type.to_string()),
    }
    .no_annotation()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::ColumnDescriptor;

    #[test]
    fn test_parse_resource_uri() {
        assert_eq!(parse_resource_uri("kusto://tables").unwrap(), ResourceUri::Tables);
        assert_eq!(parse_resource_uri("kusto://sample/").unwrap(), ResourceUri::Sample);
        assert_eq!(
            parse_resource_uri("kusto://connection").unwrap(),
            ResourceUri::Connection
        );

        let err = parse_resource_uri("kusto://functions").unwrap_err();
        assert!(matches!(err.reason, ParseErrorReason::UnknownResourceType { .. }));
        assert!(err.to_string().contains("unknown resource type"));
    }

    #[test]
    fn test_parse_schema_uri() {
        match parse_resource_uri("kusto://schema/StormEvents") {
            Ok(ResourceUri::Schema { table }) => assert_eq!(table, "StormEvents"),
            other => panic!("Expected Ok(Schema), got {:?}", other),
        }

        let missing = parse_resource_uri("kusto://schema").unwrap_err();
        assert!(matches!(missing.reason, ParseErrorReason::MissingComponent { .. }));

        let extra = parse_resource_uri("kusto://schema/a/b").unwrap_err();
        assert!(matches!(
            extra.reason,
            ParseErrorReason::TooManySegments { expected: 2, got: 3 }
        ));
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        let err = parse_resource_uri("https://tables").unwrap_err();
        assert!(matches!(err.reason, ParseErrorReason::InvalidScheme));
        let err = parse_resource_uri("kusto://").unwrap_err();
        assert!(matches!(err.reason, ParseErrorReason::EmptyPath));
    }

    #[test]
    fn test_format_schema_markdown() {
        let schema = TableSchema {
            name: Some("T".to_string()),
            ordered_columns: vec![
                ColumnDescriptor {
                    name: "State".to_string(),
                    r#type: "System.String".to_string(),
                    csl_type: Some("string".to_string()),
                    description: Some("US state\nname".to_string()),
                },
                ColumnDescriptor {
                    name: "Count".to_string(),
                    r#type: "System.Int64".to_string(),
                    csl_type: None,
                    description: None,
                },
            ],
            ..Default::default()
        };

        let md = format_schema_markdown("T", &schema);
        assert!(md.starts_with("# Schema for Kusto Table: T\n\n## Columns\n\n"));
        assert!(md.contains("| State | string | US state name |\n"));
        assert!(md.contains("| Count | System.Int64 | - |\n"));
    }

    #[test]
    fn test_sample_is_valid_json() {
        let value: serde_json::Value = serde_json::from_str(&read_sample()).unwrap();
        assert_eq!(value["queryParts"].as_array().unwrap().len(), 4);
        assert_eq!(value["commonOperators"][1]["operator"], "summarize");
    }

    #[test]
    fn test_resource_listing() {
        let uris: Vec<String> = build_resource_list()
            .iter()
            .map(|r| r.uri.clone())
            .collect();
        assert_eq!(uris, ["kusto://tables", "kusto://sample", "kusto://connection"]);
        assert_eq!(
            build_resource_templates()[0].uri_template,
            "kusto://schema/{table}"
        );
    }
}
