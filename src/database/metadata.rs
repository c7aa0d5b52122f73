//! Kusto schema introspection.

use crate::constants::{LIST_TABLES_QUERY, SCHEMA_COLUMN, TABLE_NAME_COLUMN};
use crate::database::query::{QueryExecutor, QueryOutcome};
use crate::database::types::TypeMapper;
use crate::security::escape_identifier;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Column metadata from `.show table T schema as json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnDescriptor {
    pub name: String,
    /// CLR type name, e.g. `System.String`.
    #[serde(default)]
    pub r#type: String,
    /// KQL type name, e.g. `string`.
    #[serde(default)]
    pub csl_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ColumnDescriptor {
    /// KQL type when known, otherwise the CLR type.
    pub fn display_type(&self) -> &str {
        self.csl_type.as_deref().unwrap_or(&self.r#type)
    }
}

/// Table schema document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableSchema {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub doc_string: Option<String>,
    #[serde(default)]
    pub ordered_columns: Vec<ColumnDescriptor>,
}

impl TableSchema {
    /// Parse the JSON schema document embedded in a reply.
    pub fn parse(document: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(document)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.ordered_columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.ordered_columns.iter().find(|c| c.name == name)
    }
}

/// Build the control command describing one table.
pub fn describe_table_command(table: &str) -> Option<String> {
    match escape_identifier(table) {
        Ok(quoted) => Some(format!(".show table {} schema as json", quoted)),
        Err(e) => {
            warn!("Refusing to describe table: {}", e);
            None
        }
    }
}

/// Canned introspection queries on top of [`QueryExecutor`].
#[derive(Clone)]
pub struct SchemaAccessor {
    executor: QueryExecutor,
}

impl SchemaAccessor {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }

    /// Table names of the current database, in reply order.
    ///
    /// Empty on any failure.
    pub async fn list_tables(&self) -> Vec<String> {
        let response = match self.executor.run(LIST_TABLES_QUERY).await {
            QueryOutcome::Success(response) => response,
            QueryOutcome::Failure(e) => {
                warn!("Error getting tables: {}", e);
                return Vec::new();
            }
        };

        let Some(table) = response.first_primary() else {
            debug!("Table listing returned no primary result");
            return Vec::new();
        };
        let Some(idx) = table.column_index(TABLE_NAME_COLUMN) else {
            warn!("Table listing has no {} column", TABLE_NAME_COLUMN);
            return Vec::new();
        };

        table
            .rows
            .iter()
            .filter_map(|row| row.get(idx))
            .filter(|v| !v.is_null())
            .map(TypeMapper::display)
            .collect()
    }

    /// Schema of one table. `None` on any failure.
    pub async fn describe_table(&self, table: &str) -> Option<TableSchema> {
        let command = describe_table_command(table)?;

        let response = match self.executor.run(&command).await {
            QueryOutcome::Success(response) => response,
            QueryOutcome::Failure(e) => {
                warn!("Error getting schema for table {}: {}", table, e);
                return None;
            }
        };

        let result = response.first_primary()?;
        let document = match result.get(0, SCHEMA_COLUMN)? {
            serde_json::Value::String(s) => s.clone(),
            // Some proxies hand back the document already decoded.
            other @ serde_json::Value::Object(_) => other.to_string(),
            _ => return None,
        };

        match TableSchema::parse(&document) {
            Ok(schema) => Some(schema),
            Err(e) => {
                warn!("Unparseable schema for table {}: {}", table, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schema_document() {
        let schema = TableSchema::parse(
            r#"{"Name":"T","OrderedColumns":[
                {"Name":"Timestamp","Type":"System.DateTime","CslType":"datetime"},
                {"Name":"Message","Type":"System.String","CslType":"string","Description":"log text"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(schema.name.as_deref(), Some("T"));
        assert_eq!(schema.column_names(), vec!["Timestamp", "Message"]);
        assert_eq!(schema.ordered_columns[0].display_type(), "datetime");
        assert_eq!(
            schema.column("Message").unwrap().description.as_deref(),
            Some("log text")
        );
    }

    #[test]
    fn test_missing_ordered_columns() {
        let schema = TableSchema::parse(r#"{"Name":"T"}"#).unwrap();
        assert!(schema.ordered_columns.is_empty());
    }

    #[test]
    fn test_display_type_falls_back_to_clr() {
        let schema =
            TableSchema::parse(r#"{"OrderedColumns":[{"Name":"x","Type":"System.Int64"}]}"#).unwrap();
        assert_eq!(schema.ordered_columns[0].display_type(), "System.Int64");
    }

    #[test]
    fn test_describe_table_command() {
        assert_eq!(
            describe_table_command("StormEvents").as_deref(),
            Some(".show table ['StormEvents'] schema as json")
        );
        assert!(describe_table_command("").is_none());
    }
}
