//! Kusto result model and value mapping.
//!
//! Replies from the REST endpoint are decoded into [`KustoResponse`], a list
//! of tables plus the indices of the tables that carry query output (the
//! "primary results"). Cell values stay as `serde_json::Value` since Kusto's
//! wire encoding is JSON already; [`TypeMapper`] interprets them.

use crate::constants::NULL_DISPLAY;
use crate::error::KustoError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Broad classification of a Kusto column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Boolean,
    DateTime,
    Text,
    Dynamic,
    Other,
}

/// A result column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KustoColumn {
    pub name: String,
    /// Kusto scalar type (`string`, `long`, `datetime`, ...) or CLR type name.
    pub column_type: String,
}

impl KustoColumn {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
        }
    }

    /// Classify the declared type. Accepts both KQL and CLR spellings.
    pub fn kind(&self) -> ColumnKind {
        match self.column_type.to_lowercase().trim_start_matches("system.") {
            "int" | "long" | "real" | "double" | "decimal" | "int16" | "int32" | "int64"
            | "single" | "sbyte" | "byte" | "float" => ColumnKind::Numeric,
            "bool" | "boolean" => ColumnKind::Boolean,
            "datetime" | "date" => ColumnKind::DateTime,
            "string" | "guid" | "timespan" => ColumnKind::Text,
            "dynamic" | "object" | "data.sqltypes.sqldecimal" => ColumnKind::Dynamic,
            _ => ColumnKind::Other,
        }
    }
}

/// One result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KustoTable {
    pub name: String,
    pub columns: Vec<KustoColumn>,
    pub rows: Vec<Vec<Value>>,
}

impl KustoTable {
    pub fn new(name: impl Into<String>, columns: Vec<KustoColumn>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cell lookup by row index and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| row.get(idx).unwrap_or(&Value::Null))
    }

    /// Whether a column holds numbers.
    ///
    /// Declared numeric types win; for untyped columns every non-null value
    /// must be a JSON number.
    pub fn is_numeric_column(&self, idx: usize) -> bool {
        let Some(column) = self.columns.get(idx) else {
            return false;
        };
        match column.kind() {
            ColumnKind::Numeric => true,
            ColumnKind::Other => {
                let mut saw_number = false;
                for value in self.column_values(idx) {
                    match value {
                        Value::Null => {}
                        Value::Number(_) => saw_number = true,
                        _ => return false,
                    }
                }
                saw_number
            }
            _ => false,
        }
    }

    /// Display strings of the first `limit` rows.
    pub fn display_rows(&self, limit: usize) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                (0..self.columns.len())
                    .map(|i| TypeMapper::display(row.get(i).unwrap_or(&Value::Null)))
                    .collect()
            })
            .collect()
    }

    /// Render the first `limit` rows as an aligned plain-text table.
    pub fn to_text_table(&self, limit: usize) -> String {
        let headers: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        render_text_table(&headers, &self.display_rows(limit))
    }

    /// Format the table as a markdown table.
    pub fn to_markdown_table(&self) -> String {
        if self.columns.is_empty() {
            return "Query executed successfully. No results returned.".to_string();
        }

        let mut output = String::new();

        let headers = self.column_names();
        output.push_str("| ");
        output.push_str(&headers.join(" | "));
        output.push_str(" |\n");

        output.push_str("| ");
        output.push_str(
            &headers
                .iter()
                .map(|h| "-".repeat(h.len().max(3)))
                .collect::<Vec<_>>()
                .join(" | "),
        );
        output.push_str(" |\n");

        for row in self.display_rows(self.rows.len()) {
            output.push_str("| ");
            output.push_str(&row.join(" | ").replace('\n', " "));
            output.push_str(" |\n");
        }

        output.push_str(&format!("\n_{} row(s)_", self.rows.len()));
        output
    }

    /// Format the table as CSV.
    pub fn to_csv(&self) -> String {
        if self.columns.is_empty() {
            return String::new();
        }

        let mut output = String::new();
        output.push_str(&self.column_names().join(","));
        output.push('\n');

        for row in self.display_rows(self.rows.len()) {
            let values: Vec<String> = row
                .into_iter()
                .map(|value| {
                    if value.contains(',') || value.contains('"') || value.contains('\n') {
                        format!("\"{}\"", value.replace('"', "\"\""))
                    } else {
                        value
                    }
                })
                .collect();
            output.push_str(&values.join(","));
            output.push('\n');
        }

        output
    }
}

/// A decoded reply: every returned table plus which of them are primary results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KustoResponse {
    pub tables: Vec<KustoTable>,
    primary: Vec<usize>,
}

impl KustoResponse {
    /// Build a response whose primary results are the tables at `primary`.
    pub fn new(tables: Vec<KustoTable>, primary: Vec<usize>) -> Self {
        let primary = primary.into_iter().filter(|&i| i < tables.len()).collect();
        Self { tables, primary }
    }

    /// A response with a single primary table.
    pub fn single(table: KustoTable) -> Self {
        Self {
            tables: vec![table],
            primary: vec![0],
        }
    }

    /// A response with no tables at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Tables carrying query output, in reply order.
    pub fn primary_results(&self) -> Vec<&KustoTable> {
        self.primary.iter().filter_map(|&i| self.tables.get(i)).collect()
    }

    /// The first primary result, if any.
    pub fn first_primary(&self) -> Option<&KustoTable> {
        self.primary.first().and_then(|&i| self.tables.get(i))
    }

    /// Decode a v1 REST reply.
    ///
    /// Control commands return only primary tables. Queries that return more
    /// than one table append a table of contents; only the tables it lists
    /// with kind `QueryResult` are primary.
    pub fn from_v1(body: Value, is_command: bool) -> Result<Self, KustoError> {
        let reply: V1Reply = serde_json::from_value(body)
            .map_err(|e| KustoError::malformed(format!("unexpected reply layout: {}", e)))?;

        let mut tables = Vec::with_capacity(reply.tables.len());
        for raw in reply.tables {
            tables.push(raw.into_table()?);
        }

        if is_command || tables.len() <= 1 {
            let primary = (0..tables.len()).collect();
            return Ok(Self { tables, primary });
        }

        let toc = tables.pop().ok_or_else(|| KustoError::malformed("missing table of contents"))?;
        let primary = primary_from_toc(&toc, tables.len());
        Ok(Self { tables, primary })
    }
}

/// Read the ordinals of `QueryResult` entries out of a table of contents.
fn primary_from_toc(toc: &KustoTable, table_count: usize) -> Vec<usize> {
    let (Some(ordinal_idx), Some(kind_idx)) = (toc.column_index("Ordinal"), toc.column_index("Kind"))
    else {
        // Not a recognizable TOC; fall back to the first table.
        return if table_count > 0 { vec![0] } else { Vec::new() };
    };

    toc.rows
        .iter()
        .filter(|row| row.get(kind_idx).and_then(Value::as_str) == Some("QueryResult"))
        .filter_map(|row| row.get(ordinal_idx).and_then(TypeMapper::as_f64))
        .map(|ordinal| ordinal as usize)
        .filter(|&i| i < table_count)
        .collect()
}

#[derive(Debug, Deserialize)]
struct V1Reply {
    #[serde(rename = "Tables", default)]
    tables: Vec<V1Table>,
}

#[derive(Debug, Deserialize)]
struct V1Table {
    #[serde(rename = "TableName", default)]
    table_name: String,
    #[serde(rename = "Columns", default)]
    columns: Vec<V1Column>,
    #[serde(rename = "Rows", default)]
    rows: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct V1Column {
    #[serde(rename = "ColumnName")]
    column_name: String,
    #[serde(rename = "ColumnType", default)]
    column_type: Option<String>,
    #[serde(rename = "DataType", default)]
    data_type: Option<String>,
}

impl V1Table {
    /// Convert into a table. Rows that are objects carry partial-failure
    /// exceptions and turn the whole reply into a service error.
    fn into_table(self) -> Result<KustoTable, KustoError> {
        let columns = self
            .columns
            .into_iter()
            .map(|c| {
                let column_type = c.column_type.or(c.data_type).unwrap_or_default();
                KustoColumn::new(c.column_name, column_type)
            })
            .collect();

        let mut rows = Vec::with_capacity(self.rows.len());
        let mut exceptions = Vec::new();
        for row in self.rows {
            match row {
                Value::Array(values) => rows.push(values),
                Value::Object(obj) => {
                    if let Some(Value::Array(list)) = obj.get("Exceptions") {
                        exceptions.extend(list.iter().map(TypeMapper::display));
                    } else {
                        exceptions.push(Value::Object(obj).to_string());
                    }
                }
                other => {
                    return Err(KustoError::malformed(format!(
                        "row is neither an array nor an object: {}",
                        other
                    )))
                }
            }
        }

        if !exceptions.is_empty() {
            return Err(KustoError::service(exceptions.join("; ")));
        }

        Ok(KustoTable::new(self.table_name, columns, rows))
    }
}

/// Interpretation of Kusto JSON cell values.
pub struct TypeMapper;

impl TypeMapper {
    /// Convert a cell to a display string.
    pub fn display(value: &Value) -> String {
        match value {
            Value::Null => NULL_DISPLAY.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Numeric value of a cell.
    ///
    /// `decimal` and very large `long` values arrive as strings; those are
    /// parsed through `rust_decimal` before falling back to `f64` parsing.
    pub fn as_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => Decimal::from_str(s.trim())
                .ok()
                .and_then(|d| d.to_f64())
                .or_else(|| s.trim().parse::<f64>().ok()),
            _ => None,
        }
    }
}

/// Render headers and rows as a right-aligned plain-text table.
pub fn render_text_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(len),
                None => widths.push(len),
            }
        }
    }

    let format_line = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:>width$}", cell, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format_line(headers));
    for row in rows {
        lines.push(format_line(row));
    }
    lines.join("\n")
}
