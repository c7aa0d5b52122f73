//! Descriptive statistics over a result table.
//!
//! Output follows the familiar dataframe layout: one column per input column,
//! one row per statistic.

use crate::database::types::{render_text_table, ColumnKind, KustoTable, TypeMapper};
use std::collections::HashMap;

/// Read-only view of a result table for analysis.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    table: &'a KustoTable,
}

impl<'a> Frame<'a> {
    pub fn new(table: &'a KustoTable) -> Self {
        Self { table }
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.table.row_count(), self.table.column_count())
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn column_names(&self) -> Vec<&'a str> {
        self.table.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Indices of numeric columns.
    pub fn numeric_columns(&self) -> Vec<usize> {
        (0..self.table.column_count())
            .filter(|&i| self.table.is_numeric_column(i))
            .collect()
    }

    /// Indices of free-form columns (strings and dynamic values).
    pub fn categorical_columns(&self) -> Vec<usize> {
        (0..self.table.column_count())
            .filter(|&i| !self.table.is_numeric_column(i))
            .filter(|&i| {
                !matches!(
                    self.table.columns[i].kind(),
                    ColumnKind::Boolean | ColumnKind::DateTime
                )
            })
            .collect()
    }

    pub fn names_of(&self, indices: &[usize]) -> Vec<&'a str> {
        indices
            .iter()
            .filter_map(|&i| self.table.columns.get(i).map(|c| c.name.as_str()))
            .collect()
    }

    /// First `n` rows as an aligned text table without an index.
    pub fn head(&self, n: usize) -> String {
        self.table.to_text_table(n)
    }

    /// Non-null numeric values of a column.
    fn numbers(&self, idx: usize) -> Vec<f64> {
        self.table
            .column_values(idx)
            .filter_map(TypeMapper::as_f64)
            .filter(|v| v.is_finite())
            .collect()
    }

    /// Numeric value per row, `None` where missing.
    fn numbers_by_row(&self, idx: usize) -> Vec<Option<f64>> {
        self.table
            .column_values(idx)
            .map(|v| TypeMapper::as_f64(v).filter(|x| x.is_finite()))
            .collect()
    }
}

/// Summary statistics of one numeric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnProfile {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
}

impl ColumnProfile {
    /// Profile a set of values. Sample standard deviation; linear percentiles.
    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                count,
                mean: f64::NAN,
                std: f64::NAN,
                min: f64::NAN,
                q25: f64::NAN,
                q50: f64::NAN,
                q75: f64::NAN,
                max: f64::NAN,
            };
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mean = sorted.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        } else {
            f64::NAN
        };

        Self {
            count,
            mean,
            std,
            min: sorted[0],
            q25: percentile(&sorted, 0.25),
            q50: percentile(&sorted, 0.50),
            q75: percentile(&sorted, 0.75),
            max: sorted[count - 1],
        }
    }

    fn cells(&self) -> Vec<String> {
        vec![
            format_stat(self.count as f64),
            format_stat(self.mean),
            format_stat(self.std),
            format_stat(self.min),
            format_stat(self.q25),
            format_stat(self.q50),
            format_stat(self.q75),
            format_stat(self.max),
        ]
    }
}

/// Percentile of sorted values with linear interpolation.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn format_stat(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        format!("{:.6}", v)
    }
}

/// A labelled grid of statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsTable {
    pub columns: Vec<String>,
    pub index: Vec<String>,
    /// `cells[row][column]`
    pub cells: Vec<Vec<String>>,
}

impl StatsTable {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn cell(&self, row: &str, column: &str) -> Option<&str> {
        let r = self.index.iter().position(|i| i == row)?;
        let c = self.columns.iter().position(|col| col == column)?;
        self.cells.get(r)?.get(c).map(String::as_str)
    }

    /// Render with the index as a left-aligned first column.
    pub fn render(&self) -> String {
        let index_width = self.index.iter().map(|i| i.chars().count()).max().unwrap_or(0);

        let mut headers = vec![String::new()];
        headers.extend(self.columns.iter().cloned());

        let rows: Vec<Vec<String>> = self
            .index
            .iter()
            .zip(&self.cells)
            .map(|(label, cells)| {
                let mut row = vec![format!("{:<width$}", label, width = index_width)];
                row.extend(cells.iter().cloned());
                row
            })
            .collect();

        render_text_table(&headers, &rows)
    }
}

/// Describe a frame: numeric statistics when numeric columns exist,
/// otherwise count/unique/top/freq of every column.
pub fn describe(frame: &Frame<'_>) -> StatsTable {
    let numeric = frame.numeric_columns();
    if numeric.is_empty() {
        describe_categorical(frame)
    } else {
        describe_numeric(frame, &numeric)
    }
}

/// Numeric statistics for the given columns.
pub fn describe_numeric(frame: &Frame<'_>, columns: &[usize]) -> StatsTable {
    let profiles: Vec<Vec<String>> = columns
        .iter()
        .map(|&i| ColumnProfile::from_values(&frame.numbers(i)).cells())
        .collect();

    let index: Vec<String> = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let cells = (0..index.len())
        .map(|r| profiles.iter().map(|p| p[r].clone()).collect())
        .collect();

    StatsTable {
        columns: frame.names_of(columns).into_iter().map(String::from).collect(),
        index,
        cells,
    }
}

fn describe_categorical(frame: &Frame<'_>) -> StatsTable {
    let (_, column_count) = frame.shape();
    let mut per_column: Vec<Vec<String>> = Vec::with_capacity(column_count);

    for idx in 0..column_count {
        let values: Vec<String> = frame
            .table
            .column_values(idx)
            .filter(|v| !v.is_null())
            .map(TypeMapper::display)
            .collect();

        let mut freq: HashMap<&str, usize> = HashMap::new();
        let mut first_seen: Vec<&str> = Vec::new();
        for v in &values {
            let entry = freq.entry(v.as_str()).or_insert(0);
            if *entry == 0 {
                first_seen.push(v.as_str());
            }
            *entry += 1;
        }

        // Most frequent value; ties go to the first one seen.
        let top = first_seen
            .iter()
            .copied()
            .fold(None::<(&str, usize)>, |best, v| {
                let n = freq[v];
                match best {
                    Some((_, b)) if b >= n => best,
                    _ => Some((v, n)),
                }
            });

        per_column.push(vec![
            values.len().to_string(),
            freq.len().to_string(),
            top.map(|(v, _)| v.to_string()).unwrap_or_else(|| "NaN".into()),
            top.map(|(_, n)| n.to_string()).unwrap_or_else(|| "NaN".into()),
        ]);
    }

    let index: Vec<String> = ["count", "unique", "top", "freq"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let cells = (0..index.len())
        .map(|r| per_column.iter().map(|c| c[r].clone()).collect())
        .collect();

    StatsTable {
        columns: frame.column_names().into_iter().map(String::from).collect(),
        index,
        cells,
    }
}

/// Pairwise Pearson correlation between columns, rounded to two decimals.
pub fn correlation_matrix(frame: &Frame<'_>, columns: &[usize]) -> StatsTable {
    let series: Vec<Vec<Option<f64>>> = columns.iter().map(|&i| frame.numbers_by_row(i)).collect();
    let names: Vec<String> = frame.names_of(columns).into_iter().map(String::from).collect();

    let cells = series
        .iter()
        .map(|a| {
            series
                .iter()
                .map(|b| {
                    let r = pearson(a, b);
                    if r.is_nan() {
                        "NaN".to_string()
                    } else {
                        format!("{:.2}", r)
                    }
                })
                .collect()
        })
        .collect();

    StatsTable {
        columns: names.clone(),
        index: names,
        cells,
    }
}

/// Pearson correlation over rows where both values are present.
fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}
