//! Offline analysis of query results and query text.

pub mod optimizer;
pub mod stats;

pub use optimizer::{analyze_query, OptimizationReport};
pub use stats::{correlation_matrix, describe, describe_numeric, ColumnProfile, Frame, StatsTable};
