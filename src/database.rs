//! Cluster connectivity and query execution.

pub mod auth;
pub mod client;
mod connection;
pub mod metadata;
mod query;
pub mod types;

pub use auth::{credential_from_config, SharedCredential};
pub use client::{AadClientFactory, ClientFactory, ConnectionHandle, KustoBackend, KustoClient};
pub use connection::ConnectionRegistry;
pub use metadata::{ColumnDescriptor, SchemaAccessor, TableSchema};
pub use query::{dispatch, QueryExecutor, QueryOutcome};
pub use types::{ColumnKind, KustoColumn, KustoResponse, KustoTable, TypeMapper};
