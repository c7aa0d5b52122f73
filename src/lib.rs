//! # Kusto MCP Server
//!
//! A Model Context Protocol (MCP) server for Azure Data Explorer (Kusto).
//!
//! This crate provides:
//! - **Tools**: Connect to a cluster, run KQL, analyze results, review queries
//! - **Resources**: Browse tables and schemas of the current database
//! - **Prompts**: Guided time series, cohort, funnel and data quality analyses
//!
//! ## Architecture
//!
//! A single [`KustoService`] owns the connection registry (one cached,
//! authenticated handle per cluster plus the active cluster/database pair),
//! the query executor and the schema accessor. Tools, resources and prompts
//! are thin adapters over it.

pub mod analysis;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod handlers;
pub mod prompter;
pub mod prompts;
pub mod resources;
pub mod security;
pub mod server;
pub mod service;
pub mod shutdown;
pub mod state;
pub mod tools;

pub use config::Config;
pub use error::{KustoError, McpError};
pub use server::KustoMcpServer;
pub use service::KustoService;
