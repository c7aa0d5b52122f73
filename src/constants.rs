//! Centralized constants for the Kusto MCP Server.
//!
//! This module contains the magic strings and default values used throughout
//! the codebase, making them easy to find, understand, and modify.

use std::time::Duration;

// =============================================================================
// Environment Variables
// =============================================================================

/// Cluster URL override. Must be set together with [`ENV_DATABASE`].
pub const ENV_CLUSTER: &str = "AZURE_KUSTO_CLUSTER";

/// Database name override. Must be set together with [`ENV_CLUSTER`].
pub const ENV_DATABASE: &str = "AZURE_KUSTO_DATABASE";

/// Path of the sidecar file holding the last active connection.
pub const ENV_CONFIG_FILE: &str = "KUSTO_MCP_CONFIG_FILE";

/// Input prompter selection (`host` or `console`).
pub const ENV_PROMPTER: &str = "KUSTO_MCP_PROMPTER";

/// Application name reported to the cluster.
pub const ENV_APP_NAME: &str = "KUSTO_MCP_APP_NAME";

/// Row count above which query results are summarized.
pub const ENV_MAX_DISPLAY_ROWS: &str = "KUSTO_MCP_MAX_DISPLAY_ROWS";

/// Rows shown when a result is summarized.
pub const ENV_PREVIEW_ROWS: &str = "KUSTO_MCP_PREVIEW_ROWS";

/// TCP connect timeout for the HTTP client, in seconds.
pub const ENV_CONNECT_TIMEOUT: &str = "KUSTO_MCP_CONNECT_TIMEOUT";

/// Graceful shutdown drain timeout, in seconds.
pub const ENV_SHUTDOWN_DRAIN_TIMEOUT: &str = "KUSTO_MCP_SHUTDOWN_DRAIN_TIMEOUT";

/// Disable the Azure CLI credential (`false`/`0`).
pub const ENV_USE_AZURE_CLI: &str = "KUSTO_MCP_USE_AZURE_CLI";

/// Service principal tenant.
pub const ENV_TENANT_ID: &str = "AZURE_TENANT_ID";

/// Service principal application id.
pub const ENV_CLIENT_ID: &str = "AZURE_CLIENT_ID";

/// Service principal secret.
pub const ENV_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";

/// Azure AD authority host.
pub const ENV_AUTHORITY_HOST: &str = "AZURE_AUTHORITY_HOST";

// =============================================================================
// Persistence
// =============================================================================

/// File name of the per-user sidecar, created in the home directory.
pub const DEFAULT_CONFIG_FILE_NAME: &str = ".kusto_mcp_config.json";

// =============================================================================
// Connection Constants
// =============================================================================

/// Sentinel reported by connection details when nothing is active.
pub const NOT_CONNECTED: &str = "Not connected";

/// Lightweight control command used to validate a freshly created handle.
pub const PROBE_QUERY: &str = ".show database schema | limit 1";

/// Control command listing the tables of the current database.
pub const LIST_TABLES_QUERY: &str = ".show tables | project TableName";

/// Column carrying table names in the [`LIST_TABLES_QUERY`] reply.
pub const TABLE_NAME_COLUMN: &str = "TableName";

/// Column carrying the JSON schema document in `.show table T schema as json`.
pub const SCHEMA_COLUMN: &str = "Schema";

/// Default application name sent as `x-ms-app`.
pub const DEFAULT_APP_NAME: &str = "kusto-mcp-server";

/// Default HTTP connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP connect timeout as Duration.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS);

// =============================================================================
// Authentication Constants
// =============================================================================

/// Default Azure AD authority.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

// =============================================================================
// Result Display Constants
// =============================================================================

/// Results with more rows than this are summarized.
pub const DEFAULT_MAX_DISPLAY_ROWS: usize = 100;

/// Rows shown in the summary of a large result.
pub const DEFAULT_PREVIEW_ROWS: usize = 10;

/// Rows shown as a sample by the analysis tool.
pub const ANALYSIS_SAMPLE_ROWS: usize = 5;

/// Placeholder shown in tables for null values.
pub const NULL_DISPLAY: &str = "null";

// =============================================================================
// Shutdown Constants
// =============================================================================

/// Default drain timeout for in-flight queries during shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll interval while draining.
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(200);

// =============================================================================
// Logging Constants
// =============================================================================

/// Maximum query length written to logs.
pub const LOG_QUERY_MAX_LEN: usize = 200;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_defaults_are_consistent() {
        assert!(DEFAULT_PREVIEW_ROWS < DEFAULT_MAX_DISPLAY_ROWS);
        assert!(ANALYSIS_SAMPLE_ROWS <= DEFAULT_PREVIEW_ROWS);
    }

    #[test]
    fn test_probe_is_control_command() {
        assert!(PROBE_QUERY.starts_with('.'));
        assert!(LIST_TABLES_QUERY.contains(TABLE_NAME_COLUMN));
    }
}
