//! Configuration management for the Kusto MCP Server.
//!
//! Configuration is loaded from environment variables following the 12-factor app pattern.

use crate::constants::{
    DEFAULT_APP_NAME, DEFAULT_AUTHORITY_HOST, DEFAULT_CONNECT_TIMEOUT, DEFAULT_DRAIN_TIMEOUT,
    DEFAULT_MAX_DISPLAY_ROWS, DEFAULT_PREVIEW_ROWS, ENV_APP_NAME, ENV_AUTHORITY_HOST,
    ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_CLUSTER, ENV_CONFIG_FILE, ENV_CONNECT_TIMEOUT,
    ENV_DATABASE, ENV_MAX_DISPLAY_ROWS, ENV_PREVIEW_ROWS, ENV_PROMPTER,
    ENV_SHUTDOWN_DRAIN_TIMEOUT, ENV_TENANT_ID, ENV_USE_AZURE_CLI,
};
use crate::error::KustoError;
use crate::prompter::PrompterMode;
use crate::state::{ActiveIdentity, IdentityStore};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cluster connection configuration
    pub connection: ConnectionConfig,

    /// Credential configuration
    pub auth: AuthConfig,

    /// Result rendering limits
    pub display: DisplayConfig,

    /// How the `connect` tool collects cluster and database
    pub prompter: PrompterMode,

    /// Maximum time to wait for in-flight queries on shutdown
    pub shutdown_drain_timeout: Duration,
}

/// Cluster connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Identity supplied through `AZURE_KUSTO_CLUSTER` / `AZURE_KUSTO_DATABASE`.
    /// When present it is adopted at startup and never written to disk.
    pub env_identity: Option<ActiveIdentity>,

    /// Location of the sidecar file, `None` when no home directory is known
    pub config_file: Option<PathBuf>,

    /// Application name sent to the cluster
    pub application_name: String,

    /// TCP connect timeout of the HTTP client
    pub connect_timeout: Duration,
}

/// Credential configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Service principal; when set it is the only credential used
    pub service_principal: Option<ServicePrincipal>,

    /// Whether the developer credential may use the Azure CLI
    pub use_azure_cli: bool,
}

/// Azure AD application credentials for the client credentials flow.
#[derive(Clone)]
pub struct ServicePrincipal {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub authority_host: String,
}

/// Result rendering limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Results with more rows are summarized
    pub max_display_rows: usize,

    /// Rows shown in a summary
    pub preview_rows: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// ## Connection
    /// - `AZURE_KUSTO_CLUSTER`, `AZURE_KUSTO_DATABASE`: adopted as the active identity at
    ///   startup (no handle is created until first use) and used as `connect` defaults
    /// - `KUSTO_MCP_CONFIG_FILE`: sidecar file (default: `~/.kusto_mcp_config.json`)
    /// - `KUSTO_MCP_APP_NAME`: application name (default: kusto-mcp-server)
    /// - `KUSTO_MCP_CONNECT_TIMEOUT`: connect timeout in seconds (default: 30)
    ///
    /// ## Credentials
    /// - `AZURE_TENANT_ID`, `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET`: service principal
    /// - `AZURE_AUTHORITY_HOST`: authority (default: https://login.microsoftonline.com)
    /// - `KUSTO_MCP_USE_AZURE_CLI`: include the Azure CLI credential when no service
    ///   principal is set (default: true)
    ///
    /// ## Behaviour
    /// - `KUSTO_MCP_PROMPTER`: `host` or `console` (default: host)
    /// - `KUSTO_MCP_MAX_DISPLAY_ROWS`: summarize larger results (default: 100)
    /// - `KUSTO_MCP_PREVIEW_ROWS`: rows in a summary (default: 10)
    /// - `KUSTO_MCP_SHUTDOWN_DRAIN_TIMEOUT`: drain timeout in seconds (default: 30)
    pub fn from_env() -> Result<Self, KustoError> {
        Self::from_source(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_source<F>(lookup: F) -> Result<Self, KustoError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let env_identity = match (var(ENV_CLUSTER), var(ENV_DATABASE)) {
            (Some(cluster), Some(database)) => Some(ActiveIdentity::new(cluster, database)),
            (Some(_), None) | (None, Some(_)) => {
                warn!(
                    "Ignoring partial connection override: both {} and {} must be set",
                    ENV_CLUSTER, ENV_DATABASE
                );
                None
            }
            (None, None) => None,
        };

        let config_file = var(ENV_CONFIG_FILE)
            .map(PathBuf::from)
            .or_else(IdentityStore::default_path);

        let application_name = var(ENV_APP_NAME).unwrap_or_else(|| DEFAULT_APP_NAME.to_string());

        let connect_timeout = var(ENV_CONNECT_TIMEOUT)
            .and_then(|p| p.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT);

        let service_principal =
            match (var(ENV_TENANT_ID), var(ENV_CLIENT_ID), var(ENV_CLIENT_SECRET)) {
                (Some(tenant_id), Some(client_id), Some(client_secret)) => Some(ServicePrincipal {
                    tenant_id,
                    client_id,
                    client_secret,
                    authority_host: var(ENV_AUTHORITY_HOST)
                        .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string()),
                }),
                (None, None, None) => None,
                (tenant, client, secret) => {
                    let missing: Vec<&str> = [
                        (ENV_TENANT_ID, tenant.is_none()),
                        (ENV_CLIENT_ID, client.is_none()),
                        (ENV_CLIENT_SECRET, secret.is_none()),
                    ]
                    .into_iter()
                    .filter_map(|(name, absent)| absent.then_some(name))
                    .collect();
                    return Err(KustoError::config(format!(
                        "Incomplete service principal: {} must also be set",
                        missing.join(", ")
                    )));
                }
            };

        let use_azure_cli = var(ENV_USE_AZURE_CLI)
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true);

        let prompter = match var(ENV_PROMPTER) {
            Some(value) => value.parse()?,
            None => PrompterMode::default(),
        };

        let max_display_rows = var(ENV_MAX_DISPLAY_ROWS)
            .and_then(|p| p.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(DEFAULT_MAX_DISPLAY_ROWS);

        let preview_rows = var(ENV_PREVIEW_ROWS)
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PREVIEW_ROWS)
            .min(max_display_rows);

        let shutdown_drain_timeout = var(ENV_SHUTDOWN_DRAIN_TIMEOUT)
            .and_then(|p| p.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_DRAIN_TIMEOUT);

        Ok(Config {
            connection: ConnectionConfig {
                env_identity,
                config_file,
                application_name,
                connect_timeout,
            },
            auth: AuthConfig {
                service_principal,
                use_azure_cli,
            },
            display: DisplayConfig {
                max_display_rows,
                preview_rows,
            },
            prompter,
            shutdown_drain_timeout,
        })
    }

    /// Whether the active identity comes from the environment.
    pub fn has_env_identity(&self) -> bool {
        self.connection.env_identity.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            auth: AuthConfig::default(),
            display: DisplayConfig::default(),
            prompter: PrompterMode::default(),
            shutdown_drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            env_identity: None,
            config_file: IdentityStore::default_path(),
            application_name: DEFAULT_APP_NAME.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            service_principal: None,
            use_azure_cli: true,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_display_rows: DEFAULT_MAX_DISPLAY_ROWS,
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}

// Secrets never reach the logs.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("service_principal", &self.service_principal)
            .field("use_azure_cli", &self.use_azure_cli)
            .finish()
    }
}

impl fmt::Debug for ServicePrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServicePrincipal")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authority_host", &self.authority_host)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, KustoError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_source(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert!(config.connection.env_identity.is_none());
        assert_eq!(config.connection.application_name, "kusto-mcp-server");
        assert_eq!(config.display, DisplayConfig::default());
        assert_eq!(config.prompter, PrompterMode::Host);
        assert!(config.auth.service_principal.is_none());
        assert!(config.auth.use_azure_cli);
    }

    #[test]
    fn test_env_identity_requires_both() {
        let config = load(&[
            ("AZURE_KUSTO_CLUSTER", "https://c.kusto.windows.net"),
            ("AZURE_KUSTO_DATABASE", "db"),
        ])
        .unwrap();
        assert_eq!(
            config.connection.env_identity,
            Some(ActiveIdentity::new("https://c.kusto.windows.net", "db"))
        );
        assert!(config.has_env_identity());

        let partial = load(&[("AZURE_KUSTO_CLUSTER", "https://c.kusto.windows.net")]).unwrap();
        assert!(partial.connection.env_identity.is_none());
    }

    #[test]
    fn test_config_file_override() {
        let config = load(&[("KUSTO_MCP_CONFIG_FILE", "/tmp/custom.json")]).unwrap();
        assert_eq!(
            config.connection.config_file,
            Some(PathBuf::from("/tmp/custom.json"))
        );
    }

    #[test]
    fn test_service_principal() {
        let config = load(&[
            ("AZURE_TENANT_ID", "tenant"),
            ("AZURE_CLIENT_ID", "client"),
            ("AZURE_CLIENT_SECRET", "secret"),
        ])
        .unwrap();
        let sp = config.auth.service_principal.unwrap();
        assert_eq!(sp.tenant_id, "tenant");
        assert_eq!(sp.authority_host, "https://login.microsoftonline.com");
        assert!(!format!("{:?}", sp).contains("\"secret\""));
    }

    #[test]
    fn test_partial_service_principal_is_rejected() {
        let err = load(&[("AZURE_TENANT_ID", "tenant")]).unwrap_err();
        assert!(matches!(err, KustoError::Config(_)));
        assert!(err.to_string().contains("AZURE_CLIENT_ID"));
        assert!(err.to_string().contains("AZURE_CLIENT_SECRET"));
    }

    #[test]
    fn test_display_limits() {
        let config = load(&[
            ("KUSTO_MCP_MAX_DISPLAY_ROWS", "20"),
            ("KUSTO_MCP_PREVIEW_ROWS", "50"),
        ])
        .unwrap();
        assert_eq!(config.display.max_display_rows, 20);
        assert_eq!(config.display.preview_rows, 20);

        let invalid = load(&[("KUSTO_MCP_MAX_DISPLAY_ROWS", "lots")]).unwrap();
        assert_eq!(invalid.display.max_display_rows, 100);
    }

    #[test]
    fn test_prompter_mode() {
        let config = load(&[("KUSTO_MCP_PROMPTER", "console")]).unwrap();
        assert_eq!(config.prompter, PrompterMode::Console);
        assert!(load(&[("KUSTO_MCP_PROMPTER", "carrier-pigeon")]).is_err());
    }

    #[test]
    fn test_disable_azure_cli() {
        let config = load(&[("KUSTO_MCP_USE_AZURE_CLI", "false")]).unwrap();
        assert!(!config.auth.use_azure_cli);
    }
}
