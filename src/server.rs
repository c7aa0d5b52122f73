//! MCP server struct definition and initialization.

use crate::config::Config;
use crate::error::KustoError;
use crate::service::KustoService;
use rmcp::handler::server::router::tool::ToolRouter;
use std::sync::Arc;

/// The Kusto MCP Server instance.
///
/// Cloned per request; the service and configuration are shared via `Arc`.
///
/// - **Tools**: connecting, querying, analysis and schema lookups
/// - **Resources**: table list, table schemas, a sample query, connection info
/// - **Prompts**: guided analysis conversations
#[derive(Clone)]
pub struct KustoMcpServer {
    /// Connection registry, executor and schema accessor.
    pub(crate) service: Arc<KustoService>,

    pub(crate) config: Arc<Config>,

    /// Tool router for dispatching tool calls.
    pub(crate) tool_router: ToolRouter<Self>,
}

impl KustoMcpServer {
    /// Create a server that reaches clusters over HTTPS with Azure AD tokens.
    ///
    /// No connection is attempted here; the registry starts from the
    /// persisted identity (if any) and connects lazily.
    pub fn new(config: Config) -> Result<Self, KustoError> {
        let service = KustoService::from_config(&config)?;
        Ok(Self::with_service(config, Arc::new(service)))
    }

    /// Create a server around an existing service.
    pub fn with_service(config: Config, service: Arc<KustoService>) -> Self {
        Self {
            service,
            config: Arc::new(config),
            tool_router: crate::tools::create_tool_router(),
        }
    }

    /// Create a server from environment variables.
    pub fn from_env() -> Result<Self, KustoError> {
        Self::new(Config::from_env()?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn service(&self) -> &Arc<KustoService> {
        &self.service
    }

    /// `(cluster, database)` of the active identity, when connected.
    pub fn current_target(&self) -> Option<(String, String)> {
        if self.service.is_connected() {
            Some(self.service.get_connection_details())
        } else {
            None
        }
    }
}
