//! ServerHandler implementation for the Kusto MCP Server.
//!
//! This module implements the rmcp `ServerHandler` trait which defines how
//! the server responds to MCP protocol requests.

use crate::prompts::{build_prompt_list, get_prompt};
use crate::resources::{build_resource_list, build_resource_templates, read_resource};
use crate::server::KustoMcpServer;
use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    GetPromptRequestParam, GetPromptResult, Implementation, ListPromptsResult,
    ListResourceTemplatesResult, ListResourcesResult, Meta, PaginatedRequestParam, ProtocolVersion,
    ReadResourceRequestParam, ReadResourceResult, ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{tool_handler, ErrorData};
use std::collections::HashMap;
use std::fmt::Write;
use tracing::{debug, info};

/// The `#[tool_handler]` macro generates `list_tools` and `call_tool`.
#[tool_handler]
impl ServerHandler for KustoMcpServer {
    fn get_info(&self) -> ServerInfo {
        info!("MCP client requesting server info");

        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,

            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .enable_prompts()
                .build(),

            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                title: Some("Kusto MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },

            instructions: Some(build_instructions(self)),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        let (cluster, database) = self.service.get_connection_details();

        Ok(ListResourcesResult {
            resources: build_resource_list(),
            next_cursor: None,
            meta: Some(Meta(
                serde_json::json!({
                    "connected": self.service.is_connected(),
                    "cluster": cluster,
                    "database": database,
                })
                .as_object()
                .cloned()
                .unwrap_or_default(),
            )),
        })
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, ErrorData> {
        Ok(ListResourceTemplatesResult {
            resource_templates: build_resource_templates(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        debug!("Reading resource {}", request.uri);
        read_resource(&self.service, &request.uri)
            .await
            .map_err(ErrorData::from)
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, ErrorData> {
        Ok(ListPromptsResult {
            prompts: build_prompt_list(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, ErrorData> {
        let arguments = request.arguments.map(prompt_arguments);
        get_prompt(&request.name, arguments.as_ref()).map_err(ErrorData::from)
    }
}

/// Flatten JSON prompt arguments to strings. Arrays keep their JSON form.
fn prompt_arguments(map: serde_json::Map<String, serde_json::Value>) -> HashMap<String, String> {
    map.into_iter()
        .filter_map(|(k, v)| match v {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((k, s)),
            other => Some((k, other.to_string())),
        })
        .collect()
}

fn build_instructions(server: &KustoMcpServer) -> String {
    let mut instructions = String::from("# Kusto MCP Server\n\n");
    instructions.push_str("This server runs KQL queries against Azure Data Explorer (Kusto) clusters.\n\n");

    match server.current_target() {
        Some((cluster, database)) => {
            let _ = write!(
                instructions,
                "**Connected to:** `{}`, database `{}`\n\n",
                cluster, database
            );
        }
        None => {
            instructions.push_str("**Not connected.** Call `connect` with a cluster URL and database first.\n\n");
        }
    }

    instructions.push_str("### Tools\n");
    instructions.push_str("- `connect`, `connection_status`: manage the active cluster and database\n");
    instructions.push_str("- `execute_query`: run KQL and return a formatted table\n");
    instructions.push_str("- `analyze_data`: summary, stats or plot_ready analysis of query results\n");
    instructions.push_str("- `optimize_query`: static review of a query without running it\n");
    instructions.push_str("- `list_tables`, `describe_table`: schema lookups\n\n");

    instructions.push_str("### Resources\n");
    instructions.push_str("- `kusto://tables`, `kusto://schema/{table}`, `kusto://sample`, `kusto://connection`\n\n");

    instructions.push_str("### Prompts\n");
    instructions.push_str("- `time_series_analysis`, `cohort_analysis`, `funnel_analysis`, `data_quality_check`\n");

    instructions
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_arguments_flatten() {
        let map = json!({
            "table_name": "T",
            "funnel_steps": ["a", "b"],
            "event_column": null,
        })
        .as_object()
        .cloned()
        .unwrap();

        let args = prompt_arguments(map);
        assert_eq!(args["table_name"], "T");
        assert_eq!(args["funnel_steps"], r#"["a","b"]"#);
        assert!(!args.contains_key("event_column"));
    }
}
