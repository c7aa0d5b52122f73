//! REST client for Kusto clusters.
//!
//! [`KustoBackend`] is the seam the rest of the crate talks to: one
//! authenticated handle bound to a cluster endpoint. [`KustoClient`] is the
//! HTTP implementation; tests substitute stubs.

use crate::config::Config;
use crate::constants::LOG_QUERY_MAX_LEN;
use crate::database::auth::{bearer_token, credential_from_config, truncate_for_log, SharedCredential};
use crate::database::types::KustoResponse;
use crate::error::KustoError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// An authenticated client bound to one cluster.
#[async_trait]
pub trait KustoBackend: Send + Sync {
    /// Run a query or control command against `database`.
    async fn execute(&self, database: &str, query: &str) -> Result<KustoResponse, KustoError>;

    /// Cluster endpoint this handle talks to.
    fn cluster(&self) -> &str;
}

/// Shared handle as cached by the registry.
pub type ConnectionHandle = Arc<dyn KustoBackend>;

/// Creates handles for clusters.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Build a handle for `cluster`. Credentials are resolved here.
    async fn connect(&self, cluster: &str) -> Result<ConnectionHandle, KustoError>;
}

/// Whether the text is a control command (first statement starts with `.`).
pub fn is_control_command(query: &str) -> bool {
    query
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("//"))
        .map(|line| line.starts_with('.'))
        .unwrap_or(false)
}

/// HTTP client for the Kusto v1 REST endpoints.
pub struct KustoClient {
    http: reqwest::Client,
    cluster: String,
    app_name: String,
    credential: SharedCredential,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "@message", default)]
    detail: Option<String>,
}

impl KustoClient {
    pub fn new(
        http: reqwest::Client,
        cluster: impl Into<String>,
        app_name: impl Into<String>,
        credential: SharedCredential,
    ) -> Self {
        Self {
            http,
            cluster: cluster.into().trim_end_matches('/').to_string(),
            app_name: app_name.into(),
            credential,
        }
    }

    /// Acquire a token up front so that credential problems surface at connect time.
    pub async fn authenticate(&self) -> Result<(), KustoError> {
        self.bearer().await.map(|_| ())
    }

    fn endpoint(&self, is_command: bool) -> String {
        let path = if is_command { "mgmt" } else { "query" };
        format!("{}/v1/rest/{}", self.cluster, path)
    }

    /// Bearer token for this cluster. The credential caches and refreshes it.
    async fn bearer(&self) -> Result<String, KustoError> {
        bearer_token(self.credential.as_ref(), &self.cluster).await
    }
}

#[async_trait]
impl KustoBackend for KustoClient {
    async fn execute(&self, database: &str, query: &str) -> Result<KustoResponse, KustoError> {
        let is_command = is_control_command(query);
        let request_id = Uuid::new_v4();
        debug!(
            "POST {} [{}]: {}",
            self.endpoint(is_command),
            request_id,
            truncate_for_log(query, LOG_QUERY_MAX_LEN)
        );

        let bearer = self.bearer().await?;
        let response = self
            .http
            .post(self.endpoint(is_command))
            .bearer_auth(bearer)
            .header("x-ms-app", &self.app_name)
            .header("x-ms-client-request-id", format!("{};{}", self.app_name, request_id))
            .json(&json!({ "db": database, "csl": query }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(error_from_reply(status.as_u16(), &body));
        }

        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| KustoError::malformed(format!("reply is not JSON: {}", e)))?;
        KustoResponse::from_v1(value, is_command)
    }

    fn cluster(&self) -> &str {
        &self.cluster
    }
}

/// Map a non-success reply to an error, keeping the service's own text.
fn error_from_reply(status: u16, body: &str) -> KustoError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let code = parsed.as_ref().and_then(|e| e.code.clone());
    let message = parsed
        .and_then(|e| e.detail.or(e.message))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {}", status)
            } else {
                trimmed.to_string()
            }
        });

    match status {
        401 => KustoError::auth(message),
        403 => KustoError::auth(format!("access denied: {}", message)),
        _ => KustoError::service_with_code(message, code, Some(status)),
    }
}

/// Builds [`KustoClient`]s sharing the configured Azure credential.
pub struct AadClientFactory {
    http: reqwest::Client,
    app_name: String,
    credential: SharedCredential,
}

impl AadClientFactory {
    pub fn new(http: reqwest::Client, app_name: String, credential: SharedCredential) -> Self {
        Self {
            http,
            app_name,
            credential,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, KustoError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connection.connect_timeout)
            .user_agent(format!("{}/{}", config.connection.application_name, env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| KustoError::config(format!("failed to build HTTP client: {}", e)))?;
        let credential = credential_from_config(&config.auth)?;
        Ok(Self::new(
            http,
            config.connection.application_name.clone(),
            credential,
        ))
    }
}

#[async_trait]
impl ClientFactory for AadClientFactory {
    async fn connect(&self, cluster: &str) -> Result<ConnectionHandle, KustoError> {
        let cluster = cluster.trim();
        if !cluster.starts_with("https://") && !cluster.starts_with("http://") {
            return Err(KustoError::invalid_input(format!(
                "cluster must be a URL such as https://<name>.<region>.kusto.windows.net, got '{}'",
                cluster
            )));
        }

        let client = KustoClient::new(
            self.http.clone(),
            cluster,
            self.app_name.clone(),
            self.credential.clone(),
        );
        client.authenticate().await?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azure_core::credentials::{AccessToken, TokenCredential, TokenRequestOptions};
    use azure_core::error::{Error, ErrorKind};

    #[derive(Debug)]
    struct SignedOut;

    #[async_trait]
    impl TokenCredential for SignedOut {
        async fn get_token(
            &self,
            _scopes: &[&str],
            _options: Option<TokenRequestOptions>,
        ) -> azure_core::Result<AccessToken> {
            Err(Error::message(ErrorKind::Credential, "not signed in"))
        }
    }

    #[test]
    fn test_is_control_command() {
        assert!(is_control_command(".show tables"));
        assert!(is_control_command("  // list\n\n.show database schema | limit 1"));
        assert!(!is_control_command("StormEvents | take 10"));
        assert!(!is_control_command("// only a comment"));
        assert!(!is_control_command(""));
    }

    #[test]
    fn test_endpoint_selection() {
        let client = KustoClient::new(
            reqwest::Client::new(),
            "https://c.kusto.windows.net/",
            "app",
            Arc::new(SignedOut),
        );
        assert_eq!(client.cluster(), "https://c.kusto.windows.net");
        assert_eq!(client.endpoint(true), "https://c.kusto.windows.net/v1/rest/mgmt");
        assert_eq!(client.endpoint(false), "https://c.kusto.windows.net/v1/rest/query");
    }

    #[test]
    fn test_error_from_reply_uses_service_text() {
        let body = r#"{"error":{"code":"General_BadRequest","message":"Request is invalid","@message":"Syntax error: SYN0002"}}"#;
        match error_from_reply(400, body) {
            KustoError::Service {
                message,
                code,
                status,
            } => {
                assert_eq!(message, "Syntax error: SYN0002");
                assert_eq!(code.as_deref(), Some("General_BadRequest"));
                assert_eq!(status, Some(400));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_error_from_reply_auth_and_plain_text() {
        assert!(error_from_reply(401, "").is_authentication());
        assert!(error_from_reply(403, r#"{"error":{"message":"Forbidden"}}"#)
            .to_string()
            .contains("Forbidden"));
        assert_eq!(error_from_reply(502, "bad gateway").to_string(), "bad gateway");
        assert_eq!(error_from_reply(500, "").to_string(), "HTTP 500");
    }

    #[tokio::test]
    async fn test_factory_rejects_non_url_cluster() {
        let factory = AadClientFactory::new(
            reqwest::Client::new(),
            "app".into(),
            Arc::new(SignedOut),
        );
        let err = factory.connect("mycluster").await.err().unwrap();
        assert!(matches!(err, KustoError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_factory_surfaces_credential_failure() {
        let factory = AadClientFactory::new(
            reqwest::Client::new(),
            "app".into(),
            Arc::new(SignedOut),
        );
        let err = factory.connect("https://c.kusto.windows.net").await.err().unwrap();
        assert!(err.is_authentication());
    }
}
