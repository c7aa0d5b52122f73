//! Azure AD credentials for Kusto clusters.
//!
//! Token acquisition is delegated to `azure_identity`:
//! - a service principal uses [`ClientSecretCredential`]
//! - otherwise [`DefaultAzureCredential`] tries the developer tools
//!   (Azure CLI, Azure Developer CLI)
//!
//! Both credentials cache tokens and refresh them before expiry.

use crate::config::{AuthConfig, ServicePrincipal};
use crate::error::KustoError;
use azure_core::credentials::{Secret, TokenCredential, DEFAULT_SCOPE_SUFFIX};
use azure_identity::{
    ClientSecretCredential, ClientSecretCredentialOptions, DefaultAzureCredential,
    TokenCredentialOptions,
};
use std::sync::Arc;
use tracing::debug;

/// Credential shared by every client the factory creates.
pub type SharedCredential = Arc<dyn TokenCredential>;

/// Build the credential described by the configuration.
pub fn credential_from_config(auth: &AuthConfig) -> Result<SharedCredential, KustoError> {
    match &auth.service_principal {
        Some(principal) => client_secret_credential(principal),
        None => developer_credential(auth.use_azure_cli),
    }
}

fn client_secret_credential(principal: &ServicePrincipal) -> Result<SharedCredential, KustoError> {
    debug!(
        "Using service principal credential for client_id: {}",
        principal.client_id.chars().take(8).collect::<String>()
    );

    let mut credential_options = TokenCredentialOptions::default();
    credential_options.set_authority_host(principal.authority_host.clone());

    let credential: SharedCredential = ClientSecretCredential::new(
        &principal.tenant_id,
        principal.client_id.clone(),
        Secret::new(principal.client_secret.clone()),
        Some(ClientSecretCredentialOptions { credential_options }),
    )
    .map_err(|e| KustoError::config(format!("invalid service principal: {}", e)))?;

    Ok(credential)
}

fn developer_credential(use_azure_cli: bool) -> Result<SharedCredential, KustoError> {
    let mut builder = DefaultAzureCredential::builder();
    if !use_azure_cli {
        debug!("Azure CLI credential disabled");
        builder.exclude_azure_cli_credential();
    }

    let credential: SharedCredential = builder
        .build()
        .map_err(|e| KustoError::auth(format!("no credential source available: {}", e)))?;
    Ok(credential)
}

/// OAuth2 scope for a cluster resource.
pub fn scope_for(resource: &str) -> String {
    format!("{}{}", resource.trim_end_matches('/'), DEFAULT_SCOPE_SUFFIX)
}

/// Bearer token for `cluster`.
pub async fn bearer_token(
    credential: &dyn TokenCredential,
    cluster: &str,
) -> Result<String, KustoError> {
    let scope = scope_for(cluster);
    let token = credential
        .get_token(&[scope.as_str()], None)
        .await
        .map_err(|e| KustoError::auth(format!("Failed to acquire Azure AD token: {}", e)))?;
    Ok(token.token.secret().to_string())
}

/// Truncate a string for logging purposes.
pub fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use azure_core::credentials::{AccessToken, TokenRequestOptions};
    use azure_core::date::OffsetDateTime;
    use azure_core::error::{Error, ErrorKind};
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct RecordingCredential {
        scopes: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl TokenCredential for RecordingCredential {
        async fn get_token(
            &self,
            scopes: &[&str],
            _options: Option<TokenRequestOptions>,
        ) -> azure_core::Result<AccessToken> {
            self.scopes
                .lock()
                .extend(scopes.iter().map(|s| s.to_string()));
            if self.fail {
                return Err(Error::with_message(ErrorKind::Credential, || {
                    "az login required"
                }));
            }
            Ok(AccessToken::new("token-a", OffsetDateTime::now_utc()))
        }
    }

    #[tokio::test]
    async fn test_bearer_token_requests_cluster_scope() {
        let credential = RecordingCredential::default();
        let token = bearer_token(&credential, "https://c.kusto.windows.net/")
            .await
            .unwrap();
        assert_eq!(token, "token-a");
        assert_eq!(
            *credential.scopes.lock(),
            vec!["https://c.kusto.windows.net/.default".to_string()]
        );
    }

    #[tokio::test]
    async fn test_bearer_token_failure_is_authentication() {
        let credential = RecordingCredential {
            fail: true,
            ..Default::default()
        };
        let err = bearer_token(&credential, "https://c").await.unwrap_err();
        assert!(err.is_authentication());
        assert!(err.to_string().contains("az login required"));
    }

    #[test]
    fn test_service_principal_credential() {
        let auth = AuthConfig {
            service_principal: Some(ServicePrincipal {
                tenant_id: "00000000-0000-0000-0000-000000000000".into(),
                client_id: "client-é-id".into(),
                client_secret: "s".into(),
                authority_host: "https://login.microsoftonline.com".into(),
            }),
            use_azure_cli: false,
        };
        assert!(credential_from_config(&auth).is_ok());
    }

    #[test]
    fn test_service_principal_rejects_bad_tenant() {
        let auth = AuthConfig {
            service_principal: Some(ServicePrincipal {
                tenant_id: "not a tenant/..".into(),
                client_id: "c".into(),
                client_secret: "s".into(),
                authority_host: "https://login.microsoftonline.com".into(),
            }),
            use_azure_cli: true,
        };
        let err = credential_from_config(&auth).err().unwrap();
        assert!(matches!(err, KustoError::Config(_)));
    }

    #[test]
    fn test_developer_credential_builds() {
        assert!(credential_from_config(&AuthConfig::default()).is_ok());
    }

    #[test]
    fn test_scope_for() {
        assert_eq!(
            scope_for("https://c.kusto.windows.net/"),
            "https://c.kusto.windows.net/.default"
        );
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("this is a long string", 10), "this is a ...");
        assert_eq!(truncate_for_log("ééééé", 3), "é...");
    }
}
