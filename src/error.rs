//! Error types for the Kusto MCP Server.
//!
//! Backend failures are converted into values at the lowest layer that can
//! interpret them: the registry reports `false`, the executor reports
//! [`QueryOutcome::Failure`](crate::database::QueryOutcome), the schema
//! accessor reports empty results. `KustoError` is the common currency
//! underneath those conversions.

pub use rmcp::ErrorData as McpError;
use thiserror::Error;

/// Domain-specific errors for the Kusto MCP Server.
///
/// Named `KustoError` to avoid collision with the protocol error type.
#[derive(Debug, Error)]
pub enum KustoError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential acquisition or token exchange failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The backend rejected or failed a request. Displays the backend's own text.
    #[error("{message}")]
    Service {
        message: String,
        code: Option<String>,
        status: Option<u16>,
    },

    /// A query was attempted with no established handle
    #[error("No active connection. Please connect to a Kusto cluster first.")]
    NoActiveConnection,

    /// A reply did not have the expected shape
    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    /// The sidecar file could not be read or written
    #[error("Could not persist connection settings to {path}: {message}")]
    Persistence { path: String, message: String },

    /// Network-level failure talking to the cluster or the identity provider
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl KustoError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an authentication error.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a service error carrying the backend's message.
    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service {
            message: msg.into(),
            code: None,
            status: None,
        }
    }

    /// Create a service error with the backend error code and HTTP status.
    pub fn service_with_code(
        msg: impl Into<String>,
        code: Option<String>,
        status: Option<u16>,
    ) -> Self {
        Self::Service {
            message: msg.into(),
            code,
            status,
        }
    }

    /// Create a malformed reply error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedReply(msg.into())
    }

    /// Create a persistence error.
    pub fn persistence(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a transport error with a source.
    pub fn transport_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error came from credential acquisition.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Get a user-friendly suggestion for how to fix this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) => Some("Check your environment variables and configuration"),
            Self::Authentication(_) => Some(
                "Sign in with `az login` or set AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET",
            ),
            Self::NoActiveConnection => Some("Use the `connect` tool to establish a connection"),
            Self::Transport { .. } => Some("Check the cluster URL and network connectivity"),
            Self::Service {
                status: Some(403), ..
            } => Some("Request viewer permissions on the database from its administrator"),
            Self::Service { .. } => Some("Review the KQL syntax and the referenced tables"),
            Self::Persistence { .. } => {
                Some("The connection still works; only the saved settings file is affected")
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for KustoError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            KustoError::malformed(e.to_string())
        } else {
            KustoError::transport_with_source("HTTP request failed", e)
        }
    }
}

/// Convert KustoError to the protocol error for protocol-level responses.
///
/// Tool failures are reported as text inside a successful tool result; this
/// conversion is for resource and prompt requests.
impl From<KustoError> for McpError {
    fn from(e: KustoError) -> Self {
        match e {
            KustoError::InvalidInput(msg) => McpError::invalid_params(msg, None),
            KustoError::Config(msg) => McpError::invalid_request(msg, None),
            KustoError::NoActiveConnection => McpError::invalid_request(e.to_string(), None),
            other => McpError::internal_error(other.to_string(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_displays_backend_text() {
        let err = KustoError::service("Syntax error: unexpected token '|'");
        assert_eq!(err.to_string(), "Syntax error: unexpected token '|'");
    }

    #[test]
    fn test_no_active_connection_message() {
        let err = KustoError::NoActiveConnection;
        assert_eq!(
            err.to_string(),
            "No active connection. Please connect to a Kusto cluster first."
        );
    }

    #[test]
    fn test_protocol_error_conversion() {
        use rmcp::model::ErrorCode;

        let err: McpError = KustoError::invalid_input("Unknown prompt: nope").into();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(err.message, "Unknown prompt: nope");

        let err: McpError = KustoError::service("boom").into();
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    }

    #[test]
    fn test_error_suggestions() {
        assert!(KustoError::auth("token expired").suggestion().is_some());
        assert!(KustoError::service_with_code("denied", None, Some(403))
            .suggestion()
            .unwrap()
            .contains("permissions"));
        assert!(KustoError::internal("unknown").suggestion().is_none());
    }

    #[test]
    fn test_is_authentication() {
        assert!(KustoError::auth("x").is_authentication());
        assert!(!KustoError::service("x").is_authentication());
    }
}
