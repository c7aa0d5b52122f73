//! Collaborator-facing facade over the registry, executor and schema accessor.
//!
//! One `KustoService` exists per server process and is shared by every tool,
//! resource and prompt handler.

use crate::config::Config;
use crate::database::{
    AadClientFactory, ClientFactory, ConnectionRegistry, QueryExecutor, QueryOutcome,
    SchemaAccessor, TableSchema,
};
use crate::error::KustoError;
use crate::prompter::{InputPrompter, CLUSTER_PROMPT, DATABASE_PROMPT};
use crate::state::ActiveIdentity;
use std::sync::Arc;

/// Message returned when a connection attempt fails.
pub const CONNECT_FAILED_MESSAGE: &str =
    "Failed to connect. Please check your credentials and connection details.";

pub struct KustoService {
    registry: Arc<ConnectionRegistry>,
    executor: QueryExecutor,
    schema: SchemaAccessor,
    env_identity: Option<ActiveIdentity>,
}

impl KustoService {
    /// Build the service from configuration using the Azure AD client factory.
    pub fn from_config(config: &Config) -> Result<Self, KustoError> {
        let factory = AadClientFactory::from_config(config)?;
        Ok(Self::with_factory(config, Arc::new(factory)))
    }

    /// Build the service with a custom client factory.
    pub fn with_factory(config: &Config, factory: Arc<dyn ClientFactory>) -> Self {
        let registry = Arc::new(ConnectionRegistry::from_config(config, factory));
        Self::with_registry(registry, config.connection.env_identity.clone())
    }

    pub fn with_registry(
        registry: Arc<ConnectionRegistry>,
        env_identity: Option<ActiveIdentity>,
    ) -> Self {
        let executor = QueryExecutor::new(registry.clone());
        let schema = SchemaAccessor::new(executor.clone());
        Self {
            registry,
            executor,
            schema,
            env_identity,
        }
    }

    /// Connect to a cluster and database.
    pub async fn connect(&self, cluster: &str, database: &str) -> (bool, String) {
        let cluster = cluster.trim();
        let database = database.trim();
        if self.registry.initialize(cluster, database).await {
            (
                true,
                format!("Connected to {}, database: {}", cluster, database),
            )
        } else {
            (false, CONNECT_FAILED_MESSAGE.to_string())
        }
    }

    /// Connect using answers from `prompter`.
    ///
    /// Prompts default to the environment identity when one was supplied,
    /// otherwise to the current identity.
    pub async fn connect_with_prompter(&self, prompter: &dyn InputPrompter) -> (bool, String) {
        let (default_cluster, default_database) = self
            .env_identity
            .clone()
            .or_else(|| self.registry.active_identity())
            .map(|id| (id.cluster, id.database))
            .unwrap_or_default();

        let cluster = prompter.ask(CLUSTER_PROMPT, &default_cluster).await;
        if cluster.trim().is_empty() {
            return (false, "Connection cancelled - no cluster specified".to_string());
        }

        let database = prompter.ask(DATABASE_PROMPT, &default_database).await;
        if database.trim().is_empty() {
            return (false, "Connection cancelled - no database specified".to_string());
        }

        self.connect(&cluster, &database).await
    }

    pub async fn execute_query(&self, query: &str) -> QueryOutcome {
        self.executor.run(query).await
    }

    pub async fn get_tables(&self) -> Vec<String> {
        self.schema.list_tables().await
    }

    pub async fn get_table_schema(&self, table: &str) -> Option<TableSchema> {
        self.schema.describe_table(table).await
    }

    pub fn is_connected(&self) -> bool {
        self.registry.is_connected()
    }

    /// `(cluster, database)`, or `("Not connected", "Not connected")`.
    pub fn get_connection_details(&self) -> (String, String) {
        self.registry.connection_details()
    }

    pub fn close_connections(&self) {
        self.registry.close_all();
    }

    /// Queries currently running.
    pub fn in_flight_queries(&self) -> usize {
        self.executor.in_flight()
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{ConnectionHandle, KustoBackend, KustoResponse};
    use crate::prompter::HostPrompter;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OkBackend(String);

    #[async_trait]
    impl KustoBackend for OkBackend {
        async fn execute(&self, _db: &str, _query: &str) -> Result<KustoResponse, KustoError> {
            Ok(KustoResponse::empty())
        }

        fn cluster(&self) -> &str {
            &self.0
        }
    }

    #[derive(Default)]
    struct Factory {
        connects: AtomicUsize,
    }

    #[async_trait]
    impl ClientFactory for Factory {
        async fn connect(&self, cluster: &str) -> Result<ConnectionHandle, KustoError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if cluster.contains("unreachable") {
                return Err(KustoError::transport("connection refused"));
            }
            Ok(Arc::new(OkBackend(cluster.to_string())))
        }
    }

    fn service(env_identity: Option<ActiveIdentity>) -> (KustoService, Arc<Factory>) {
        let factory = Arc::new(Factory::default());
        let registry = Arc::new(ConnectionRegistry::new(factory.clone(), None, None));
        (KustoService::with_registry(registry, env_identity), factory)
    }

    #[tokio::test]
    async fn test_connect_messages() {
        let (service, _) = service(None);
        assert_eq!(
            service.connect("https://c", "db").await,
            (true, "Connected to https://c, database: db".to_string())
        );
        assert_eq!(
            service.connect("https://unreachable", "db").await,
            (false, CONNECT_FAILED_MESSAGE.to_string())
        );
    }

    #[tokio::test]
    async fn test_prompter_without_cluster_cancels() {
        let (service, factory) = service(None);
        let (ok, message) = service
            .connect_with_prompter(&HostPrompter::for_connect(None, Some("db")))
            .await;
        assert!(!ok);
        assert_eq!(message, "Connection cancelled - no cluster specified");
        assert_eq!(factory.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_prompter_without_database_cancels() {
        let (service, _) = service(None);
        let (ok, message) = service
            .connect_with_prompter(&HostPrompter::for_connect(Some("https://c"), None))
            .await;
        assert!(!ok);
        assert_eq!(message, "Connection cancelled - no database specified");
    }

    #[tokio::test]
    async fn test_prompter_defaults_to_current_identity() {
        let (service, factory) = service(None);
        assert!(service.connect("https://c", "db").await.0);

        let (ok, _) = service.connect_with_prompter(&HostPrompter::new()).await;
        assert!(ok);
        assert_eq!(factory.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_explicit_answers_win_over_env_identity() {
        let (service, _) = service(Some(ActiveIdentity::new("https://env", "envdb")));
        let (ok, message) = service
            .connect_with_prompter(&HostPrompter::for_connect(Some("https://other"), Some("x")))
            .await;
        assert!(ok);
        assert_eq!(message, "Connected to https://other, database: x");
        assert_eq!(
            service.get_connection_details(),
            ("https://other".to_string(), "x".to_string())
        );
    }

    #[tokio::test]
    async fn test_env_identity_is_the_prompt_default() {
        let (service, _) = service(Some(ActiveIdentity::new("https://env", "envdb")));
        let (ok, message) = service
            .connect_with_prompter(&HostPrompter::for_connect(None, Some("otherdb")))
            .await;
        assert!(ok);
        assert_eq!(message, "Connected to https://env, database: otherdb");
    }
}
