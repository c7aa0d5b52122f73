//! Query execution against the active handle.

use super::auth::truncate_for_log;
use super::client::ConnectionHandle;
use super::connection::ConnectionRegistry;
use super::types::KustoResponse;
use crate::constants::LOG_QUERY_MAX_LEN;
use crate::error::KustoError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Outcome of running a query.
///
/// Every failure is reduced to its message; an empty result is still a success.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Success(KustoResponse),
    Failure(String),
}

impl QueryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, QueryOutcome::Success(_))
    }

    /// Reply of a successful run.
    pub fn response(&self) -> Option<&KustoResponse> {
        match self {
            QueryOutcome::Success(response) => Some(response),
            QueryOutcome::Failure(_) => None,
        }
    }

    /// Message of a failed run.
    pub fn error(&self) -> Option<&str> {
        match self {
            QueryOutcome::Success(_) => None,
            QueryOutcome::Failure(message) => Some(message),
        }
    }

    pub fn into_result(self) -> Result<KustoResponse, String> {
        match self {
            QueryOutcome::Success(response) => Ok(response),
            QueryOutcome::Failure(message) => Err(message),
        }
    }
}

/// Run `query` on `handle` in its own task.
///
/// The caller's task only awaits the join handle. A panic inside the backend
/// call is reported as an internal error.
pub async fn dispatch(
    handle: ConnectionHandle,
    database: String,
    query: String,
) -> Result<KustoResponse, KustoError> {
    let task = tokio::spawn(async move { handle.execute(&database, &query).await });
    match task.await {
        Ok(result) => result,
        Err(e) => Err(KustoError::internal(format!("query task failed: {}", e))),
    }
}

/// Runs queries against the registry's active handle.
#[derive(Clone)]
pub struct QueryExecutor {
    registry: Arc<ConnectionRegistry>,
    in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight counter when a run ends, however it ends.
struct InFlightGuard(Arc<AtomicUsize>);

impl InFlightGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl QueryExecutor {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run a query against the active handle.
    pub async fn run(&self, query: &str) -> QueryOutcome {
        let Some((handle, database)) = self.registry.current_target() else {
            return QueryOutcome::Failure(KustoError::NoActiveConnection.to_string());
        };

        let _guard = InFlightGuard::enter(&self.in_flight);
        let start = Instant::now();
        debug!(
            "Executing query on {}: {}",
            database,
            truncate_for_log(query, LOG_QUERY_MAX_LEN)
        );

        match dispatch(handle, database, query.to_string()).await {
            Ok(response) => {
                debug!(
                    "Query completed: {} table(s) in {} ms",
                    response.tables.len(),
                    start.elapsed().as_millis()
                );
                QueryOutcome::Success(response)
            }
            Err(e) => {
                warn!("Query failed after {} ms: {}", start.elapsed().as_millis(), e);
                QueryOutcome::Failure(e.to_string())
            }
        }
    }

    /// Number of queries currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}
