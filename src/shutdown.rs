//! Graceful shutdown handling.
//!
//! On SIGTERM or Ctrl+C the server stops serving, waits for running queries
//! up to the drain timeout, then releases every cached connection handle.

use crate::constants::DRAIN_POLL_INTERVAL;
use crate::service::KustoService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Shutdown signal that can be awaited.
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Wait for the shutdown signal.
    pub async fn recv(&mut self) {
        let _ = self.receiver.wait_for(|&v| v).await;
    }

    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// Shutdown phases, logged as they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Initiated,
    DrainingQueries,
    ClosingConnections,
    Complete,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownPhase::Initiated => write!(f, "initiated"),
            ShutdownPhase::DrainingQueries => write!(f, "draining_queries"),
            ShutdownPhase::ClosingConnections => write!(f, "closing_connections"),
            ShutdownPhase::Complete => write!(f, "complete"),
        }
    }
}

/// Controller for managing graceful shutdown.
pub struct ShutdownController {
    sender: watch::Sender<bool>,
    shutting_down: AtomicBool,
    /// Set once connections have been released.
    closed: AtomicBool,
    drain_timeout: Duration,
}

impl ShutdownController {
    pub fn new(drain_timeout: Duration) -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender,
            shutting_down: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            drain_timeout,
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Initiate shutdown. Later calls are no-ops.
    pub fn shutdown(&self) {
        if self
            .shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("Shutdown phase: {}", ShutdownPhase::Initiated);
            let _ = self.sender.send(true);
        }
    }

    /// Drain running queries, then close every connection exactly once.
    pub async fn graceful_shutdown(&self, service: &KustoService) {
        self.shutdown();

        info!("Shutdown phase: {}", ShutdownPhase::DrainingQueries);
        self.drain_queries(service).await;

        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("Shutdown phase: {}", ShutdownPhase::ClosingConnections);
            service.close_connections();
        }

        info!("Shutdown phase: {}", ShutdownPhase::Complete);
    }

    async fn drain_queries(&self, service: &KustoService) {
        let start = Instant::now();

        loop {
            let running = service.in_flight_queries();
            if running == 0 {
                info!("All queries drained");
                break;
            }

            if start.elapsed() >= self.drain_timeout {
                warn!(
                    "Drain timeout exceeded with {} queries still running",
                    running
                );
                break;
            }

            info!("Waiting for {} in-flight queries to complete...", running);
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }
}

/// Shared shutdown controller type.
pub type SharedShutdownController = Arc<ShutdownController>;

/// Install SIGTERM (Unix) and Ctrl+C handlers that trigger `controller`.
pub fn install_signal_handlers(controller: SharedShutdownController) {
    let ctrl_c_controller = controller.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating shutdown...");
                ctrl_c_controller.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl+C signal: {}", e),
        }
    });

    #[cfg(unix)]
    {
        tokio::spawn(async move {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("Received SIGTERM, initiating shutdown...");
                    controller.shutdown();
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        });
    }
    #[cfg(not(unix))]
    drop(controller);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{
        ClientFactory, ConnectionHandle, ConnectionRegistry, KustoBackend, KustoResponse,
    };
    use crate::error::KustoError;
    use async_trait::async_trait;

    struct SlowBackend(Duration);

    #[async_trait]
    impl KustoBackend for SlowBackend {
        async fn execute(&self, _db: &str, query: &str) -> Result<KustoResponse, KustoError> {
            if !query.starts_with('.') {
                tokio::time::sleep(self.0).await;
            }
            Ok(KustoResponse::empty())
        }

        fn cluster(&self) -> &str {
            "https://c"
        }
    }

    struct Factory(Duration);

    #[async_trait]
    impl ClientFactory for Factory {
        async fn connect(&self, _cluster: &str) -> Result<ConnectionHandle, KustoError> {
            Ok(Arc::new(SlowBackend(self.0)))
        }
    }

    async fn connected_service(query_time: Duration) -> Arc<KustoService> {
        let registry = Arc::new(ConnectionRegistry::new(
            Arc::new(Factory(query_time)),
            None,
            None,
        ));
        let service = Arc::new(KustoService::with_registry(registry, None));
        assert!(service.connect("https://c", "db").await.0);
        service
    }

    #[test]
    fn test_shutdown_signal_and_idempotence() {
        let controller = ShutdownController::new(Duration::from_secs(1));
        let signal = controller.signal();
        assert!(!signal.is_shutdown());

        controller.shutdown();
        controller.shutdown();
        assert!(controller.is_shutting_down());
        assert!(signal.is_shutdown());
    }

    #[tokio::test]
    async fn test_graceful_shutdown_closes_connections() {
        let service = connected_service(Duration::ZERO).await;
        assert_eq!(service.registry().handle_count(), 1);

        let controller = ShutdownController::new(Duration::from_secs(1));
        controller.graceful_shutdown(&service).await;
        assert_eq!(service.registry().handle_count(), 0);

        // A second pass does not close again.
        assert!(service.connect("https://c", "db").await.0);
        controller.graceful_shutdown(&service).await;
        assert_eq!(service.registry().handle_count(), 1);
    }

    #[tokio::test]
    async fn test_drain_waits_for_running_query() {
        let service = connected_service(Duration::from_millis(300)).await;
        let runner = service.clone();
        let query = tokio::spawn(async move { runner.execute_query("T | take 1").await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(service.in_flight_queries(), 1);

        let controller = ShutdownController::new(Duration::from_secs(5));
        controller.graceful_shutdown(&service).await;
        assert_eq!(service.in_flight_queries(), 0);
        assert!(query.await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_drain_timeout_still_closes() {
        let service = connected_service(Duration::from_secs(5)).await;
        let runner = service.clone();
        let _query = tokio::spawn(async move { runner.execute_query("T").await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let controller = ShutdownController::new(Duration::from_millis(100));
        controller.graceful_shutdown(&service).await;
        assert_eq!(service.registry().handle_count(), 0);
    }

    #[test]
    fn test_shutdown_phase_display() {
        assert_eq!(ShutdownPhase::DrainingQueries.to_string(), "draining_queries");
        assert_eq!(
            ShutdownPhase::ClosingConnections.to_string(),
            "closing_connections"
        );
    }
}
