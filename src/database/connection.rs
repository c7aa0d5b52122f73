//! Registry of authenticated cluster handles.
//!
//! Handles are keyed by (cluster, database) and live until [`close_all`].
//! Exactly one identity is "active" at a time; queries go to its handle.
//!
//! [`close_all`]: ConnectionRegistry::close_all

use super::client::{ClientFactory, ConnectionHandle};
use super::query::dispatch;
use crate::config::Config;
use crate::constants::PROBE_QUERY;
use crate::error::KustoError;
use crate::state::{ActiveIdentity, ConnectionKey, IdentityStore};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Default)]
struct RegistryState {
    handles: HashMap<ConnectionKey, ConnectionHandle>,
    active: Option<ActiveIdentity>,
}

/// Owns every cached handle and the active identity.
pub struct ConnectionRegistry {
    factory: Arc<dyn ClientFactory>,
    state: RwLock<RegistryState>,
    /// `None` when the identity came from the environment.
    store: Option<IdentityStore>,
}

impl ConnectionRegistry {
    /// Create a registry with an explicit starting identity and store.
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        active: Option<ActiveIdentity>,
        store: Option<IdentityStore>,
    ) -> Self {
        Self {
            factory,
            state: RwLock::new(RegistryState {
                handles: HashMap::new(),
                active,
            }),
            store,
        }
    }

    /// Create a registry from configuration.
    ///
    /// An environment-supplied identity is adopted as is and disables the
    /// sidecar file. Otherwise the sidecar is loaded if it exists.
    pub fn from_config(config: &Config, factory: Arc<dyn ClientFactory>) -> Self {
        if let Some(identity) = config.connection.env_identity.clone() {
            info!("Using connection from environment: {}", identity);
            return Self::new(factory, Some(identity), None);
        }

        let store = config.connection.config_file.clone().map(IdentityStore::new);
        let active = store.as_ref().and_then(IdentityStore::load);
        if let Some(identity) = &active {
            info!("Restored saved connection: {}", identity);
        }
        Self::new(factory, active, store)
    }

    /// Make (cluster, database) the active identity, creating a handle if needed.
    ///
    /// Returns `false` when the handle could not be created or the probe
    /// query failed; nothing is cached in that case.
    pub async fn initialize(&self, cluster: &str, database: &str) -> bool {
        let identity = ActiveIdentity::new(cluster, database);
        let key = identity.key();

        let cached = self.state.read().handles.contains_key(&key);
        if cached {
            debug!("Reusing cached handle for {}", key);
            self.activate(identity);
            return true;
        }

        let handle = match self.factory.connect(cluster).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Failed to create handle for {}: {}", key, describe_failure(&e));
                return false;
            }
        };

        if let Err(e) = dispatch(handle.clone(), database.to_string(), PROBE_QUERY.to_string()).await
        {
            warn!("Probe query failed for {}: {}", key, describe_failure(&e));
            return false;
        }

        self.state.write().handles.entry(key).or_insert(handle);
        info!("Connected to {}", identity);
        self.activate(identity);
        true
    }

    fn activate(&self, identity: ActiveIdentity) {
        self.state.write().active = Some(identity.clone());
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&identity) {
                warn!("{}", e);
            }
        }
    }

    /// Handle of the active identity.
    pub fn current(&self) -> Option<ConnectionHandle> {
        self.current_target().map(|(handle, _)| handle)
    }

    /// Handle of the active identity together with its database.
    pub fn current_target(&self) -> Option<(ConnectionHandle, String)> {
        let state = self.state.read();
        let active = state.active.as_ref()?;
        let handle = state.handles.get(&active.key())?;
        Some((handle.clone(), active.database.clone()))
    }

    /// Whether the active identity has a cached handle.
    pub fn is_connected(&self) -> bool {
        let state = self.state.read();
        state
            .active
            .as_ref()
            .is_some_and(|active| state.handles.contains_key(&active.key()))
    }

    /// The active identity, connected or not.
    pub fn active_identity(&self) -> Option<ActiveIdentity> {
        self.state.read().active.clone()
    }

    /// `(cluster, database)` of the active identity, or the "Not connected" sentinel.
    pub fn connection_details(&self) -> (String, String) {
        ActiveIdentity::details(self.state.read().active.as_ref())
    }

    /// Number of cached handles.
    pub fn handle_count(&self) -> usize {
        self.state.read().handles.len()
    }

    /// Drop every cached handle. The active identity is kept.
    pub fn close_all(&self) {
        let dropped = {
            let mut state = self.state.write();
            std::mem::take(&mut state.handles)
        };
        if !dropped.is_empty() {
            info!("Closed {} connection(s)", dropped.len());
        }
    }

    /// Whether the identity is written to a sidecar file.
    pub fn persists_identity(&self) -> bool {
        self.store.is_some()
    }
}

/// Error text followed by its remedy, when one is known.
fn describe_failure(e: &KustoError) -> String {
    match e.suggestion() {
        Some(hint) => format!("{} ({})", e, hint),
        None => e.to_string(),
    }
}
