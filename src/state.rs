//! Active connection identity and its on-disk mirror.
//!
//! The only durable state of the server is the (cluster, database) pair that
//! was last connected successfully. It lives in a small per-user JSON file
//! unless it was supplied through environment variables, in which case it is
//! never written back.

use crate::constants::{DEFAULT_CONFIG_FILE_NAME, NOT_CONNECTED};
use crate::error::KustoError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The (cluster, database) pair currently designated "current".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveIdentity {
    pub cluster: String,
    pub database: String,
}

impl ActiveIdentity {
    pub fn new(cluster: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            database: database.into(),
        }
    }

    /// Key under which the handle for this identity is cached.
    pub fn key(&self) -> ConnectionKey {
        ConnectionKey::new(&self.cluster, &self.database)
    }

    /// Connection details in the `(cluster, database)` shape used by callers,
    /// with the "Not connected" sentinel for an absent identity.
    pub fn details(identity: Option<&ActiveIdentity>) -> (String, String) {
        match identity {
            Some(id) => (id.cluster.clone(), id.database.clone()),
            None => (NOT_CONNECTED.to_string(), NOT_CONNECTED.to_string()),
        }
    }
}

impl fmt::Display for ActiveIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.database, self.cluster)
    }
}

/// Identity of a cached handle: cluster and database joined into one string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionKey(String);

impl ConnectionKey {
    pub fn new(cluster: &str, database: &str) -> Self {
        Self(format!("{}:{}", cluster, database))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// On-disk layout of the sidecar file.
///
/// Both fields are optional on read so that a partially written file degrades
/// to "no identity" instead of an error.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedIdentity {
    #[serde(default)]
    cluster: Option<String>,
    #[serde(default)]
    database: Option<String>,
}

/// Reads and writes the per-user sidecar file.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$HOME/.kusto_mcp_config.json` (or `%USERPROFILE%` on Windows).
    pub fn default_path() -> Option<PathBuf> {
        home_dir().map(|home| home.join(DEFAULT_CONFIG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted identity.
    ///
    /// A missing, unreadable or corrupt file yields `None`.
    pub fn load(&self) -> Option<ActiveIdentity> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No saved connection at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!(
                    "Could not read saved connection from {}: {}",
                    self.path.display(),
                    e
                );
                return None;
            }
        };

        let persisted: PersistedIdentity = match serde_json::from_str(&contents) {
            Ok(p) => p,
            Err(e) => {
                warn!(
                    "Ignoring corrupt connection file {}: {}",
                    self.path.display(),
                    e
                );
                return None;
            }
        };

        match (persisted.cluster, persisted.database) {
            (Some(cluster), Some(database)) if !cluster.is_empty() && !database.is_empty() => {
                debug!("Restored connection {} at {}", database, cluster);
                Some(ActiveIdentity::new(cluster, database))
            }
            _ => None,
        }
    }

    /// Write the identity to disk, replacing any previous contents.
    pub fn save(&self, identity: &ActiveIdentity) -> Result<(), KustoError> {
        let persisted = PersistedIdentity {
            cluster: Some(identity.cluster.clone()),
            database: Some(identity.database.clone()),
        };
        let json = serde_json::to_string(&persisted)
            .map_err(|e| KustoError::persistence(self.path.display().to_string(), e.to_string()))?;
        std::fs::write(&self.path, json)
            .map_err(|e| KustoError::persistence(self.path.display().to_string(), e.to_string()))
    }
}

fn home_dir() -> Option<PathBuf> {
    let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_key_joins_pair() {
        let key = ConnectionKey::new("https://c.kusto.windows.net", "db");
        assert_eq!(key.as_str(), "https://c.kusto.windows.net:db");
        assert_eq!(key, ActiveIdentity::new("https://c.kusto.windows.net", "db").key());
    }

    #[test]
    fn test_details_sentinel() {
        assert_eq!(
            ActiveIdentity::details(None),
            ("Not connected".to_string(), "Not connected".to_string())
        );
        let id = ActiveIdentity::new("c", "d");
        assert_eq!(
            ActiveIdentity::details(Some(&id)),
            ("c".to_string(), "d".to_string())
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(dir.path().join("conn.json"));
        let id = ActiveIdentity::new("https://testcluster.kusto.windows.net", "testdb");

        store.save(&id).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({
                "cluster": "https://testcluster.kusto.windows.net",
                "database": "testdb"
            })
        );
        assert_eq!(store.load(), Some(id));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(IdentityStore::new(path).load(), None);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{"cluster": "https://c.kusto.windows.net"}"#).unwrap();
        assert_eq!(IdentityStore::new(path).load(), None);
    }

    #[test]
    fn test_save_to_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(dir.path().join("missing-dir").join("conn.json"));
        let err = store.save(&ActiveIdentity::new("c", "d")).unwrap_err();
        assert!(matches!(err, KustoError::Persistence { .. }));
    }
}
