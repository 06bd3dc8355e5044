//! Durable routing state.
//!
//! One JSON file maps session scopes to container names. All access goes
//! through a single async mutex so concurrent tool calls in one process
//! observe a consistent binding; writes go to a sibling `.tmp` file and
//! are renamed into place so readers never see a partial file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;

/// Schema version of the on-disk routing state.
pub const STATE_VERSION: u32 = 1;

/// Result type for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors writing the routing state file. Reads never error: a missing,
/// corrupt, or version-mismatched file reads as empty state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode routing state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One scope binding as persisted on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingEntry {
    pub container: String,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoutingState {
    version: u32,
    sessions: HashMap<String, RoutingEntry>,
}

impl RoutingState {
    fn empty() -> Self {
        Self {
            version: STATE_VERSION,
            sessions: HashMap::new(),
        }
    }
}

/// Durable scope-to-container binding store.
pub struct RoutingStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl RoutingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the container bound to a scope.
    pub async fn get(&self, scope_id: &str) -> Option<String> {
        let _guard = self.lock.lock().await;
        self.load()
            .await
            .sessions
            .get(scope_id)
            .map(|entry| entry.container.clone())
    }

    /// Bind a scope to a container, stamping the update time.
    pub async fn set(&self, scope_id: &str, container: &str) -> StateResult<()> {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await;
        state.sessions.insert(
            scope_id.to_string(),
            RoutingEntry {
                container: container.to_string(),
                updated_at: Utc::now().timestamp_millis(),
            },
        );
        self.persist(&state).await?;
        debug!("bound scope {scope_id} to container {container}");
        Ok(())
    }

    /// Remove a scope's binding, returning the container it pointed at.
    pub async fn clear(&self, scope_id: &str) -> StateResult<Option<String>> {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await;
        let previous = state.sessions.remove(scope_id);
        if previous.is_some() {
            self.persist(&state).await?;
        }
        Ok(previous.map(|entry| entry.container))
    }

    async fn load(&self) -> RoutingState {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(_) => return RoutingState::empty(),
        };
        match serde_json::from_str::<RoutingState>(&raw) {
            Ok(state) if state.version == STATE_VERSION => state,
            Ok(state) => {
                warn!(
                    "routing state {} has version {}, expected {}; starting empty",
                    self.path.display(),
                    state.version,
                    STATE_VERSION
                );
                RoutingState::empty()
            }
            Err(err) => {
                warn!(
                    "routing state {} is unreadable ({err}); starting empty",
                    self.path.display()
                );
                RoutingState::empty()
            }
        }
    }

    async fn persist(&self, state: &RoutingState) -> StateResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> RoutingStore {
        RoutingStore::new(dir.path().join("nested").join("state.json"))
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert_eq!(store.get("scope-a").await, None);
        store.set("scope-a", "box-1").await.unwrap();
        assert_eq!(store.get("scope-a").await, Some("box-1".to_string()));

        store.set("scope-a", "box-2").await.unwrap();
        assert_eq!(store.get("scope-a").await, Some("box-2".to_string()));
    }

    #[tokio::test]
    async fn bindings_survive_a_new_store_instance() {
        let dir = TempDir::new().unwrap();
        store_in(&dir).set("scope-a", "box-1").await.unwrap();

        let reopened = store_in(&dir);
        assert_eq!(reopened.get("scope-a").await, Some("box-1".to_string()));
    }

    #[tokio::test]
    async fn clear_returns_previous_binding() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set("scope-a", "box-1").await.unwrap();

        assert_eq!(store.clear("scope-a").await.unwrap(), Some("box-1".to_string()));
        assert_eq!(store.get("scope-a").await, None);
        assert_eq!(store.clear("scope-a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = RoutingStore::new(&path);
        assert_eq!(store.get("scope-a").await, None);

        store.set("scope-a", "box-1").await.unwrap();
        assert_eq!(store.get("scope-a").await, Some("box-1".to_string()));
    }

    #[tokio::test]
    async fn version_mismatch_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{"version": 99, "sessions": {"s": {"container": "c", "updatedAt": 1}}}"#,
        )
        .unwrap();

        let store = RoutingStore::new(&path);
        assert_eq!(store.get("s").await, None);
    }

    #[tokio::test]
    async fn on_disk_schema_is_versioned_camel_case() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set("scope-a", "box-1").await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["sessions"]["scope-a"]["container"], "box-1");
        assert!(value["sessions"]["scope-a"]["updatedAt"].is_i64());
    }

    #[tokio::test]
    async fn no_tmp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set("scope-a", "box-1").await.unwrap();
        assert!(!store.path().with_extension("json.tmp").exists());
    }
}
