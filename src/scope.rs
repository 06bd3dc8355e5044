//! Session scope resolution.
//!
//! The agent framework forks child sessions freely; bindings have to
//! follow the logical workspace, not the ephemeral session id. The
//! resolver walks the parent chain once per unseen session and memoises
//! every visited id against the discovered root.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::Mutex;

use crate::config::RoutingScope;

/// Deepest parent chain the resolver will follow.
const MAX_PARENT_DEPTH: usize = 10;
/// Memoisation cap; the cache is dropped wholesale when it fills.
const CACHE_CAP: usize = 1024;

/// The agent framework's view of session ancestry.
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Parent of `session_id`, or `None` for a root session.
    async fn parent_id(&self, session_id: &str) -> Result<Option<String>>;
}

/// Source for embeddings without session ancestry (the operator CLI);
/// every session is its own root.
pub struct NullSessionSource;

#[async_trait]
impl SessionSource for NullSessionSource {
    async fn parent_id(&self, _session_id: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Memoising resolver from live session ids to routing scope ids.
pub struct ScopeResolver {
    source: Arc<dyn SessionSource>,
    cache: Mutex<HashMap<String, String>>,
}

impl ScopeResolver {
    pub fn new(source: Arc<dyn SessionSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the routing scope for a session. Never fails: a source
    /// error makes the session its own root.
    pub async fn resolve(&self, session_id: &str, scope: RoutingScope) -> String {
        if scope == RoutingScope::Session {
            return session_id.to_string();
        }

        if let Some(root) = self.cache.lock().await.get(session_id) {
            return root.clone();
        }

        let mut visited = vec![session_id.to_string()];
        let mut current = session_id.to_string();
        for _ in 0..MAX_PARENT_DEPTH {
            match self.source.parent_id(&current).await {
                Ok(Some(parent)) => {
                    current = parent;
                    visited.push(current.clone());
                }
                Ok(None) => break,
                Err(err) => {
                    warn!("parent lookup for session {current} failed: {err}; treating as root");
                    break;
                }
            }
        }

        let root = current;
        let mut cache = self.cache.lock().await;
        if cache.len() + visited.len() > CACHE_CAP {
            debug!("scope cache full; dropping {} entries", cache.len());
            cache.clear();
        }
        for id in visited {
            cache.insert(id, root.clone());
        }
        root
    }
}
