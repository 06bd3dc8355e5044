//! Per-call staging between the pre and post hooks.
//!
//! The pre hook records what the post hook should do for a given call id;
//! the post hook consumes the record exactly once. Cancelled calls never
//! reach the post hook, so the map is swept by age and capped in size.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::debug;
use tokio::sync::Mutex;

const MAX_ENTRIES: usize = 256;
const ENTRY_TTL: Duration = Duration::from_secs(60);

/// What the post hook owes the agent for one intercepted call.
#[derive(Debug, Clone)]
pub enum PendingCall {
    Read {
        container: String,
        container_path: String,
        host_path: PathBuf,
    },
    List {
        container: String,
        container_path: String,
    },
    Grep {
        container: String,
        host_root: PathBuf,
        container_root: String,
        pattern: String,
        include: Option<String>,
    },
    Glob {
        container: String,
        host_root: PathBuf,
        container_root: String,
        pattern: String,
    },
    /// Shared by the write and edit tools; both mean "push the host file
    /// into the container afterwards".
    Write {
        container: String,
        host_path: PathBuf,
        container_path: String,
    },
}

/// Call-id-keyed staging map.
#[derive(Default)]
pub(crate) struct PendingCalls {
    inner: Mutex<HashMap<String, (Instant, PendingCall)>>,
}

impl PendingCalls {
    pub(crate) async fn stage(&self, call_id: &str, call: PendingCall) {
        let mut map = self.inner.lock().await;
        let now = Instant::now();
        map.retain(|_, (staged_at, _)| now.duration_since(*staged_at) < ENTRY_TTL);
        if map.len() >= MAX_ENTRIES {
            if let Some(oldest) = map
                .iter()
                .min_by_key(|(_, (staged_at, _))| *staged_at)
                .map(|(id, _)| id.clone())
            {
                debug!("pending-call map full; dropping stale call {oldest}");
                map.remove(&oldest);
            }
        }
        map.insert(call_id.to_string(), (now, call));
    }

    pub(crate) async fn take(&self, call_id: &str) -> Option<PendingCall> {
        self.inner.lock().await.remove(call_id).map(|(_, call)| call)
    }
}
