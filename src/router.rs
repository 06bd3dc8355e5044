//! Router aggregate.
//!
//! One `Router` lives for the whole agent process. It owns the frozen
//! configuration, the scope resolver, the durable routing store, the
//! runtime client, and the pre/post staging map; the hook and operator
//! entry points are implemented on it in their own modules.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::config::Settings;
use crate::hooks::PendingCalls;
use crate::lifecycle::ContainerSpec;
use crate::naming;
use crate::runtime::{ContainerCli, RuntimeApi, RuntimeCli};
use crate::scope::{ScopeResolver, SessionSource};
use crate::state::RoutingStore;

/// The project identity the embedding framework hands us.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    /// Opaque project id used in names and owner labels.
    pub id: String,
    /// Host directory the agent treats as the workspace.
    pub root: PathBuf,
}

/// A resolved container binding for one scope.
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub name: String,
    /// True when the name was freshly derived and still needs persisting.
    pub derived: bool,
}

pub struct Router {
    pub(crate) settings: Settings,
    pub(crate) project: ProjectContext,
    pub(crate) scopes: ScopeResolver,
    pub(crate) store: RoutingStore,
    pub(crate) containers: ContainerCli,
    pub(crate) pending: PendingCalls,
}

impl Router {
    /// Build a router that drives the configured runtime binary.
    pub fn new(
        settings: Settings,
        project: ProjectContext,
        sessions: Arc<dyn SessionSource>,
    ) -> Self {
        let runtime: Arc<dyn RuntimeApi> = Arc::new(RuntimeCli::new(&settings.runtime_binary));
        Self::with_runtime(settings, project, sessions, runtime)
    }

    /// Build a router over an explicit runtime, the seam tests use.
    pub fn with_runtime(
        settings: Settings,
        project: ProjectContext,
        sessions: Arc<dyn SessionSource>,
        runtime: Arc<dyn RuntimeApi>,
    ) -> Self {
        let store = RoutingStore::new(settings.state_file_path());
        Self {
            settings,
            project,
            scopes: ScopeResolver::new(sessions),
            store,
            containers: ContainerCli::new(runtime),
            pending: PendingCalls::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn project(&self) -> &ProjectContext {
        &self.project
    }

    /// Host side of the project mount.
    pub(crate) fn host_root(&self) -> &Path {
        self.settings
            .container
            .project_path
            .as_deref()
            .unwrap_or(&self.project.root)
    }

    /// Container side of the project mount.
    pub(crate) fn container_root(&self) -> &str {
        &self.settings.container.workdir
    }

    /// Container name for a scope: the pinned shared name, the persisted
    /// binding, or a freshly derived name when auto-create allows it.
    pub(crate) async fn resolve_binding(&self, scope_id: &str) -> Option<Binding> {
        if let Some(name) = &self.settings.container.name {
            if !name.is_empty() {
                return Some(Binding {
                    name: name.clone(),
                    derived: false,
                });
            }
        }

        if let Some(name) = self.store.get(scope_id).await {
            return Some(Binding {
                name,
                derived: false,
            });
        }

        if self.settings.container.auto_create {
            let name = naming::build_name(
                &self.settings.container.name_prefix,
                &self.project.id,
                scope_id,
            );
            debug!("derived container name {name} for scope {scope_id}");
            return Some(Binding {
                name,
                derived: true,
            });
        }

        None
    }

    /// Creation spec for a container bound to `scope_id`.
    pub(crate) fn spec_for(&self, name: &str, scope_id: &str) -> ContainerSpec {
        let container = &self.settings.container;
        ContainerSpec {
            name: name.to_string(),
            image: container.image.clone(),
            workdir: container.workdir.clone(),
            project_path: self.host_root().to_path_buf(),
            network: container.network.clone(),
            env: container.env.clone(),
            mounts: container.mounts.clone(),
            command: container.command.clone(),
            project_id: self.project.id.clone(),
            scope_id: scope_id.to_string(),
        }
    }
}
