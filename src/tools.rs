//! Operator tools.
//!
//! Five idempotent commands the agent (or `sandboxctl`) can call to
//! manage the scope-to-container bindings directly. Each returns a
//! human-readable one-liner; failures carry context the operator can act
//! on.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::warn;

use crate::lifecycle::{ensure_running, LABEL_PROJECT};
use crate::naming;
use crate::router::Router;
use crate::runtime::ContainerState;

/// Agent-facing tool names.
pub const TOOL_CREATE: &str = "sandbox_container_create";
pub const TOOL_USE: &str = "sandbox_container_use";
pub const TOOL_CLEAR: &str = "sandbox_container_clear";
pub const TOOL_INFO: &str = "sandbox_container_info";
pub const TOOL_LIST: &str = "sandbox_container_list";

/// Overrides for [`Router::tool_create`]; anything unset falls back to
/// the configured container settings.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub name: Option<String>,
    pub image: Option<String>,
    pub workdir: Option<String>,
    pub project_path: Option<PathBuf>,
    pub network: Option<String>,
    pub mounts: Vec<String>,
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl Router {
    /// Create (or adopt) a container and bind the session's scope to it.
    pub async fn tool_create(
        &self,
        session_id: Option<&str>,
        opts: CreateOptions,
    ) -> Result<String> {
        let scope_id = match session_id.filter(|s| !s.is_empty()) {
            Some(session) => Some(
                self.scopes
                    .resolve(session, self.settings.routing.scope)
                    .await,
            ),
            None => None,
        };

        let name = match &opts.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => match &scope_id {
                Some(scope) => naming::build_name(
                    &self.settings.container.name_prefix,
                    &self.project.id,
                    scope,
                ),
                None => bail!("no container name given and no session to derive one from"),
            },
        };

        let mut spec = self.spec_for(&name, scope_id.as_deref().unwrap_or_default());
        if let Some(image) = opts.image {
            spec.image = image;
        }
        if let Some(workdir) = opts.workdir {
            spec.workdir = workdir;
        }
        if let Some(project_path) = opts.project_path {
            spec.project_path = project_path;
        }
        if let Some(network) = opts.network {
            spec.network = Some(network);
        }
        if !opts.mounts.is_empty() {
            spec.mounts = opts.mounts;
        }
        if !opts.command.is_empty() {
            spec.command = opts.command;
        }
        spec.env.extend(opts.env);

        ensure_running(&self.containers, &spec, true, true)
            .await
            .with_context(|| format!("bringing up container {name}"))?;

        if let Some(scope) = &scope_id {
            self.store
                .set(scope, &name)
                .await
                .context("persisting container binding")?;
            Ok(format!("Container {name} is running and bound to scope {scope}"))
        } else {
            Ok(format!("Container {name} is running"))
        }
    }

    /// Bind this session's scope to an existing container.
    pub async fn tool_use(&self, session_id: &str, name: &str) -> Result<String> {
        if name.is_empty() {
            bail!("a container name is required");
        }
        let scope_id = self
            .scopes
            .resolve(session_id, self.settings.routing.scope)
            .await;

        let state = self.containers.state(name).await?;
        if state == ContainerState::Absent {
            bail!("Container {name} does not exist");
        }

        self.store
            .set(&scope_id, name)
            .await
            .context("persisting container binding")?;
        Ok(format!("Bound scope {scope_id} to container {name}"))
    }

    /// Drop this scope's binding; optionally stop or remove the container.
    pub async fn tool_clear(&self, session_id: &str, stop: bool, remove: bool) -> Result<String> {
        let scope_id = self
            .scopes
            .resolve(session_id, self.settings.routing.scope)
            .await;

        let Some(name) = self.store.clear(&scope_id).await? else {
            return Ok(format!("No container is bound to scope {scope_id}"));
        };

        if remove {
            match self.containers.remove(&name).await {
                Ok(out) if !out.success() => {
                    warn!("removing container {name} failed: {}", out.diagnostic())
                }
                Err(err) => warn!("removing container {name} failed: {err}"),
                _ => {}
            }
            return Ok(format!("Released and removed container {name}"));
        }
        if stop {
            match self.containers.stop(&name).await {
                Ok(out) if !out.success() => {
                    warn!("stopping container {name} failed: {}", out.diagnostic())
                }
                Err(err) => warn!("stopping container {name} failed: {err}"),
                _ => {}
            }
            return Ok(format!("Released and stopped container {name}"));
        }
        Ok(format!("Released container {name}"))
    }

    /// Report the bound container and its runtime state.
    pub async fn tool_info(&self, session_id: &str) -> Result<String> {
        let scope_id = self
            .scopes
            .resolve(session_id, self.settings.routing.scope)
            .await;

        let Some(name) = self.store.get(&scope_id).await else {
            return Ok(format!("No container is bound to scope {scope_id}"));
        };

        let state = match self.containers.state(&name).await {
            Ok(ContainerState::Running) => "running",
            Ok(ContainerState::Stopped) => "stopped",
            Ok(ContainerState::Absent) => "missing",
            Err(err) => {
                let probe = self.containers.version().await;
                if probe.is_err() || probe.is_ok_and(|out| !out.success()) {
                    bail!("container runtime is unreachable: {err}");
                }
                bail!("inspecting container {name} failed: {err}");
            }
        };
        Ok(format!("Scope {scope_id} is bound to container {name} ({state})"))
    }

    /// List this project's managed containers.
    pub async fn tool_list(&self, all: bool) -> Result<String> {
        let filter = format!("{LABEL_PROJECT}={}", self.project.id);
        let out = self.containers.ps(all, &filter).await?;
        if !out.success() {
            bail!("listing containers failed: {}", out.diagnostic());
        }
        let listing = out.stdout.trim_end();
        if listing.is_empty() {
            Ok("No sandbox containers found for this project".to_string())
        } else {
            Ok(listing.to_string())
        }
    }
}
