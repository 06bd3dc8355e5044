//! Pre-execution hook.
//!
//! Runs before every tool call. Decides whether the call is ours to
//! route, brings the scope's container up, and either rewrites the shell
//! command in place or stages work for the post hook. Never errors out to
//! the framework: every failure path degrades to host execution or to a
//! failure command the agent will see.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde_json::Value;

use crate::hooks::{arg_env, arg_str, HookInput, PendingCall, ToolArgs, ToolFamily};
use crate::lifecycle::ensure_running;
use crate::pathmap;
use crate::router::Router;
use crate::shell;

/// What the hook decided to do for one call, computed before any
/// container work so that bypassed or out-of-root calls have no side
/// effects at all.
enum Plan {
    Shell {
        command: String,
        cwd: PathBuf,
        env: BTreeMap<String, String>,
    },
    Read {
        host: PathBuf,
    },
    WriteLike {
        host: PathBuf,
    },
    Grep {
        root: PathBuf,
        pattern: String,
        include: Option<String>,
    },
    Glob {
        root: PathBuf,
        pattern: String,
    },
    List {
        host: PathBuf,
    },
}

impl Router {
    /// Inspect one outgoing tool call and reroute it into the scope's
    /// container. Mutates `args` for shell calls; file-shaped tools are
    /// left alone here and resolved by the post hook.
    pub async fn pre_execute(&self, input: &HookInput, args: &mut ToolArgs) {
        if !self.settings.enabled {
            return;
        }
        if !self.settings.is_intercepted(&input.tool) {
            return;
        }
        let Some(family) = ToolFamily::parse(&input.tool) else {
            return;
        };
        if input.session_id.is_empty() {
            return;
        }

        let Some(plan) = self.plan(family, args) else {
            debug!("tool {} call {} is not ours", input.tool, input.call_id);
            return;
        };

        let scope_id = self
            .scopes
            .resolve(&input.session_id, self.settings.routing.scope)
            .await;
        let Some(binding) = self.resolve_binding(&scope_id).await else {
            debug!("no container binding for scope {scope_id}; running on host");
            return;
        };

        let spec = self.spec_for(&binding.name, &scope_id);
        if let Err(err) = ensure_running(
            &self.containers,
            &spec,
            self.settings.container.auto_create,
            self.settings.container.auto_start,
        )
        .await
        {
            warn!("container {} unavailable: {err}", binding.name);
            if self.settings.routing.fallback_to_host {
                return;
            }
            if matches!(&plan, Plan::Shell { .. }) {
                args.insert(
                    "command".to_string(),
                    Value::String(shell::failure_command(&err.to_string())),
                );
            }
            return;
        }

        if binding.derived {
            if let Err(err) = self.store.set(&scope_id, &binding.name).await {
                warn!("could not persist binding for scope {scope_id}: {err}");
                return;
            }
        }

        self.apply(plan, &binding.name, input, args).await;
    }

    /// Validate arguments and extract everything the rewrite needs.
    /// `None` means the call runs on the host untouched.
    fn plan(&self, family: ToolFamily, args: &ToolArgs) -> Option<Plan> {
        let host_root = self.host_root();
        match family {
            ToolFamily::Shell => {
                let command = arg_str(args, &["command"])?;
                let bypassed = self
                    .settings
                    .bypass_prefixes
                    .iter()
                    .any(|prefix| command.starts_with(prefix.as_str()));
                if bypassed {
                    return None;
                }
                let cwd = arg_str(args, &["cwd"])
                    .map(PathBuf::from)
                    .unwrap_or_else(|| host_root.to_path_buf());
                Some(Plan::Shell {
                    command: command.to_string(),
                    cwd,
                    env: arg_env(args, "env"),
                })
            }
            ToolFamily::Read => {
                let path = arg_str(args, &["filePath"])?;
                let host = pathmap::resolve_strictly_under(host_root, Path::new(path))?;
                Some(Plan::Read { host })
            }
            ToolFamily::Write | ToolFamily::Edit => {
                let path = arg_str(args, &["filePath", "path"])?;
                let host = pathmap::resolve_strictly_under(host_root, Path::new(path))?;
                Some(Plan::WriteLike { host })
            }
            ToolFamily::Grep => {
                let pattern = arg_str(args, &["pattern"])?.to_string();
                let root = self.search_root(args, &["path"])?;
                let include = arg_str(args, &["include", "glob"]).map(str::to_string);
                Some(Plan::Grep {
                    root,
                    pattern,
                    include,
                })
            }
            ToolFamily::Glob => {
                let pattern = arg_str(args, &["pattern"])?.to_string();
                let root = self.search_root(args, &["path"])?;
                Some(Plan::Glob { root, pattern })
            }
            ToolFamily::List => {
                let host = self.search_root(args, &["path", "dir", "directory"])?;
                Some(Plan::List { host })
            }
        }
    }

    /// Directory argument for search-shaped tools: defaults to the
    /// project root, rejects anything the mount cannot reach.
    fn search_root(&self, args: &ToolArgs, keys: &[&str]) -> Option<PathBuf> {
        let host_root = self.host_root();
        match arg_str(args, keys) {
            Some(path) => pathmap::resolve_under(host_root, Path::new(path)),
            None => Some(host_root.to_path_buf()),
        }
    }

    async fn apply(&self, plan: Plan, container: &str, input: &HookInput, args: &mut ToolArgs) {
        let host_root = self.host_root();
        let container_root = Path::new(self.container_root());
        match plan {
            Plan::Shell { command, cwd, env } => {
                let workdir = pathmap::host_to_container(&cwd, host_root, container_root)
                    .to_string_lossy()
                    .to_string();
                let wrapped = shell::exec_wrapper(
                    &self.settings.runtime_binary,
                    container,
                    &command,
                    Some(&workdir),
                    &env,
                );
                args.insert("command".to_string(), Value::String(wrapped));
            }
            Plan::Read { host } => {
                let container_path = pathmap::host_to_container(&host, host_root, container_root)
                    .to_string_lossy()
                    .to_string();
                self.pending
                    .stage(
                        &input.call_id,
                        PendingCall::Read {
                            container: container.to_string(),
                            container_path,
                            host_path: host,
                        },
                    )
                    .await;
            }
            Plan::WriteLike { host } => {
                let container_path = pathmap::host_to_container(&host, host_root, container_root)
                    .to_string_lossy()
                    .to_string();
                self.pending
                    .stage(
                        &input.call_id,
                        PendingCall::Write {
                            container: container.to_string(),
                            host_path: host,
                            container_path,
                        },
                    )
                    .await;
            }
            Plan::Grep {
                root,
                pattern,
                include,
            } => {
                let mapped_root = pathmap::host_to_container(&root, host_root, container_root)
                    .to_string_lossy()
                    .to_string();
                self.pending
                    .stage(
                        &input.call_id,
                        PendingCall::Grep {
                            container: container.to_string(),
                            host_root: root,
                            container_root: mapped_root,
                            pattern,
                            include,
                        },
                    )
                    .await;
            }
            Plan::Glob { root, pattern } => {
                let mapped_root = pathmap::host_to_container(&root, host_root, container_root)
                    .to_string_lossy()
                    .to_string();
                self.pending
                    .stage(
                        &input.call_id,
                        PendingCall::Glob {
                            container: container.to_string(),
                            host_root: root,
                            container_root: mapped_root,
                            pattern,
                        },
                    )
                    .await;
            }
            Plan::List { host } => {
                let container_path = pathmap::host_to_container(&host, host_root, container_root)
                    .to_string_lossy()
                    .to_string();
                self.pending
                    .stage(
                        &input.call_id,
                        PendingCall::List {
                            container: container.to_string(),
                            container_path,
                        },
                    )
                    .await;
            }
        }
    }
}
