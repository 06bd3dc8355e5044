//! OCI runtime driver.
//!
//! Invokes the configured runtime binary (docker, podman, ...) with an
//! argument vector and captures stdout/stderr/exit code. The low-level
//! [`RuntimeApi`] trait is the seam tests replace with a scripted fake;
//! [`ContainerCli`] layers the typed container operations on top.

mod error;

pub use error::{RuntimeError, RuntimeResult};

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio::process::Command;

/// Captured result of one runtime invocation.
#[derive(Debug, Clone)]
pub struct CmdOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Best single-line diagnostic for logs and operator messages.
    pub fn diagnostic(&self) -> &str {
        let err = self.stderr.trim();
        if err.is_empty() {
            self.stdout.trim()
        } else {
            err
        }
    }
}

/// Low-level runtime invocation, one subprocess per call.
#[async_trait]
pub trait RuntimeApi: Send + Sync {
    async fn run(&self, args: &[String]) -> RuntimeResult<CmdOutput>;
}

/// Real driver that shells out to the runtime binary.
#[derive(Debug, Clone)]
pub struct RuntimeCli {
    binary: String,
}

impl RuntimeCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl RuntimeApi for RuntimeCli {
    async fn run(&self, args: &[String]) -> RuntimeResult<CmdOutput> {
        if self.binary.is_empty() {
            return Err(RuntimeError::MissingBinary);
        }

        let subcommand = args.first().cloned().unwrap_or_default();
        debug!("runtime: {} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| RuntimeError::Spawn {
                binary: self.binary.clone(),
                command: subcommand,
                message: e.to_string(),
            })?;

        Ok(CmdOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            code: output.status.code().unwrap_or(-1),
        })
    }
}

/// Observed container state from `inspect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Stopped,
    Absent,
}

/// Typed container operations over a [`RuntimeApi`].
#[derive(Clone)]
pub struct ContainerCli {
    runtime: Arc<dyn RuntimeApi>,
}

impl ContainerCli {
    pub fn new(runtime: Arc<dyn RuntimeApi>) -> Self {
        Self { runtime }
    }

    /// Pass-through for callers that assemble their own argument vector.
    pub async fn raw(&self, args: Vec<String>) -> RuntimeResult<CmdOutput> {
        self.runtime.run(&args).await
    }

    /// Probe a container's state. Inspect failing counts as absent, the
    /// same way the runtime reports unknown names.
    pub async fn state(&self, name: &str) -> RuntimeResult<ContainerState> {
        let out = self
            .runtime
            .run(&svec(["inspect", "-f", "{{.State.Running}}", name]))
            .await?;
        if !out.success() {
            return Ok(ContainerState::Absent);
        }
        match out.stdout.trim() {
            "true" => Ok(ContainerState::Running),
            _ => Ok(ContainerState::Stopped),
        }
    }

    pub async fn start(&self, name: &str) -> RuntimeResult<CmdOutput> {
        self.runtime.run(&svec(["start", name])).await
    }

    pub async fn stop(&self, name: &str) -> RuntimeResult<CmdOutput> {
        self.runtime.run(&svec(["stop", name])).await
    }

    pub async fn remove(&self, name: &str) -> RuntimeResult<CmdOutput> {
        self.runtime.run(&svec(["rm", "-f", name])).await
    }

    /// Run a shell command inside the container and wait for its output.
    pub async fn exec_sh(
        &self,
        name: &str,
        command: &str,
        workdir: Option<&str>,
    ) -> RuntimeResult<CmdOutput> {
        let mut args = vec!["exec".to_string(), "-i".to_string()];
        if let Some(dir) = workdir {
            args.push("--workdir".to_string());
            args.push(dir.to_string());
        }
        args.push(name.to_string());
        args.push("sh".to_string());
        args.push("-lc".to_string());
        args.push(command.to_string());
        self.runtime.run(&args).await
    }

    /// Copy a host file into the container.
    pub async fn copy_in(
        &self,
        host: &Path,
        name: &str,
        container_path: &str,
    ) -> RuntimeResult<CmdOutput> {
        self.runtime
            .run(&[
                "cp".to_string(),
                host.display().to_string(),
                format!("{name}:{container_path}"),
            ])
            .await
    }

    /// List container names and statuses, filtered by label.
    pub async fn ps(&self, all: bool, label_filter: &str) -> RuntimeResult<CmdOutput> {
        let mut args = vec!["ps".to_string()];
        if all {
            args.push("-a".to_string());
        }
        args.push("--format".to_string());
        args.push("{{.Names}}\t{{.Status}}".to_string());
        args.push("--filter".to_string());
        args.push(format!("label={label_filter}"));
        self.runtime.run(&args).await
    }

    /// Server version probe, used to distinguish "runtime unreachable"
    /// from "container missing".
    pub async fn version(&self) -> RuntimeResult<CmdOutput> {
        self.runtime
            .run(&svec(["version", "--format", "{{.Server.Version}}"]))
            .await
    }
}

fn svec<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
