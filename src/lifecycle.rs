//! Container lifecycle.
//!
//! `ensure_running` is the single entry point the hooks and operator
//! tools go through: inspect the container, create it on demand when
//! allowed, start it when stopped. Created containers always carry the
//! owner labels so `list` can tell ours apart from everything else on
//! the host.

use std::collections::BTreeMap;
use std::path::PathBuf;

use log::{debug, info};
use thiserror::Error;

use crate::runtime::{ContainerCli, ContainerState, RuntimeError};

/// Label carrying the owning project id.
pub const LABEL_PROJECT: &str = "owner.project";
/// Label carrying the owning session scope.
pub const LABEL_SCOPE: &str = "owner.scope";

/// Everything needed to create (or recognise) one managed container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Mount point and working directory inside the container.
    pub workdir: String,
    /// Host directory mounted at `workdir`.
    pub project_path: PathBuf,
    pub network: Option<String>,
    pub env: BTreeMap<String, String>,
    /// Extra `-v` mounts in `host:container` form.
    pub mounts: Vec<String>,
    pub command: Vec<String>,
    pub project_id: String,
    pub scope_id: String,
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Container {0} does not exist")]
    Missing(String),

    #[error("project path {0} does not exist on the host")]
    ProjectPathMissing(String),

    #[error("container image is not configured")]
    ImageMissing,

    #[error("creating container {name} failed: {message}")]
    CreateFailed { name: String, message: String },

    #[error("starting container {name} failed: {message}")]
    StartFailed { name: String, message: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Bring the container described by `spec` to a usable state.
///
/// `allow_create` gates on-demand creation; `auto_start` gates starting a
/// stopped container (when false, a stopped container is left alone and
/// the caller's exec will surface the error).
pub async fn ensure_running(
    cli: &ContainerCli,
    spec: &ContainerSpec,
    allow_create: bool,
    auto_start: bool,
) -> LifecycleResult<()> {
    match cli.state(&spec.name).await? {
        ContainerState::Running => Ok(()),
        ContainerState::Stopped => {
            if !auto_start {
                debug!("container {} is stopped; autostart disabled", spec.name);
                return Ok(());
            }
            let out = cli.start(&spec.name).await?;
            if out.success() {
                info!("started container {}", spec.name);
                Ok(())
            } else {
                Err(LifecycleError::StartFailed {
                    name: spec.name.clone(),
                    message: out.diagnostic().to_string(),
                })
            }
        }
        ContainerState::Absent => {
            if !allow_create {
                return Err(LifecycleError::Missing(spec.name.clone()));
            }
            create(cli, spec).await
        }
    }
}

async fn create(cli: &ContainerCli, spec: &ContainerSpec) -> LifecycleResult<()> {
    if spec.image.is_empty() {
        return Err(LifecycleError::ImageMissing);
    }
    if !spec.project_path.exists() {
        return Err(LifecycleError::ProjectPathMissing(
            spec.project_path.display().to_string(),
        ));
    }

    let out = cli.raw(create_args(spec)).await?;
    if out.success() {
        info!("created container {} from {}", spec.name, spec.image);
        Ok(())
    } else {
        Err(LifecycleError::CreateFailed {
            name: spec.name.clone(),
            message: out.diagnostic().to_string(),
        })
    }
}

fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "--workdir".to_string(),
        spec.workdir.clone(),
    ];

    if let Some(network) = &spec.network {
        args.push("--network".to_string());
        args.push(network.clone());
    }

    args.push("--label".to_string());
    args.push(format!("{LABEL_PROJECT}={}", spec.project_id));
    args.push("--label".to_string());
    args.push(format!("{LABEL_SCOPE}={}", spec.scope_id));

    for (key, value) in &spec.env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }

    args.push("-v".to_string());
    args.push(format!("{}:{}", spec.project_path.display(), spec.workdir));
    for mount in &spec.mounts {
        args.push("-v".to_string());
        args.push(mount.clone());
    }

    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{CmdOutput, RuntimeApi, RuntimeResult};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Answers `inspect` with a fixed state and records everything else.
    struct StagedRuntime {
        inspect: CmdOutput,
        other: CmdOutput,
        calls: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl RuntimeApi for StagedRuntime {
        async fn run(&self, args: &[String]) -> RuntimeResult<CmdOutput> {
            self.calls.lock().unwrap().push(args.to_vec());
            if args.first().map(String::as_str) == Some("inspect") {
                Ok(self.inspect.clone())
            } else {
                Ok(self.other.clone())
            }
        }
    }

    fn runtime(inspect_stdout: &str, inspect_code: i32) -> Arc<StagedRuntime> {
        Arc::new(StagedRuntime {
            inspect: CmdOutput {
                stdout: inspect_stdout.to_string(),
                stderr: String::new(),
                code: inspect_code,
            },
            other: CmdOutput {
                stdout: String::new(),
                stderr: String::new(),
                code: 0,
            },
            calls: Mutex::new(Vec::new()),
        })
    }

    fn spec(project_path: &std::path::Path) -> ContainerSpec {
        ContainerSpec {
            name: "oc-proj-sess".to_string(),
            image: "img:1".to_string(),
            workdir: "/workspace".to_string(),
            project_path: project_path.to_path_buf(),
            network: None,
            env: BTreeMap::new(),
            mounts: vec![],
            command: vec!["sleep".to_string(), "infinity".to_string()],
            project_id: "proj".to_string(),
            scope_id: "sess".to_string(),
        }
    }

    #[tokio::test]
    async fn running_container_is_left_alone() {
        let api = runtime("true\n", 0);
        let cli = ContainerCli::new(api.clone());
        let dir = TempDir::new().unwrap();
        ensure_running(&cli, &spec(dir.path()), false, true)
            .await
            .unwrap();
        assert_eq!(api.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stopped_container_is_started_when_allowed() {
        let api = runtime("false\n", 0);
        let cli = ContainerCli::new(api.clone());
        let dir = TempDir::new().unwrap();
        ensure_running(&cli, &spec(dir.path()), false, true)
            .await
            .unwrap();
        let calls = api.calls.lock().unwrap();
        assert_eq!(calls[1], vec!["start", "oc-proj-sess"]);
    }

    #[tokio::test]
    async fn stopped_container_is_untouched_without_autostart() {
        let api = runtime("false\n", 0);
        let cli = ContainerCli::new(api.clone());
        let dir = TempDir::new().unwrap();
        ensure_running(&cli, &spec(dir.path()), false, false)
            .await
            .unwrap();
        assert_eq!(api.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn absent_without_create_is_an_error() {
        let api = runtime("", 1);
        let cli = ContainerCli::new(api.clone());
        let dir = TempDir::new().unwrap();
        let err = ensure_running(&cli, &spec(dir.path()), false, true)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Container oc-proj-sess does not exist");
    }

    #[tokio::test]
    async fn absent_with_create_runs_the_container() {
        let api = runtime("", 1);
        let cli = ContainerCli::new(api.clone());
        let dir = TempDir::new().unwrap();
        let mut spec = spec(dir.path());
        spec.network = Some("bridge".to_string());
        spec.env.insert("K".to_string(), "V".to_string());
        spec.mounts.push("/data:/data".to_string());

        ensure_running(&cli, &spec, true, true).await.unwrap();

        let calls = api.calls.lock().unwrap();
        let create = &calls[1];
        let expected: Vec<String> = [
            "run",
            "-d",
            "--name",
            "oc-proj-sess",
            "--workdir",
            "/workspace",
            "--network",
            "bridge",
            "--label",
            "owner.project=proj",
            "--label",
            "owner.scope=sess",
            "-e",
            "K=V",
            "-v",
            &format!("{}:/workspace", dir.path().display()),
            "-v",
            "/data:/data",
            "img:1",
            "sleep",
            "infinity",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(create, &expected);
    }

    #[tokio::test]
    async fn missing_project_path_blocks_creation() {
        let api = runtime("", 1);
        let cli = ContainerCli::new(api.clone());
        let mut spec = spec(std::path::Path::new("/nonexistent/project/dir"));
        spec.project_path = PathBuf::from("/nonexistent/project/dir");
        let err = ensure_running(&cli, &spec, true, true).await.unwrap_err();
        assert!(matches!(err, LifecycleError::ProjectPathMissing(_)));
        // only the inspect ran
        assert_eq!(api.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_image_blocks_creation() {
        let api = runtime("", 1);
        let cli = ContainerCli::new(api.clone());
        let dir = TempDir::new().unwrap();
        let mut spec = spec(dir.path());
        spec.image = String::new();
        let err = ensure_running(&cli, &spec, true, true).await.unwrap_err();
        assert!(matches!(err, LifecycleError::ImageMissing));
    }
}
