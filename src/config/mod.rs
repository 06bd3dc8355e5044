//! Router configuration.
//!
//! Built once at startup and frozen: defaults, shadowed by
//! `SANDBOX_ROUTER_*` environment variables, shadowed in turn by the
//! project's `.sandbox/router.jsonc` file. A file that fails to parse or
//! carries unrecognised keys is logged and ignored wholesale rather than
//! half-applied.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use config::{Config, Environment};
use log::warn;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the router config file location.
pub const CONFIG_PATH_ENV: &str = "SANDBOX_ROUTER_CONFIG";
/// Project-relative default location of the router config file.
pub const CONFIG_RELATIVE_PATH: &str = ".sandbox/router.jsonc";

const ENV_PREFIX: &str = "SANDBOX_ROUTER";

/// Which identity a session routes under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingScope {
    /// Route by the root of the session's parent chain, so branched
    /// sessions share one container.
    #[default]
    Root,
    /// Route every live session to its own container.
    Session,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    pub scope: RoutingScope,
    /// On container-unavailable, let the tool run on the host instead of
    /// surfacing a failure to the agent.
    pub fallback_to_host: bool,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            scope: RoutingScope::Root,
            fallback_to_host: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// Pin every scope to one shared container instead of deriving names.
    pub name: Option<String>,
    pub name_prefix: String,
    /// Image used for on-demand creation; creation fails when unset.
    pub image: String,
    /// Mount point of the project inside the container.
    pub workdir: String,
    /// Host path to mount; defaults to the project root.
    pub project_path: Option<PathBuf>,
    pub network: Option<String>,
    pub env: BTreeMap<String, String>,
    /// Extra `-v` mounts in `host:container` form.
    pub mounts: Vec<String>,
    /// Entry command keeping the container alive.
    pub command: Vec<String>,
    pub auto_create: bool,
    pub auto_start: bool,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            name: None,
            name_prefix: crate::naming::DEFAULT_PREFIX.to_string(),
            image: String::new(),
            workdir: "/workspace".to_string(),
            project_path: None,
            network: None,
            env: BTreeMap::new(),
            mounts: Vec::new(),
            command: vec!["sleep".to_string(), "infinity".to_string()],
            auto_create: false,
            auto_start: true,
        }
    }
}

/// Frozen router configuration for one agent process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Master switch; false disables both hooks entirely.
    pub enabled: bool,
    /// Tool names the hooks intercept.
    pub tool_names: Vec<String>,
    /// OCI runtime CLI to drive.
    pub runtime_binary: String,
    /// Shell commands starting with any of these run on the host.
    pub bypass_prefixes: Vec<String>,
    /// Routing state file override; defaults under the local data dir.
    pub state_file: Option<PathBuf>,
    pub routing: RoutingSettings,
    pub container: ContainerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            tool_names: default_tool_names(),
            runtime_binary: "docker".to_string(),
            bypass_prefixes: vec!["docker ".to_string()],
            state_file: None,
            routing: RoutingSettings::default(),
            container: ContainerSettings::default(),
        }
    }
}

fn default_tool_names() -> Vec<String> {
    ["shell", "bash", "read", "write", "edit", "grep", "glob", "list"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Settings {
    /// Layered load: defaults <- environment <- project file.
    pub fn load(project_root: &Path) -> Self {
        let mut settings = Self::from_env();
        let path = config_file_path(project_root);
        if let Some(overrides) = FileOverrides::read(&path) {
            overrides.apply(&mut settings);
        }
        settings.validate();
        settings
    }

    /// Like [`Settings::load`] but with an explicit config file path,
    /// used by the operator CLI's `--config` flag.
    pub fn load_with_file(project_root: &Path, file: Option<&Path>) -> Self {
        match file {
            None => Self::load(project_root),
            Some(path) => {
                let mut settings = Self::from_env();
                if let Some(overrides) = FileOverrides::read(path) {
                    overrides.apply(&mut settings);
                }
                settings.validate();
                settings
            }
        }
    }

    fn from_env() -> Self {
        let defaults = Self::default();
        let built = Config::try_from(&defaults)
            .and_then(|base| {
                Config::builder()
                    .add_source(base)
                    .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
                    .build()
            })
            .and_then(|config| config.try_deserialize::<Settings>());
        match built {
            Ok(settings) => settings,
            Err(err) => {
                warn!("ignoring invalid {ENV_PREFIX}_* environment overrides: {err}");
                defaults
            }
        }
    }

    /// Resolved routing state file location.
    pub fn state_file_path(&self) -> PathBuf {
        if let Some(path) = &self.state_file {
            return path.clone();
        }
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sandbox-router")
            .join("state.json")
    }

    /// Whether the hooks should look at this tool at all.
    pub fn is_intercepted(&self, tool: &str) -> bool {
        self.tool_names.iter().any(|name| name == tool)
    }

    fn validate(&mut self) {
        let any_known = self
            .tool_names
            .iter()
            .any(|name| crate::hooks::ToolFamily::parse(name).is_some());
        if !any_known {
            warn!("toolNames matches no interceptable tool; restoring the default set");
            self.tool_names = default_tool_names();
        }
        if !self.container.workdir.starts_with('/') {
            warn!(
                "container.workdir {:?} is not absolute; using /workspace",
                self.container.workdir
            );
            self.container.workdir = "/workspace".to_string();
        }
    }
}

fn config_file_path(project_root: &Path) -> PathBuf {
    match env::var_os(CONFIG_PATH_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => project_root.join(CONFIG_RELATIVE_PATH),
    }
}

/// Overlay parsed from the project's router.jsonc. Every field optional;
/// unknown keys reject the whole file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FileOverrides {
    enabled: Option<bool>,
    tool_names: Option<Vec<String>>,
    runtime_binary: Option<String>,
    bypass_prefixes: Option<Vec<String>>,
    state_file: Option<PathBuf>,
    routing: Option<RoutingOverrides>,
    container: Option<ContainerOverrides>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RoutingOverrides {
    scope: Option<RoutingScope>,
    fallback_to_host: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ContainerOverrides {
    name: Option<String>,
    name_prefix: Option<String>,
    image: Option<String>,
    workdir: Option<String>,
    project_path: Option<PathBuf>,
    network: Option<String>,
    env: Option<BTreeMap<String, String>>,
    mounts: Option<Vec<String>>,
    command: Option<Vec<String>>,
    auto_create: Option<bool>,
    auto_start: Option<bool>,
}

impl FileOverrides {
    fn read(path: &Path) -> Option<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!("cannot read {}: {err}", path.display());
                return None;
            }
        };
        match json5::from_str::<FileOverrides>(&raw) {
            Ok(overrides) => Some(overrides),
            Err(err) => {
                warn!("ignoring {}: {err}", path.display());
                None
            }
        }
    }

    fn apply(self, settings: &mut Settings) {
        if let Some(enabled) = self.enabled {
            settings.enabled = enabled;
        }
        if let Some(tool_names) = self.tool_names {
            settings.tool_names = tool_names;
        }
        if let Some(runtime_binary) = self.runtime_binary {
            settings.runtime_binary = runtime_binary;
        }
        if let Some(bypass_prefixes) = self.bypass_prefixes {
            settings.bypass_prefixes = bypass_prefixes;
        }
        if let Some(state_file) = self.state_file {
            settings.state_file = Some(state_file);
        }
        if let Some(routing) = self.routing {
            if let Some(scope) = routing.scope {
                settings.routing.scope = scope;
            }
            if let Some(fallback) = routing.fallback_to_host {
                settings.routing.fallback_to_host = fallback;
            }
        }
        if let Some(container) = self.container {
            let target = &mut settings.container;
            if let Some(name) = container.name {
                target.name = Some(name);
            }
            if let Some(name_prefix) = container.name_prefix {
                target.name_prefix = name_prefix;
            }
            if let Some(image) = container.image {
                target.image = image;
            }
            if let Some(workdir) = container.workdir {
                target.workdir = workdir;
            }
            if let Some(project_path) = container.project_path {
                target.project_path = Some(project_path);
            }
            if let Some(network) = container.network {
                target.network = Some(network);
            }
            if let Some(env) = container.env {
                target.env = env;
            }
            if let Some(mounts) = container.mounts {
                target.mounts = mounts;
            }
            if let Some(command) = container.command {
                target.command = command;
            }
            if let Some(auto_create) = container.auto_create {
                target.auto_create = auto_create;
            }
            if let Some(auto_start) = container.auto_start {
                target.auto_start = auto_start;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_the_documented_table() {
        let settings = Settings::default();
        assert!(settings.enabled);
        assert_eq!(settings.runtime_binary, "docker");
        assert_eq!(settings.bypass_prefixes, vec!["docker ".to_string()]);
        assert_eq!(settings.routing.scope, RoutingScope::Root);
        assert!(!settings.routing.fallback_to_host);
        assert_eq!(settings.container.workdir, "/workspace");
        assert_eq!(settings.container.name_prefix, "opencode");
        assert_eq!(settings.container.command, vec!["sleep", "infinity"]);
        assert!(!settings.container.auto_create);
        assert!(settings.container.auto_start);
        assert!(settings.is_intercepted("shell"));
        assert!(settings.is_intercepted("read"));
    }

    #[test]
    fn file_overrides_apply_over_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("router.jsonc");
        std::fs::write(
            &path,
            r#"{
                // project sandbox settings
                "enabled": true,
                "toolNames": ["shell"],
                "runtimeBinary": "podman",
                "routing": { "scope": "session", "fallbackToHost": true },
                "container": {
                    "image": "img:1",
                    "namePrefix": "oc",
                    "autoCreate": true,
                },
            }"#,
        )
        .unwrap();

        let mut settings = Settings::default();
        FileOverrides::read(&path).unwrap().apply(&mut settings);

        assert_eq!(settings.runtime_binary, "podman");
        assert_eq!(settings.tool_names, vec!["shell".to_string()]);
        assert_eq!(settings.routing.scope, RoutingScope::Session);
        assert!(settings.routing.fallback_to_host);
        assert_eq!(settings.container.image, "img:1");
        assert_eq!(settings.container.name_prefix, "oc");
        assert!(settings.container.auto_create);
        // untouched fields keep their defaults
        assert_eq!(settings.container.workdir, "/workspace");
    }

    #[test]
    fn unknown_keys_reject_the_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("router.jsonc");
        std::fs::write(&path, r#"{ "enabled": false, "tyopNames": [] }"#).unwrap();
        assert!(FileOverrides::read(&path).is_none());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(FileOverrides::read(&dir.path().join("absent.jsonc")).is_none());
    }

    #[test]
    fn validate_restores_unusable_tool_names() {
        let mut settings = Settings {
            tool_names: vec!["webfetch".to_string()],
            ..Settings::default()
        };
        settings.validate();
        assert!(settings.is_intercepted("shell"));
    }

    #[test]
    fn validate_forces_absolute_workdir() {
        let mut settings = Settings::default();
        settings.container.workdir = "workspace".to_string();
        settings.validate();
        assert_eq!(settings.container.workdir, "/workspace");
    }

    #[test]
    fn state_file_override_wins() {
        let settings = Settings {
            state_file: Some(PathBuf::from("/tmp/custom-state.json")),
            ..Settings::default()
        };
        assert_eq!(
            settings.state_file_path(),
            PathBuf::from("/tmp/custom-state.json")
        );
    }
}
