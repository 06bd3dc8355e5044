//! Post-execution hook.
//!
//! Consumes the staging records the pre hook left behind. Read-shaped
//! tools get their host result overwritten with the container-side
//! result; write-shaped tools get the freshly written host file pushed
//! into the container. Container failures are logged and the agent keeps
//! whatever the host produced.

use std::path::Path;

use log::{debug, warn};

use crate::hooks::{HookInput, PendingCall, ToolOutput};
use crate::pathmap;
use crate::router::Router;
use crate::shell;

impl Router {
    /// Resolve a tool call the pre hook staged. Each staged call is
    /// consumed on first dispatch whether or not the container action
    /// succeeds.
    pub async fn post_execute(&self, input: &HookInput, output: &mut ToolOutput) {
        if !self.settings.enabled {
            return;
        }
        let Some(call) = self.pending.take(&input.call_id).await else {
            return;
        };

        match call {
            PendingCall::Read {
                container,
                container_path,
                ..
            } => {
                let command = shell::read_command(&container_path);
                match self.containers.exec_sh(&container, &command, None).await {
                    Ok(out) if out.success() => output.output = out.stdout,
                    Ok(out) => warn!(
                        "container read of {container_path} failed: {}",
                        out.diagnostic()
                    ),
                    Err(err) => warn!("container read of {container_path} failed: {err}"),
                }
            }
            PendingCall::List {
                container,
                container_path,
            } => {
                let command = shell::list_command(&container_path, shell::DEFAULT_LIST_LIMIT);
                match self.containers.exec_sh(&container, &command, None).await {
                    Ok(out) if out.success() => output.output = out.stdout,
                    Ok(out) => warn!(
                        "container list of {container_path} failed: {}",
                        out.diagnostic()
                    ),
                    Err(err) => warn!("container list of {container_path} failed: {err}"),
                }
            }
            PendingCall::Grep {
                container,
                host_root,
                container_root,
                pattern,
                include,
            } => {
                let command = shell::grep_command(&pattern, include.as_deref());
                match self
                    .containers
                    .exec_sh(&container, &command, Some(&container_root))
                    .await
                {
                    // exit 1 is ripgrep's no-match, still a valid result
                    Ok(out) if out.code == 0 || out.code == 1 => {
                        output.output = remap_grep_output(&out.stdout, &host_root, &container_root);
                    }
                    Ok(out) => warn!("container grep failed: {}", out.diagnostic()),
                    Err(err) => warn!("container grep failed: {err}"),
                }
            }
            PendingCall::Glob {
                container,
                host_root,
                container_root,
                pattern,
            } => {
                let command = shell::glob_command(Some(&pattern), shell::DEFAULT_GLOB_LIMIT);
                match self
                    .containers
                    .exec_sh(&container, &command, Some(&container_root))
                    .await
                {
                    Ok(out) if out.success() => {
                        output.output = remap_glob_output(&out.stdout, &host_root, &container_root);
                    }
                    Ok(out) => warn!("container glob failed: {}", out.diagnostic()),
                    Err(err) => warn!("container glob failed: {err}"),
                }
            }
            PendingCall::Write {
                container,
                host_path,
                container_path,
            } => {
                // The mount usually makes this redundant; the copy is the
                // contract for read-only, stale, or absent mounts.
                if let Some(mkdir) = shell::mkdir_command(&container_path) {
                    match self.containers.exec_sh(&container, &mkdir, None).await {
                        Ok(out) if !out.success() => {
                            warn!("container mkdir failed: {}", out.diagnostic())
                        }
                        Err(err) => warn!("container mkdir failed: {err}"),
                        _ => {}
                    }
                }
                match self
                    .containers
                    .copy_in(&host_path, &container, &container_path)
                    .await
                {
                    Ok(out) if out.success() => {
                        debug!("synced {} into {container}", host_path.display())
                    }
                    Ok(out) => warn!(
                        "sync of {} into {container} failed: {}",
                        host_path.display(),
                        out.diagnostic()
                    ),
                    Err(err) => warn!(
                        "sync of {} into {container} failed: {err}",
                        host_path.display()
                    ),
                }
            }
        }
    }
}

/// Rewrite ripgrep `file|line|rest` lines so file paths point at the
/// host. Lines that do not carry two separators pass through unchanged.
fn remap_grep_output(stdout: &str, host_root: &Path, container_root: &str) -> String {
    stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut parts = line.splitn(3, '|');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(file), Some(line_no), Some(rest)) => {
                    let mapped = map_result_path(file, host_root, container_root);
                    format!("{mapped}|{line_no}|{rest}")
                }
                _ => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rewrite `rg --files` output onto the host, capped at the glob limit.
fn remap_glob_output(stdout: &str, host_root: &Path, container_root: &str) -> String {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(shell::DEFAULT_GLOB_LIMIT)
        .map(|line| map_result_path(line, host_root, container_root))
        .collect::<Vec<_>>()
        .join("\n")
}

fn map_result_path(file: &str, host_root: &Path, container_root: &str) -> String {
    if file.starts_with('/') {
        pathmap::container_to_host(Path::new(file), Path::new(container_root), host_root)
            .to_string_lossy()
            .to_string()
    } else {
        host_root.join(file).to_string_lossy().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grep_lines_are_remapped_to_host_paths() {
        let stdout = "src/a.ts|42|  TODO: foo\nsrc/b.ts|7| TODO: bar";
        let remapped = remap_grep_output(stdout, Path::new("/home/u/p"), "/workspace");
        assert_eq!(
            remapped,
            "/home/u/p/src/a.ts|42|  TODO: foo\n/home/u/p/src/b.ts|7| TODO: bar"
        );
    }

    #[test]
    fn grep_remap_handles_absolute_container_paths() {
        let stdout = "/workspace/src/a.ts|1|x";
        let remapped = remap_grep_output(stdout, Path::new("/home/u/p"), "/workspace");
        assert_eq!(remapped, "/home/u/p/src/a.ts|1|x");
    }

    #[test]
    fn grep_remap_keeps_pipes_in_match_text() {
        let stdout = "src/a.ts|3|let x = a || b;";
        let remapped = remap_grep_output(stdout, Path::new("/p"), "/workspace");
        assert_eq!(remapped, "/p/src/a.ts|3|let x = a || b;");
    }

    #[test]
    fn grep_remap_passes_malformed_lines_through() {
        let stdout = "no separators here";
        assert_eq!(
            remap_grep_output(stdout, Path::new("/p"), "/w"),
            "no separators here"
        );
    }

    #[test]
    fn glob_remap_caps_and_maps() {
        let many: Vec<String> = (0..150).map(|n| format!("src/f{n}.rs")).collect();
        let remapped = remap_glob_output(&many.join("\n"), Path::new("/p"), "/w");
        let lines: Vec<&str> = remapped.lines().collect();
        assert_eq!(lines.len(), shell::DEFAULT_GLOB_LIMIT);
        assert_eq!(lines[0], "/p/src/f0.rs");
    }

    #[test]
    fn glob_remap_drops_blank_lines() {
        let remapped = remap_glob_output("a.rs\n\n  \n/workspace/b.rs\n", Path::new("/p"), "/workspace");
        assert_eq!(remapped, "/p/a.rs\n/p/b.rs");
    }
}
