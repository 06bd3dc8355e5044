//! Shell command assembly for container execution.
//!
//! Everything that ends up inside a `sh -lc` invocation is built here so
//! that quoting stays in one place. Substituted values are wrapped in
//! double quotes with the four shell-active characters escaped; newlines
//! are carried verbatim inside the quotes, which is what preserves the
//! original command byte-for-byte through a shell parse.

use std::collections::BTreeMap;
use std::path::Path;

/// Default line cap for directory listings.
pub const DEFAULT_LIST_LIMIT: usize = 200;
/// Default entry cap for glob results.
pub const DEFAULT_GLOB_LIMIT: usize = 100;

/// Wrap a value in double quotes, escaping `\`, `$`, `` ` `` and `"`.
pub fn quote(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('$', "\\$")
        .replace('`', "\\`")
        .replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// A one-line command that surfaces `message` through the agent's shell
/// tool and exits nonzero.
pub fn failure_command(message: &str) -> String {
    format!("echo {}; exit 1", quote(&format!("sandbox: {message}")))
}

/// Build the host-side wrapper that re-runs `command` inside `container`:
/// `BINARY exec -i [--workdir "W"] [-e "K=V"]... "CONTAINER" sh -lc "CMD"`.
///
/// An empty binary, container or command cannot produce a usable exec, so
/// the result degrades to a [`failure_command`] the agent will still run
/// and see fail.
pub fn exec_wrapper(
    binary: &str,
    container: &str,
    command: &str,
    workdir: Option<&str>,
    env: &BTreeMap<String, String>,
) -> String {
    if binary.is_empty() || container.is_empty() || command.is_empty() {
        return failure_command("container exec is missing its binary, container, or command");
    }

    let mut wrapped = format!("{binary} exec -i");
    if let Some(dir) = workdir {
        if !dir.is_empty() {
            wrapped.push_str(" --workdir ");
            wrapped.push_str(&quote(dir));
        }
    }
    for (key, value) in env {
        wrapped.push_str(" -e ");
        wrapped.push_str(&quote(&format!("{key}={value}")));
    }
    wrapped.push(' ');
    wrapped.push_str(&quote(container));
    wrapped.push_str(" sh -lc ");
    wrapped.push_str(&quote(command));
    wrapped
}

/// `cat -- "PATH"` for container-side file reads.
pub fn read_command(path: &str) -> String {
    format!("cat -- {}", quote(path))
}

/// `ls -A -p -1` capped at `limit` lines; lists dotfiles, marks
/// directories with a trailing slash.
pub fn list_command(path: &str, limit: usize) -> String {
    format!(
        "ls -A -p -1 -- {} 2>/dev/null | head -n {limit}",
        quote(path)
    )
}

/// Ripgrep search with a `|` field separator. Downstream parsing splits
/// each line on the first two pipes, so file paths containing a literal
/// `|` come back mangled; that risk is accepted. The separator itself is
/// quoted so the container shell does not read it as a pipe.
pub fn grep_command(pattern: &str, include: Option<&str>) -> String {
    let mut cmd = format!(
        "rg -nH --field-match-separator={} --regexp {}",
        quote("|"),
        quote(pattern)
    );
    if let Some(glob) = include {
        if !glob.is_empty() {
            cmd.push_str(" --glob ");
            cmd.push_str(&quote(glob));
        }
    }
    cmd.push_str(" 2>/dev/null");
    cmd
}

/// `rg --files` with an optional glob filter, capped at `limit` entries.
pub fn glob_command(pattern: Option<&str>, limit: usize) -> String {
    let mut cmd = String::from("rg --files");
    if let Some(pattern) = pattern {
        if !pattern.is_empty() {
            cmd.push_str(" -g ");
            cmd.push_str(&quote(pattern));
        }
    }
    cmd.push_str(&format!(" 2>/dev/null | head -n {limit}"));
    cmd
}

/// `mkdir -p` for the parent of a container path, used before pushing a
/// host-written file into the container.
pub fn mkdir_command(container_path: &str) -> Option<String> {
    let parent = Path::new(container_path).parent()?;
    let parent = parent.to_str()?;
    if parent.is_empty() {
        return None;
    }
    Some(format!("mkdir -p -- {}", quote(parent)))
}
