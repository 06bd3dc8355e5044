//! Host/container path mapping.
//!
//! Pure lexical translation between the host project root and the container
//! mount point. These functions never touch the filesystem; a path that
//! escapes the mount is clamped to the opposite root instead of leaking.

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: drop `.` components and fold `..` against
/// the preceding component, clamping at the root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir | Component::Prefix(_) => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Map a host path into the container mount.
///
/// Relative inputs resolve against `host_root`. Anything that is neither
/// `host_root` itself nor inside it maps to `container_root`. Empty input
/// or roots fall back to `container_root`, or `/` when that is empty too.
pub fn host_to_container(input: &Path, host_root: &Path, container_root: &Path) -> PathBuf {
    map_between(input, host_root, container_root)
}

/// Map a container path back onto the host. Symmetric to
/// [`host_to_container`]: paths outside `container_root` clamp to
/// `host_root`, and the trailing remainder is preserved as-is.
pub fn container_to_host(input: &Path, container_root: &Path, host_root: &Path) -> PathBuf {
    map_between(input, container_root, host_root)
}

fn map_between(input: &Path, from_root: &Path, to_root: &Path) -> PathBuf {
    let fallback = if to_root.as_os_str().is_empty() {
        PathBuf::from("/")
    } else {
        normalize(to_root)
    };
    if input.as_os_str().is_empty()
        || from_root.as_os_str().is_empty()
        || to_root.as_os_str().is_empty()
    {
        return fallback;
    }

    let root = normalize(from_root);
    let resolved = if input.is_relative() {
        normalize(&root.join(input))
    } else {
        normalize(input)
    };

    match resolved.strip_prefix(&root) {
        Ok(rest) if rest.as_os_str().is_empty() => fallback,
        Ok(rest) => fallback.join(rest),
        Err(_) => fallback,
    }
}

/// Resolve `input` (relative inputs against `root`) and return the
/// normalized absolute path if it is `root` itself or inside it.
pub fn resolve_under(root: &Path, input: &Path) -> Option<PathBuf> {
    if root.as_os_str().is_empty() || input.as_os_str().is_empty() {
        return None;
    }
    let root = normalize(root);
    let resolved = if input.is_relative() {
        normalize(&root.join(input))
    } else {
        normalize(input)
    };
    if resolved.starts_with(&root) {
        Some(resolved)
    } else {
        None
    }
}

/// Like [`resolve_under`], but rejects `root` itself. Used for file paths,
/// which can never legitimately be the project root directory.
pub fn resolve_strictly_under(root: &Path, input: &Path) -> Option<PathBuf> {
    let resolved = resolve_under(root, input)?;
    if resolved == normalize(root) {
        None
    } else {
        Some(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_subpath_into_container() {
        let mapped = host_to_container(
            Path::new("/home/u/p/src/x.ts"),
            Path::new("/home/u/p"),
            Path::new("/workspace"),
        );
        assert_eq!(mapped, PathBuf::from("/workspace/src/x.ts"));
    }

    #[test]
    fn root_itself_maps_to_container_root() {
        let mapped = host_to_container(
            Path::new("/home/u/p"),
            Path::new("/home/u/p"),
            Path::new("/workspace"),
        );
        assert_eq!(mapped, PathBuf::from("/workspace"));
    }

    #[test]
    fn relative_input_resolves_against_host_root() {
        let mapped = host_to_container(
            Path::new("src/a.rs"),
            Path::new("/home/u/p"),
            Path::new("/workspace"),
        );
        assert_eq!(mapped, PathBuf::from("/workspace/src/a.rs"));
    }

    #[test]
    fn escape_clamps_to_container_root() {
        let mapped = host_to_container(
            Path::new("/etc/passwd"),
            Path::new("/home/u/p"),
            Path::new("/workspace"),
        );
        assert_eq!(mapped, PathBuf::from("/workspace"));

        let dotdot = host_to_container(
            Path::new("/home/u/p/../../etc"),
            Path::new("/home/u/p"),
            Path::new("/workspace"),
        );
        assert_eq!(dotdot, PathBuf::from("/workspace"));
    }

    #[test]
    fn empty_inputs_fall_back() {
        assert_eq!(
            host_to_container(Path::new(""), Path::new("/h"), Path::new("/c")),
            PathBuf::from("/c")
        );
        assert_eq!(
            host_to_container(Path::new("/h/x"), Path::new(""), Path::new("/c")),
            PathBuf::from("/c")
        );
        assert_eq!(
            host_to_container(Path::new("/h/x"), Path::new("/h"), Path::new("")),
            PathBuf::from("/")
        );
    }

    #[test]
    fn container_to_host_is_left_inverse_inside_root() {
        let host_root = Path::new("/home/u/p");
        let container_root = Path::new("/workspace");
        for sub in ["src/a.ts", "deep/ly/nested/file.rs", "Cargo.toml"] {
            let host = host_root.join(sub);
            let mapped = host_to_container(&host, host_root, container_root);
            let back = container_to_host(&mapped, container_root, host_root);
            assert_eq!(back, host);
        }
    }

    #[test]
    fn container_escape_clamps_to_host_root() {
        let back = container_to_host(
            Path::new("/tmp/elsewhere"),
            Path::new("/workspace"),
            Path::new("/home/u/p"),
        );
        assert_eq!(back, PathBuf::from("/home/u/p"));
    }

    #[test]
    fn mapped_paths_stay_under_container_root() {
        let cases = [
            "/home/u/p/a",
            "/home/u/p/../q",
            "/",
            "relative/x",
            "/totally/else",
        ];
        for case in cases {
            let mapped = host_to_container(
                Path::new(case),
                Path::new("/home/u/p"),
                Path::new("/workspace"),
            );
            assert!(mapped.starts_with("/workspace"), "{case} -> {mapped:?}");
        }
    }

    #[test]
    fn resolve_under_accepts_root_and_children() {
        let root = Path::new("/home/u/p");
        assert_eq!(
            resolve_under(root, Path::new("/home/u/p")),
            Some(PathBuf::from("/home/u/p"))
        );
        assert_eq!(
            resolve_under(root, Path::new("sub/dir")),
            Some(PathBuf::from("/home/u/p/sub/dir"))
        );
        assert_eq!(resolve_under(root, Path::new("/etc")), None);
        assert_eq!(resolve_under(root, Path::new("../sibling")), None);
    }

    #[test]
    fn resolve_strictly_under_rejects_root() {
        let root = Path::new("/home/u/p");
        assert_eq!(resolve_strictly_under(root, Path::new("/home/u/p")), None);
        assert_eq!(
            resolve_strictly_under(root, Path::new("/home/u/p/f.rs")),
            Some(PathBuf::from("/home/u/p/f.rs"))
        );
    }
}
