//! Container name derivation.
//!
//! Names follow `prefix-<project8>-<session8>` so that a container is
//! recognisable from `docker ps` output alone. Every segment is run
//! through [`sanitize`] first, which keeps the result valid for any OCI
//! runtime's name grammar.

/// Fallback prefix when sanitisation leaves nothing usable.
pub const DEFAULT_PREFIX: &str = "opencode";

/// Lowercase the input, collapse every run of characters outside
/// `[a-z0-9_.-]` (and repeated dashes) into a single `-`, and trim dashes
/// from both ends. An empty result falls back to [`DEFAULT_PREFIX`].
pub fn sanitize(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.to_lowercase().chars() {
        let keep = matches!(ch, 'a'..='z' | '0'..='9' | '_' | '.');
        if keep {
            out.push(ch);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        DEFAULT_PREFIX.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Derive a container name from the routing identities:
/// sanitised prefix, the first 8 chars of the sanitised project id with
/// dashes stripped, and the first 8 chars of the first non-empty
/// dash-separated segment of the sanitised session id.
pub fn build_name(prefix: &str, project_id: &str, session_id: &str) -> String {
    let prefix = sanitize(prefix);

    let project: String = sanitize(project_id)
        .chars()
        .filter(|c| *c != '-')
        .take(8)
        .collect();

    let sanitized_session = sanitize(session_id);
    let session: String = sanitized_session
        .split('-')
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
        .chars()
        .take(8)
        .collect();

    let mut name = prefix;
    for segment in [project, session] {
        if !segment.is_empty() {
            name.push('-');
            name.push_str(&segment);
        }
    }
    name
}
