//! Hook ABI surface.
//!
//! The agent framework calls [`crate::Router::pre_execute`] right before a
//! tool runs and [`crate::Router::post_execute`] right after, handing over
//! the tool's mutable argument bag and output record. Everything here is
//! the shared vocabulary of that pair.

mod pending;
mod post;
mod pre;

pub use pending::PendingCall;
pub(crate) use pending::PendingCalls;

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Mutable tool argument bag, as handed over by the agent framework.
pub type ToolArgs = Map<String, Value>;

/// Identity of one tool invocation.
#[derive(Debug, Clone)]
pub struct HookInput {
    pub tool: String,
    pub session_id: String,
    pub call_id: String,
}

/// Mutable tool result record. The post hook only ever touches `output`.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub output: String,
    pub title: String,
    pub metadata: Value,
}

/// The tool families the router knows how to intercept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFamily {
    Shell,
    Read,
    Write,
    Edit,
    Grep,
    Glob,
    List,
}

impl ToolFamily {
    /// Map a framework tool name to its family. `bash` is the framework's
    /// name for its shell tool.
    pub fn parse(tool: &str) -> Option<Self> {
        match tool {
            "shell" | "bash" => Some(Self::Shell),
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "edit" => Some(Self::Edit),
            "grep" => Some(Self::Grep),
            "glob" => Some(Self::Glob),
            "list" => Some(Self::List),
            _ => None,
        }
    }
}

/// First non-empty string argument under any of `keys`.
pub(crate) fn arg_str<'a>(args: &'a ToolArgs, keys: &[&str]) -> Option<&'a str> {
    for key in keys {
        if let Some(Value::String(value)) = args.get(*key) {
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

/// String-valued entries of an object argument, anything else skipped.
pub(crate) fn arg_env(args: &ToolArgs, key: &str) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    if let Some(Value::Object(map)) = args.get(key) {
        for (name, value) in map {
            if let Value::String(value) = value {
                env.insert(name.clone(), value.clone());
            }
        }
    }
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_accepts_framework_names() {
        assert_eq!(ToolFamily::parse("bash"), Some(ToolFamily::Shell));
        assert_eq!(ToolFamily::parse("shell"), Some(ToolFamily::Shell));
        assert_eq!(ToolFamily::parse("grep"), Some(ToolFamily::Grep));
        assert_eq!(ToolFamily::parse("webfetch"), None);
    }

    #[test]
    fn arg_str_skips_empty_and_non_string() {
        let mut args = ToolArgs::new();
        args.insert("filePath".to_string(), json!(""));
        args.insert("path".to_string(), json!("/x"));
        args.insert("count".to_string(), json!(3));
        assert_eq!(arg_str(&args, &["filePath", "path"]), Some("/x"));
        assert_eq!(arg_str(&args, &["count"]), None);
        assert_eq!(arg_str(&args, &["missing"]), None);
    }

    #[test]
    fn arg_env_keeps_string_entries() {
        let mut args = ToolArgs::new();
        args.insert("env".to_string(), json!({"A": "1", "B": 2}));
        let env = arg_env(&args, "env");
        assert_eq!(env.get("A").map(String::as_str), Some("1"));
        assert!(!env.contains_key("B"));
    }
}
