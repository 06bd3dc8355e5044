//! Tool-call interception router.
//!
//! Sits between an AI coding agent and its tools: the pre hook rewrites
//! shell commands to run inside a per-session container (creating and
//! starting it on demand), the post hook replaces read/list/grep/glob
//! results with the container-side truth and pushes host-written files
//! into the container. Scope-to-container bindings persist across
//! restarts in a small JSON state file.

pub mod config;
pub mod hooks;
pub mod lifecycle;
pub mod naming;
pub mod pathmap;
pub mod router;
pub mod runtime;
pub mod scope;
pub mod shell;
pub mod state;
pub mod tools;

pub use config::{RoutingScope, Settings};
pub use hooks::{HookInput, ToolArgs, ToolOutput};
pub use router::{ProjectContext, Router};
pub use scope::{NullSessionSource, SessionSource};
pub use tools::CreateOptions;
