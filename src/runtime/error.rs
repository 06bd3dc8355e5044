//! Runtime driver error types.

use thiserror::Error;

/// Result type for runtime driver operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors from invoking the OCI runtime binary.
///
/// A nonzero exit from the runtime is not an error at this layer; it is
/// reported through [`crate::runtime::CmdOutput`] so callers can decide.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime binary could not be spawned at all.
    #[error("spawning {binary} {command} failed: {message}")]
    Spawn {
        binary: String,
        command: String,
        message: String,
    },

    /// No runtime binary is configured.
    #[error("runtime binary is not configured")]
    MissingBinary,
}
