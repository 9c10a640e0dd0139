//! Component-level error types.
//!
//! Each subsystem gets its own `thiserror` enum so callers can match on the
//! failure kind. Setup-time glue (config loading, process bootstrap) uses
//! `anyhow` instead, matching the rest of the workspace.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool {tool} validation failed: {errors:?}")]
    Validation { tool: String, errors: Vec<String> },

    #[error("no handler registered for tool: {0}")]
    NoHandler(String),

    #[error("tool {tool} failed: {message}")]
    HandlerFailed { tool: String, message: String },
}

#[derive(Debug, Error)]
pub enum RemoteToolError {
    #[error("server not connected: {0}")]
    NotConnected(String),

    #[error("remote server returned malformed JSON: {0}")]
    InvalidJson(String),

    #[error("remote server error: {0}")]
    ServerError(String),

    #[error("request to remote server failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request to remote server timed out")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("provider credential not configured for {0}")]
    MissingCredential(String),

    #[error("turn deadline exceeded")]
    DeadlineExceeded,

    #[error("tool call deadline exceeded")]
    ToolDeadlineExceeded,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    RemoteTool(#[from] RemoteToolError),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("e2b api key not configured")]
    MissingCredential,

    #[error("unknown sandbox: {0}")]
    UnknownSandbox(String),

    #[error("sandbox execution timed out")]
    ExecutionTimeout,

    #[error("sandbox backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
