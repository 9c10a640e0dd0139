//! The backend trait a concrete sandbox provider implements.
//!
//! Grounded in the teacher's [`Provider`](crate::ai::provider::Provider)
//! split: a thin async-trait seam between the manager (lifecycle, event
//! framing) and whatever actually runs the code.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SandboxError;

#[derive(Debug, Clone, Copy)]
pub struct SandboxLimits {
    pub cpu: u32,
    pub memory_mb: u32,
    pub timeout_seconds: u64,
    pub network: bool,
}

/// An event produced while a sandbox executes a snippet of code.
#[derive(Debug, Clone)]
pub enum SandboxEvent {
    Stdout { text: String },
    Stderr { text: String },
    Result {
        output: String,
        files: Vec<String>,
        exit_code: i32,
    },
    Error { code: String, message: String },
}

/// A running or idle sandbox as the backend sees it.
#[async_trait]
pub trait SandboxBackend: Send + Sync {
    /// Provision a new sandbox for `template` (e.g. `"python"`, `"bash"`)
    /// and return a backend-assigned handle.
    async fn create(&self, template: &str, limits: SandboxLimits) -> Result<String, SandboxError>;

    /// Execute `code` inside the sandbox identified by `handle`, streaming
    /// events into `events` as they occur. Returns once the terminal
    /// `Result`/`Error` event has been sent.
    async fn execute(
        &self,
        handle: &str,
        code: &str,
        language: &str,
        events: mpsc::Sender<SandboxEvent>,
    ) -> Result<(), SandboxError>;

    /// Write `bytes` to `path` inside the sandbox, returning the stored size.
    async fn upload(&self, handle: &str, path: &str, bytes: &[u8]) -> Result<usize, SandboxError>;

    /// Release the sandbox's underlying resources. Idempotent.
    async fn destroy(&self, handle: &str) -> Result<(), SandboxError>;
}
