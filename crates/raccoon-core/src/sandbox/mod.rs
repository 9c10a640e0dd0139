//! Sandbox Manager: lifecycle over an external code-execution service.
//!
//! No real E2B integration ships here — `SimulatedBackend` runs code with
//! `tokio::process::Command` against the host's own `python3`/`bash`, which
//! is enough to exercise the manager's streaming and lifecycle contract
//! without a network dependency. A real backend would implement the same
//! [`SandboxBackend`] trait and swap in behind [`SandboxManager::new`].

mod backend;
mod manager;
mod simulated;

pub use backend::{SandboxBackend, SandboxEvent, SandboxLimits};
pub use manager::{SandboxInfo, SandboxManager, UploadResult};
pub use simulated::SimulatedBackend;
