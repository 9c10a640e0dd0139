//! Tool resolution: local registry and the remote JSON-RPC client the
//! orchestrator falls back to for declared-but-not-local tools.

pub mod descriptor;
pub mod registry;
pub mod remote;
pub mod truncation;

pub use descriptor::ToolSchema;
pub use registry::{ToolHandler, ToolRegistry};
pub use remote::{RemoteAuth, RemoteToolClient, RemoteToolDescriptor};
