//! Pure translation layer between the tonic wire schema and the core data
//! model. Each RPC here does three things: decode the request, call into
//! `raccoon-core`, re-encode the result — no business logic lives here.

mod agent_service;
mod convert;
mod sandbox_service;

pub use agent_service::AgentServiceImpl;
pub use sandbox_service::SandboxServiceImpl;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use raccoon_core::config::Settings;
use raccoon_core::orchestrator::{ApprovalHandle, Orchestrator};
use raccoon_core::sandbox::SandboxManager;
use raccoon_core::tools::{RemoteToolClient, ToolRegistry};

/// Shared, long-lived state handed to every RPC implementation. One
/// instance serves the whole process.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub registry: Arc<ToolRegistry>,
    pub remote_client: Arc<RemoteToolClient>,
    pub sandbox_manager: Arc<SandboxManager>,
    pub settings: Arc<Settings>,
    /// Routes an out-of-band `SubmitApproval` call to the turn awaiting that
    /// `request_id`. An entry lives from the moment its turn emits
    /// `approval_requested` until the decision is submitted or the turn
    /// resolves the tool call some other way (deny-by-default on timeout).
    pub pending_approvals: Arc<RwLock<HashMap<String, ApprovalHandle>>>,
}
