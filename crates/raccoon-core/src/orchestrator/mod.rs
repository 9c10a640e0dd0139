//! Turn orchestration: provider selection, code-block detection, approval
//! gating, and tool dispatch under nested deadlines.

pub mod approval;
pub mod code_block;
pub mod public_event;
pub mod turn;

pub use approval::{ApprovalDecision, ApprovalError};
pub use public_event::{ApprovalScope, PublicEvent};
pub use turn::{ApprovalHandle, Orchestrator, TurnRequest};
