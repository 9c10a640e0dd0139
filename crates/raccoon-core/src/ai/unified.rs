//! The unified event type every provider adapter produces and the
//! orchestrator consumes. Duck-typed event dicts in the reference
//! implementation become a tagged enum here so the compiler enforces
//! exhaustive handling at the orchestrator boundary.

use serde_json::Value;

use super::types::{FinishReason, Usage};

/// An event emitted by a provider adapter while streaming a single turn.
#[derive(Debug, Clone)]
pub enum UnifiedEvent {
    /// A fragment of free-text output.
    Token { text: String },
    /// A tool invocation has begun streaming; no input has arrived yet.
    ToolUseStart { id: String, name: String },
    /// Incremental JSON fragment for the most recently started tool
    /// invocation (block-delta variant) or for the entry at a given index
    /// (choice-delta variant, folded in before this type is constructed).
    ToolInputDelta { text: String },
    /// A fully assembled tool invocation ready for dispatch.
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// Terminal event: the provider has nothing further to say.
    Complete {
        usage: Usage,
        stop_reason: FinishReason,
    },
}
