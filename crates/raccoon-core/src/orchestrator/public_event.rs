//! The wire-agnostic event stream emitted by a turn.
//!
//! Tagged so the facade's translation to protobuf messages is an exhaustive
//! `match`, same discipline as [`super::super::ai::unified::UnifiedEvent`].

use serde::Serialize;

use crate::ai::types::FinishReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalScope {
    AllowOnce,
    AllowForSession,
    AlwaysForAgentTool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublicEvent {
    Status {
        message: String,
        category: String,
    },
    Token {
        text: String,
    },
    CodeBlock {
        language: String,
        code: String,
        filename: String,
    },
    ToolCall {
        request_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },
    ApprovalRequested {
        request_id: String,
        tool_name: String,
        arguments_preview: serde_json::Value,
        available_scopes: Vec<ApprovalScope>,
    },
    AwaitingApproval {
        request_id: String,
    },
    ToolResult {
        request_id: String,
        tool_name: String,
        result: String,
        is_error: bool,
    },
    Complete {
        model: String,
        stop_reason: String,
        prompt_tokens: u32,
        completion_tokens: u32,
        total_tokens: u32,
    },
    Error {
        code: String,
        message: String,
        retryable: bool,
    },
}

impl PublicEvent {
    pub fn complete(model: &str, stop_reason: &FinishReason, usage: crate::ai::types::Usage) -> Self {
        Self::Complete {
            model: model.to_string(),
            stop_reason: stop_reason.as_wire_str(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }

    pub fn deadline_exceeded() -> Self {
        Self::Error {
            code: "deadline_exceeded".to_string(),
            message: "turn deadline exceeded".to_string(),
            retryable: true,
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Error {
            code: "internal_error".to_string(),
            message: message.into(),
            retryable: true,
        }
    }
}
