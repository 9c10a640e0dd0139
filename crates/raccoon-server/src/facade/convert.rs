//! Wire <-> core type conversions.
//!
//! `arguments`/`arguments_preview`/tool input cross the wire as JSON-encoded
//! strings rather than `google.protobuf.Struct` (see the workspace design
//! notes); every conversion here round-trips through `serde_json` so the
//! JSON value itself is never stringified twice.

use raccoon_core::ai::types::{Role, ToolDescriptor, TurnConfig, TurnMessage};
use raccoon_core::orchestrator::{ApprovalScope, PublicEvent};

use crate::pb;

pub fn turn_message_from_wire(msg: &pb::ChatMessage) -> Result<TurnMessage, tonic::Status> {
    let role = match msg.role.as_str() {
        "system" => Role::System,
        "user" => Role::User,
        "assistant" => Role::Assistant,
        other => {
            return Err(tonic::Status::invalid_argument(format!(
                "unknown message role: {other}"
            )))
        }
    };
    Ok(TurnMessage {
        role,
        content: msg.content.clone(),
    })
}

pub fn tool_descriptor_from_wire(tool: &pb::ToolDescriptor) -> Result<ToolDescriptor, tonic::Status> {
    let input_schema = if tool.input_schema_json.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_str(&tool.input_schema_json)
            .map_err(|e| tonic::Status::invalid_argument(format!("invalid input_schema_json: {e}")))?
    };
    Ok(ToolDescriptor {
        name: tool.name.clone(),
        description: tool.description.clone(),
        input_schema,
        requires_approval: tool.requires_approval,
    })
}

pub fn turn_config_from_wire(config: &pb::TurnConfigMessage) -> Result<TurnConfig, tonic::Status> {
    let tools = config
        .tools
        .iter()
        .map(tool_descriptor_from_wire)
        .collect::<Result<Vec<_>, _>>()?;

    let default = TurnConfig::default();
    Ok(TurnConfig {
        model: if config.model.is_empty() {
            default.model
        } else {
            config.model.clone()
        },
        temperature: if config.temperature == 0.0 {
            default.temperature
        } else {
            config.temperature
        },
        max_tokens: if config.max_tokens == 0 {
            default.max_tokens
        } else {
            config.max_tokens
        },
        system_prompt: if config.system_prompt.is_empty() {
            None
        } else {
            Some(config.system_prompt.clone())
        },
        tools,
        deadline_seconds: if config.deadline_seconds == 0 {
            default.deadline_seconds
        } else {
            config.deadline_seconds
        },
    })
}

fn approval_scope_to_wire(scope: ApprovalScope) -> &'static str {
    match scope {
        ApprovalScope::AllowOnce => "allow_once",
        ApprovalScope::AllowForSession => "allow_for_session",
        ApprovalScope::AlwaysForAgentTool => "always_for_agent_tool",
    }
}

pub fn approval_scope_from_wire(scope: &str) -> Result<ApprovalScope, tonic::Status> {
    match scope {
        "allow_once" => Ok(ApprovalScope::AllowOnce),
        "allow_for_session" => Ok(ApprovalScope::AllowForSession),
        "always_for_agent_tool" => Ok(ApprovalScope::AlwaysForAgentTool),
        other => Err(tonic::Status::invalid_argument(format!(
            "unknown approval scope: {other}"
        ))),
    }
}

/// Every variant maps to exactly one wire event; the `oneof` is always set.
pub fn turn_event_from_public(event: PublicEvent) -> pb::TurnEvent {
    use pb::turn_event::Event;

    let event = match event {
        PublicEvent::Status { message, category } => {
            Event::Status(pb::StatusEvent { message, category })
        }
        PublicEvent::Token { text } => Event::Token(pb::TokenEvent { text }),
        PublicEvent::CodeBlock { language, code, filename } => {
            Event::CodeBlock(pb::CodeBlockEvent { language, code, filename })
        }
        PublicEvent::ToolCall { request_id, tool_name, arguments } => {
            Event::ToolCall(pb::ToolCallEvent {
                request_id,
                tool_name,
                arguments_json: arguments.to_string(),
            })
        }
        PublicEvent::ApprovalRequested {
            request_id,
            tool_name,
            arguments_preview,
            available_scopes,
        } => Event::ApprovalRequested(pb::ApprovalRequestedEvent {
            request_id,
            tool_name,
            arguments_preview_json: arguments_preview.to_string(),
            available_scopes: available_scopes.into_iter().map(approval_scope_to_wire).map(str::to_string).collect(),
        }),
        PublicEvent::AwaitingApproval { request_id } => {
            Event::AwaitingApproval(pb::AwaitingApprovalEvent { request_id })
        }
        PublicEvent::ToolResult { request_id, tool_name, result, is_error } => {
            Event::ToolResult(pb::ToolResultEvent {
                request_id,
                tool_name,
                result,
                is_error,
            })
        }
        PublicEvent::Complete {
            model,
            stop_reason,
            prompt_tokens,
            completion_tokens,
            total_tokens,
        } => Event::Complete(pb::CompleteEvent {
            model,
            stop_reason,
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }),
        PublicEvent::Error { code, message, retryable } => {
            Event::Error(pb::ErrorEvent { code, message, retryable })
        }
    };

    pb::TurnEvent { event: Some(event) }
}

pub fn sandbox_event_from_core(event: raccoon_core::sandbox::SandboxEvent) -> pb::SandboxEvent {
    use pb::sandbox_event::Event;
    use raccoon_core::sandbox::SandboxEvent as CoreEvent;

    let event = match event {
        CoreEvent::Stdout { text } => Event::Stdout(pb::SandboxStdoutEvent { text }),
        CoreEvent::Stderr { text } => Event::Stderr(pb::SandboxStderrEvent { text }),
        CoreEvent::Result { output, files, exit_code } => {
            Event::Result(pb::SandboxResultEvent { output, files, exit_code })
        }
        CoreEvent::Error { code, message } => Event::Error(pb::SandboxErrorEvent { code, message }),
    };

    pb::SandboxEvent { event: Some(event) }
}
