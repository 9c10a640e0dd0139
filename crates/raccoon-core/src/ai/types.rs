//! Shared request/response types for the AI layer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single turn message. Flat `{role, content}` shape — no multi-part
/// content blocks, no image/document attachments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnMessage {
    pub role: Role,
    pub content: String,
}

/// A tool made available to the model for this turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    #[serde(default)]
    pub requires_approval: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Normalized stop reason. `Other` is an escape hatch for any vendor value
/// that doesn't map onto the common set, so the mapping stays total instead
/// of silently dropping information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    EndTurn,
    MaxTokens,
    ToolUse,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    pub fn as_wire_str(&self) -> String {
        match self {
            Self::EndTurn => "end_turn".to_string(),
            Self::MaxTokens => "max_tokens".to_string(),
            Self::ToolUse => "tool_use".to_string(),
            Self::ContentFilter => "content_filter".to_string(),
            Self::Other(s) => s.clone(),
        }
    }
}

/// Which vendor family a model name routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    Anthropic,
    OpenAi,
}

impl Vendor {
    /// Resolve a vendor from a model id prefix. `claude*` routes to
    /// Anthropic, `gpt*` routes to OpenAI; anything else is unrecognized.
    pub fn from_model(model: &str) -> Option<Self> {
        if model.starts_with("claude") {
            Some(Self::Anthropic)
        } else if model.starts_with("gpt") {
            Some(Self::OpenAi)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }
}

/// Flat turn configuration, matching the data model's six recognized
/// fields plus the turn deadline.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
    pub tools: Vec<ToolDescriptor>,
    pub deadline_seconds: u64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-6".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            system_prompt: None,
            tools: Vec::new(),
            deadline_seconds: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_routes_by_model_prefix() {
        assert_eq!(Vendor::from_model("claude-sonnet-4-6"), Some(Vendor::Anthropic));
        assert_eq!(Vendor::from_model("gpt-5.2"), Some(Vendor::OpenAi));
        assert_eq!(Vendor::from_model("llama-3"), None);
    }
}
