//! Block-delta provider adapter (Anthropic-shaped wire protocol).
//!
//! Consumes `content_block_start` / `content_block_delta` /
//! `content_block_stop` / `message_delta` / `message_stop` SSE frames and
//! translates them into [`UnifiedEvent`]s. Tool-use blocks are tracked by
//! content-block index, mirroring the wire protocol itself — in practice
//! only one tool-use block streams at a time, so "most recently started
//! pending tool" and "the block at this index" coincide.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::OrchestratorError;

use super::provider::Provider;
use super::sse::{Frame, SseFramer};
use super::types::{FinishReason, ToolDescriptor, TurnConfig, TurnMessage, Usage, Vendor};
use super::unified::UnifiedEvent;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

struct PendingTool {
    id: String,
    name: String,
    buffer: String,
}

pub struct AnthropicProvider {
    api_key: String,
    http: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: reqwest::Client::new(),
        }
    }

    fn request_body(messages: &[TurnMessage], config: &TurnConfig) -> Value {
        let msgs: Vec<Value> = messages
            .iter()
            .filter(|m| !matches!(m.role, super::types::Role::System))
            .map(|m| {
                serde_json::json!({
                    "role": role_str(m.role),
                    "content": m.content,
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": config.model,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
            "messages": msgs,
            "stream": true,
        });

        if let Some(system) = &config.system_prompt {
            body["system"] = Value::String(system.clone());
        }
        if !config.tools.is_empty() {
            body["tools"] = Value::Array(config.tools.iter().map(tool_to_wire).collect());
        }
        body
    }
}

fn role_str(role: super::types::Role) -> &'static str {
    match role {
        super::types::Role::User => "user",
        super::types::Role::Assistant => "assistant",
        super::types::Role::System => "user",
    }
}

fn tool_to_wire(tool: &ToolDescriptor) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

fn map_stop_reason(raw: &str) -> FinishReason {
    match raw {
        "end_turn" => FinishReason::EndTurn,
        "max_tokens" => FinishReason::MaxTokens,
        "tool_use" => FinishReason::ToolUse,
        other => FinishReason::Other(other.to_string()),
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn vendor(&self) -> Vendor {
        Vendor::Anthropic
    }

    async fn stream_turn(
        &self,
        messages: &[TurnMessage],
        config: &TurnConfig,
    ) -> Result<mpsc::UnboundedReceiver<UnifiedEvent>, OrchestratorError> {
        let body = Self::request_body(messages, config);

        let response = self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| OrchestratorError::Internal(format!("anthropic request failed: {e}")))?;

        let byte_stream = response.bytes_stream();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_block_delta_decoder(byte_stream, tx));
        Ok(rx)
    }
}

async fn run_block_delta_decoder<S>(stream: S, tx: mpsc::UnboundedSender<UnifiedEvent>)
where
    S: futures::Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    tokio::pin!(stream);
    let mut framer = SseFramer::new();
    let mut pending: HashMap<usize, PendingTool> = HashMap::new();
    let mut emitted: HashSet<String> = HashSet::new();
    let mut usage = Usage::default();
    let mut stop_reason = FinishReason::EndTurn;

    while let Some(chunk) = stream.next().await {
        let bytes = match chunk {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "anthropic stream read error");
                break;
            }
        };
        for frame in framer.push(bytes) {
            let Frame::Event(json) = frame else { continue };
            if let Some(event) = translate_block_delta_event(&json, &mut pending, &mut emitted) {
                if tx.send(event).is_err() {
                    return;
                }
            }
            if let Some(u) = extract_usage(&json) {
                usage = u;
            }
            if let Some(reason) = extract_stop_reason(&json) {
                stop_reason = reason;
            }
        }
    }

    // Any block that started but never received content_block_stop (e.g. a
    // truncated stream) is flushed with an empty input rather than left
    // silently unemitted.
    for (_, tool) in pending.into_iter() {
        if emitted.insert(tool.id.clone()) {
            let _ = tx.send(UnifiedEvent::ToolUse {
                id: tool.id,
                name: tool.name,
                input: Value::Object(serde_json::Map::new()),
            });
        }
    }

    let _ = tx.send(UnifiedEvent::Complete { usage, stop_reason });
}

fn translate_block_delta_event(
    json: &Value,
    pending: &mut HashMap<usize, PendingTool>,
    emitted: &mut HashSet<String>,
) -> Option<UnifiedEvent> {
    let event_type = json.get("type").and_then(|t| t.as_str())?;

    match event_type {
        "content_block_start" => {
            let index = json.get("index").and_then(|i| i.as_u64())? as usize;
            let block = json.get("content_block")?;
            if block.get("type").and_then(|t| t.as_str()) != Some("tool_use") {
                return None;
            }
            let id = block.get("id").and_then(|i| i.as_str())?.to_string();
            let name = block.get("name").and_then(|n| n.as_str())?.to_string();
            pending.insert(
                index,
                PendingTool {
                    id: id.clone(),
                    name: name.clone(),
                    buffer: String::new(),
                },
            );
            Some(UnifiedEvent::ToolUseStart { id, name })
        }
        "content_block_delta" => {
            let index = json.get("index").and_then(|i| i.as_u64())? as usize;
            let delta = json.get("delta")?;
            match delta.get("type").and_then(|t| t.as_str())? {
                "text_delta" => {
                    let text = delta.get("text").and_then(|t| t.as_str())?.to_string();
                    Some(UnifiedEvent::Token { text })
                }
                "input_json_delta" => {
                    let fragment = delta
                        .get("partial_json")
                        .and_then(|p| p.as_str())
                        .unwrap_or("")
                        .to_string();
                    if let Some(tool) = pending.get_mut(&index) {
                        tool.buffer.push_str(&fragment);
                    }
                    Some(UnifiedEvent::ToolInputDelta { text: fragment })
                }
                _ => None,
            }
        }
        "content_block_stop" => {
            let index = json.get("index").and_then(|i| i.as_u64())? as usize;
            let tool = pending.remove(&index)?;
            emitted.insert(tool.id.clone());
            let input = if tool.buffer.trim().is_empty() {
                Value::Object(serde_json::Map::new())
            } else {
                match serde_json::from_str::<Value>(&tool.buffer) {
                    Ok(v) => v,
                    Err(e) => {
                        let preview: String = tool.buffer.chars().take(200).collect();
                        warn!(tool = %tool.name, error = %e, preview = %preview, "malformed tool input JSON");
                        Value::Object(serde_json::Map::new())
                    }
                }
            };
            Some(UnifiedEvent::ToolUse {
                id: tool.id,
                name: tool.name,
                input,
            })
        }
        _ => None,
    }
}

fn extract_usage(json: &Value) -> Option<Usage> {
    let usage = json
        .get("message")
        .and_then(|m| m.get("usage"))
        .or_else(|| json.get("usage"))?;
    let prompt = usage.get("input_tokens").and_then(|t| t.as_u64())? as u32;
    let completion = usage
        .get("output_tokens")
        .and_then(|t| t.as_u64())
        .unwrap_or(0) as u32;
    Some(Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: prompt + completion,
    })
}

fn extract_stop_reason(json: &Value) -> Option<FinishReason> {
    let raw = json.get("delta")?.get("stop_reason")?.as_str()?;
    Some(map_stop_reason(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_use_start_then_stop_assembles_input() {
        let mut pending = HashMap::new();
        let mut emitted = HashSet::new();

        let start = serde_json::json!({
            "type": "content_block_start",
            "index": 0,
            "content_block": {"type": "tool_use", "id": "t1", "name": "search"}
        });
        let ev = translate_block_delta_event(&start, &mut pending, &mut emitted).unwrap();
        assert!(matches!(ev, UnifiedEvent::ToolUseStart { id, .. } if id == "t1"));

        let delta = serde_json::json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "input_json_delta", "partial_json": "{\"q\":\"x\"}"}
        });
        translate_block_delta_event(&delta, &mut pending, &mut emitted);

        let stop = serde_json::json!({"type": "content_block_stop", "index": 0});
        let ev = translate_block_delta_event(&stop, &mut pending, &mut emitted).unwrap();
        match ev {
            UnifiedEvent::ToolUse { id, name, input } => {
                assert_eq!(id, "t1");
                assert_eq!(name, "search");
                assert_eq!(input["q"], "x");
            }
            _ => panic!("expected ToolUse"),
        }
    }

    #[test]
    fn malformed_tool_json_yields_empty_input() {
        let mut pending = HashMap::new();
        let mut emitted = HashSet::new();

        let start = serde_json::json!({
            "type": "content_block_start",
            "index": 0,
            "content_block": {"type": "tool_use", "id": "t1", "name": "search"}
        });
        translate_block_delta_event(&start, &mut pending, &mut emitted);

        let delta = serde_json::json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "input_json_delta", "partial_json": "{not json"}
        });
        translate_block_delta_event(&delta, &mut pending, &mut emitted);

        let stop = serde_json::json!({"type": "content_block_stop", "index": 0});
        let ev = translate_block_delta_event(&stop, &mut pending, &mut emitted).unwrap();
        match ev {
            UnifiedEvent::ToolUse { input, .. } => {
                assert_eq!(input, Value::Object(serde_json::Map::new()));
            }
            _ => panic!("expected ToolUse"),
        }
    }

    #[test]
    fn stop_reason_mapping() {
        assert_eq!(map_stop_reason("end_turn"), FinishReason::EndTurn);
        assert_eq!(map_stop_reason("tool_use"), FinishReason::ToolUse);
        assert_eq!(
            map_stop_reason("stop_sequence"),
            FinishReason::Other("stop_sequence".to_string())
        );
    }
}
