//! Choice-delta provider adapter (OpenAI-shaped chat/completions wire
//! protocol).
//!
//! Tool calls are assembled by `index` rather than content-block id: each
//! delta chunk carries at most one choice, and `delta.tool_calls[]` entries
//! merge into a per-index accumulator (`id` and `name` overwrite, `arguments`
//! concatenates). Unlike the block-delta adapter, a malformed or incomplete
//! tool call is dropped rather than emitted with an empty input — there is
//! no per-block stop event here to anchor an empty-input call to a real
//! provider intent.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::error::OrchestratorError;

use super::provider::Provider;
use super::sse::{Frame, SseFramer};
use super::types::{FinishReason, Role, ToolDescriptor, TurnConfig, TurnMessage, Usage, Vendor};
use super::unified::UnifiedEvent;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Default)]
struct ToolCallEntry {
    id: String,
    name: String,
    arguments: String,
}

pub struct OpenAiProvider {
    api_key: String,
    http: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: reqwest::Client::new(),
        }
    }

    fn request_body(messages: &[TurnMessage], config: &TurnConfig) -> Value {
        let mut msgs: Vec<Value> = Vec::new();
        if let Some(system) = &config.system_prompt {
            msgs.push(serde_json::json!({"role": "system", "content": system}));
        }
        msgs.extend(messages.iter().map(|m| {
            serde_json::json!({
                "role": role_str(m.role),
                "content": m.content,
            })
        }));

        let mut body = serde_json::json!({
            "model": config.model,
            "messages": msgs,
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
            "stream": true,
            "stream_options": {"include_usage": true},
        });

        if !config.tools.is_empty() {
            body["tools"] = Value::Array(config.tools.iter().map(tool_to_wire).collect());
        }
        body
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

fn tool_to_wire(tool: &ToolDescriptor) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        }
    })
}

fn map_finish_reason(raw: &str) -> FinishReason {
    match raw {
        "stop" => FinishReason::EndTurn,
        "length" => FinishReason::MaxTokens,
        "tool_calls" => FinishReason::ToolUse,
        "content_filter" => FinishReason::ContentFilter,
        other => FinishReason::Other(other.to_string()),
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn vendor(&self) -> Vendor {
        Vendor::OpenAi
    }

    async fn stream_turn(
        &self,
        messages: &[TurnMessage],
        config: &TurnConfig,
    ) -> Result<mpsc::UnboundedReceiver<UnifiedEvent>, OrchestratorError> {
        let body = Self::request_body(messages, config);

        let response = self
            .http
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| OrchestratorError::Internal(format!("openai request failed: {e}")))?;

        let byte_stream = response.bytes_stream();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_choice_delta_decoder(byte_stream, tx));
        Ok(rx)
    }
}

async fn run_choice_delta_decoder<S>(stream: S, tx: mpsc::UnboundedSender<UnifiedEvent>)
where
    S: futures::Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    tokio::pin!(stream);
    let mut framer = SseFramer::new();
    let mut tool_calls: BTreeMap<usize, ToolCallEntry> = BTreeMap::new();
    let mut usage = Usage::default();
    let mut stop_reason = FinishReason::EndTurn;

    'outer: while let Some(chunk) = stream.next().await {
        let bytes = match chunk {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "openai stream read error");
                break;
            }
        };
        for frame in framer.push(bytes) {
            match frame {
                Frame::Done => break 'outer,
                Frame::Event(json) => {
                    if let Some(text) = extract_content_delta(&json) {
                        if tx.send(UnifiedEvent::Token { text }).is_err() {
                            return;
                        }
                    }
                    merge_tool_call_deltas(&json, &mut tool_calls);
                    if let Some(u) = extract_usage(&json) {
                        usage = u;
                    }
                    if let Some(reason) = extract_finish_reason(&json) {
                        stop_reason = reason;
                    }
                }
            }
        }
    }

    for (_, entry) in tool_calls {
        match finalize_tool_call(entry) {
            Some((id, name, input)) => {
                if tx
                    .send(UnifiedEvent::ToolUse { id, name, input })
                    .is_err()
                {
                    return;
                }
            }
            None => continue,
        }
    }

    let _ = tx.send(UnifiedEvent::Complete { usage, stop_reason });
}

fn finalize_tool_call(entry: ToolCallEntry) -> Option<(String, String, Value)> {
    if entry.id.is_empty() {
        warn!("dropping tool call with empty id");
        return None;
    }
    if entry.name.is_empty() {
        warn!(id = %entry.id, "dropping tool call with empty name");
        return None;
    }
    let input = if entry.arguments.trim().is_empty() {
        Value::Object(serde_json::Map::new())
    } else {
        match serde_json::from_str::<Value>(&entry.arguments) {
            Ok(v) => v,
            Err(e) => {
                error!(id = %entry.id, error = %e, "dropping tool call with malformed arguments JSON");
                return None;
            }
        }
    };
    Some((entry.id, entry.name, input))
}

fn extract_content_delta(json: &Value) -> Option<String> {
    let choice = json.get("choices")?.as_array()?.first()?;
    let text = choice.get("delta")?.get("content")?.as_str()?;
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn merge_tool_call_deltas(json: &Value, tool_calls: &mut BTreeMap<usize, ToolCallEntry>) {
    let Some(choice) = json.get("choices").and_then(|c| c.as_array()).and_then(|a| a.first())
    else {
        return;
    };
    let Some(deltas) = choice
        .get("delta")
        .and_then(|d| d.get("tool_calls"))
        .and_then(|t| t.as_array())
    else {
        return;
    };

    for delta in deltas {
        let index = delta.get("index").and_then(|i| i.as_u64()).unwrap_or(0) as usize;
        let entry = tool_calls.entry(index).or_default();
        if let Some(id) = delta.get("id").and_then(|i| i.as_str()) {
            entry.id = id.to_string();
        }
        if let Some(function) = delta.get("function") {
            if let Some(name) = function.get("name").and_then(|n| n.as_str()) {
                entry.name = name.to_string();
            }
            if let Some(args) = function.get("arguments").and_then(|a| a.as_str()) {
                entry.arguments.push_str(args);
            }
        }
    }
}

fn extract_usage(json: &Value) -> Option<Usage> {
    let usage = json.get("usage")?;
    let prompt = usage.get("prompt_tokens").and_then(|t| t.as_u64())? as u32;
    let completion = usage
        .get("completion_tokens")
        .and_then(|t| t.as_u64())
        .unwrap_or(0) as u32;
    Some(Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: prompt + completion,
    })
}

fn extract_finish_reason(json: &Value) -> Option<FinishReason> {
    let choice = json.get("choices")?.as_array()?.first()?;
    let raw = choice.get("finish_reason")?.as_str()?;
    Some(map_finish_reason(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_assembled_across_deltas_in_index_order() {
        let mut tool_calls = BTreeMap::new();

        let start = serde_json::json!({
            "choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 0, "id": "c1", "function": {"name": "search"}}
            ]}}]
        });
        merge_tool_call_deltas(&start, &mut tool_calls);

        let args1 = serde_json::json!({
            "choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": "{\"q\":"}}
            ]}}]
        });
        merge_tool_call_deltas(&args1, &mut tool_calls);

        let args2 = serde_json::json!({
            "choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": "\"x\"}"}}
            ]}}]
        });
        merge_tool_call_deltas(&args2, &mut tool_calls);

        let entry = tool_calls.remove(&0).unwrap();
        let (id, name, input) = finalize_tool_call(entry).unwrap();
        assert_eq!(id, "c1");
        assert_eq!(name, "search");
        assert_eq!(input["q"], "x");
    }

    #[test]
    fn empty_id_is_dropped() {
        let entry = ToolCallEntry {
            id: String::new(),
            name: "search".to_string(),
            arguments: String::new(),
        };
        assert!(finalize_tool_call(entry).is_none());
    }

    #[test]
    fn malformed_arguments_are_dropped_not_emptied() {
        let entry = ToolCallEntry {
            id: "c1".to_string(),
            name: "search".to_string(),
            arguments: "{not json".to_string(),
        };
        assert!(finalize_tool_call(entry).is_none());
    }

    #[test]
    fn finish_reason_mapping() {
        assert_eq!(map_finish_reason("stop"), FinishReason::EndTurn);
        assert_eq!(map_finish_reason("length"), FinishReason::MaxTokens);
        assert_eq!(map_finish_reason("tool_calls"), FinishReason::ToolUse);
        assert_eq!(
            map_finish_reason("content_filter"),
            FinishReason::ContentFilter
        );
    }
}
