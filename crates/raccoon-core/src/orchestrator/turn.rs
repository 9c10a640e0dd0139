//! The turn loop: the single task that drives one agent turn from provider
//! stream to public event stream.
//!
//! Shaped after the teacher's `AgenticOrchestrator::run` (spawn a task,
//! return `(event_rx, input)` to the caller, emit everything as it
//! happens) but collapsed to a single provider call per turn — this system
//! has no multi-iteration tool-call loop, a provider's `complete` event
//! ends the turn.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{error, warn};

use crate::ai::provider::ProviderCache;
use crate::ai::types::{FinishReason, ToolDescriptor, TurnConfig, TurnMessage, Vendor};
use crate::ai::unified::UnifiedEvent;
use crate::config::Settings;
use crate::error::{OrchestratorError, RegistryError};
use crate::status::{StatusCategory, StatusPicker};
use crate::tools::registry::ToolRegistry;
use crate::tools::remote::RemoteToolClient;
use crate::tools::truncation::truncate_tail;

use super::approval::{ApprovalDecision, ApprovalRegistry, ApprovalScope as InternalScope};
use super::code_block::CodeBlockDetector;
use super::public_event::{ApprovalScope, PublicEvent};

/// Tool output beyond this is tail-truncated before it reaches the public
/// event stream — a single runaway tool should not blow up the turn's
/// message size on the wire.
const MAX_TOOL_RESULT_LINES: usize = 200;
const MAX_TOOL_RESULT_BYTES: usize = 16 * 1024;

/// Everything needed to drive one turn.
pub struct TurnRequest {
    pub conversation_id: String,
    pub agent_id: String,
    pub messages: Vec<TurnMessage>,
    pub config: TurnConfig,
    /// Bring-your-own-key: bypasses the provider cache for this turn only.
    pub api_key: Option<String>,
}

/// Shared, long-lived services the orchestrator needs. One instance serves
/// every concurrent turn; nothing here is turn-scoped.
pub struct Orchestrator {
    provider_cache: Arc<ProviderCache>,
    registry: Arc<ToolRegistry>,
    remote_client: Arc<RemoteToolClient>,
    settings: Arc<Settings>,
}

/// Handle for submitting an out-of-band approval decision into a running
/// turn. Cheap to clone; shares the turn's approval table.
#[derive(Clone)]
pub struct ApprovalHandle {
    registry: ApprovalRegistry,
}

impl ApprovalHandle {
    pub async fn submit(
        &self,
        request_id: &str,
        approved: bool,
        scope: ApprovalScope,
    ) -> Result<(), super::approval::ApprovalError> {
        self.registry
            .submit_decision(
                request_id,
                ApprovalDecision {
                    approved,
                    scope: to_internal_scope(scope),
                },
            )
            .await
    }
}

fn to_internal_scope(scope: ApprovalScope) -> InternalScope {
    match scope {
        ApprovalScope::AllowOnce => InternalScope::AllowOnce,
        ApprovalScope::AllowForSession => InternalScope::AllowForSession,
        ApprovalScope::AlwaysForAgentTool => InternalScope::AlwaysForAgentTool,
    }
}

impl Orchestrator {
    pub fn new(
        provider_cache: Arc<ProviderCache>,
        registry: Arc<ToolRegistry>,
        remote_client: Arc<RemoteToolClient>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            provider_cache,
            registry,
            remote_client,
            settings,
        }
    }

    /// Start a turn. Configuration errors (unknown model, missing
    /// credential) are returned synchronously here and never reach the
    /// event stream; everything else is reported as a terminal `error`
    /// event from the spawned task.
    pub async fn run_turn(
        &self,
        request: TurnRequest,
    ) -> Result<(mpsc::UnboundedReceiver<PublicEvent>, ApprovalHandle), OrchestratorError> {
        let vendor = Vendor::from_model(&request.config.model)
            .ok_or_else(|| OrchestratorError::UnknownModel(request.config.model.clone()))?;

        let provider = match &request.api_key {
            Some(key) => self.provider_cache.build_with_key(vendor, key.clone())?,
            None => self.provider_cache.get_or_init(vendor).await?,
        };

        let approval_registry = ApprovalRegistry::new();
        let handle = ApprovalHandle {
            registry: approval_registry.clone(),
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let registry = Arc::clone(&self.registry);
        let remote_client = Arc::clone(&self.remote_client);
        let tool_call_deadline = self.settings.tool_call_deadline;
        let turn_deadline = Duration::from_secs(request.config.deadline_seconds);

        tokio::spawn(async move {
            let fut = run_inner(
                provider,
                request.messages,
                request.config,
                registry,
                remote_client,
                approval_registry,
                tool_call_deadline,
                event_tx.clone(),
            );

            match timeout(turn_deadline, fut).await {
                Ok(()) => {}
                Err(_) => {
                    let _ = event_tx.send(PublicEvent::deadline_exceeded());
                }
            }
        });

        Ok((event_rx, handle))
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_inner(
    provider: Arc<dyn crate::ai::provider::Provider>,
    messages: Vec<TurnMessage>,
    config: TurnConfig,
    registry: Arc<ToolRegistry>,
    remote_client: Arc<RemoteToolClient>,
    approval_registry: ApprovalRegistry,
    tool_call_deadline: Duration,
    event_tx: mpsc::UnboundedSender<PublicEvent>,
) {
    let mut status = StatusPicker::new();
    if event_tx
        .send(PublicEvent::Status {
            message: status.pick(StatusCategory::Thinking).to_string(),
            category: StatusCategory::Thinking.as_str().to_string(),
        })
        .is_err()
    {
        return;
    }

    let mut rx = match provider.stream_turn(&messages, &config).await {
        Ok(rx) => rx,
        Err(e) => {
            let _ = event_tx.send(PublicEvent::internal_error(e.to_string()));
            return;
        }
    };

    let mut code_blocks = CodeBlockDetector::new();
    let model = config.model.clone();

    while let Some(event) = rx.recv().await {
        match event {
            UnifiedEvent::Token { text } => {
                if let Some(block) = code_blocks.push(&text) {
                    if event_tx.send(PublicEvent::Token { text }).is_err() {
                        return;
                    }
                    if event_tx
                        .send(PublicEvent::CodeBlock {
                            language: block.language,
                            code: block.code,
                            filename: String::new(),
                        })
                        .is_err()
                    {
                        return;
                    }
                } else if event_tx.send(PublicEvent::Token { text }).is_err() {
                    return;
                }
            }
            UnifiedEvent::ToolUse { id, name, input } => {
                if !dispatch_tool_call(
                    &id,
                    &name,
                    input,
                    &config,
                    &registry,
                    &remote_client,
                    &approval_registry,
                    tool_call_deadline,
                    &mut status,
                    &event_tx,
                )
                .await
                {
                    return;
                }
            }
            UnifiedEvent::ToolUseStart { .. } | UnifiedEvent::ToolInputDelta { .. } => {
                // Internal to the provider adapter's own assembly; the
                // orchestrator only reacts once a tool call is complete.
            }
            UnifiedEvent::Complete { usage, stop_reason } => {
                let _ = event_tx.send(PublicEvent::complete(&model, &stop_reason, usage));
                return;
            }
        }
    }

    // Stream closed without a terminal `complete` — treat as a malformed
    // upstream condition rather than silently ending.
    let _ = event_tx.send(PublicEvent::internal_error(
        "provider stream ended without a completion event",
    ));
}

#[allow(clippy::too_many_arguments)]
async fn dispatch_tool_call(
    id: &str,
    name: &str,
    input: Value,
    config: &TurnConfig,
    registry: &Arc<ToolRegistry>,
    remote_client: &Arc<RemoteToolClient>,
    approval_registry: &ApprovalRegistry,
    tool_call_deadline: Duration,
    status: &mut StatusPicker,
    event_tx: &mpsc::UnboundedSender<PublicEvent>,
) -> bool {
    let requires_approval = tool_descriptor(config, name)
        .map(|t| t.requires_approval)
        .unwrap_or(false);

    if requires_approval {
        if event_tx
            .send(PublicEvent::ApprovalRequested {
                request_id: id.to_string(),
                tool_name: name.to_string(),
                arguments_preview: input.clone(),
                available_scopes: vec![
                    ApprovalScope::AllowOnce,
                    ApprovalScope::AllowForSession,
                    ApprovalScope::AlwaysForAgentTool,
                ],
            })
            .is_err()
        {
            return false;
        }

        let waiter = approval_registry.begin(id).await;
        if event_tx
            .send(PublicEvent::AwaitingApproval {
                request_id: id.to_string(),
            })
            .is_err()
        {
            return false;
        }

        let decision = waiter.wait().await;
        let approved = decision.map(|d| d.approved).unwrap_or(false);
        if !approved {
            return event_tx
                .send(PublicEvent::ToolResult {
                    request_id: id.to_string(),
                    tool_name: name.to_string(),
                    result: "Tool execution denied by user".to_string(),
                    is_error: true,
                })
                .is_ok();
        }
    }

    let lower = name.to_ascii_lowercase();
    let category = if lower.contains("search") {
        Some(StatusCategory::Searching)
    } else if lower.contains("code") || lower.contains("exec") {
        Some(StatusCategory::Coding)
    } else {
        None
    };
    if let Some(category) = category {
        if event_tx
            .send(PublicEvent::Status {
                message: status.pick(category).to_string(),
                category: category.as_str().to_string(),
            })
            .is_err()
        {
            return false;
        }
    }

    if event_tx
        .send(PublicEvent::ToolCall {
            request_id: id.to_string(),
            tool_name: name.to_string(),
            arguments: input.clone(),
        })
        .is_err()
    {
        return false;
    }

    let result = timeout(
        tool_call_deadline,
        execute_tool(registry, remote_client, name, input),
    )
    .await;

    let (result_text, is_error) = match result {
        Ok(Ok(value)) => (stringify_tool_result(value), false),
        Ok(Err(message)) => (message, true),
        Err(_) => ("Tool execution timed out".to_string(), true),
    };
    let result_text = if is_error {
        result_text
    } else {
        let truncated = truncate_tail(&result_text, MAX_TOOL_RESULT_LINES, MAX_TOOL_RESULT_BYTES);
        match truncated.notice() {
            Some(notice) => format!("{}{}", truncated.text, notice),
            None => truncated.text,
        }
    };

    event_tx
        .send(PublicEvent::ToolResult {
            request_id: id.to_string(),
            tool_name: name.to_string(),
            result: result_text,
            is_error,
        })
        .is_ok()
}

/// Render a successful tool result the way the ground-truth runtime's
/// `str(result)` does: a string value passes through unquoted, anything
/// else is JSON-encoded.
fn stringify_tool_result(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => serde_json::to_string(&other).unwrap_or_default(),
    }
}

fn tool_descriptor<'a>(config: &'a TurnConfig, name: &str) -> Option<&'a ToolDescriptor> {
    config.tools.iter().find(|t| t.name == name)
}

/// Route a tool call: try the local registry first; a tool declared but
/// without a local handler is routed to the remote client using the
/// `server:tool` naming convention (the server name is the prefix before
/// the first colon in the tool's advertised name).
async fn execute_tool(
    registry: &Arc<ToolRegistry>,
    remote_client: &Arc<RemoteToolClient>,
    name: &str,
    input: Value,
) -> Result<Value, String> {
    match registry.execute(name, input.clone()).await {
        Ok(value) => Ok(value),
        Err(RegistryError::NoHandler(_)) => {
            let Some((server, tool)) = name.split_once(':') else {
                warn!(tool = name, "no local handler and no server prefix to route to");
                return Err(format!("no handler registered for tool: {name}"));
            };
            remote_client
                .call(server, tool, input, Duration::from_secs(120))
                .await
                .map_err(|e| e.to_string())
        }
        Err(e) => {
            error!(tool = name, error = %e, "tool execution failed");
            Err(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::descriptor::ToolSchema;
    use async_trait::async_trait;
    use std::sync::Arc as StdArc;

    struct ScriptedProvider {
        events: std::sync::Mutex<Vec<UnifiedEvent>>,
    }

    #[async_trait]
    impl crate::ai::provider::Provider for ScriptedProvider {
        fn vendor(&self) -> Vendor {
            Vendor::Anthropic
        }

        async fn stream_turn(
            &self,
            _messages: &[TurnMessage],
            _config: &TurnConfig,
        ) -> Result<mpsc::UnboundedReceiver<UnifiedEvent>, OrchestratorError> {
            let (tx, rx) = mpsc::unbounded_channel();
            let events = std::mem::take(&mut *self.events.lock().unwrap());
            tokio::spawn(async move {
                for event in events {
                    let _ = tx.send(event);
                }
            });
            Ok(rx)
        }
    }

    async fn collect(mut rx: mpsc::UnboundedReceiver<PublicEvent>) -> Vec<PublicEvent> {
        let mut out = Vec::new();
        while let Some(event) = rx.recv().await {
            out.push(event);
        }
        out
    }

    fn base_config() -> TurnConfig {
        TurnConfig {
            model: "claude-sonnet-4-6".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn plain_text_turn_emits_tokens_then_complete() {
        let provider: StdArc<dyn crate::ai::provider::Provider> = StdArc::new(ScriptedProvider {
            events: std::sync::Mutex::new(vec![
                UnifiedEvent::Token { text: "he".into() },
                UnifiedEvent::Token { text: "llo".into() },
                UnifiedEvent::Token { text: "!".into() },
                UnifiedEvent::Complete {
                    usage: crate::ai::types::Usage {
                        prompt_tokens: 1,
                        completion_tokens: 3,
                        total_tokens: 4,
                    },
                    stop_reason: FinishReason::EndTurn,
                },
            ]),
        });

        let registry = StdArc::new(ToolRegistry::new());
        let remote = StdArc::new(RemoteToolClient::new());
        let approval_registry = ApprovalRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();

        run_inner(
            provider,
            vec![TurnMessage {
                role: crate::ai::types::Role::User,
                content: "hi".into(),
            }],
            base_config(),
            registry,
            remote,
            approval_registry,
            Duration::from_secs(20),
            tx,
        )
        .await;

        let events = collect(rx).await;
        assert!(matches!(events[0], PublicEvent::Status { .. }));
        assert!(matches!(&events[1], PublicEvent::Token { text } if text == "he"));
        assert!(matches!(&events[2], PublicEvent::Token { text } if text == "llo"));
        assert!(matches!(&events[3], PublicEvent::Token { text } if text == "!"));
        assert!(matches!(events.last().unwrap(), PublicEvent::Complete { total_tokens: 4, .. }));
    }

    #[tokio::test]
    async fn auto_executed_tool_emits_call_then_result() {
        struct EchoHandler;
        #[async_trait]
        impl crate::tools::registry::ToolHandler for EchoHandler {
            async fn call(&self, _args: Value) -> Result<Value, String> {
                Ok(Value::String("ok".into()))
            }
        }

        let registry = StdArc::new(ToolRegistry::new());
        registry
            .register("search", ToolSchema::default(), Some(StdArc::new(EchoHandler)))
            .await;

        let provider: StdArc<dyn crate::ai::provider::Provider> = StdArc::new(ScriptedProvider {
            events: std::sync::Mutex::new(vec![
                UnifiedEvent::ToolUse {
                    id: "t1".into(),
                    name: "search".into(),
                    input: serde_json::json!({"q": "x"}),
                },
                UnifiedEvent::Complete {
                    usage: Default::default(),
                    stop_reason: FinishReason::ToolUse,
                },
            ]),
        });

        let remote = StdArc::new(RemoteToolClient::new());
        let approval_registry = ApprovalRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut config = base_config();
        config.tools.push(ToolDescriptor {
            name: "search".into(),
            description: String::new(),
            input_schema: serde_json::json!({}),
            requires_approval: false,
        });

        run_inner(
            provider,
            vec![],
            config,
            registry,
            remote,
            approval_registry,
            Duration::from_secs(20),
            tx,
        )
        .await;

        let events = collect(rx).await;
        assert!(events
            .iter()
            .any(|e| matches!(e, PublicEvent::Status { category, .. } if category == "searching")));
        assert!(events.iter().any(|e| matches!(
            e,
            PublicEvent::ToolCall { request_id, .. } if request_id == "t1"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            PublicEvent::ToolResult { request_id, result, is_error: false, .. }
                if request_id == "t1" && result == "ok"
        )));
    }

    #[tokio::test]
    async fn string_tool_result_passes_through_unquoted() {
        assert_eq!(stringify_tool_result(Value::String("ok".to_string())), "ok");
        assert_eq!(
            stringify_tool_result(serde_json::json!({"a": 1})),
            "{\"a\":1}"
        );
    }

    #[tokio::test]
    async fn approval_denied_skips_tool_call_event() {
        let registry = StdArc::new(ToolRegistry::new());
        let provider: StdArc<dyn crate::ai::provider::Provider> = StdArc::new(ScriptedProvider {
            events: std::sync::Mutex::new(vec![
                UnifiedEvent::ToolUse {
                    id: "t2".into(),
                    name: "delete_everything".into(),
                    input: serde_json::json!({}),
                },
                UnifiedEvent::Complete {
                    usage: Default::default(),
                    stop_reason: FinishReason::ToolUse,
                },
            ]),
        });
        let remote = StdArc::new(RemoteToolClient::new());
        let approval_registry = ApprovalRegistry::new();
        let approval_registry_clone = approval_registry.clone();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut config = base_config();
        config.tools.push(ToolDescriptor {
            name: "delete_everything".into(),
            description: String::new(),
            input_schema: serde_json::json!({}),
            requires_approval: true,
        });

        tokio::spawn(async move {
            // Give the turn a moment to register the pending approval.
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = approval_registry_clone
                .submit_decision(
                    "t2",
                    ApprovalDecision {
                        approved: false,
                        scope: InternalScope::AllowOnce,
                    },
                )
                .await;
        });

        run_inner(
            provider,
            vec![],
            config,
            registry,
            remote,
            approval_registry,
            Duration::from_secs(20),
            tx,
        )
        .await;

        let events = collect(rx).await;
        assert!(!events.iter().any(|e| matches!(e, PublicEvent::ToolCall { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            PublicEvent::ToolResult { is_error: true, result, .. } if result == "Tool execution denied by user"
        )));
    }

    #[tokio::test]
    async fn tool_deadline_reports_timeout_not_a_hang() {
        struct SlowHandler;
        #[async_trait]
        impl crate::tools::registry::ToolHandler for SlowHandler {
            async fn call(&self, _args: Value) -> Result<Value, String> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Value::Null)
            }
        }

        let registry = StdArc::new(ToolRegistry::new());
        registry
            .register("slow", ToolSchema::default(), Some(StdArc::new(SlowHandler)))
            .await;

        let provider: StdArc<dyn crate::ai::provider::Provider> = StdArc::new(ScriptedProvider {
            events: std::sync::Mutex::new(vec![
                UnifiedEvent::ToolUse {
                    id: "t3".into(),
                    name: "slow".into(),
                    input: serde_json::json!({}),
                },
                UnifiedEvent::Complete {
                    usage: Default::default(),
                    stop_reason: FinishReason::ToolUse,
                },
            ]),
        });
        let remote = StdArc::new(RemoteToolClient::new());
        let approval_registry = ApprovalRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut config = base_config();
        config.tools.push(ToolDescriptor {
            name: "slow".into(),
            description: String::new(),
            input_schema: serde_json::json!({}),
            requires_approval: false,
        });

        run_inner(
            provider,
            vec![],
            config,
            registry,
            remote,
            approval_registry,
            Duration::from_millis(50),
            tx,
        )
        .await;

        let events = collect(rx).await;
        assert!(events.iter().any(|e| matches!(
            e,
            PublicEvent::ToolResult { is_error: true, result, .. } if result == "Tool execution timed out"
        )));
    }
}
