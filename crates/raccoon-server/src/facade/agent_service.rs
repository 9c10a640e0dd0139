use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status};
use tracing::warn;

use raccoon_core::ai::types::ToolDescriptor;
use raccoon_core::orchestrator::{PublicEvent, TurnRequest};
use raccoon_core::tools::descriptor::ToolSchema;
use raccoon_core::tools::ToolRegistry;

use crate::pb;
use crate::pb::agent_service_server::AgentService;

use super::convert::{approval_scope_from_wire, turn_config_from_wire, turn_event_from_public, turn_message_from_wire};
use super::AppState;

pub struct AgentServiceImpl {
    state: Arc<AppState>,
}

impl AgentServiceImpl {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

type TurnEventStream = Pin<Box<dyn Stream<Item = Result<pb::TurnEvent, Status>> + Send>>;

#[tonic::async_trait]
impl AgentService for AgentServiceImpl {
    type ExecuteAgentStream = TurnEventStream;

    async fn execute_agent(
        &self,
        request: Request<pb::ExecuteAgentRequest>,
    ) -> Result<Response<Self::ExecuteAgentStream>, Status> {
        let req = request.into_inner();

        let messages = req
            .messages
            .iter()
            .map(turn_message_from_wire)
            .collect::<Result<Vec<_>, _>>()?;
        let config = turn_config_from_wire(
            req.config
                .as_ref()
                .ok_or_else(|| Status::invalid_argument("missing config"))?,
        )?;

        let turn_request = TurnRequest {
            conversation_id: req.conversation_id,
            agent_id: req.agent_id,
            messages,
            config,
            api_key: req.api_key,
        };

        let (event_rx, approval_handle) = self
            .state
            .orchestrator
            .run_turn(turn_request)
            .await
            .map_err(|e| Status::failed_precondition(e.to_string()))?;

        let pending_approvals = Arc::clone(&self.state.pending_approvals);
        let stream = UnboundedReceiverStream::new(event_rx).then(move |event| {
            let pending_approvals = Arc::clone(&pending_approvals);
            let approval_handle = approval_handle.clone();
            async move {
                match &event {
                    PublicEvent::ApprovalRequested { request_id, .. } => {
                        pending_approvals
                            .write()
                            .await
                            .insert(request_id.clone(), approval_handle);
                    }
                    PublicEvent::ToolResult { request_id, .. } => {
                        pending_approvals.write().await.remove(request_id);
                    }
                    _ => {}
                }
                Ok(turn_event_from_public(event))
            }
        });

        Ok(Response::new(Box::pin(stream)))
    }

    async fn get_agent_config(
        &self,
        _request: Request<pb::GetAgentConfigRequest>,
    ) -> Result<Response<pb::GetAgentConfigResponse>, Status> {
        let settings = &self.state.settings;
        Ok(Response::new(pb::GetAgentConfigResponse {
            default_model: settings.default_model.clone(),
            agent_turn_deadline_seconds: settings.agent_turn_deadline.as_secs(),
            tool_call_deadline_seconds: settings.tool_call_deadline.as_secs(),
        }))
    }

    async fn validate_tools(
        &self,
        request: Request<pb::ValidateToolsRequest>,
    ) -> Result<Response<pb::ValidateToolsResponse>, Status> {
        let req = request.into_inner();

        let descriptors: Vec<ToolDescriptor> = req
            .tools
            .iter()
            .map(|t| {
                let input_schema = if t.input_schema_json.is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(&t.input_schema_json).unwrap_or(serde_json::json!({}))
                };
                ToolDescriptor {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema,
                    requires_approval: t.requires_approval,
                }
            })
            .collect();

        // Request-scoped registry: the submitted descriptors are candidates
        // to validate against, not tools the server locally executes.
        let scratch = ToolRegistry::new();
        for tool in &descriptors {
            scratch
                .register_schema_only(&tool.name, ToolSchema::from_json_schema(&tool.input_schema))
                .await;
        }

        let mut errors = std::collections::HashMap::new();
        for (name, args_json) in &req.arguments_json {
            let args: serde_json::Value = match serde_json::from_str(args_json) {
                Ok(v) => v,
                Err(e) => {
                    errors.insert(
                        name.clone(),
                        pb::ToolValidationErrors {
                            errors: vec![format!("invalid arguments JSON: {e}")],
                        },
                    );
                    continue;
                }
            };
            let tool_errors = scratch.validate(name, &args).await;
            if !tool_errors.is_empty() {
                errors.insert(name.clone(), pb::ToolValidationErrors { errors: tool_errors });
            }
        }

        Ok(Response::new(pb::ValidateToolsResponse { errors }))
    }

    async fn submit_approval(
        &self,
        request: Request<pb::SubmitApprovalRequest>,
    ) -> Result<Response<pb::SubmitApprovalResponse>, Status> {
        let req = request.into_inner();
        let scope = approval_scope_from_wire(&req.scope)?;

        let handle = self
            .state
            .pending_approvals
            .write()
            .await
            .remove(&req.request_id);

        let Some(handle) = handle else {
            warn!(request_id = %req.request_id, "submit_approval for unknown or already-resolved request");
            return Ok(Response::new(pb::SubmitApprovalResponse { accepted: false }));
        };

        handle
            .submit(&req.request_id, req.approved, scope)
            .await
            .map_err(|e| Status::not_found(e.to_string()))?;

        Ok(Response::new(pb::SubmitApprovalResponse { accepted: true }))
    }
}
