use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

use raccoon_core::sandbox::{SandboxEvent, SandboxLimits};

use crate::pb;
use crate::pb::sandbox_service_server::SandboxService;

use super::convert::sandbox_event_from_core;
use super::AppState;

pub struct SandboxServiceImpl {
    state: Arc<AppState>,
}

impl SandboxServiceImpl {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

type SandboxEventStream = Pin<Box<dyn Stream<Item = Result<pb::SandboxEvent, Status>> + Send>>;

#[tonic::async_trait]
impl SandboxService for SandboxServiceImpl {
    async fn create_sandbox(
        &self,
        request: Request<pb::CreateSandboxRequest>,
    ) -> Result<Response<pb::CreateSandboxResponse>, Status> {
        let req = request.into_inner();

        let limits = if req.cpu.is_some() || req.memory_mb.is_some() || req.timeout_seconds.is_some() || req.network.is_some() {
            Some(SandboxLimits {
                cpu: req.cpu.unwrap_or(self.state.settings.sandbox_max_cpu),
                memory_mb: req.memory_mb.unwrap_or(self.state.settings.sandbox_max_memory_mb),
                timeout_seconds: req
                    .timeout_seconds
                    .unwrap_or(self.state.settings.sandbox_timeout.as_secs()),
                network: req.network.unwrap_or(true),
            })
        } else {
            None
        };

        let info = self
            .state
            .sandbox_manager
            .create(&req.conversation_id, &req.template, limits)
            .await
            .map_err(|e| Status::failed_precondition(e.to_string()))?;

        Ok(Response::new(pb::CreateSandboxResponse {
            sandbox_id: info.sandbox_id,
            conversation_id: info.conversation_id,
            template: info.template,
        }))
    }

    type ExecuteCodeStream = SandboxEventStream;

    async fn execute_code(
        &self,
        request: Request<pb::ExecuteCodeRequest>,
    ) -> Result<Response<Self::ExecuteCodeStream>, Status> {
        let req = request.into_inner();

        let rx = self
            .state
            .sandbox_manager
            .execute(&req.sandbox_id, req.code, req.language)
            .await
            .map_err(|e| Status::not_found(e.to_string()))?;

        let deadline = self.state.settings.code_execution_deadline;
        let (out_tx, out_rx) = tokio::sync::mpsc::channel(256);

        tokio::spawn(async move {
            let mut rx = rx;
            let drain = async {
                while let Some(event) = rx.recv().await {
                    let is_terminal = matches!(event, SandboxEvent::Result { .. } | SandboxEvent::Error { .. });
                    if out_tx.send(Ok(sandbox_event_from_core(event))).await.is_err() {
                        return;
                    }
                    if is_terminal {
                        return;
                    }
                }
            };

            if timeout(deadline, drain).await.is_err() {
                let _ = out_tx
                    .send(Ok(pb::SandboxEvent {
                        event: Some(pb::sandbox_event::Event::Error(pb::SandboxErrorEvent {
                            code: "execution_timeout".to_string(),
                            message: "sandbox code execution deadline exceeded".to_string(),
                        })),
                    }))
                    .await;
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(out_rx))))
    }

    async fn upload_file(
        &self,
        request: Request<pb::UploadFileRequest>,
    ) -> Result<Response<pb::UploadFileResponse>, Status> {
        let req = request.into_inner();
        let result = self
            .state
            .sandbox_manager
            .upload(&req.sandbox_id, &req.path, &req.content)
            .await
            .map_err(|e| Status::not_found(e.to_string()))?;

        Ok(Response::new(pb::UploadFileResponse {
            path: result.path,
            size_bytes: result.size_bytes as u64,
        }))
    }

    async fn destroy_sandbox(
        &self,
        request: Request<pb::DestroySandboxRequest>,
    ) -> Result<Response<pb::DestroySandboxResponse>, Status> {
        let req = request.into_inner();
        self.state
            .sandbox_manager
            .destroy(&req.sandbox_id)
            .await
            .map_err(|e| Status::internal(e.to_string()))?;

        Ok(Response::new(pb::DestroySandboxResponse { destroyed: true }))
    }
}
