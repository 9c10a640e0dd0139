//! Sandbox lifecycle: credential gating, handle bookkeeping, and the
//! bounded streaming hand-off between a backend's execution task and the
//! caller consuming [`SandboxEvent`]s.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tracing::info;

use crate::config::Settings;
use crate::error::SandboxError;

use super::backend::{SandboxBackend, SandboxEvent, SandboxLimits};

/// Depth of the producer/consumer channel between a backend's reader tasks
/// and the stream handed back to the caller. Bounded so a runaway producer
/// of output cannot grow memory unboundedly ahead of a slow consumer.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct SandboxInfo {
    pub sandbox_id: String,
    pub conversation_id: String,
    pub template: String,
    pub limits: SandboxLimits,
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub path: String,
    pub size_bytes: usize,
}

struct Entry {
    info: SandboxInfo,
}

pub struct SandboxManager {
    backend: Arc<dyn SandboxBackend>,
    settings: Settings,
    sandboxes: RwLock<HashMap<String, Entry>>,
}

impl SandboxManager {
    pub fn new(backend: Arc<dyn SandboxBackend>, settings: Settings) -> Self {
        Self {
            backend,
            settings,
            sandboxes: RwLock::new(HashMap::new()),
        }
    }

    /// The spec's hardcoded no-override default — `{cpu:2, memory_mb:512,
    /// timeout_seconds:config.sandbox_timeout, network:true}` — not the
    /// `SANDBOX_MAX_CPU`/`SANDBOX_MAX_MEMORY_MB` ceiling settings, which only
    /// bound an explicitly-supplied `limits` elsewhere.
    fn default_limits(&self) -> SandboxLimits {
        SandboxLimits {
            cpu: 2,
            memory_mb: 512,
            timeout_seconds: self.settings.sandbox_timeout.as_secs(),
            network: true,
        }
    }

    pub async fn create(
        &self,
        conversation_id: &str,
        template: &str,
        limits: Option<SandboxLimits>,
    ) -> Result<SandboxInfo, SandboxError> {
        if self.settings.e2b_api_key.is_empty() {
            return Err(SandboxError::MissingCredential);
        }

        let limits = limits.unwrap_or_else(|| self.default_limits());
        let sandbox_id = self.backend.create(template, limits).await?;

        let info = SandboxInfo {
            sandbox_id: sandbox_id.clone(),
            conversation_id: conversation_id.to_string(),
            template: template.to_string(),
            limits,
        };

        info!(sandbox_id = %sandbox_id, conversation_id, template, "sandbox created");
        self.sandboxes
            .write()
            .await
            .insert(sandbox_id, Entry { info: info.clone() });
        Ok(info)
    }

    /// Stream execution events for `sandbox_id`. The returned receiver
    /// yields `Stdout`/`Stderr` events as the backend produces them, then a
    /// single terminal `Result` or `Error` event, then closes.
    pub async fn execute(
        &self,
        sandbox_id: &str,
        code: String,
        language: String,
    ) -> Result<mpsc::Receiver<SandboxEvent>, SandboxError> {
        if !self.sandboxes.read().await.contains_key(sandbox_id) {
            return Err(SandboxError::UnknownSandbox(sandbox_id.to_string()));
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let backend = self.backend.clone();
        let handle = sandbox_id.to_string();

        tokio::spawn(async move {
            if let Err(e) = backend.execute(&handle, &code, &language, tx.clone()).await {
                let _ = tx
                    .send(SandboxEvent::Error {
                        code: "backend_error".to_string(),
                        message: e.to_string(),
                    })
                    .await;
            }
        });

        Ok(rx)
    }

    pub async fn upload(
        &self,
        sandbox_id: &str,
        path: &str,
        bytes: &[u8],
    ) -> Result<UploadResult, SandboxError> {
        if !self.sandboxes.read().await.contains_key(sandbox_id) {
            return Err(SandboxError::UnknownSandbox(sandbox_id.to_string()));
        }
        let size_bytes = self.backend.upload(sandbox_id, path, bytes).await?;
        Ok(UploadResult {
            path: path.to_string(),
            size_bytes,
        })
    }

    /// Idempotent: destroying an unknown or already-destroyed sandbox is a
    /// no-op, matching `disconnect`/`unregister`'s contract elsewhere in the
    /// workspace.
    pub async fn destroy(&self, sandbox_id: &str) -> Result<(), SandboxError> {
        if self.sandboxes.write().await.remove(sandbox_id).is_some() {
            self.backend.destroy(sandbox_id).await?;
            info!(sandbox_id, "sandbox destroyed");
        }
        Ok(())
    }

    pub async fn destroy_all(&self) -> Result<(), SandboxError> {
        let ids: Vec<String> = self.sandboxes.write().await.drain().map(|(id, _)| id).collect();
        for id in ids {
            self.backend.destroy(&id).await?;
            info!(sandbox_id = %id, "sandbox destroyed");
        }
        Ok(())
    }
}

/// Waits for the next event with a short timeout so the drain loop can
/// promptly notice the producer has stopped, rather than blocking forever
/// on `recv`.
pub async fn drain_with_timeout(
    rx: &mut mpsc::Receiver<SandboxEvent>,
    timeout: Duration,
) -> Option<SandboxEvent> {
    tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SimulatedBackend;

    fn settings_with_key() -> Settings {
        Settings {
            e2b_api_key: "test-key".to_string(),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn create_without_credential_is_an_error() {
        let manager = SandboxManager::new(Arc::new(SimulatedBackend::new()), Settings::default());
        let err = manager.create("conv1", "python", None).await.unwrap_err();
        assert!(matches!(err, SandboxError::MissingCredential));
    }

    #[tokio::test]
    async fn create_with_no_limits_uses_the_spec_hardcoded_default() {
        let manager = SandboxManager::new(Arc::new(SimulatedBackend::new()), settings_with_key());
        let info = manager.create("conv1", "python", None).await.unwrap();
        assert_eq!(info.limits.cpu, 2);
        assert_eq!(info.limits.memory_mb, 512);
        manager.destroy(&info.sandbox_id).await.unwrap();
    }

    #[tokio::test]
    async fn execute_on_unknown_sandbox_is_an_error() {
        let manager = SandboxManager::new(Arc::new(SimulatedBackend::new()), settings_with_key());
        let err = manager
            .execute("ghost", "print(1)".to_string(), "python".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::UnknownSandbox(_)));
    }

    #[tokio::test]
    async fn execute_streams_stdout_then_result() {
        let manager = SandboxManager::new(Arc::new(SimulatedBackend::new()), settings_with_key());
        let info = manager.create("conv1", "python", None).await.unwrap();

        let mut rx = manager
            .execute(&info.sandbox_id, "print('ok')".to_string(), "python".to_string())
            .await
            .unwrap();

        let mut saw_result = false;
        while let Some(event) = drain_with_timeout(&mut rx, Duration::from_secs(5)).await {
            if let SandboxEvent::Result { exit_code, .. } = event {
                assert_eq!(exit_code, 0);
                saw_result = true;
            }
        }
        assert!(saw_result);
        manager.destroy(&info.sandbox_id).await.unwrap();
    }

    #[tokio::test]
    async fn destroy_and_destroy_all_are_idempotent() {
        let manager = SandboxManager::new(Arc::new(SimulatedBackend::new()), settings_with_key());
        let info = manager.create("conv1", "python", None).await.unwrap();
        manager.destroy(&info.sandbox_id).await.unwrap();
        manager.destroy(&info.sandbox_id).await.unwrap();
        manager.destroy_all().await.unwrap();
        manager.destroy_all().await.unwrap();
    }
}
