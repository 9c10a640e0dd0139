//! In-process stand-in for a real sandbox provider (e.g. E2B).
//!
//! Each sandbox is a scratch directory under the system temp dir; `execute`
//! actually runs the requested snippet with `python3`/`bash` via
//! [`tokio::process::Command`], same spawn-and-stream shape as the teacher's
//! [`ProcessRegistry`](../../../honeycomb-Technolgies-Krusty reference) —
//! except here stdout/stderr are piped rather than discarded, and forwarded
//! line-by-line into the caller's channel as they arrive.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, RwLock};

use crate::error::SandboxError;

use super::backend::{SandboxBackend, SandboxEvent, SandboxLimits};

struct SandboxDir {
    path: PathBuf,
    #[allow(dead_code)]
    limits: SandboxLimits,
}

/// Runs real subprocesses in a scratch directory per sandbox. No resource
/// limits are actually enforced against the host process — `limits` is
/// recorded for parity with a real backend but otherwise advisory here.
#[derive(Default)]
pub struct SimulatedBackend {
    sandboxes: RwLock<HashMap<String, SandboxDir>>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn command_for(dir: &PathBuf, language: &str, code: &str) -> Result<Command, SandboxError> {
        let mut cmd = match language {
            "python" | "python3" => {
                let mut c = Command::new("python3");
                c.arg("-c").arg(code);
                c
            }
            "bash" | "sh" => {
                let mut c = Command::new("bash");
                c.arg("-c").arg(code);
                c
            }
            other => {
                return Err(SandboxError::Backend(format!(
                    "unsupported sandbox language: {other}"
                )))
            }
        };
        cmd.current_dir(dir);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        Ok(cmd)
    }
}

#[async_trait]
impl SandboxBackend for SimulatedBackend {
    async fn create(&self, _template: &str, limits: SandboxLimits) -> Result<String, SandboxError> {
        let handle = uuid::Uuid::new_v4().to_string();
        let path = std::env::temp_dir().join(format!("raccoon-sandbox-{handle}"));
        tokio::fs::create_dir_all(&path).await?;
        self.sandboxes
            .write()
            .await
            .insert(handle.clone(), SandboxDir { path, limits });
        Ok(handle)
    }

    async fn execute(
        &self,
        handle: &str,
        code: &str,
        language: &str,
        events: mpsc::Sender<SandboxEvent>,
    ) -> Result<(), SandboxError> {
        let dir = {
            let sandboxes = self.sandboxes.read().await;
            let entry = sandboxes
                .get(handle)
                .ok_or_else(|| SandboxError::UnknownSandbox(handle.to_string()))?;
            entry.path.clone()
        };

        let mut cmd = match Self::command_for(&dir, language, code) {
            Ok(cmd) => cmd,
            Err(e) => {
                let _ = events
                    .send(SandboxEvent::Error {
                        code: "unsupported_language".to_string(),
                        message: e.to_string(),
                    })
                    .await;
                return Ok(());
            }
        };

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let _ = events
                    .send(SandboxEvent::Error {
                        code: "spawn_failed".to_string(),
                        message: e.to_string(),
                    })
                    .await;
                return Ok(());
            }
        };

        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        let stdout_events = events.clone();
        let stdout_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let _ = stdout_events
                    .send(SandboxEvent::Stdout {
                        text: format!("{line}\n"),
                    })
                    .await;
            }
        });

        let stderr_events = events.clone();
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let _ = stderr_events
                    .send(SandboxEvent::Stderr {
                        text: format!("{line}\n"),
                    })
                    .await;
            }
        });

        let status = child.wait().await?;
        let _ = stdout_task.await;
        let _ = stderr_task.await;

        let files = list_files(&dir).await.unwrap_or_default();
        let _ = events
            .send(SandboxEvent::Result {
                output: String::new(),
                files,
                exit_code: status.code().unwrap_or(-1),
            })
            .await;

        Ok(())
    }

    async fn upload(&self, handle: &str, path: &str, bytes: &[u8]) -> Result<usize, SandboxError> {
        let dir = {
            let sandboxes = self.sandboxes.read().await;
            let entry = sandboxes
                .get(handle)
                .ok_or_else(|| SandboxError::UnknownSandbox(handle.to_string()))?;
            entry.path.clone()
        };
        let target = dir.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        Ok(bytes.len())
    }

    async fn destroy(&self, handle: &str) -> Result<(), SandboxError> {
        if let Some(entry) = self.sandboxes.write().await.remove(handle) {
            let _ = tokio::fs::remove_dir_all(&entry.path).await;
        }
        Ok(())
    }
}

async fn list_files(dir: &PathBuf) -> Result<Vec<String>, std::io::Error> {
    let mut out = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            out.push(name.to_string());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> SandboxLimits {
        SandboxLimits {
            cpu: 2,
            memory_mb: 512,
            timeout_seconds: 30,
            network: true,
        }
    }

    #[tokio::test]
    async fn python_stdout_is_forwarded_then_result() {
        let backend = SimulatedBackend::new();
        let handle = backend.create("python", limits()).await.unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        backend
            .execute(&handle, "print('hi')", "python", tx)
            .await
            .unwrap();

        let mut saw_stdout = false;
        let mut saw_result = false;
        while let Some(event) = rx.recv().await {
            match event {
                SandboxEvent::Stdout { text } => {
                    assert_eq!(text, "hi\n");
                    saw_stdout = true;
                }
                SandboxEvent::Result { exit_code, .. } => {
                    assert_eq!(exit_code, 0);
                    saw_result = true;
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert!(saw_stdout && saw_result);
        backend.destroy(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_sandbox_is_an_error() {
        let backend = SimulatedBackend::new();
        let (tx, _rx) = mpsc::channel(16);
        let err = backend
            .execute("ghost", "print(1)", "python", tx)
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::UnknownSandbox(_)));
    }

    #[tokio::test]
    async fn unsupported_language_yields_error_event_not_a_failure() {
        let backend = SimulatedBackend::new();
        let handle = backend.create("ruby", limits()).await.unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        backend
            .execute(&handle, "puts 1", "ruby", tx)
            .await
            .unwrap();
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SandboxEvent::Error { .. }));
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let backend = SimulatedBackend::new();
        let handle = backend.create("python", limits()).await.unwrap();
        backend.destroy(&handle).await.unwrap();
        backend.destroy(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn upload_writes_bytes_under_the_sandbox_dir() {
        let backend = SimulatedBackend::new();
        let handle = backend.create("python", limits()).await.unwrap();
        let size = backend
            .upload(&handle, "data.txt", b"hello")
            .await
            .unwrap();
        assert_eq!(size, 5);
        backend.destroy(&handle).await.unwrap();
    }
}
