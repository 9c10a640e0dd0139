//! Pending-approval registry: a one-shot rendezvous between the turn task
//! awaiting a human decision and the out-of-band caller that supplies it.
//!
//! Grounded in the teacher's MCP client (`mcp/client.rs`), which keys a
//! `Mutex<HashMap<id, oneshot::Sender<..>>>` by request id and resolves
//! exactly one pending entry per response. Here the map is scoped to a
//! single turn rather than a whole client connection, and cleanup uses a
//! drop guard so a cancelled turn can never leak an entry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalScope {
    AllowOnce,
    AllowForSession,
    AlwaysForAgentTool,
}

#[derive(Debug, Clone, Copy)]
pub struct ApprovalDecision {
    pub approved: bool,
    /// Accepted and threaded through, but never persisted — every decision
    /// behaves like `AllowOnce` within the turn that requested it.
    pub scope: ApprovalScope,
}

#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("no pending approval for request {0}")]
    NoSuchApproval(String),
}

/// Per-turn table of outstanding approval requests.
#[derive(Clone, Default)]
pub struct ApprovalRegistry {
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<ApprovalDecision>>>>,
}

/// Drops the registry entry for `request_id` on scope exit, regardless of
/// whether the decision arrived, the wait timed out, or the turn was
/// cancelled.
pub struct ApprovalWaiter<'a> {
    registry: &'a ApprovalRegistry,
    request_id: String,
    rx: Option<oneshot::Receiver<ApprovalDecision>>,
}

impl ApprovalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `request_id` as awaiting a decision and return a waiter
    /// that cleans itself up when dropped.
    pub async fn begin(&self, request_id: &str) -> ApprovalWaiter<'_> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .await
            .insert(request_id.to_string(), tx);
        ApprovalWaiter {
            registry: self,
            request_id: request_id.to_string(),
            rx: Some(rx),
        }
    }

    /// Resolve a pending approval. Fails if no entry exists — either the
    /// id was never requested, the decision already arrived, or the turn
    /// already cleaned up on timeout/cancellation.
    pub async fn submit_decision(
        &self,
        request_id: &str,
        decision: ApprovalDecision,
    ) -> Result<(), ApprovalError> {
        let tx = self
            .pending
            .lock()
            .await
            .remove(request_id)
            .ok_or_else(|| ApprovalError::NoSuchApproval(request_id.to_string()))?;
        let _ = tx.send(decision);
        Ok(())
    }
}

impl ApprovalWaiter<'_> {
    /// Wait for the decision, or `None` if the sender side was dropped
    /// (the registry itself went away, which cannot happen while the
    /// waiter holds `self.registry`, but the channel API still models it).
    pub async fn wait(mut self) -> Option<ApprovalDecision> {
        self.rx.take().unwrap().await.ok()
    }
}

impl Drop for ApprovalWaiter<'_> {
    fn drop(&mut self) {
        let registry = self.registry.pending.clone();
        let request_id = std::mem::take(&mut self.request_id);
        tokio::spawn(async move {
            registry.lock().await.remove(&request_id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_resolves_the_waiting_receiver() {
        let registry = ApprovalRegistry::new();
        let waiter = registry.begin("r1").await;

        let registry_clone = registry.clone();
        tokio::spawn(async move {
            registry_clone
                .submit_decision(
                    "r1",
                    ApprovalDecision {
                        approved: true,
                        scope: ApprovalScope::AllowOnce,
                    },
                )
                .await
                .unwrap();
        });

        let decision = waiter.wait().await.unwrap();
        assert!(decision.approved);
    }

    #[tokio::test]
    async fn submit_with_no_pending_entry_is_an_error() {
        let registry = ApprovalRegistry::new();
        let err = registry
            .submit_decision(
                "ghost",
                ApprovalDecision {
                    approved: true,
                    scope: ApprovalScope::AllowOnce,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::NoSuchApproval(_)));
    }

    #[tokio::test]
    async fn dropping_the_waiter_cleans_up_the_entry() {
        let registry = ApprovalRegistry::new();
        {
            let _waiter = registry.begin("r2").await;
        }
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let err = registry
            .submit_decision(
                "r2",
                ApprovalDecision {
                    approved: false,
                    scope: ApprovalScope::AllowOnce,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::NoSuchApproval(_)));
    }
}
