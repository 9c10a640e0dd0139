//! Provider trait and the per-vendor instance cache.
//!
//! The cache is read-mostly and created-on-first-use; a `tokio::sync::RwLock`
//! guards the map so concurrent turns racing to populate the same vendor slot
//! observe a safe publication rather than a torn write. A BYOK turn bypasses
//! the cache entirely and builds a fresh, throwaway provider instance.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use crate::config::Settings;
use crate::error::OrchestratorError;

use super::types::{TurnConfig, TurnMessage, Vendor};
use super::unified::UnifiedEvent;

/// A streaming LLM backend. Each vendor gets one implementation; both
/// translate their wire protocol into [`UnifiedEvent`]s delivered over an
/// unbounded channel so the orchestrator is never coupled to a vendor SDK
/// type.
#[async_trait]
pub trait Provider: Send + Sync {
    fn vendor(&self) -> Vendor;

    /// Start streaming a turn. Returns a receiver the orchestrator polls;
    /// the adapter drives an internal task that decodes the vendor's wire
    /// stream and forwards [`UnifiedEvent`]s until the channel closes.
    async fn stream_turn(
        &self,
        messages: &[TurnMessage],
        config: &TurnConfig,
    ) -> Result<mpsc::UnboundedReceiver<UnifiedEvent>, OrchestratorError>;
}

/// Per-vendor provider cache, keyed by [`Vendor`] and populated on first use.
pub struct ProviderCache {
    settings: Arc<Settings>,
    instances: RwLock<HashMap<Vendor, Arc<dyn Provider>>>,
}

impl ProviderCache {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the cached provider for `vendor`, constructing and publishing
    /// one with the default process credential if this is the first call for
    /// that vendor.
    pub async fn get_or_init(
        &self,
        vendor: Vendor,
    ) -> Result<Arc<dyn Provider>, OrchestratorError> {
        if let Some(existing) = self.instances.read().await.get(&vendor) {
            return Ok(Arc::clone(existing));
        }

        let mut instances = self.instances.write().await;
        if let Some(existing) = instances.get(&vendor) {
            return Ok(Arc::clone(existing));
        }

        let provider = self.build(vendor, None)?;
        instances.insert(vendor, Arc::clone(&provider));
        Ok(provider)
    }

    /// Build a fresh, uncached provider for a caller-supplied (BYOK) key.
    pub fn build_with_key(
        &self,
        vendor: Vendor,
        api_key: String,
    ) -> Result<Arc<dyn Provider>, OrchestratorError> {
        self.build(vendor, Some(api_key))
    }

    fn build(
        &self,
        vendor: Vendor,
        api_key_override: Option<String>,
    ) -> Result<Arc<dyn Provider>, OrchestratorError> {
        match vendor {
            Vendor::Anthropic => {
                let key = api_key_override.unwrap_or_else(|| self.settings.anthropic_api_key.clone());
                if key.is_empty() {
                    return Err(OrchestratorError::MissingCredential("anthropic".into()));
                }
                Ok(Arc::new(super::anthropic::AnthropicProvider::new(key)))
            }
            Vendor::OpenAi => {
                let key = api_key_override.unwrap_or_else(|| self.settings.openai_api_key.clone());
                if key.is_empty() {
                    return Err(OrchestratorError::MissingCredential("openai".into()));
                }
                Ok(Arc::new(super::openai::OpenAiProvider::new(key)))
            }
        }
    }
}
