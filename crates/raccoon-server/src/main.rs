//! Raccoon agent runtime — process entry point.
//!
//! Loads settings from the environment, wires up the shared application
//! state (provider cache, tool registry, remote tool client, sandbox
//! manager), and serves both gRPC services on one listener.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::RwLock;
use tonic::transport::Server;

use raccoon_core::ai::provider::ProviderCache;
use raccoon_core::config::Settings;
use raccoon_core::orchestrator::Orchestrator;
use raccoon_core::sandbox::{SandboxManager, SimulatedBackend};
use raccoon_core::tools::{RemoteToolClient, ToolRegistry};
use raccoon_server::facade::{AgentServiceImpl, AppState, SandboxServiceImpl};
use raccoon_server::pb::agent_service_server::AgentServiceServer;
use raccoon_server::pb::sandbox_service_server::SandboxServiceServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let settings = Arc::new(Settings::from_env());

    let registry = Arc::new(ToolRegistry::new());
    let remote_client = Arc::new(RemoteToolClient::new());
    let provider_cache = Arc::new(ProviderCache::new(Arc::clone(&settings)));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&provider_cache),
        Arc::clone(&registry),
        Arc::clone(&remote_client),
        Arc::clone(&settings),
    ));
    let sandbox_manager = Arc::new(SandboxManager::new(
        Arc::new(SimulatedBackend::new()),
        (*settings).clone(),
    ));

    let state = Arc::new(AppState {
        orchestrator,
        registry,
        remote_client,
        sandbox_manager,
        settings: Arc::clone(&settings),
        pending_approvals: Arc::new(RwLock::new(HashMap::new())),
    });

    let addr: SocketAddr = format!("0.0.0.0:{}", settings.grpc_port).parse()?;
    tracing::info!(%addr, "starting raccoon-server");

    Server::builder()
        .max_frame_size(Some(settings.max_message_size.min(u32::MAX as usize) as u32))
        .concurrency_limit_per_connection(settings.max_workers)
        .add_service(AgentServiceServer::new(AgentServiceImpl::new(Arc::clone(&state))))
        .add_service(SandboxServiceServer::new(SandboxServiceImpl::new(state)))
        .serve(addr)
        .await?;

    Ok(())
}
