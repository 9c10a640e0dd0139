//! JSON-RPC-over-HTTP client for external (remote) tool servers.
//!
//! Mirrors the teacher's MCP stdio client (`mcp::client::McpClient`) one
//! transport layer over: a monotonic `AtomicI64` request-id counter and a
//! connection table mutated only at setup (`connect`/`disconnect`), read by
//! `discover`/`call`. Here the transport is HTTP POST rather than stdio, and
//! each call is bounded by the caller-supplied deadline rather than a single
//! fixed request timeout.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::RemoteToolError;

/// Bearer credential for a remote server, if it requires one.
#[derive(Debug, Clone, Default)]
pub struct RemoteAuth {
    pub token: Option<String>,
}

/// A tool descriptor returned by `tools/list`, attributed to the server
/// that advertised it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Value,
    #[serde(skip_deserializing, default)]
    pub server: String,
}

struct RemoteServerConn {
    url: String,
    auth: RemoteAuth,
    cached_tools: Vec<RemoteToolDescriptor>,
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: i64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    #[allow(dead_code)]
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct ToolsListResult {
    #[serde(default)]
    tools: Vec<RemoteToolDescriptor>,
}

pub struct RemoteToolClient {
    http: reqwest::Client,
    next_id: AtomicI64,
    connections: RwLock<HashMap<String, RemoteServerConn>>,
}

impl Default for RemoteToolClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteToolClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            next_id: AtomicI64::new(1),
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Record a server and reset its cached tool list. Reconnecting to an
    /// already-known name simply replaces the entry.
    pub async fn connect(&self, name: &str, url: &str, auth: Option<RemoteAuth>) {
        info!(server = name, url, "connecting to remote tool server");
        self.connections.write().await.insert(
            name.to_string(),
            RemoteServerConn {
                url: url.to_string(),
                auth: auth.unwrap_or_default(),
                cached_tools: Vec::new(),
            },
        );
    }

    /// Idempotent: disconnecting an unknown server is a no-op.
    pub async fn disconnect(&self, name: &str) {
        self.connections.write().await.remove(name);
    }

    /// Idempotent: calling with no connections is a no-op.
    pub async fn disconnect_all(&self) {
        self.connections.write().await.clear();
    }

    /// Discover tools from one server (`name = Some(..)`) or every
    /// connected server. Each returned descriptor is attributed with its
    /// originating server name.
    pub async fn discover(
        &self,
        name: Option<&str>,
        deadline: Duration,
    ) -> Result<Vec<RemoteToolDescriptor>, RemoteToolError> {
        let targets: Vec<String> = match name {
            Some(n) => vec![n.to_string()],
            None => self.connections.read().await.keys().cloned().collect(),
        };

        let mut all = Vec::new();
        for target in targets {
            all.extend(self.discover_one(&target, deadline).await?);
        }
        Ok(all)
    }

    async fn discover_one(
        &self,
        name: &str,
        deadline: Duration,
    ) -> Result<Vec<RemoteToolDescriptor>, RemoteToolError> {
        let (url, auth) = {
            let connections = self.connections.read().await;
            let conn = connections
                .get(name)
                .ok_or_else(|| RemoteToolError::NotConnected(name.to_string()))?;
            (conn.url.clone(), conn.auth.clone())
        };

        let result: ToolsListResult = self
            .call_rpc(&url, &auth, "tools/list", serde_json::json!({}), deadline)
            .await?;

        let tools: Vec<RemoteToolDescriptor> = result
            .tools
            .into_iter()
            .map(|mut t| {
                t.server = name.to_string();
                t
            })
            .collect();

        let mut connections = self.connections.write().await;
        if let Some(conn) = connections.get_mut(name) {
            conn.cached_tools = tools.clone();
        }

        Ok(tools)
    }

    /// Invoke `tools/call` on a connected server.
    pub async fn call(
        &self,
        server: &str,
        tool: &str,
        args: Value,
        deadline: Duration,
    ) -> Result<Value, RemoteToolError> {
        let (url, auth) = {
            let connections = self.connections.read().await;
            let conn = connections
                .get(server)
                .ok_or_else(|| RemoteToolError::NotConnected(server.to_string()))?;
            (conn.url.clone(), conn.auth.clone())
        };

        let params = serde_json::json!({ "name": tool, "arguments": args });
        self.call_rpc(&url, &auth, "tools/call", params, deadline)
            .await
    }

    async fn call_rpc<R: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        auth: &RemoteAuth,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<R, RemoteToolError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        debug!(url, method, id, "remote tool JSON-RPC request");

        let mut builder = self.http.post(url).json(&request);
        if let Some(token) = &auth.token {
            builder = builder.bearer_auth(token);
        }

        let send = async {
            let response = builder.send().await?;
            response.text().await
        };

        let body = tokio::time::timeout(deadline, send)
            .await
            .map_err(|_| RemoteToolError::Timeout)??;

        let parsed: JsonRpcResponse = serde_json::from_str(&body)
            .map_err(|e| RemoteToolError::InvalidJson(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(RemoteToolError::ServerError(error.message));
        }

        let result = parsed.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|e| RemoteToolError::InvalidJson(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn discover_on_unconnected_server_is_not_connected() {
        let client = RemoteToolClient::new();
        let err = client
            .discover(Some("ghost"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteToolError::NotConnected(_)));
    }

    #[tokio::test]
    async fn call_on_unconnected_server_is_not_connected() {
        let client = RemoteToolClient::new();
        let err = client
            .call("ghost", "search", serde_json::json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteToolError::NotConnected(_)));
    }

    #[tokio::test]
    async fn disconnect_and_disconnect_all_are_idempotent() {
        let client = RemoteToolClient::new();
        client.connect("s1", "http://localhost:9", None).await;
        client.disconnect("s1").await;
        client.disconnect("s1").await; // no panic, no error
        client.disconnect_all().await;
        client.disconnect_all().await;
    }

    #[tokio::test]
    async fn reconnect_replaces_prior_cached_tools() {
        let client = RemoteToolClient::new();
        client.connect("s1", "http://localhost:9", None).await;
        client.connect("s1", "http://localhost:10", None).await;
        let connections = client.connections.read().await;
        assert_eq!(connections.get("s1").unwrap().url, "http://localhost:10");
    }
}
