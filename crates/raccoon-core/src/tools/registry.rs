//! In-process tool registry: schema-validated, optionally-executable tools.
//!
//! A tool can be registered with just a schema (declared but not locally
//! executable — the orchestrator routes those to the remote tool client) or
//! with a schema plus a handler. Mutated only at setup time; `execute` reads
//! through an `RwLock`, matching the teacher's setup-phase-mutation
//! discipline for shared registries.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::RegistryError;

use super::descriptor::ToolSchema;

/// A locally-executable tool implementation.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value) -> Result<Value, String>;
}

struct ToolEntry {
    schema: ToolSchema,
    handler: Option<Arc<dyn ToolHandler>>,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, ToolEntry>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, overwriting any prior entry of the same name.
    pub async fn register(
        &self,
        name: &str,
        schema: ToolSchema,
        handler: Option<Arc<dyn ToolHandler>>,
    ) {
        info!(tool = name, has_handler = handler.is_some(), "registering tool");
        self.tools
            .write()
            .await
            .insert(name.to_string(), ToolEntry { schema, handler });
    }

    /// Register a schema-only tool declaration (no local handler; the
    /// orchestrator must route calls to the remote tool client instead).
    pub async fn register_schema_only(&self, name: &str, schema: ToolSchema) {
        self.register(name, schema, None).await;
    }

    /// Idempotent: removing an absent tool is a no-op.
    pub async fn unregister(&self, name: &str) {
        self.tools.write().await.remove(name);
    }

    pub async fn get_descriptors(&self) -> Vec<(String, ToolSchema)> {
        self.tools
            .read()
            .await
            .iter()
            .map(|(name, entry)| (name.clone(), entry.schema.clone()))
            .collect()
    }

    /// Validate `args` against the named tool's schema without executing.
    /// Returns an empty vec iff every `required` key is present and every
    /// recognized-type property matches the declared type.
    pub async fn validate(&self, name: &str, args: &Value) -> Vec<String> {
        let tools = self.tools.read().await;
        let Some(entry) = tools.get(name) else {
            return vec![format!("unknown tool: {name}")];
        };
        validate_schema(&entry.schema, args)
    }

    /// Validate then invoke the handler.
    ///
    /// `NoHandler` signals a declared-but-not-local tool: the caller should
    /// route the call to the remote tool client instead of treating this as
    /// a hard failure.
    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, RegistryError> {
        debug!(tool = name, "executing tool");
        let (schema, handler) = {
            let tools = self.tools.read().await;
            let entry = tools
                .get(name)
                .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?;
            (entry.schema.clone(), entry.handler.clone())
        };

        let errors = validate_schema(&schema, &args);
        if !errors.is_empty() {
            return Err(RegistryError::Validation {
                tool: name.to_string(),
                errors,
            });
        }

        let handler = handler.ok_or_else(|| RegistryError::NoHandler(name.to_string()))?;
        handler.call(args).await.map_err(|message| RegistryError::HandlerFailed {
            tool: name.to_string(),
            message,
        })
    }
}

fn validate_schema(schema: &ToolSchema, args: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    let args_obj = args.as_object();

    for required in &schema.required {
        let present = args_obj.map(|o| o.contains_key(required)).unwrap_or(false);
        if !present {
            errors.push(format!("missing required argument: {required}"));
        }
    }

    if let Some(obj) = args_obj {
        for (key, value) in obj {
            let Some(declared_type) = schema.properties.get(key) else {
                continue; // unrecognized property: no constraint
            };
            if let Some(error) = check_type(key, declared_type, value) {
                errors.push(error);
            }
        }
    }

    errors
}

fn check_type(key: &str, declared_type: &str, value: &Value) -> Option<String> {
    let ok = match declared_type {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => return None, // unrecognized type keyword: no constraint
    };
    if ok {
        None
    } else {
        Some(format!(
            "argument '{key}' expected type {declared_type}, got {}",
            value_kind(value)
        ))
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
