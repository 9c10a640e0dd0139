//! Process-wide settings, loaded once from the environment.
//!
//! Mirrors the `RACCOON_`-prefixed environment contract described in the
//! runtime's external interface: every field has a sane default so the
//! service boots with no configuration beyond provider credentials.

use std::env;
use std::time::Duration;

/// Settings loaded from the environment at process start.
#[derive(Debug, Clone)]
pub struct Settings {
    pub grpc_port: u16,
    pub max_workers: usize,
    pub max_message_size: usize,

    pub anthropic_api_key: String,
    pub openai_api_key: String,
    pub e2b_api_key: String,
    pub default_model: String,

    pub sandbox_timeout: Duration,
    pub sandbox_max_cpu: u32,
    pub sandbox_max_memory_mb: u32,

    pub agent_turn_deadline: Duration,
    pub tool_call_deadline: Duration,
    pub code_execution_deadline: Duration,
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Settings {
    /// Load settings from `RACCOON_*` environment variables, falling back to
    /// documented defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        Self {
            grpc_port: env_parsed("RACCOON_GRPC_PORT", 50051),
            max_workers: env_parsed("RACCOON_MAX_WORKERS", 10),
            max_message_size: env_parsed("RACCOON_MAX_MESSAGE_SIZE", 50 * 1024 * 1024),

            anthropic_api_key: env_string("RACCOON_ANTHROPIC_API_KEY", ""),
            openai_api_key: env_string("RACCOON_OPENAI_API_KEY", ""),
            e2b_api_key: env_string("RACCOON_E2B_API_KEY", ""),
            default_model: env_string("RACCOON_DEFAULT_MODEL", "claude-sonnet-4-6"),

            sandbox_timeout: Duration::from_secs(env_parsed("RACCOON_SANDBOX_TIMEOUT", 300)),
            sandbox_max_cpu: env_parsed("RACCOON_SANDBOX_MAX_CPU", 8),
            sandbox_max_memory_mb: env_parsed("RACCOON_SANDBOX_MAX_MEMORY_MB", 8192),

            agent_turn_deadline: Duration::from_secs(env_parsed("RACCOON_AGENT_TURN_DEADLINE", 60)),
            tool_call_deadline: Duration::from_secs(env_parsed("RACCOON_TOOL_CALL_DEADLINE", 20)),
            code_execution_deadline: Duration::from_secs(env_parsed(
                "RACCOON_CODE_EXECUTION_DEADLINE",
                45,
            )),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grpc_port: 50051,
            max_workers: 10,
            max_message_size: 50 * 1024 * 1024,
            anthropic_api_key: String::new(),
            openai_api_key: String::new(),
            e2b_api_key: String::new(),
            default_model: "claude-sonnet-4-6".to_string(),
            sandbox_timeout: Duration::from_secs(300),
            sandbox_max_cpu: 8,
            sandbox_max_memory_mb: 8192,
            agent_turn_deadline: Duration::from_secs(60),
            tool_call_deadline: Duration::from_secs(20),
            code_execution_deadline: Duration::from_secs(45),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.grpc_port, 50051);
        assert_eq!(s.agent_turn_deadline, Duration::from_secs(60));
        assert_eq!(s.tool_call_deadline, Duration::from_secs(20));
        assert_eq!(s.sandbox_max_cpu, 8);
        assert_eq!(s.sandbox_max_memory_mb, 8192);
    }
}
