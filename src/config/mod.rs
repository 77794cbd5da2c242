/// Configuration management for the automation runtime
///
/// Handles server binding, ledger access, external service endpoints and
/// engine pacing. Every field can be overridden with an `AUTOMATA_*` variable.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token in a recipient field that is replaced by the incoming payload's `to`
pub const DEFAULT_RECIPIENT_PLACEHOLDER: &str = "{{Trigger.data.to}}";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Ledger access for trigger cursors
    pub chain: ChainConfig,
    /// Inference and relay endpoints
    pub services: ServiceConfig,
    /// Execution engine behavior
    pub engine: EngineConfig,
    /// Optional JSON workflow loaded into memory at startup
    pub workflow_file: Option<String>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC endpoint. Without it there is no watch capability and no
    /// trigger cursor is started.
    pub rpc_url: Option<String>,
    /// Cursor tick period
    pub poll_interval_ms: u64,
}

/// External service endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    pub inference_path: String,
    pub relay_path: String,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long a node shows SuccessTransient/FailTransient before settling
    pub status_delay_ms: u64,
    /// Serialize overlapping runs that reach the same node
    pub serialize_node_runs: bool,
    /// Placeholder substituted with `payload.to` in recipient fields
    pub recipient_placeholder: String,
}

impl ChainConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ServiceConfig {
    pub fn inference_url(&self) -> String {
        join_url(&self.base_url, &self.inference_path)
    }

    pub fn relay_url(&self) -> String {
        join_url(&self.base_url, &self.relay_path)
    }
}

impl EngineConfig {
    pub fn status_delay(&self) -> Duration {
        Duration::from_millis(self.status_delay_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            status_delay_ms: 1500,
            serialize_node_runs: true,
            recipient_placeholder: DEFAULT_RECIPIENT_PLACEHOLDER.to_string(),
        }
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        let engine_defaults = EngineConfig::default();

        Self {
            server: ServerConfig {
                host: std::env::var("AUTOMATA_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("AUTOMATA_PORT", 3004),
            },
            chain: ChainConfig {
                rpc_url: std::env::var("AUTOMATA_RPC_URL").ok().filter(|url| !url.is_empty()),
                poll_interval_ms: env_or("AUTOMATA_POLL_INTERVAL_MS", 5000),
            },
            services: ServiceConfig {
                base_url: std::env::var("AUTOMATA_SERVICE_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
                inference_path: "/api/ai-decision".to_string(),
                relay_path: "/api/relay".to_string(),
            },
            engine: EngineConfig {
                status_delay_ms: env_or("AUTOMATA_STATUS_DELAY_MS", engine_defaults.status_delay_ms),
                serialize_node_runs: env_or(
                    "AUTOMATA_SERIALIZE_NODE_RUNS",
                    engine_defaults.serialize_node_runs,
                ),
                recipient_placeholder: engine_defaults.recipient_placeholder,
            },
            workflow_file: std::env::var("AUTOMATA_WORKFLOW_FILE").ok().filter(|p| !p.is_empty()),
        }
    }
}

/// Read and parse an env var, falling back when unset or malformed
fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(fallback)
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
