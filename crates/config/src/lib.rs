//! Configuration loading, validation, and management for Coxswain.
//!
//! Loads configuration from a TOML file with environment variable
//! overrides (`COXSWAIN_ENGINE_URL`, `COXSWAIN_HOST`, `COXSWAIN_PORT`).
//! Validates all settings at load time.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub assembler: AssemblerConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Inference engine connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the Ollama-compatible engine.
    #[serde(default = "default_engine_url")]
    pub base_url: String,

    /// Per-generation request timeout.
    #[serde(default = "default_engine_timeout")]
    pub request_timeout_secs: u64,

    /// Embedding model for the retrieval index. `None` = lexical fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

fn default_engine_url() -> String {
    "http://localhost:11434".into()
}
fn default_engine_timeout() -> u64 {
    120
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_engine_url(),
            request_timeout_secs: default_engine_timeout(),
            embedding_model: None,
        }
    }
}

/// Conversation log limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum turns kept per session before oldest-first eviction.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Maximum total characters kept per session log.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// The most recent turns that truncation must always retain verbatim.
    #[serde(default = "default_retain_turns")]
    pub retain_turns: usize,
}

fn default_max_turns() -> usize {
    200
}
fn default_max_chars() -> usize {
    200_000
}
fn default_retain_turns() -> usize {
    8
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_chars: default_max_chars(),
            retain_turns: default_retain_turns(),
        }
    }
}

/// Document chunking and query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_chunk_len")]
    pub chunk_len: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Chunks shorter than this are discarded as noise.
    #[serde(default = "default_min_chunk_len")]
    pub min_chunk_len: usize,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Similarity floor below which chunks are not returned.
    #[serde(default = "default_min_score")]
    pub min_score: f32,
}

fn default_chunk_len() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}
fn default_min_chunk_len() -> usize {
    50
}
fn default_top_k() -> usize {
    3
}
fn default_min_score() -> f32 {
    0.2
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_len: default_chunk_len(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_len: default_min_chunk_len(),
            top_k: default_top_k(),
            min_score: default_min_score(),
        }
    }
}

/// Context assembly budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerConfig {
    /// Budget limit, measured in `unit`.
    #[serde(default = "default_budget")]
    pub budget: usize,

    /// "chars" or "tokens" (tokens ≈ chars / 4).
    #[serde(default = "default_budget_unit")]
    pub unit: String,
}

fn default_budget() -> usize {
    4096
}
fn default_budget_unit() -> String {
    "tokens".into()
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            budget: default_budget(),
            unit: default_budget_unit(),
        }
    }
}

/// Tool execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Per-tool invocation deadline.
    #[serde(default = "default_tool_timeout")]
    pub timeout_ms: u64,
}

fn default_tool_timeout() -> u64 {
    5_000
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_tool_timeout(),
        }
    }
}

/// Turn-level orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// "wait" serializes same-session turns; "reject" surfaces SessionBusy.
    #[serde(default = "default_busy_policy")]
    pub busy_policy: String,

    /// Whether successful tool output is appended to the log as tool turns.
    #[serde(default)]
    pub log_tool_turns: bool,
}

fn default_busy_policy() -> String {
    "wait".into()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            busy_policy: default_busy_policy(),
            log_tool_turns: false,
        }
    }
}

/// HTTP surface bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file, apply env overrides, validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: AppConfig = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Load from a file if it exists, otherwise defaults + env overrides.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            _ => {
                let mut config = AppConfig::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("COXSWAIN_ENGINE_URL") {
            self.engine.base_url = url;
        }
        if let Ok(host) = std::env::var("COXSWAIN_HOST") {
            self.gateway.host = host;
        }
        if let Ok(port) = std::env::var("COXSWAIN_PORT")
            && let Ok(port) = port.parse()
        {
            self.gateway.port = port;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.retrieval.chunk_overlap >= self.retrieval.chunk_len {
            return Err(ConfigError::Invalid(format!(
                "retrieval.chunk_overlap ({}) must be smaller than retrieval.chunk_len ({})",
                self.retrieval.chunk_overlap, self.retrieval.chunk_len
            )));
        }
        if self.memory.retain_turns > self.memory.max_turns {
            return Err(ConfigError::Invalid(format!(
                "memory.retain_turns ({}) must not exceed memory.max_turns ({})",
                self.memory.retain_turns, self.memory.max_turns
            )));
        }
        match self.assembler.unit.as_str() {
            "chars" | "tokens" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "assembler.unit must be \"chars\" or \"tokens\", got \"{other}\""
                )));
            }
        }
        match self.orchestrator.busy_policy.as_str() {
            "wait" | "reject" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "orchestrator.busy_policy must be \"wait\" or \"reject\", got \"{other}\""
                )));
            }
        }
        Ok(())
    }
}
