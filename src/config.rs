//! Configuration management for kubesage.
//!
//! Configuration is read from environment variables:
//! - `KUBESAGE_API_KEY` - Required. API key for the chat-completions provider.
//! - `KUBESAGE_MODEL` - Optional. Model identifier. Defaults to `gpt-4o`.
//! - `KUBESAGE_BASE_URL` - Optional. OpenAI-compatible endpoint base URL.
//! - `HOST` / `PORT` - Optional. HTTP bind address. Defaults to `0.0.0.0:8081`.
//! - `TARGET_NAMESPACE` - Optional. Namespace for tasks created from alerts.
//! - `ALERT_WINDOW_SECONDS` - Optional. Sliding dedup window. Defaults to `60`.
//! - `ALERT_SWEEP_SECONDS` - Optional. Sweep interval. Defaults to `5`.
//! - `AGENT_TIMEOUT_MINUTES` - Optional. Per-task run deadline. Defaults to `10`.
//! - `AGENT_MAX_STEPS` - Optional. Default step budget. Defaults to `20`.
//! - `RECENT_EVENT_LIMIT` - Optional. L2 events injected per run. Defaults to `5`.
//! - `L2_ENABLED` - Optional. Enables the in-process recent-events store.
//! - `L3_ENABLED` - Optional. Enables the in-process knowledge base
//!   (requires the chat provider's API key for embeddings).
//! - `KUBESAGE_EMBED_MODEL` - Optional. Embedding model for the L3 store.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Settings for the chat-completions provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key for the provider.
    pub api_key: String,

    /// Model identifier (provider format).
    pub model: String,

    /// OpenAI-compatible endpoint base URL.
    pub base_url: String,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host.
    pub host: String,

    /// HTTP server port.
    pub port: u16,

    /// Namespace in which alert-derived tasks are created.
    pub target_namespace: String,

    /// Sliding deduplication window for the alert aggregator.
    pub window_size: Duration,

    /// How often the aggregator checks groups for expiry.
    pub sweep_interval: Duration,

    /// Deadline for one agent run.
    pub agent_timeout: Duration,

    /// Step budget applied when a task's policy does not set one.
    pub default_max_steps: usize,

    /// How many recent L2 alert events are injected per run.
    pub recent_event_limit: usize,

    /// Whether the in-process L2 recent-events store is wired in.
    pub l2_enabled: bool,

    /// Whether the in-process L3 knowledge base is wired in.
    pub l3_enabled: bool,

    /// Embedding model used by the L3 store.
    pub embed_model: String,

    /// Chat-completions provider settings.
    pub llm: LlmConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `KUBESAGE_API_KEY` is not set,
    /// or `ConfigError::InvalidValue` for unparsable numeric values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("KUBESAGE_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("KUBESAGE_API_KEY".to_string()))?;

        let model =
            std::env::var("KUBESAGE_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        let base_url = std::env::var("KUBESAGE_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            crate::util::env_var_parsed("PORT", 8081).map_err(ConfigError::InvalidValue)?;

        let target_namespace =
            std::env::var("TARGET_NAMESPACE").unwrap_or_else(|_| "default".to_string());

        let window_seconds: u64 = crate::util::env_var_parsed("ALERT_WINDOW_SECONDS", 60)
            .map_err(ConfigError::InvalidValue)?;
        let sweep_seconds: u64 = crate::util::env_var_parsed("ALERT_SWEEP_SECONDS", 5)
            .map_err(ConfigError::InvalidValue)?;
        let timeout_minutes: u64 = crate::util::env_var_parsed("AGENT_TIMEOUT_MINUTES", 10)
            .map_err(ConfigError::InvalidValue)?;
        let default_max_steps: usize = crate::util::env_var_parsed("AGENT_MAX_STEPS", 20)
            .map_err(ConfigError::InvalidValue)?;
        let recent_event_limit: usize = crate::util::env_var_parsed("RECENT_EVENT_LIMIT", 5)
            .map_err(ConfigError::InvalidValue)?;
        let l2_enabled = crate::util::env_var_bool("L2_ENABLED", false);
        let l3_enabled = crate::util::env_var_bool("L3_ENABLED", false);
        let embed_model = std::env::var("KUBESAGE_EMBED_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());

        if window_seconds == 0 || sweep_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "ALERT_WINDOW_SECONDS and ALERT_SWEEP_SECONDS must be non-zero".to_string(),
            ));
        }

        Ok(Self {
            host,
            port,
            target_namespace,
            window_size: Duration::from_secs(window_seconds),
            sweep_interval: Duration::from_secs(sweep_seconds),
            agent_timeout: Duration::from_secs(timeout_minutes * 60),
            default_max_steps,
            recent_event_limit,
            l2_enabled,
            l3_enabled,
            embed_model,
            llm: LlmConfig {
                api_key,
                model,
                base_url,
            },
        })
    }
}
