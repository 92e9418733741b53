use config::{Config, ConfigError, Environment, File};
use portfolio_core::ChainRegistry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration loading error: {0}")]
    ConfigLoad(#[from] ConfigError),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

/// Upper bound accepted for `worker.rate_limit_per_second`
pub const MAX_RATE_LIMIT_PER_SECOND: u32 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// General system settings
    pub system: SystemSettings,

    /// GoldRush API configuration (per-chain balances)
    pub goldrush: GoldRushSettings,

    /// Rate-limited worker configuration
    pub worker: WorkerConfig,

    /// Redis configuration (status store)
    pub redis: RedisConfig,

    /// Aggregation read path
    pub aggregation: AggregationConfig,

    /// Chain registry
    pub chains: ChainsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSettings {
    /// Enable debug mode
    pub debug_mode: bool,

    /// Emit logs as JSON lines
    pub json_logs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldRushSettings {
    /// GoldRush API key
    pub api_key: String,

    /// GoldRush API base URL
    pub api_base_url: String,

    /// Deadline for a single upstream request in seconds
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Global cap on upstream requests per second
    pub rate_limit_per_second: u32,

    /// Retries after the initial attempt
    pub max_retries: u32,

    /// HTTP statuses treated as permanent (no retry)
    pub fail_fast_statuses: Vec<u16>,

    /// Maximum pending submissions; None = unbounded
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Expiry for terminal status records; None keeps them forever
    pub record_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Queued records older than this are reported as failed; None disables
    pub stale_queued_after_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainsConfig {
    /// Chain ids accepted for submission, in display order; empty = all known chains
    pub enabled_chain_ids: Vec<u64>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            system: SystemSettings {
                debug_mode: false,
                json_logs: false,
            },
            goldrush: GoldRushSettings {
                api_key: "".to_string(), // Must be set in .env or config file
                api_base_url: "https://api.covalenthq.com/v1".to_string(),
                request_timeout_seconds: 30,
            },
            worker: WorkerConfig {
                rate_limit_per_second: 1,
                max_retries: 3,
                fail_fast_statuses: vec![400, 401, 403, 404, 422],
                queue_capacity: None,
            },
            redis: RedisConfig {
                url: "redis://127.0.0.1:6379".to_string(),
                record_ttl_seconds: None,
            },
            aggregation: AggregationConfig {
                stale_queued_after_seconds: Some(900),
            },
            chains: ChainsConfig {
                enabled_chain_ids: Vec::new(),
            },
        }
    }
}

impl GoldRushSettings {
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "GoldRush API key is required".to_string(),
            ));
        }

        if self.api_base_url.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "GoldRush API base URL is required".to_string(),
            ));
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigurationError::InvalidValue(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit_per_second == 0 || self.rate_limit_per_second > MAX_RATE_LIMIT_PER_SECOND {
            return Err(ConfigurationError::InvalidValue(format!(
                "Rate limit must be between 1 and {} requests per second, got {}",
                MAX_RATE_LIMIT_PER_SECOND, self.rate_limit_per_second
            )));
        }

        if self.queue_capacity == Some(0) {
            return Err(ConfigurationError::InvalidValue(
                "Queue capacity must be greater than 0 when set".to_string(),
            ));
        }

        if let Some(status) = self
            .fail_fast_statuses
            .iter()
            .find(|status| !(400..600).contains(*status))
        {
            return Err(ConfigurationError::InvalidValue(format!(
                "Fail-fast status {} is not an HTTP error status",
                status
            )));
        }

        Ok(())
    }
}

impl SystemConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config_builder = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&SystemConfig::default())?);

        // Add config file if it exists
        if config_path.as_ref().exists() {
            info!(
                "Loading configuration from: {}",
                config_path.as_ref().display()
            );
            config_builder = config_builder.add_source(File::from(config_path.as_ref()));
        } else {
            debug!("Config file not found, using defaults and environment variables");
        }

        // PORTFOLIO__WORKER__RATE_LIMIT_PER_SECOND=5 etc.
        config_builder = config_builder.add_source(
            Environment::with_prefix("PORTFOLIO")
                .try_parsing(true)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("worker.fail_fast_statuses")
                .with_list_parse_key("chains.enabled_chain_ids"),
        );

        let config = config_builder.build()?;
        let system_config: SystemConfig = config.try_deserialize()?;

        system_config.validate()?;

        Ok(system_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.goldrush.validate()?;
        self.worker.validate()?;

        if self.redis.url.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "Redis URL is required".to_string(),
            ));
        }

        if self.redis.record_ttl_seconds == Some(0) {
            return Err(ConfigurationError::InvalidValue(
                "Record TTL must be greater than 0 when set".to_string(),
            ));
        }

        self.chain_registry()?;

        Ok(())
    }

    /// Registry shared by submission and aggregation
    pub fn chain_registry(&self) -> Result<ChainRegistry> {
        ChainRegistry::with_enabled(&self.chains.enabled_chain_ids)
            .map_err(|e| ConfigurationError::InvalidValue(e.to_string()))
    }

    pub fn stale_queued_after(&self) -> Option<Duration> {
        self.aggregation
            .stale_queued_after_seconds
            .map(Duration::from_secs)
    }

    /// Configuration as JSON with the API key masked, for startup logging
    pub fn to_redacted_json(&self) -> serde_json::Value {
        let mut redacted = self.clone();
        if !redacted.goldrush.api_key.is_empty() {
            redacted.goldrush.api_key = "***".to_string();
        }
        serde_json::to_value(&redacted).unwrap_or(serde_json::Value::Null)
    }
}
