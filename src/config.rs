//! Client configuration from environment variables
//!
//! Environment variables (a `.env` file is honoured by the binary):
//! - `AGENTLAB_API_BASE` (default: http://localhost:8000)
//! - `AGENTLAB_POLL_INTERVAL_MS` (default: 2000)
//! - `AGENTLAB_EVENTS_PAGE_LIMIT` (default: 50)
//! - `AGENTLAB_REQUEST_TIMEOUT_SECS` (default: 10)
//! - `AGENTLAB_POLL_BACKOFF` (default: false)
//! - `AGENTLAB_BACKOFF_MAX_SKIP` (default: 8)
//! - `AGENTLAB_DEDUPE_EVENTS` (default: false)
//! - `RUST_LOG` (default: info)

use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Event synchronizer tuning
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Fixed cadence between fetch cycles
    pub interval: Duration,

    /// Upper bound on events requested per cycle
    pub page_limit: usize,

    /// Skip ticks after consecutive failures
    pub backoff: bool,

    /// Most ticks a single backoff may skip
    pub backoff_max_skip: u32,

    /// Drop items whose id is already in the log
    pub dedupe_by_id: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2_000),
            page_limit: 50,
            backoff: false,
            backoff_max_skip: 8,
            dedupe_by_id: false,
        }
    }
}

/// Configuration for one client instance
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base address of the perception-agent service
    pub api_base: String,

    /// Per-request transport timeout
    pub request_timeout: Duration,

    pub poll: PollConfig,

    pub rust_log: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(10),
            poll: PollConfig::default(),
            rust_log: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_base = env::var("AGENTLAB_API_BASE").unwrap_or(defaults.api_base);
        validate_api_base(&api_base)?;

        let poll = PollConfig {
            interval: Duration::from_millis(parse_or(
                "AGENTLAB_POLL_INTERVAL_MS",
                defaults.poll.interval.as_millis() as u64,
            )),
            page_limit: parse_or("AGENTLAB_EVENTS_PAGE_LIMIT", defaults.poll.page_limit),
            backoff: parse_or("AGENTLAB_POLL_BACKOFF", defaults.poll.backoff),
            backoff_max_skip: parse_or("AGENTLAB_BACKOFF_MAX_SKIP", defaults.poll.backoff_max_skip),
            dedupe_by_id: parse_or("AGENTLAB_DEDUPE_EVENTS", defaults.poll.dedupe_by_id),
        };

        if poll.interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "AGENTLAB_POLL_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }
        if poll.page_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "AGENTLAB_EVENTS_PAGE_LIMIT must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            api_base,
            request_timeout: Duration::from_secs(parse_or(
                "AGENTLAB_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            poll,
            rust_log: env::var("RUST_LOG").unwrap_or(defaults.rust_log),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Result<Self, ConfigError> {
        let api_base = api_base.into();
        validate_api_base(&api_base)?;
        self.api_base = api_base;
        Ok(self)
    }
}

fn validate_api_base(api_base: &str) -> Result<(), ConfigError> {
    if !api_base.starts_with("http://") && !api_base.starts_with("https://") {
        return Err(ConfigError::InvalidValue(format!(
            "AGENTLAB_API_BASE must start with http:// or https://, got '{}'",
            api_base
        )));
    }
    Ok(())
}

fn parse_or<T: FromStr + std::fmt::Display>(var: &str, default: T) -> T {
    match env::var(var) {
        Ok(raw) => match raw.trim().to_lowercase().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Invalid {} '{}', defaulting to {}", var, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}
