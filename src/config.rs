//! Client configuration.
//!
//! Settings come from `DATABRAIN_*` environment variables with the defaults
//! below. The mock/live switch only affects which generation endpoint is
//! used.

use std::str::FromStr;
use std::time::Duration;

use crate::channel::ReconnectPolicy;
use crate::error::ConfigError;
use crate::models::{GenerationFilters, GenerationRequest};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8008";

const ENV_API_BASE_URL: &str = "DATABRAIN_API_BASE_URL";
const ENV_USE_MOCKS: &str = "DATABRAIN_USE_MOCKS";
const ENV_TEMPERATURE: &str = "DATABRAIN_TEMPERATURE";
const ENV_MIN_SCORE: &str = "DATABRAIN_MIN_SCORE";
const ENV_NUM_CHUNKS: &str = "DATABRAIN_NUM_CHUNKS";
const ENV_MAX_RECONNECT_ATTEMPTS: &str = "DATABRAIN_MAX_RECONNECT_ATTEMPTS";

/// Backend location and generation defaults.
///
/// # Example
///
/// ```ignore
/// use databrain::config::ClientConfig;
///
/// let config = ClientConfig::default()
///     .with_api_base_url("http://10.0.0.5:8008")
///     .with_use_mocks(false);
/// assert!(config.generation_endpoint().ends_with("/api/v1/generation/generate"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL without a trailing slash
    pub api_base_url: String,
    /// Use the mock generation endpoint (default: true)
    pub use_mocks: bool,
    pub temperature: f64,
    pub min_score: f64,
    pub num_chunks: u32,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            use_mocks: true,
            temperature: GenerationRequest::DEFAULT_TEMPERATURE,
            min_score: GenerationRequest::DEFAULT_MIN_SCORE,
            num_chunks: GenerationRequest::DEFAULT_NUM_CHUNKS,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend base URL. A trailing slash is dropped.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_use_mocks(mut self, use_mocks: bool) -> Self {
        self.use_mocks = use_mocks;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_num_chunks(mut self, num_chunks: u32) -> Self {
        self.num_chunks = num_chunks;
        self
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which returns a variable's value
    /// if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|v| !v.trim().is_empty()) {
            config = config.with_api_base_url(url.trim());
        }
        if let Some(value) = lookup(ENV_USE_MOCKS) {
            config.use_mocks = parse_flag(&value);
        }
        if let Some(value) = lookup(ENV_TEMPERATURE) {
            config.temperature = parse_value(ENV_TEMPERATURE, &value)?;
        }
        if let Some(value) = lookup(ENV_MIN_SCORE) {
            config.min_score = parse_value(ENV_MIN_SCORE, &value)?;
        }
        if let Some(value) = lookup(ENV_NUM_CHUNKS) {
            config.num_chunks = parse_value(ENV_NUM_CHUNKS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_RECONNECT_ATTEMPTS) {
            config.reconnect.max_attempts = parse_value(ENV_MAX_RECONNECT_ATTEMPTS, &value)?;
        }

        tracing::debug!("Loaded client config: {:?}", config);
        Ok(config)
    }

    /// URL the answer stream is requested from.
    pub fn generation_endpoint(&self) -> String {
        if self.use_mocks {
            format!("{}/api/v1/mock/generation/generate", self.api_base_url)
        } else {
            format!("{}/api/v1/generation/generate", self.api_base_url)
        }
    }

    pub fn health_url(&self) -> String {
        format!("{}/api/v1/health/health", self.api_base_url)
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        self.reconnect.base_delay
    }

    /// Build a request for `query` carrying these defaults.
    pub fn request(&self, query: impl Into<String>, filters: GenerationFilters) -> GenerationRequest {
        GenerationRequest::new(query)
            .with_temperature(self.temperature)
            .with_min_score(self.min_score)
            .with_num_chunks(self.num_chunks)
            .with_filters(filters)
    }
}

/// `true` and `1` (any case) enable a flag; everything else disables it.
fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("true") || value == "1"
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
