//! Configuration management for Tollgate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, TollgateError};

/// Prefix for environment variable overrides, e.g.
/// `TOLLGATE__RATE_LIMITING__MAX_REQUESTS=10`.
const ENV_PREFIX: &str = "TOLLGATE";

/// Main configuration for the Tollgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TollgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3001))
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Interval between sweep passes in milliseconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,

    /// TTL for values stored by the application routes in milliseconds
    #[serde(default = "default_ttl")]
    pub default_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: default_sweep_interval(),
            default_ttl_ms: default_ttl(),
        }
    }
}

impl CacheConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }
}

fn default_sweep_interval() -> u64 {
    1000
}

fn default_ttl() -> u64 {
    5000
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum admitted requests per key per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Fixed window length in milliseconds
    #[serde(default = "default_window")]
    pub window_ms: u64,

    /// Whether to attach `X-RateLimit-*` headers to responses
    #[serde(default = "default_show_headers")]
    pub show_headers: bool,

    /// Keys that are always admitted and never counted
    #[serde(default)]
    pub whitelist: Vec<String>,

    /// Keys that are always denied and never counted
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_ms: default_window(),
            show_headers: default_show_headers(),
            whitelist: Vec::new(),
            blacklist: Vec::new(),
        }
    }
}

/// Whole milliseconds in `window`, rounded up so a non-zero window stays non-zero.
fn window_millis(window: Duration) -> u64 {
    u64::try_from(window.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

impl RateLimitConfig {
    /// Create a configuration with the given quota and default everything else.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window_ms: window_millis(window),
            ..Self::default()
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn with_show_headers(mut self, show_headers: bool) -> Self {
        self.show_headers = show_headers;
        self
    }

    pub fn with_whitelist<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.whitelist = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_blacklist<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blacklist = keys.into_iter().map(Into::into).collect();
        self
    }
}

fn default_max_requests() -> u32 {
    5
}

fn default_window() -> u64 {
    1000
}

fn default_show_headers() -> bool {
    true
}

impl TollgateConfig {
    /// Load configuration from a YAML file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration file");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: TollgateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| TollgateError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load layered configuration: defaults, then the optional YAML file,
    /// then `TOLLGATE__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            ::config::Config::builder().add_source(::config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                ::config::File::from(path).format(::config::FileFormat::Yaml),
            );
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("rate_limiting.whitelist")
                .with_list_parse_key("rate_limiting.blacklist")
                .try_parsing(true),
        );

        let config: TollgateConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the cache or limiter meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limiting.max_requests == 0 {
            return Err(TollgateError::Config(
                "rate_limiting.max_requests must be greater than zero".to_string(),
            ));
        }
        if self.rate_limiting.window_ms == 0 {
            return Err(TollgateError::Config(
                "rate_limiting.window_ms must be greater than zero".to_string(),
            ));
        }
        if self.cache.sweep_interval_ms == 0 {
            return Err(TollgateError::Config(
                "cache.sweep_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
