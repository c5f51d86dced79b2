//! Client configuration.
//!
//! Defaults match the benchmark dashboard backend on `localhost:7000`.
//! Every setting can be overridden from the environment:
//!
//! | Variable | Default |
//! |---|---|
//! | `BENCHSCOPE_API_BASE_URL` | `http://localhost:7000` |
//! | `BENCHSCOPE_WS_BASE_URL` | API base with `http` → `ws` |
//! | `BENCHSCOPE_METRICS_PATH` | `/metrics` |
//! | `BENCHSCOPE_RETRY_MODE` | `exponential` (or `fixed`) |
//! | `BENCHSCOPE_RETRY_BASE_MS` | `2000` |
//! | `BENCHSCOPE_RETRY_MULTIPLIER` | `2` |
//! | `BENCHSCOPE_RETRY_MAX_MS` | `30000` |
//! | `BENCHSCOPE_RETRY_CEILING` | `5` |
//! | `BENCHSCOPE_HISTORY_CAPACITY` | `120` |

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::{ConfigError, TelemetryResult};
use crate::metrics::DEFAULT_HISTORY_CAPACITY;
use crate::stream::{BackoffPolicy, BackoffStrategy};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:7000";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

pub const ENV_API_BASE_URL: &str = "BENCHSCOPE_API_BASE_URL";
pub const ENV_WS_BASE_URL: &str = "BENCHSCOPE_WS_BASE_URL";
pub const ENV_METRICS_PATH: &str = "BENCHSCOPE_METRICS_PATH";
pub const ENV_RETRY_MODE: &str = "BENCHSCOPE_RETRY_MODE";
pub const ENV_RETRY_BASE_MS: &str = "BENCHSCOPE_RETRY_BASE_MS";
pub const ENV_RETRY_MULTIPLIER: &str = "BENCHSCOPE_RETRY_MULTIPLIER";
pub const ENV_RETRY_MAX_MS: &str = "BENCHSCOPE_RETRY_MAX_MS";
pub const ENV_RETRY_CEILING: &str = "BENCHSCOPE_RETRY_CEILING";
pub const ENV_HISTORY_CAPACITY: &str = "BENCHSCOPE_HISTORY_CAPACITY";

/// Endpoint, retry, and retention settings.
///
/// # Example
///
/// ```ignore
/// use benchscope::config::TelemetryConfig;
///
/// let config = TelemetryConfig::default()
///     .with_api_base_url("https://bench.example.com/")
///     .with_history_capacity(300);
/// assert_eq!(config.metrics_endpoint()?, "wss://bench.example.com/metrics");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// HTTP base of the dashboard backend
    pub api_base_url: String,
    /// Explicit WebSocket base; derived from `api_base_url` when unset
    pub ws_base_url: Option<String>,
    /// Path of the telemetry stream under the WebSocket base
    pub metrics_path: String,
    /// Full stream URL; replaces the derived endpoint when set
    pub endpoint: Option<String>,
    pub retry: BackoffPolicy,
    /// Throughput samples retained per snapshot
    pub history_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            ws_base_url: None,
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            endpoint: None,
            retry: BackoffPolicy::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl TelemetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_ws_base_url(mut self, url: impl Into<String>) -> Self {
        self.ws_base_url = Some(url.into());
        self
    }

    pub fn with_metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = path.into();
        self
    }

    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    pub fn with_retry(mut self, retry: BackoffPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Build config from the process environment.
    ///
    /// Unparseable values fall back to their defaults with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut config = defaults.clone();

        if let Some(url) = lookup(ENV_API_BASE_URL) {
            config.api_base_url = url;
        }
        config.ws_base_url = lookup(ENV_WS_BASE_URL);
        if let Some(path) = lookup(ENV_METRICS_PATH) {
            config.metrics_path = path;
        }
        config.history_capacity =
            parse_or(&lookup, ENV_HISTORY_CAPACITY, defaults.history_capacity);

        let base = defaults.retry;
        let base_ms = parse_or(&lookup, ENV_RETRY_BASE_MS, base.base_delay.as_millis() as u64);
        let max_ms = parse_or(&lookup, ENV_RETRY_MAX_MS, base.max_delay.as_millis() as u64);
        let ceiling = parse_or(&lookup, ENV_RETRY_CEILING, base.max_attempts);
        let mode = lookup(ENV_RETRY_MODE).map(|mode| mode.trim().to_ascii_lowercase());

        let policy = match mode.as_deref() {
            Some("fixed") => BackoffPolicy::fixed(Duration::from_millis(base_ms)),
            other => {
                if let Some(other) = other.filter(|mode| *mode != "exponential") {
                    warn!(
                        variable = ENV_RETRY_MODE,
                        value = other,
                        "Unknown retry mode, using exponential"
                    );
                }
                let multiplier = match base.strategy {
                    BackoffStrategy::Exponential { multiplier } => multiplier,
                    BackoffStrategy::Fixed => 1.0,
                };
                BackoffPolicy::exponential(
                    Duration::from_millis(base_ms),
                    parse_or(&lookup, ENV_RETRY_MULTIPLIER, multiplier),
                    Duration::from_millis(max_ms),
                )
            }
        }
        .with_max_attempts(ceiling);

        config.retry = match policy.validate() {
            Ok(()) => policy,
            Err(e) => {
                warn!("Ignoring retry settings from environment: {}", e);
                BackoffPolicy::default()
            }
        };
        config
    }

    /// WebSocket base URL, explicit or derived from the API base.
    pub fn ws_base_url(&self) -> Result<String, ConfigError> {
        match &self.ws_base_url {
            Some(url) => {
                let url = sanitize_base_url(url, ENV_WS_BASE_URL)?;
                if has_scheme(&url, "ws://") || has_scheme(&url, "wss://") {
                    Ok(url)
                } else {
                    Err(ConfigError::UnsupportedScheme {
                        url,
                        expected: "ws:// or wss://",
                    })
                }
            }
            None => websocket_base(&sanitize_base_url(&self.api_base_url, ENV_API_BASE_URL)?),
        }
    }

    /// Full stream endpoint, e.g. `ws://localhost:7000/metrics`.
    pub fn metrics_endpoint(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.endpoint {
            let url = url.trim();
            if url.is_empty() {
                return Err(ConfigError::Empty { name: "endpoint" });
            }
            if !(has_scheme(url, "ws://") || has_scheme(url, "wss://")) {
                return Err(ConfigError::UnsupportedScheme {
                    url: url.to_string(),
                    expected: "ws:// or wss://",
                });
            }
            return Ok(url.to_string());
        }
        let base = self.ws_base_url()?;
        let path = self.metrics_path.trim();
        if path.is_empty() || path == "/" {
            return Ok(base);
        }
        if path.starts_with('/') {
            Ok(format!("{}{}", base, path))
        } else {
            Ok(format!("{}/{}", base, path))
        }
    }

    /// Check the endpoint and retry settings. The binary runs this before
    /// subscribing.
    pub fn validate(&self) -> TelemetryResult<()> {
        self.metrics_endpoint()?;
        self.retry.validate()?;
        Ok(())
    }
}

/// Trim whitespace and trailing slashes.
fn sanitize_base_url(url: &str, name: &'static str) -> Result<String, ConfigError> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::Empty { name });
    }
    Ok(trimmed.to_string())
}

fn has_scheme(url: &str, scheme: &str) -> bool {
    url.get(..scheme.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
}

/// `http://` → `ws://`, `https://` → `wss://`.
fn websocket_base(api_base: &str) -> Result<String, ConfigError> {
    if has_scheme(api_base, "https://") {
        Ok(format!("wss://{}", &api_base["https://".len()..]))
    } else if has_scheme(api_base, "http://") {
        Ok(format!("ws://{}", &api_base["http://".len()..]))
    } else if has_scheme(api_base, "ws://") || has_scheme(api_base, "wss://") {
        Ok(api_base.to_string())
    } else {
        Err(ConfigError::UnsupportedScheme {
            url: api_base.to_string(),
            expected: "http://, https://, ws:// or wss://",
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            warn!(variable = name, value = %raw, "Invalid value, using default: {}", e);
            default
        }
    }
}
