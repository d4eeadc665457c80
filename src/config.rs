use crate::error::ShimError;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/db/query";

/// Runtime configuration for a [`crate::ShimClient`].
///
/// Only client-side coordinates live here. Database host, credentials and
/// server pool sizing belong to the process serving `endpoint`.
#[derive(Clone)]
pub struct ShimConfig {
    /// URL of the SQL query route. Health checks issue `GET` on the same URL.
    pub endpoint: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
    pub bearer_token: Option<String>,
    pub user_agent: String,
}

impl std::fmt::Debug for ShimConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShimConfig")
            .field("endpoint", &self.endpoint)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .field("pool_idle_timeout", &self.pool_idle_timeout)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_millis(2_000),
            pool_max_idle_per_host: 20,
            pool_idle_timeout: Duration::from_millis(30_000),
            bearer_token: None,
            user_agent: concat!("shimdb/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ShimConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Reads `SHIMDB_*` variables, falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self, ShimError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ShimConfig::from_env`] but with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ShimError> {
        let defaults = Self::default();
        let config = Self {
            endpoint: lookup("SHIMDB_ENDPOINT").unwrap_or(defaults.endpoint),
            request_timeout: parse_millis(
                &lookup,
                "SHIMDB_REQUEST_TIMEOUT_MS",
                defaults.request_timeout,
            )?,
            connect_timeout: parse_millis(
                &lookup,
                "SHIMDB_CONNECT_TIMEOUT_MS",
                defaults.connect_timeout,
            )?,
            pool_max_idle_per_host: parse_usize(
                &lookup,
                "SHIMDB_POOL_MAX_IDLE",
                defaults.pool_max_idle_per_host,
            )?,
            pool_idle_timeout: parse_millis(
                &lookup,
                "SHIMDB_POOL_IDLE_TIMEOUT_MS",
                defaults.pool_idle_timeout,
            )?,
            bearer_token: lookup("SHIMDB_BEARER_TOKEN").filter(|t| !t.is_empty()),
            user_agent: defaults.user_agent,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn validate(&self) -> Result<(), ShimError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ShimError::InvalidConfig {
                message: "endpoint must not be empty".into(),
            });
        }
        let url = reqwest::Url::parse(endpoint).map_err(|e| ShimError::InvalidConfig {
            message: format!("endpoint is not a valid URL: {e}"),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ShimError::InvalidConfig {
                message: format!("endpoint scheme must be http or https, got {}", url.scheme()),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ShimError::InvalidConfig {
                message: "request_timeout must be > 0".into(),
            });
        }
        if self.connect_timeout.is_zero() {
            return Err(ShimError::InvalidConfig {
                message: "connect_timeout must be > 0".into(),
            });
        }
        if self.pool_max_idle_per_host == 0 {
            return Err(ShimError::InvalidConfig {
                message: "pool_max_idle_per_host must be > 0".into(),
            });
        }
        Ok(())
    }
}

fn parse_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ShimError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ShimError::InvalidConfig {
                message: format!("{key} must be an integer millisecond count: {e}"),
            }),
        None => Ok(default),
    }
}

fn parse_usize(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: usize,
) -> Result<usize, ShimError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse::<usize>().map_err(|e| ShimError::InvalidConfig {
            message: format!("{key} must be a non-negative integer: {e}"),
        }),
        None => Ok(default),
    }
}
