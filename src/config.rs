//! Configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). [`RealtimeConfig`] drives the client
//! connection manager, [`HubConfig`] the push hub server.

use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::domain::SubjectId;

/// Default push endpoint base for local development.
pub const DEFAULT_REALTIME_URL: &str = "ws://localhost:8001";

/// Client-side connection manager configuration.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Base URL of the push hub (`ws://` or `wss://`). The identity-scoped
    /// path and credential query are appended per connection.
    pub endpoint: Url,

    /// Delay before the first retry after an abnormal close.
    pub base_delay: Duration,

    /// Upper bound on any retry delay.
    pub max_delay: Duration,

    /// Consecutive abnormal closures tolerated before giving up.
    pub max_attempts: u32,

    /// Idle time after which the activity monitor closes the channel.
    pub inactivity_timeout: Duration,

    /// Time allowed for the transport handshake.
    pub connect_timeout: Duration,
}

impl RealtimeConfig {
    /// Creates a configuration for `endpoint` with the default tuning:
    /// 1 s base delay, 30 s cap, 5 attempts, 60 s inactivity timeout and a
    /// 10 s connect timeout.
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 5,
            inactivity_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Falls back to the values of [`RealtimeConfig::new`] when a variable
    /// is not set or not a valid number.
    ///
    /// # Errors
    ///
    /// Returns an error if `REALTIME_URL` is not a valid URL.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Returns an error if `REALTIME_URL` is not a valid URL.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let raw = lookup("REALTIME_URL").unwrap_or_else(|| DEFAULT_REALTIME_URL.to_string());
        let defaults = Self::new(Url::parse(&raw)?);

        Ok(Self {
            base_delay: Duration::from_millis(parse_or(lookup("REALTIME_BASE_DELAY_MS"), 1_000)),
            max_delay: Duration::from_millis(parse_or(lookup("REALTIME_MAX_DELAY_MS"), 30_000)),
            max_attempts: parse_or(lookup("REALTIME_MAX_ATTEMPTS"), defaults.max_attempts),
            inactivity_timeout: Duration::from_secs(parse_or(
                lookup("REALTIME_INACTIVITY_TIMEOUT_SECS"),
                60,
            )),
            connect_timeout: Duration::from_secs(parse_or(
                lookup("REALTIME_CONNECT_TIMEOUT_SECS"),
                10,
            )),
            ..defaults
        })
    }
}

/// Push hub server configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Socket address to bind the HTTP server to.
    pub listen_addr: SocketAddr,

    /// Interval between heartbeat frames on each connection.
    pub heartbeat_interval: Duration,

    /// Capacity of the push bus broadcast channel.
    pub push_bus_capacity: usize,

    /// `(subject, token)` credentials accepted by the push endpoint.
    pub tokens: Vec<(SubjectId, String)>,
}

impl HubConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as a
    /// [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8001".to_string())
            .parse()?;

        let heartbeat_interval =
            Duration::from_secs(parse_env("HUB_HEARTBEAT_INTERVAL_SECS", 30_u64).max(1));
        let push_bus_capacity = parse_env("PUSH_BUS_CAPACITY", 10_000_usize).max(1);
        let tokens = std::env::var("HUB_TOKENS")
            .map(|raw| parse_token_list(&raw))
            .unwrap_or_default();

        Ok(Self {
            listen_addr,
            heartbeat_interval,
            push_bus_capacity,
            tokens,
        })
    }
}

/// Parses `subject=token` pairs separated by commas. Malformed entries are
/// skipped with a warning.
#[must_use]
pub fn parse_token_list(raw: &str) -> Vec<(SubjectId, String)> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.split_once('=') {
            Some((subject, token)) if !subject.trim().is_empty() && !token.trim().is_empty() => {
                Some((SubjectId::from(subject.trim()), token.trim().to_string()))
            }
            _ => {
                tracing::warn!(entry, "ignoring malformed HUB_TOKENS entry");
                None
            }
        })
        .collect()
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    parse_or(std::env::var(key).ok(), default)
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
