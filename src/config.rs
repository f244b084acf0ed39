//! Configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). The coordinator and the worker agent
//! each have their own struct; both read `DEBUG` and `LOG_FORMAT` for the
//! logging setup in [`crate::logging`].

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{AgentError, ConfigError};
use crate::protocol::WorkerId;

/// Logging options shared by both binaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Default the filter to `debug` instead of `info`.
    pub debug: bool,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

impl LogConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            debug: parse_bool(lookup, "DEBUG", false),
            json: lookup("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        }
    }
}

/// Coordinator configuration.
///
/// Loaded once at startup via [`CoordinatorConfig::from_env`].
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// How long a caller waits for a worker's status.
    pub command_timeout: Duration,

    /// How long a new connection has to send `register`.
    pub register_timeout: Duration,

    /// Pending commands allowed per worker.
    pub command_queue_depth: usize,

    /// Logging options.
    pub log: LogConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            event_bus_capacity: 1024,
            command_timeout: Duration::from_secs(30),
            register_timeout: Duration::from_secs(10),
            command_queue_depth: 16,
            log: LogConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `LISTEN_ADDR` is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let listen_addr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "LISTEN_ADDR",
                reason: e.to_string(),
            })?;

        Ok(Self {
            listen_addr,
            event_bus_capacity: parse(&lookup, "EVENT_BUS_CAPACITY", 1024_usize).max(1),
            command_timeout: Duration::from_millis(parse(&lookup, "COMMAND_TIMEOUT_MS", 30_000)),
            register_timeout: Duration::from_millis(parse(&lookup, "REGISTER_TIMEOUT_MS", 10_000)),
            command_queue_depth: parse(&lookup, "COMMAND_QUEUE_DEPTH", 16_usize).max(1),
            log: LogConfig::from_lookup(&lookup),
        })
    }
}

/// Reconnect policy for the worker agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reconnect after failures and disconnects.
    pub enabled: bool,
    /// Consecutive failed attempts before giving up (0 = never give up).
    pub max_attempts: u32,
    /// First delay between attempts.
    pub initial_backoff: Duration,
    /// Upper bound for the doubling delay.
    pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Returns `true` if another attempt is allowed after `failures`
    /// consecutive failures.
    #[must_use]
    pub const fn allows(&self, failures: u32) -> bool {
        self.enabled && (self.max_attempts == 0 || failures < self.max_attempts)
    }
}

/// Worker agent configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// WebSocket URL of the coordinator (e.g. `ws://127.0.0.1:3000/ws`).
    pub coordinator_url: String,

    /// Identity sent in `register`.
    pub worker_id: WorkerId,

    /// Per-command execution limit.
    pub command_timeout: Duration,

    /// Reconnect behaviour.
    pub reconnect: ReconnectPolicy,

    /// Starting fuel of the simulated turtle.
    pub turtle_fuel: u64,

    /// Logging options.
    pub log: LogConfig,
}

impl WorkerConfig {
    /// Creates a configuration with defaults for everything but the
    /// coordinator address and identity.
    #[must_use]
    pub fn new(coordinator_url: impl Into<String>, worker_id: WorkerId) -> Self {
        Self {
            coordinator_url: normalize_url(&coordinator_url.into()),
            worker_id,
            command_timeout: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
            turtle_fuel: 1000,
            log: LogConfig::default(),
        }
    }

    /// Loads configuration from environment variables (and `.env`).
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if `WORKER_ID` is not set.
    pub fn from_env() -> Result<Self, AgentError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if `WORKER_ID` is missing, blank or
    /// the reserved wildcard `*`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AgentError> {
        let worker_id = lookup("WORKER_ID")
            .filter(|v| !v.trim().is_empty())
            .map(WorkerId::from)
            .ok_or(ConfigError::Missing("WORKER_ID"))?;
        if worker_id.is_wildcard() {
            return Err(ConfigError::Invalid {
                key: "WORKER_ID",
                reason: "\"*\" is reserved".to_string(),
            }
            .into());
        }
        let coordinator_url = lookup("COORDINATOR_URL")
            .unwrap_or_else(|| "ws://127.0.0.1:3000/ws".to_string());

        let defaults = ReconnectPolicy::default();
        let reconnect = ReconnectPolicy {
            enabled: parse_bool(&lookup, "RECONNECT_ENABLED", defaults.enabled),
            max_attempts: parse(&lookup, "RECONNECT_MAX_ATTEMPTS", defaults.max_attempts),
            initial_backoff: Duration::from_millis(parse(
                &lookup,
                "RECONNECT_INITIAL_BACKOFF_MS",
                500,
            )),
            max_backoff: Duration::from_millis(parse(&lookup, "RECONNECT_MAX_BACKOFF_MS", 30_000)),
        };

        Ok(Self {
            coordinator_url: normalize_url(&coordinator_url),
            worker_id,
            command_timeout: Duration::from_millis(parse(&lookup, "COMMAND_TIMEOUT_MS", 30_000)),
            reconnect,
            turtle_fuel: parse(&lookup, "TURTLE_FUEL", 1000),
            log: LogConfig::from_lookup(&lookup),
        })
    }
}

/// Prefixes `ws://` when the address has no scheme.
fn normalize_url(address: &str) -> String {
    if address.starts_with("ws://") || address.starts_with("wss://") {
        address.to_string()
    } else {
        format!("ws://{address}")
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses a variable as a boolean. Accepts `"true"`, `"1"`, `"false"`,
/// `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
