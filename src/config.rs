//! Server Configuration
//!
//! Environment-driven, with defaults for everything. Unparsable or
//! out-of-range values are logged and replaced by the default.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::{COUNTDOWN_SECONDS, TICK_RATE};

/// Highest accepted tick rate.
pub const MAX_TICK_RATE: u32 = 240;

const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
    7009,
);

/// Settings handed to the session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Simulation steps per second
    pub tick_rate: u32,
    /// Countdown before Running
    pub countdown: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            countdown: Duration::from_secs(COUNTDOWN_SECONDS),
        }
    }
}

impl SessionConfig {
    /// Wall-clock length of one tick.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.tick_rate.max(1)))
    }

    /// Simulated seconds per tick.
    pub fn tick_dt(&self) -> f64 {
        1.0 / f64::from(self.tick_rate.max(1))
    }
}

/// Rejected configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Tick rate outside 1..=240.
    #[error("tick rate must be 1-{MAX_TICK_RATE}, got {0}")]
    TickRate(u32),

    /// Zero connection cap.
    #[error("max_connections must be at least 1")]
    MaxConnections,
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// WebSocket listen address
    pub bind_addr: SocketAddr,
    /// Concurrent connection cap
    pub max_connections: usize,
    /// Controller settings
    pub session: SessionConfig,
    /// JSON-lines results file; in-memory sink when unset
    pub results_path: Option<PathBuf>,
    /// JSON-lines event outbox; no publish channel when unset
    pub events_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR,
            max_connections: 1000,
            session: SessionConfig::default(),
            results_path: None,
            events_path: None,
        }
    }
}

impl ServerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("BIND_ADDR") {
            match addr.parse() {
                Ok(parsed) => config.bind_addr = parsed,
                Err(_) => warn!("Invalid BIND_ADDR '{}', using default", addr),
            }
        }

        if let Some(rate) = lookup("TICK_RATE") {
            match rate.parse::<u32>() {
                Ok(parsed) if (1..=MAX_TICK_RATE).contains(&parsed) => {
                    config.session.tick_rate = parsed;
                }
                Ok(_) => warn!("TICK_RATE must be 1-{}, using default", MAX_TICK_RATE),
                Err(_) => warn!("Invalid TICK_RATE '{}', using default", rate),
            }
        }

        if let Some(secs) = lookup("COUNTDOWN_SECONDS") {
            match secs.parse::<u64>() {
                Ok(parsed) => config.session.countdown = Duration::from_secs(parsed),
                Err(_) => warn!("Invalid COUNTDOWN_SECONDS '{}', using default", secs),
            }
        }

        if let Some(max) = lookup("MAX_CONNECTIONS") {
            match max.parse::<usize>() {
                Ok(parsed) if parsed > 0 => config.max_connections = parsed,
                Ok(_) => warn!("MAX_CONNECTIONS must be > 0, using default"),
                Err(_) => warn!("Invalid MAX_CONNECTIONS '{}', using default", max),
            }
        }

        config.results_path = lookup("RESULTS_PATH").filter(|p| !p.is_empty()).map(PathBuf::from);
        config.events_path = lookup("EVENTS_PATH").filter(|p| !p.is_empty()).map(PathBuf::from);

        config
    }

    /// Validate after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rate = self.session.tick_rate;
        if rate == 0 || rate > MAX_TICK_RATE {
            return Err(ConfigError::TickRate(rate));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::MaxConnections);
        }
        Ok(())
    }
}
