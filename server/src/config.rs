use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

// Server configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // HTTP/websocket listener bind address.
    pub bind: SocketAddr,
    // Directory for durable room records; in-memory rooms when unset.
    pub rooms_dir: Option<PathBuf>,
    // Close connections silent for this long; never when unset.
    pub idle_timeout: Option<Duration>,
    // Interval of websocket pings while an idle timeout is set.
    pub heartbeat_interval: Duration,
    // Outgoing events buffered per connection before new ones are dropped.
    pub connection_buffer: usize,
}

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_HEARTBEAT_SECS: u64 = 5;
const DEFAULT_CONNECTION_BUFFER: usize = 64;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            rooms_dir: None,
            idle_timeout: None,
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            connection_buffer: DEFAULT_CONNECTION_BUFFER,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match lookup("PORT") {
            Some(port) => port.parse::<u16>().context("PORT must be a port number")?,
            None => DEFAULT_PORT,
        };
        let bind = match lookup("WHITEBOARD_BIND") {
            Some(bind) => bind
                .parse::<SocketAddr>()
                .with_context(|| format!("invalid WHITEBOARD_BIND {:?}", bind))?,
            None => format!("{}:{}", DEFAULT_HOST, port)
                .parse::<SocketAddr>()
                .context("invalid default bind address")?,
        };

        let idle_timeout = match lookup("WHITEBOARD_IDLE_TIMEOUT_SECS") {
            Some(secs) => {
                let secs = secs
                    .parse::<u64>()
                    .context("WHITEBOARD_IDLE_TIMEOUT_SECS must be a number of seconds")?;
                // 0 keeps idle connections open forever.
                Some(secs).filter(|s| *s > 0).map(Duration::from_secs)
            }
            None => None,
        };

        let heartbeat_secs = match lookup("WHITEBOARD_HEARTBEAT_SECS") {
            Some(secs) => secs
                .parse::<u64>()
                .context("WHITEBOARD_HEARTBEAT_SECS must be a number of seconds")?,
            None => DEFAULT_HEARTBEAT_SECS,
        };
        if heartbeat_secs == 0 {
            anyhow::bail!("WHITEBOARD_HEARTBEAT_SECS must be positive");
        }

        let connection_buffer = match lookup("WHITEBOARD_CONNECTION_BUFFER") {
            Some(size) => size
                .parse::<usize>()
                .context("WHITEBOARD_CONNECTION_BUFFER must be a count")?,
            None => DEFAULT_CONNECTION_BUFFER,
        };
        if connection_buffer == 0 {
            anyhow::bail!("WHITEBOARD_CONNECTION_BUFFER must be positive");
        }

        Ok(Self {
            bind,
            rooms_dir: lookup("WHITEBOARD_ROOMS_DIR")
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
            idle_timeout,
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
            connection_buffer,
        })
    }
}
