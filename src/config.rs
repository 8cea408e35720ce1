use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Hostname of the settlement node's event feed
    #[serde(default = "default_feed_host")]
    pub feed_host: String,

    /// Port of the settlement node's event feed
    #[serde(default = "default_feed_port")]
    pub feed_port: u16,

    /// Use wss:// instead of ws:// for the feed connection
    #[serde(default)]
    pub feed_secure: bool,

    /// Timeout for establishing the feed connection in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Delay between reconnection attempts in milliseconds
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Maximum number of finalized messages retained in the queue.
    /// Oldest entries are evicted once the cap is exceeded.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Maximum number of incomplete chunk-reassembly buffers held at once
    #[serde(default = "default_max_incomplete_messages")]
    pub max_incomplete_messages: usize,

    /// Seconds of inactivity after which an incomplete reassembly buffer
    /// is swept
    #[serde(default = "default_chunk_stale_secs")]
    pub chunk_stale_secs: u64,

    #[serde(default = "default_server_host")]
    pub server_host: String,

    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

fn default_feed_host() -> String {
    "127.0.0.1".to_string()
}

fn default_feed_port() -> u16 {
    4001
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_reconnect_interval_ms() -> u64 {
    5_000
}

fn default_max_queue_size() -> usize {
    1_000
}

fn default_max_incomplete_messages() -> usize {
    256
}

fn default_chunk_stale_secs() -> u64 {
    300
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_host: default_feed_host(),
            feed_port: default_feed_port(),
            feed_secure: false,
            connect_timeout_ms: default_connect_timeout_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_queue_size: default_max_queue_size(),
            max_incomplete_messages: default_max_incomplete_messages(),
            chunk_stale_secs: default_chunk_stale_secs(),
            server_host: default_server_host(),
            server_port: default_server_port(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            // Use double-underscore for nesting so single underscores remain part of the key,
            // allowing env vars like FEED_HOST / MAX_QUEUE_SIZE to map to snake_case fields.
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        cfg.try_deserialize()
    }

    /// The feed endpoint URL
    pub fn feed_url(&self) -> String {
        let scheme = if self.feed_secure { "wss" } else { "ws" };
        format!("{}://{}:{}", scheme, self.feed_host, self.feed_port)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.server_host, self.server_port)
            .parse()
            .expect("Invalid server address")
    }

    /// Get feed connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Get reconnect interval as Duration
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// Get reassembly buffer staleness window as Duration
    pub fn chunk_stale(&self) -> Duration {
        Duration::from_secs(self.chunk_stale_secs)
    }
}
