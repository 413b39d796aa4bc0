//! Client configuration.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Where and how the client connects.
///
/// The server URL is `ws://<host>:<port>/<path>/<client_name>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Server host name or address.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Name the client announces itself under. Appears in the URL path.
    pub client_name: String,

    /// First path segment of the URL.
    pub path: String,

    /// Fixed delay between reconnect attempts. There is no backoff growth.
    pub reconnect_delay: Duration,

    /// Period between time-sync probes while connected.
    pub time_sync_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
            client_name: generate_client_name(),
            path: Self::DEFAULT_PATH.to_string(),
            reconnect_delay: Self::DEFAULT_RECONNECT_DELAY,
            time_sync_interval: ntlink_clock::DEFAULT_SYNC_INTERVAL,
        }
    }
}

impl ClientConfig {
    pub const DEFAULT_HOST: &'static str = "localhost";
    pub const DEFAULT_PORT: u16 = 5810;
    pub const DEFAULT_PATH: &'static str = "nt";
    pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(500);

    /// Creates a builder with default settings.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Replaces unusable values with defaults so the config is safe to use.
    ///
    /// Called automatically when a client is created. Rules:
    /// - An empty host becomes [`Self::DEFAULT_HOST`].
    /// - An empty client name is regenerated.
    /// - Leading and trailing `/` are stripped from `path`; empty becomes
    ///   [`Self::DEFAULT_PATH`].
    /// - Zero durations become their defaults.
    pub fn validated(mut self) -> Self {
        if self.host.trim().is_empty() {
            warn!("empty host, using {}", Self::DEFAULT_HOST);
            self.host = Self::DEFAULT_HOST.to_string();
        }
        if self.client_name.trim().is_empty() {
            self.client_name = generate_client_name();
            warn!(name = %self.client_name, "empty client name, generated one");
        }
        let path = self.path.trim_matches('/');
        self.path = if path.is_empty() {
            Self::DEFAULT_PATH.to_string()
        } else {
            path.to_string()
        };
        if self.reconnect_delay.is_zero() {
            warn!("reconnect_delay is zero, using default");
            self.reconnect_delay = Self::DEFAULT_RECONNECT_DELAY;
        }
        if self.time_sync_interval.is_zero() {
            warn!("time_sync_interval is zero, using default");
            self.time_sync_interval = ntlink_clock::DEFAULT_SYNC_INTERVAL;
        }
        self
    }

    /// The server URL.
    pub fn url(&self) -> String {
        format!(
            "ws://{}:{}/{}/{}",
            self.host, self.port, self.path, self.client_name
        )
    }
}

/// A random client name, `ntlink-` followed by eight hex digits.
pub fn generate_client_name() -> String {
    format!("ntlink-{:08x}", rand::rng().random::<u32>())
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`ClientConfig`].
///
/// # Example
///
/// ```
/// use ntlink::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .host("10.0.0.2")
///     .client_name("dashboard")
///     .build();
/// assert_eq!(config.url(), "ws://10.0.0.2:5810/nt/dashboard");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.config.client_name = name.into();
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    pub fn time_sync_interval(mut self, interval: Duration) -> Self {
        self.config.time_sync_interval = interval;
        self
    }

    /// Finishes the builder. The result is already [`validated`].
    ///
    /// [`validated`]: ClientConfig::validated
    pub fn build(self) -> ClientConfig {
        self.config.validated()
    }
}
