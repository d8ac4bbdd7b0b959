//! Client configuration types.

use std::time::Duration;

use postwire_smtp::framer::DEFAULT_MAX_LINE_LENGTH;

/// SMTP client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Host name announced with EHLO/HELO.
    pub hostname: String,
    /// Interval between NOOPs while no message is queued.
    pub keep_alive: Duration,
    /// Maximum reply line length.
    pub max_line_length: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("localhost")
    }
}

impl ClientConfig {
    /// Creates a configuration with a 60 second keep-alive.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            keep_alive: Duration::from_secs(60),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(hostname: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(hostname)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Creates a new builder with the given host name.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            config: ClientConfig::new(hostname),
        }
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub const fn keep_alive(mut self, interval: Duration) -> Self {
        self.config.keep_alive = interval;
        self
    }

    /// Sets the maximum reply line length.
    #[must_use]
    pub const fn max_line_length(mut self, max: usize) -> Self {
        self.config.max_line_length = max;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
