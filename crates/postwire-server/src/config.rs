//! Server configuration types.

use std::time::Duration;

use postwire_smtp::framer::DEFAULT_MAX_LINE_LENGTH;
use postwire_smtp::{AuthMechanism, Capability};
use serde::Deserialize;

/// SASL mechanisms the server can verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SaslMechanism {
    /// PLAIN (RFC 4616)
    Plain,
    /// `XOAUTH2` bearer tokens
    #[serde(rename = "XOAUTH2")]
    XOAuth2,
}

impl SaslMechanism {
    /// Returns the wire mechanism.
    #[must_use]
    pub const fn mechanism(self) -> AuthMechanism {
        match self {
            Self::Plain => AuthMechanism::Plain,
            Self::XOAuth2 => AuthMechanism::XOAuth2,
        }
    }

    /// Maps a wire mechanism to a supported one.
    #[must_use]
    pub const fn from_mechanism(mechanism: &AuthMechanism) -> Option<Self> {
        match mechanism {
            AuthMechanism::Plain => Some(Self::Plain),
            AuthMechanism::XOAuth2 => Some(Self::XOAuth2),
            _ => None,
        }
    }
}

/// SMTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host name used in the greeting and EHLO reply.
    pub hostname: String,
    /// Text following `ESMTP` in the greeting.
    pub banner: String,
    /// Maximum message size in bytes; advertised with SIZE.
    pub max_message_size: Option<u64>,
    /// Maximum recipients per transaction.
    pub max_recipients: Option<usize>,
    /// Undecodable command lines tolerated before the connection is closed.
    pub max_invalid_commands: u32,
    /// Maximum command line length, excluding CRLF.
    pub max_line_length: usize,
    /// Idle time after which the client is disconnected.
    #[serde(rename = "io_timeout_secs", deserialize_with = "duration_secs")]
    pub io_timeout: Duration,
    /// Accept BDAT (CHUNKING).
    pub chunking: bool,
    /// Accept `BODY=BINARYMIME` (requires chunking).
    pub binary_mime: bool,
    /// Accept `BODY=8BITMIME`.
    pub eight_bit_mime: bool,
    /// Answer VRFY.
    pub vrfy: bool,
    /// Answer EXPN.
    pub expn: bool,
    /// Advertise HELP.
    pub help: bool,
    /// AUTH mechanisms offered; empty disables AUTH.
    pub auth_mechanisms: Vec<SaslMechanism>,
    /// Refuse MAIL until the client authenticated.
    pub require_auth: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            banner: "Service ready".to_string(),
            max_message_size: Some(10 * 1024 * 1024),
            max_recipients: Some(100),
            max_invalid_commands: 10,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            io_timeout: Duration::from_secs(300),
            chunking: true,
            binary_mime: false,
            eight_bit_mime: true,
            vrfy: false,
            expn: false,
            help: true,
            auth_mechanisms: Vec::new(),
            require_auth: false,
        }
    }
}

impl ServerConfig {
    /// Creates a configuration with defaults for the given host name.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Self::default()
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(hostname: impl Into<String>) -> ServerConfigBuilder {
        ServerConfigBuilder::new(hostname)
    }

    /// Returns true if AUTH is offered.
    #[must_use]
    pub fn auth_enabled(&self) -> bool {
        !self.auth_mechanisms.is_empty()
    }

    /// Returns true if `BODY=BINARYMIME` can be used.
    #[must_use]
    pub const fn binary_mime_enabled(&self) -> bool {
        self.binary_mime && self.chunking
    }

    /// Assembles the EHLO capability list.
    #[must_use]
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut capabilities = vec![
            Capability::EnhancedStatusCodes,
            Capability::SmtpUtf8,
            Capability::Pipelining,
        ];

        if let Some(limit) = self.max_message_size {
            capabilities.push(Capability::Size(Some(limit)));
        }
        if self.chunking {
            capabilities.push(Capability::Chunking);
        }
        if self.binary_mime_enabled() {
            capabilities.push(Capability::BinaryMime);
        }
        if self.expn {
            capabilities.push(Capability::Expn);
        }
        if self.vrfy {
            capabilities.push(Capability::Vrfy);
        }
        if self.eight_bit_mime {
            capabilities.push(Capability::EightBitMime);
        }
        if self.auth_enabled() {
            capabilities.push(Capability::Auth(
                self.auth_mechanisms
                    .iter()
                    .map(|m| m.mechanism())
                    .collect(),
            ));
        }
        if self.help {
            capabilities.push(Capability::Help);
        }

        capabilities
    }
}

/// Builder for server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Creates a new builder with the given host name.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            config: ServerConfig::new(hostname),
        }
    }

    /// Sets the greeting banner.
    #[must_use]
    pub fn banner(mut self, banner: impl Into<String>) -> Self {
        self.config.banner = banner.into();
        self
    }

    /// Sets the maximum message size; `None` removes the limit.
    #[must_use]
    pub const fn max_message_size(mut self, size: Option<u64>) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Sets the maximum recipients per transaction.
    #[must_use]
    pub const fn max_recipients(mut self, max: Option<usize>) -> Self {
        self.config.max_recipients = max;
        self
    }

    /// Sets how many undecodable commands are tolerated.
    #[must_use]
    pub const fn max_invalid_commands(mut self, max: u32) -> Self {
        self.config.max_invalid_commands = max;
        self
    }

    /// Sets the maximum command line length.
    #[must_use]
    pub const fn max_line_length(mut self, max: usize) -> Self {
        self.config.max_line_length = max;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Enables or disables CHUNKING.
    #[must_use]
    pub const fn chunking(mut self, enabled: bool) -> Self {
        self.config.chunking = enabled;
        self
    }

    /// Enables or disables BINARYMIME.
    #[must_use]
    pub const fn binary_mime(mut self, enabled: bool) -> Self {
        self.config.binary_mime = enabled;
        self
    }

    /// Enables or disables 8BITMIME.
    #[must_use]
    pub const fn eight_bit_mime(mut self, enabled: bool) -> Self {
        self.config.eight_bit_mime = enabled;
        self
    }

    /// Enables or disables VRFY.
    #[must_use]
    pub const fn vrfy(mut self, enabled: bool) -> Self {
        self.config.vrfy = enabled;
        self
    }

    /// Enables or disables EXPN.
    #[must_use]
    pub const fn expn(mut self, enabled: bool) -> Self {
        self.config.expn = enabled;
        self
    }

    /// Enables or disables HELP.
    #[must_use]
    pub const fn help(mut self, enabled: bool) -> Self {
        self.config.help = enabled;
        self
    }

    /// Sets the offered AUTH mechanisms.
    #[must_use]
    pub fn auth_mechanisms(mut self, mechanisms: impl IntoIterator<Item = SaslMechanism>) -> Self {
        self.config.auth_mechanisms = mechanisms.into_iter().collect();
        self
    }

    /// Requires AUTH before MAIL.
    #[must_use]
    pub const fn require_auth(mut self, required: bool) -> Self {
        self.config.require_auth = required;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

fn duration_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capabilities() {
        let capabilities = ServerConfig::new("mx.example.com").capabilities();
        assert_eq!(
            capabilities,
            vec![
                Capability::EnhancedStatusCodes,
                Capability::SmtpUtf8,
                Capability::Pipelining,
                Capability::Size(Some(10 * 1024 * 1024)),
                Capability::Chunking,
                Capability::EightBitMime,
                Capability::Help,
            ]
        );
    }

    #[test]
    fn test_builder_capabilities() {
        let config = ServerConfig::builder("mx.example.com")
            .max_message_size(None)
            .chunking(false)
            .binary_mime(true)
            .vrfy(true)
            .expn(true)
            .help(false)
            .auth_mechanisms([SaslMechanism::Plain, SaslMechanism::XOAuth2])
            .build();

        let encoded: Vec<String> = config.capabilities().iter().map(Capability::encode).collect();
        assert_eq!(
            encoded,
            vec![
                "ENHANCEDSTATUSCODES",
                "SMTPUTF8",
                "PIPELINING",
                "EXPN",
                "VRFY",
                "8BITMIME",
                "AUTH PLAIN XOAUTH2",
            ]
        );
        assert!(!config.binary_mime_enabled());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ServerConfig = serde_json::from_str(
            r#"{
                "hostname": "mx.example.org",
                "io_timeout_secs": 30,
                "auth_mechanisms": ["PLAIN", "XOAUTH2"],
                "max_message_size": null
            }"#,
        )
        .unwrap();

        assert_eq!(config.hostname, "mx.example.org");
        assert_eq!(config.io_timeout, Duration::from_secs(30));
        assert_eq!(
            config.auth_mechanisms,
            vec![SaslMechanism::Plain, SaslMechanism::XOAuth2]
        );
        assert_eq!(config.max_message_size, None);
        assert_eq!(config.max_invalid_commands, 10);
    }
}
