//! ESMTP capabilities advertised in the EHLO reply.

use std::fmt;
use std::ops::BitOr;

use crate::SEPARATOR;
use crate::error::{Error, Result};

/// A single EHLO capability line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// SIZE - Maximum message size; `None` means no announced limit
    Size(Option<u64>),
    /// PIPELINING - Command pipelining
    Pipelining,
    /// STARTTLS - TLS upgrade
    StartTls,
    /// 8BITMIME - 8-bit MIME transport
    EightBitMime,
    /// SMTPUTF8 - UTF-8 email addresses
    SmtpUtf8,
    /// AUTH - Authentication
    Auth(Vec<AuthMechanism>),
    /// ENHANCEDSTATUSCODES - RFC 3463 codes in replies
    EnhancedStatusCodes,
    /// CHUNKING - BDAT transfer
    Chunking,
    /// BINARYMIME - Binary MIME
    BinaryMime,
    /// VRFY - Mailbox verification
    Vrfy,
    /// EXPN - Mailing list expansion
    Expn,
    /// DSN - Delivery status notifications
    Dsn,
    /// HELP - Help text
    Help,
    /// Unknown extension
    Unknown {
        /// Upper-cased keyword.
        keyword: String,
        /// Remaining tokens.
        args: Vec<String>,
    },
}

impl Capability {
    /// Decodes a capability line (without the reply code).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapability`] for an empty line, or a SIZE line
    /// with more than one argument or a non-numeric argument.
    pub fn decode(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let keyword = parts
            .next()
            .ok_or_else(|| Error::InvalidCapability(line.to_string()))?
            .to_ascii_uppercase();
        let args: Vec<&str> = parts.collect();

        let capability = match keyword.as_str() {
            "SIZE" => match args.as_slice() {
                [] => Self::Size(None),
                [limit] => Self::Size(Some(
                    limit
                        .parse()
                        .map_err(|_| Error::InvalidCapability(line.to_string()))?,
                )),
                _ => return Err(Error::InvalidCapability(line.to_string())),
            },
            "PIPELINING" => Self::Pipelining,
            "STARTTLS" => Self::StartTls,
            "8BITMIME" => Self::EightBitMime,
            "SMTPUTF8" => Self::SmtpUtf8,
            "AUTH" => Self::Auth(args.iter().map(|m| AuthMechanism::parse(m)).collect()),
            "ENHANCEDSTATUSCODES" => Self::EnhancedStatusCodes,
            "CHUNKING" => Self::Chunking,
            "BINARYMIME" => Self::BinaryMime,
            "VRFY" => Self::Vrfy,
            "EXPN" => Self::Expn,
            "DSN" => Self::Dsn,
            "HELP" => Self::Help,
            _ => Self::Unknown {
                keyword,
                args: args.into_iter().map(str::to_string).collect(),
            },
        };

        Ok(capability)
    }

    /// Decodes the message lines of an EHLO reply, skipping the greeting line.
    ///
    /// # Errors
    ///
    /// Returns the first capability decode error.
    pub fn decode_all<S: AsRef<str>>(lines: &[S]) -> Result<Vec<Self>> {
        lines
            .iter()
            .skip(1)
            .map(|line| Self::decode(line.as_ref()))
            .collect()
    }

    /// Returns the capability keyword.
    #[must_use]
    pub fn keyword(&self) -> &str {
        match self {
            Self::Size(_) => "SIZE",
            Self::Pipelining => "PIPELINING",
            Self::StartTls => "STARTTLS",
            Self::EightBitMime => "8BITMIME",
            Self::SmtpUtf8 => "SMTPUTF8",
            Self::Auth(_) => "AUTH",
            Self::EnhancedStatusCodes => "ENHANCEDSTATUSCODES",
            Self::Chunking => "CHUNKING",
            Self::BinaryMime => "BINARYMIME",
            Self::Vrfy => "VRFY",
            Self::Expn => "EXPN",
            Self::Dsn => "DSN",
            Self::Help => "HELP",
            Self::Unknown { keyword, .. } => keyword,
        }
    }

    /// Encodes the capability as `TYPE[ ARG ...]`.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut line = self.keyword().to_string();
        let mut push = |arg: &str| {
            line.push_str(SEPARATOR);
            line.push_str(arg);
        };

        match self {
            Self::Size(Some(limit)) => push(&limit.to_string()),
            Self::Auth(mechanisms) => mechanisms.iter().for_each(|m| push(m.as_str())),
            Self::Unknown { args, .. } => args.iter().for_each(|arg| push(arg)),
            _ => {}
        }

        line
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN - plaintext authentication
    Plain,
    /// LOGIN - legacy plaintext
    Login,
    /// CRAM-MD5 - challenge-response
    CramMd5,
    /// `XOAUTH2` - `OAuth2` (Google/Microsoft)
    XOAuth2,
    /// `OAUTHBEARER` - RFC 7628 `OAuth2`
    OAuthBearer,
    /// Any other advertised mechanism, upper-cased
    Other(String),
}

impl AuthMechanism {
    /// Parses an authentication mechanism name.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Self::Plain,
            "LOGIN" => Self::Login,
            "CRAM-MD5" => Self::CramMd5,
            "XOAUTH2" => Self::XOAuth2,
            "OAUTHBEARER" => Self::OAuthBearer,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the mechanism name as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
            Self::OAuthBearer => "OAUTHBEARER",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of boolean ESMTP features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Features(u16);

impl Features {
    /// No features.
    pub const NONE: Self = Self(0);
    /// PIPELINING
    pub const PIPELINING: Self = Self(1);
    /// STARTTLS
    pub const STARTTLS: Self = Self(1 << 1);
    /// 8BITMIME
    pub const EIGHT_BIT_MIME: Self = Self(1 << 2);
    /// SMTPUTF8
    pub const SMTP_UTF8: Self = Self(1 << 3);
    /// AUTH
    pub const AUTH: Self = Self(1 << 4);
    /// VRFY
    pub const VRFY: Self = Self(1 << 5);
    /// CHUNKING
    pub const CHUNKING: Self = Self(1 << 6);
    /// EXPN
    pub const EXPN: Self = Self(1 << 7);
    /// ENHANCEDSTATUSCODES
    pub const ENHANCED_STATUS_CODES: Self = Self(1 << 8);
    /// BINARYMIME
    pub const BINARY_MIME: Self = Self(1 << 9);
    /// DSN
    pub const DSN: Self = Self(1 << 10);

    /// Returns true if every feature in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets the features in `other`.
    pub const fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Returns true if no feature is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Features {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Snapshot of what a remote server advertised in its EHLO reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerOpts {
    /// Maximum message size, if announced.
    pub max_message_size: Option<u64>,
    /// Boolean features.
    pub features: Features,
    /// Advertised AUTH mechanisms.
    pub auth_mechanisms: Vec<AuthMechanism>,
}

impl ServerOpts {
    /// Folds decoded capabilities into a snapshot.
    #[must_use]
    pub fn from_capabilities(capabilities: &[Capability]) -> Self {
        let mut opts = Self::default();

        for capability in capabilities {
            let feature = match capability {
                Capability::Size(limit) => {
                    opts.max_message_size = *limit;
                    continue;
                }
                Capability::Auth(mechanisms) => {
                    opts.auth_mechanisms.extend(mechanisms.iter().cloned());
                    Features::AUTH
                }
                Capability::Pipelining => Features::PIPELINING,
                Capability::StartTls => Features::STARTTLS,
                Capability::EightBitMime => Features::EIGHT_BIT_MIME,
                Capability::SmtpUtf8 => Features::SMTP_UTF8,
                Capability::Vrfy => Features::VRFY,
                Capability::Chunking => Features::CHUNKING,
                Capability::Expn => Features::EXPN,
                Capability::EnhancedStatusCodes => Features::ENHANCED_STATUS_CODES,
                Capability::BinaryMime => Features::BINARY_MIME,
                Capability::Dsn => Features::DSN,
                Capability::Help | Capability::Unknown { .. } => continue,
            };
            opts.features.insert(feature);
        }

        opts
    }

    /// Returns true if PIPELINING is supported.
    #[must_use]
    pub const fn supports_pipelining(&self) -> bool {
        self.features.contains(Features::PIPELINING)
    }

    /// Returns true if STARTTLS is supported.
    #[must_use]
    pub const fn supports_starttls(&self) -> bool {
        self.features.contains(Features::STARTTLS)
    }

    /// Returns true if 8BITMIME is supported.
    #[must_use]
    pub const fn supports_8bitmime(&self) -> bool {
        self.features.contains(Features::EIGHT_BIT_MIME)
    }

    /// Returns true if SMTPUTF8 is supported.
    #[must_use]
    pub const fn supports_smtputf8(&self) -> bool {
        self.features.contains(Features::SMTP_UTF8)
    }

    /// Returns true if CHUNKING is supported.
    #[must_use]
    pub const fn supports_chunking(&self) -> bool {
        self.features.contains(Features::CHUNKING)
    }

    /// Returns true if the given AUTH mechanism is advertised.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &AuthMechanism) -> bool {
        self.auth_mechanisms.contains(mechanism)
    }
}
