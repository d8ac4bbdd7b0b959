//! SMTP command lines.

use std::cell::OnceCell;
use std::fmt;

use crate::error::{Error, Result};
use crate::{CRLF, SEPARATOR};

/// Known SMTP command verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// HELO - Simple greeting
    Helo,
    /// EHLO - Extended greeting
    Ehlo,
    /// MAIL - Start mail transaction
    Mail,
    /// RCPT - Add recipient
    Rcpt,
    /// DATA - Begin dot-terminated message data
    Data,
    /// BDAT - Binary data chunk (RFC 3030)
    Bdat,
    /// RSET - Reset transaction
    Rset,
    /// NOOP - No operation
    Noop,
    /// VRFY - Verify mailbox
    Vrfy,
    /// EXPN - Expand mailing list
    Expn,
    /// HELP - Help text
    Help,
    /// QUIT - Close connection
    Quit,
    /// AUTH - SASL authentication (RFC 4954)
    Auth,
    /// STARTTLS - Upgrade to TLS (RFC 3207)
    StartTls,
    /// TURN - Reverse roles (obsolete)
    Turn,
    /// ETRN - Remote queue start (RFC 1985)
    Etrn,
    /// ATRN - Authenticated TURN (RFC 2645)
    Atrn,
    /// SEND - Send to terminal (obsolete)
    Send,
    /// SOML - Send or mail (obsolete)
    Soml,
    /// SAML - Send and mail (obsolete)
    Saml,
    /// BURL - Message assembly from URL (RFC 4468)
    Burl,
    /// VERB - Verbose mode (Sendmail)
    Verb,
}

impl Verb {
    /// Every known verb, in wire order of the table above.
    pub const ALL: [Self; 22] = [
        Self::Helo,
        Self::Ehlo,
        Self::Mail,
        Self::Rcpt,
        Self::Data,
        Self::Bdat,
        Self::Rset,
        Self::Noop,
        Self::Vrfy,
        Self::Expn,
        Self::Help,
        Self::Quit,
        Self::Auth,
        Self::StartTls,
        Self::Turn,
        Self::Etrn,
        Self::Atrn,
        Self::Send,
        Self::Soml,
        Self::Saml,
        Self::Burl,
        Self::Verb,
    ];

    /// Parses an upper-case verb token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|verb| verb.as_str() == token)
    }

    /// Returns the verb as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Helo => "HELO",
            Self::Ehlo => "EHLO",
            Self::Mail => "MAIL",
            Self::Rcpt => "RCPT",
            Self::Data => "DATA",
            Self::Bdat => "BDAT",
            Self::Rset => "RSET",
            Self::Noop => "NOOP",
            Self::Vrfy => "VRFY",
            Self::Expn => "EXPN",
            Self::Help => "HELP",
            Self::Quit => "QUIT",
            Self::Auth => "AUTH",
            Self::StartTls => "STARTTLS",
            Self::Turn => "TURN",
            Self::Etrn => "ETRN",
            Self::Atrn => "ATRN",
            Self::Send => "SEND",
            Self::Soml => "SOML",
            Self::Saml => "SAML",
            Self::Burl => "BURL",
            Self::Verb => "VERB",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded SMTP command: verb plus raw argument text.
///
/// Arguments are split on single spaces the first time [`args`](Self::args)
/// is called and the split is cached.
#[derive(Clone)]
pub struct Command {
    verb: Verb,
    raw_args: Option<String>,
    args: OnceCell<Vec<String>>,
}

impl Command {
    /// Creates a command from a verb and optional raw argument text.
    #[must_use]
    pub fn new(verb: Verb, raw_args: Option<String>) -> Self {
        Self {
            verb,
            raw_args: raw_args.filter(|args| !args.trim().is_empty()),
            args: OnceCell::new(),
        }
    }

    /// Creates a command without arguments.
    #[must_use]
    pub fn bare(verb: Verb) -> Self {
        Self::new(verb, None)
    }

    /// Creates a command with the given argument text.
    #[must_use]
    pub fn with_args(verb: Verb, args: impl Into<String>) -> Self {
        Self::new(verb, Some(args.into()))
    }

    /// Decodes a single command line (with or without its CRLF).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Syntax`] for an empty line and
    /// [`Error::InvalidCommand`] for an unknown verb.
    pub fn decode(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Err(Error::Syntax("empty command line".into()));
        }

        let (token, rest) = line.split_once(SEPARATOR).unwrap_or((line, ""));
        let verb = Verb::parse(&token.to_ascii_uppercase())
            .ok_or_else(|| Error::InvalidCommand(token.to_string()))?;

        let rest = rest.trim();
        Ok(Self::new(verb, (!rest.is_empty()).then(|| rest.to_string())))
    }

    /// Returns the command verb.
    #[must_use]
    pub const fn verb(&self) -> Verb {
        self.verb
    }

    /// Returns the raw argument text, if any.
    #[must_use]
    pub fn raw_args(&self) -> Option<&str> {
        self.raw_args.as_deref()
    }

    /// Returns the arguments split on single spaces.
    pub fn args(&self) -> &[String] {
        self.args.get_or_init(|| {
            self.raw_args
                .as_deref()
                .map(|raw| {
                    raw.split(SEPARATOR)
                        .map(str::trim)
                        .filter(|arg| !arg.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    /// Returns true if the command carries no arguments.
    #[must_use]
    pub fn has_no_args(&self) -> bool {
        self.raw_args.is_none()
    }

    /// Encodes the command, optionally terminated with CRLF.
    #[must_use]
    pub fn encode(&self, line_ending: bool) -> String {
        let mut line = String::from(self.verb.as_str());
        for arg in self.args() {
            line.push_str(SEPARATOR);
            line.push_str(arg);
        }
        if line_ending {
            line.push_str(CRLF);
        }
        line
    }

    /// Serializes the command to wire bytes including CRLF.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        self.encode(true).into_bytes()
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.verb == other.verb && self.args() == other.args()
    }
}

impl Eq for Command {}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("verb", &self.verb)
            .field("args", &self.raw_args)
            .finish()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode(false))
    }
}
