//! Envelope addresses and `MAIL FROM` / `RCPT TO` argument parsing.

use std::fmt;

use crate::error::{Error, Result};

/// Mailbox address used in the SMTP envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the part before the `@`.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.rsplit_once('@').map_or(&self.0, |(local, _)| local)
    }

    /// Returns the part after the `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.rsplit_once('@').map_or("", |(_, domain)| domain)
    }

    /// Returns true for `user%host@relay` style relay addressing.
    #[must_use]
    pub fn is_percent_hack(&self) -> bool {
        self.local_part().contains('%')
    }

    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if addr
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>'))
        {
            return Err(Error::InvalidAddress(format!(
                "Address contains invalid characters: {addr}"
            )));
        }

        let Some((local, domain)) = addr.rsplit_once('@') else {
            return Err(Error::InvalidAddress("Address must contain @".into()));
        };

        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(
                "Local and domain parts cannot be empty".into(),
            ));
        }

        if domain.contains('@') || (local.contains('@') && !local.starts_with('"')) {
            return Err(Error::InvalidAddress(
                "Address must have exactly one @".into(),
            ));
        }

        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `KEY[=VALUE]` parameter following the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Upper-cased keyword.
    pub keyword: String,
    /// Value, if any.
    pub value: Option<String>,
}

/// Parsed `FROM:<path> params` or `TO:<path> params` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathArgs {
    /// Mailbox, or `None` for the null path `<>`.
    pub address: Option<Address>,
    /// Source route hops (`@a,@b:`) preceding the mailbox.
    pub source_route: Vec<String>,
    /// Trailing ESMTP parameters.
    pub params: Vec<Parameter>,
}

impl PathArgs {
    /// Parses the arguments of MAIL (`keyword` = `"FROM"`) or RCPT
    /// (`keyword` = `"TO"`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Syntax`] if the keyword or brackets are missing and
    /// [`Error::InvalidAddress`] if the mailbox is malformed.
    pub fn parse(raw: &str, keyword: &str) -> Result<Self> {
        let raw = raw.trim();
        let rest = raw
            .get(..keyword.len())
            .filter(|prefix| prefix.eq_ignore_ascii_case(keyword))
            .and_then(|_| raw[keyword.len()..].strip_prefix(':'))
            .ok_or_else(|| Error::Syntax(format!("expected {keyword}:<path>")))?
            .trim_start();

        let (path, params) = rest
            .strip_prefix('<')
            .and_then(|rest| rest.split_once('>'))
            .ok_or_else(|| Error::Syntax(format!("expected <path>, got {rest}")))?;

        let (source_route, mailbox) = match path.split_once(':') {
            Some((route, mailbox)) if path.starts_with('@') => (
                route
                    .split(',')
                    .map(|hop| hop.trim().trim_start_matches('@').to_string())
                    .collect(),
                mailbox,
            ),
            _ => (Vec::new(), path),
        };

        let address = if mailbox.is_empty() {
            None
        } else {
            Some(Address::new(mailbox)?)
        };

        let params = params
            .split_whitespace()
            .map(|param| match param.split_once('=') {
                Some((key, value)) => Parameter {
                    keyword: key.to_ascii_uppercase(),
                    value: Some(value.to_string()),
                },
                None => Parameter {
                    keyword: param.to_ascii_uppercase(),
                    value: None,
                },
            })
            .collect();

        Ok(Self {
            address,
            source_route,
            params,
        })
    }

    /// Returns true if the path routes through other hosts.
    #[must_use]
    pub fn is_relay(&self) -> bool {
        !self.source_route.is_empty() || self.address.as_ref().is_some_and(Address::is_percent_hack)
    }

    /// Looks up a parameter value by keyword.
    #[must_use]
    pub fn param(&self, keyword: &str) -> Option<&Parameter> {
        self.params
            .iter()
            .find(|param| param.keyword.eq_ignore_ascii_case(keyword))
    }
}
