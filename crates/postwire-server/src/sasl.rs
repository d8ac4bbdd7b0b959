//! Server side of the SASL mechanisms offered with AUTH.
//!
//! Implements:
//! - PLAIN (RFC 4616) - `[authzid] NUL authcid NUL password`
//! - XOAUTH2 (Google/Microsoft proprietary) - `user=<user>^Aauth=Bearer <token>^A^A`

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use thiserror::Error;

/// Client response that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaslError {
    /// Not valid base64.
    #[error("invalid base64")]
    Base64,
    /// Decoded bytes are not UTF-8.
    #[error("response is not UTF-8")]
    Utf8,
    /// Decoded response does not have the mechanism's format.
    #[error("malformed {0} response")]
    Malformed(&'static str),
}

/// Decoded PLAIN credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainCredentials {
    /// Authorization identity, when different from the authentication identity.
    pub authzid: Option<String>,
    /// Authentication identity.
    pub authcid: String,
    /// Password.
    pub password: String,
}

/// Decoded XOAUTH2 credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    /// User the token belongs to.
    pub user: String,
    /// Bearer token.
    pub token: String,
}

fn decode(response: &str) -> Result<String, SaslError> {
    // A lone "=" is an empty initial response (RFC 4954).
    if response == "=" {
        return Ok(String::new());
    }
    let bytes = STANDARD
        .decode(response.trim())
        .map_err(|_| SaslError::Base64)?;
    String::from_utf8(bytes).map_err(|_| SaslError::Utf8)
}

/// Decodes a base64 PLAIN response.
///
/// # Errors
///
/// Returns an error if the response is not base64 or not three NUL separated fields.
pub fn decode_plain(response: &str) -> Result<PlainCredentials, SaslError> {
    let decoded = decode(response)?;
    let mut fields = decoded.split('\0');

    let (Some(authzid), Some(authcid), Some(password), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(SaslError::Malformed("PLAIN"));
    };

    if authcid.is_empty() {
        return Err(SaslError::Malformed("PLAIN"));
    }

    Ok(PlainCredentials {
        authzid: (!authzid.is_empty()).then(|| authzid.to_string()),
        authcid: authcid.to_string(),
        password: password.to_string(),
    })
}

/// Decodes a base64 XOAUTH2 response.
///
/// # Errors
///
/// Returns an error if the response is not base64 or lacks the `user=` or
/// `auth=Bearer` fields.
pub fn decode_xoauth2(response: &str) -> Result<OAuthCredentials, SaslError> {
    let decoded = decode(response)?;

    let mut user = None;
    let mut token = None;
    for field in decoded.split('\x01').filter(|field| !field.is_empty()) {
        if let Some(value) = field.strip_prefix("user=") {
            user = Some(value);
        } else if let Some(value) = field.strip_prefix("auth=") {
            token = value
                .split_once(' ')
                .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("Bearer"))
                .map(|(_, token)| token);
        }
    }

    match (user, token) {
        (Some(user), Some(token)) if !user.is_empty() && !token.is_empty() => Ok(OAuthCredentials {
            user: user.to_string(),
            token: token.to_string(),
        }),
        _ => Err(SaslError::Malformed("XOAUTH2")),
    }
}

/// Error document sent as a 334 challenge after a rejected XOAUTH2 token.
#[derive(Debug, Clone, Serialize)]
struct OAuthError<'a> {
    status: &'a str,
    schemes: &'a str,
}

/// Returns the base64 challenge announcing a rejected XOAUTH2 token.
#[must_use]
pub fn xoauth2_failure_challenge() -> String {
    let document = OAuthError {
        status: "401",
        schemes: "bearer",
    };
    let json = serde_json::to_string(&document).unwrap_or_default();
    STANDARD.encode(json.as_bytes())
}
