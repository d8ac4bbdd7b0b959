//! AUTH (RFC 4954) with PLAIN and XOAUTH2.

use postwire_smtp::{AuthMechanism, Command, EnhancedStatusCode, ReplyCode, Response, Verb};

use super::{CommandResult, Connection, reply};
use crate::config::SaslMechanism;
use crate::error::CommandError;
use crate::flags::SessionFlags;
use crate::handler::Handler;
use crate::sasl;

/// What the continuation line answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Pending {
    /// The client response for this mechanism.
    Response(SaslMechanism),
    /// The acknowledgement of an XOAUTH2 error challenge.
    OAuthFailure,
}

fn invalid_credentials() -> CommandError {
    reply(
        ReplyCode::AUTH_FAILED,
        EnhancedStatusCode::PERMANENT + EnhancedStatusCode::AUTH_CREDENTIALS_INVALID,
        "Authentication credentials invalid",
    )
}

fn undecodable(error: &sasl::SaslError) -> CommandError {
    reply(
        ReplyCode::PARAMETER_ERROR,
        EnhancedStatusCode::PERMANENT + EnhancedStatusCode::SYNTAX_ERROR,
        &format!("Cannot decode response, {error}"),
    )
}

impl<H: Handler> Connection<H> {
    pub(super) fn auth(&mut self, command: &Command) -> CommandResult {
        if !self.config.auth_enabled() {
            return Err(CommandError::Disabled(Verb::Auth));
        }

        let flags = self.session.flags;
        if !flags.is_introduced() {
            return Err(CommandError::BadSequence("send EHLO first".into()));
        }
        if flags.is_authenticated() {
            return Err(CommandError::BadSequence("already authenticated".into()));
        }
        if flags.has_from() {
            return Err(CommandError::BadSequence(
                "AUTH not allowed during a mail transaction".into(),
            ));
        }

        let (mechanism, initial) = match command.args() {
            [mechanism] => (mechanism, None),
            [mechanism, initial] => (mechanism, Some(initial.clone())),
            _ => {
                return Err(CommandError::InvalidArguments(
                    "expected AUTH <mechanism> [initial-response]".into(),
                ));
            }
        };

        let mechanism = SaslMechanism::from_mechanism(&AuthMechanism::parse(mechanism))
            .filter(|m| self.config.auth_mechanisms.contains(m))
            .ok_or_else(|| {
                reply(
                    ReplyCode::PARAMETER_NOT_IMPLEMENTED,
                    EnhancedStatusCode::PERMANENT + EnhancedStatusCode::INVALID_ARGUMENTS,
                    "Unrecognized authentication type",
                )
            })?;

        match initial {
            Some(response) => self.authenticate(mechanism, &response),
            None => {
                self.challenge(Pending::Response(mechanism), String::new());
                Ok(())
            }
        }
    }

    /// Handles the continuation line requested by [`challenge`](Self::challenge).
    pub(super) fn auth_response(&mut self, text: &str, id: u32) -> CommandResult {
        self.framer.enter_command();

        let pending = self
            .pending_auth
            .take()
            .filter(|_| id == self.line_id)
            .ok_or_else(|| CommandError::BadSequence("no authentication in progress".into()))?;

        if text == "*" {
            return Err(reply(
                ReplyCode::PARAMETER_ERROR,
                EnhancedStatusCode::PERMANENT + EnhancedStatusCode::OTHER_SECURITY,
                "Authentication cancelled",
            ));
        }

        match pending {
            Pending::Response(mechanism) => self.authenticate(mechanism, text),
            Pending::OAuthFailure => Err(invalid_credentials()),
        }
    }

    fn challenge(&mut self, pending: Pending, text: String) {
        self.pending_auth = Some(pending);
        self.line_id = self.line_id.wrapping_add(1);
        self.framer.enter_line(self.line_id);
        self.reply(Response::new(ReplyCode::AUTH_CONTINUE, text));
    }

    fn authenticate(&mut self, mechanism: SaslMechanism, response: &str) -> CommandResult {
        let user = match mechanism {
            SaslMechanism::Plain => {
                let credentials = sasl::decode_plain(response).map_err(|e| undecodable(&e))?;
                let user = self
                    .handler
                    .verify_password(&self.session, &credentials.authcid, &credentials.password)?
                    .ok_or_else(invalid_credentials)?;

                match credentials.authzid {
                    Some(authzid) if authzid != credentials.authcid => self
                        .handler
                        .lookup_user(&self.session, &authzid)?
                        .ok_or_else(invalid_credentials)?,
                    _ => user,
                }
            }
            SaslMechanism::XOAuth2 => {
                let credentials = sasl::decode_xoauth2(response).map_err(|e| undecodable(&e))?;
                let verified = self.handler.verify_oauth_token(
                    &self.session,
                    &credentials.user,
                    &credentials.token,
                )?;
                let Some(user) = verified else {
                    self.challenge(Pending::OAuthFailure, sasl::xoauth2_failure_challenge());
                    return Ok(());
                };
                user
            }
        };

        tracing::info!(
            peer = %self.session.connection().peer,
            user = %user.name,
            ?mechanism,
            "client authenticated"
        );
        self.session.user = Some(user);
        self.session.flags.insert(SessionFlags::AUTHENTICATED);
        self.reply(Response::enhanced(
            ReplyCode::AUTH_SUCCEEDED,
            EnhancedStatusCode::SUCCESS + EnhancedStatusCode::OTHER_SECURITY,
            "Authentication successful",
        ));
        Ok(())
    }
}
