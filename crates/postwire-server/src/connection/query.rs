//! VRFY, EXPN and HELP.

use postwire_smtp::{
    Address, Command, EnhancedStatusCode, MultilineWriter, ReplyCode, Transmit, Verb,
};

use super::{CommandResult, Connection, reply};
use crate::error::CommandError;
use crate::handler::Handler;

const HELP_TEXT: &[&str] = &[
    "Commands supported:",
    "HELO EHLO MAIL RCPT DATA BDAT RSET NOOP QUIT",
    "VRFY EXPN HELP AUTH",
    "See RFC 5321 for details",
];

fn single_argument(command: &Command) -> Result<&str, CommandError> {
    match command.args() {
        [argument] => Ok(argument.as_str()),
        _ => Err(CommandError::InvalidArguments(format!(
            "{} requires exactly one argument",
            command.verb()
        ))),
    }
}

impl<H: Handler> Connection<H> {
    pub(super) fn vrfy(&mut self, command: &Command) -> CommandResult {
        if !self.config.vrfy {
            return Err(CommandError::Disabled(Verb::Vrfy));
        }
        let argument = single_argument(command)?;
        let argument = argument
            .strip_prefix('<')
            .and_then(|a| a.strip_suffix('>'))
            .unwrap_or(argument);

        let matches = if argument.contains('@') {
            let address = Address::new(argument).map_err(|_| {
                reply(
                    ReplyCode::PARAMETER_ERROR,
                    EnhancedStatusCode::PERMANENT + EnhancedStatusCode::BAD_DESTINATION_SYNTAX,
                    "Bad address syntax",
                )
            })?;
            self.handler.verify_mailbox(&self.session, &address)?
        } else {
            self.handler.verify_name(&self.session, argument)?
        };

        match matches.as_slice() {
            [] => Err(reply(
                ReplyCode::MAILBOX_UNAVAILABLE,
                EnhancedStatusCode::PERMANENT + EnhancedStatusCode::BAD_DESTINATION_MAILBOX,
                "No such user",
            )),
            [mailbox] => {
                self.ok(EnhancedStatusCode::DESTINATION_VALID, format!("<{mailbox}>"));
                Ok(())
            }
            _ => Err(reply(
                ReplyCode::MAILBOX_UNAVAILABLE,
                EnhancedStatusCode::PERMANENT + EnhancedStatusCode::DESTINATION_AMBIGUOUS,
                "User ambiguous",
            )),
        }
    }

    pub(super) fn expn(&mut self, command: &Command) -> CommandResult {
        if !self.config.expn {
            return Err(CommandError::Disabled(Verb::Expn));
        }
        let list = single_argument(command)?;

        let members = self.handler.expand_list(&self.session, list)?;
        if members.is_empty() {
            return Err(reply(
                ReplyCode::MAILBOX_UNAVAILABLE,
                EnhancedStatusCode::PERMANENT + EnhancedStatusCode::BAD_DESTINATION_MAILBOX,
                "No such list",
            ));
        }

        let mut data = Vec::new();
        MultilineWriter::new(
            ReplyCode::OK,
            Some(EnhancedStatusCode::SUCCESS + EnhancedStatusCode::DESTINATION_VALID),
        )
        .write(members.iter().map(|member| format!("<{member}>")), &mut data);
        self.transmits.push_back(Transmit::new(data));
        Ok(())
    }

    pub(super) fn help(&mut self, command: &Command) -> CommandResult {
        if !self.config.help {
            return Err(CommandError::Disabled(Verb::Help));
        }
        super::no_args(command)?;

        let mut data = Vec::new();
        MultilineWriter::new(ReplyCode::HELP, Some(EnhancedStatusCode::SUCCESS))
            .write(HELP_TEXT, &mut data);
        self.transmits.push_back(Transmit::new(data));
        Ok(())
    }
}
