use async_trait::async_trait;

use crate::{
    channel::SessionStream,
    command::Command,
    connection::Connection,
    error::{SessionError, SmtpResult},
    extensions::Extension,
    message::MessageBuilder,
    response::Response,
    status::Status,
};

/// MAIL: opens a transaction.
///
/// Accepts `MAIL FROM:<reverse-path> [param...]` with the null sender `<>`
/// allowed, validates every ESMTP parameter before any state changes, then
/// consults the policy and allocates the message builder.
pub struct Mail;

#[async_trait]
impl<Stream: SessionStream> super::Verb<Stream> for Mail {
    async fn process(
        &self,
        connection: &mut Connection<Stream>,
        command: &Command,
    ) -> SmtpResult<()> {
        if connection.message_builder().is_some() {
            return Err(SessionError::rejected(
                Status::BadSequenceOfCommands,
                "A mail transaction is already in progress",
            ));
        }

        let args = command.arguments();

        if !args
            .first()
            .is_some_and(|arg| arg.eq_ignore_ascii_case("FROM"))
        {
            return Err(SessionError::rejected(
                Status::SyntaxErrorInCommandArguments,
                "Expected MAIL FROM:<address>",
            ));
        }

        // The null reverse-path <> tokenizes to an empty string, which is a
        // legitimate sender for bounces
        let Some(from) = args.get(1) else {
            return Err(SessionError::rejected(
                Status::SyntaxErrorInCommandArguments,
                "Expected MAIL FROM:<address>",
            ));
        };

        let mut declared_size = None;
        let mut eight_bit = false;

        for parameter in &args[2..] {
            match parameter.split_once('=') {
                Some((key, value)) if key.eq_ignore_ascii_case("SIZE") => {
                    let size: u64 = value.parse().map_err(|_| {
                        SessionError::rejected(
                            Status::SyntaxErrorInCommandArguments,
                            format!("Invalid SIZE parameter value '{value}'"),
                        )
                    })?;

                    let maximum = connection
                        .policy()
                        .maximum_message_size(connection.session());
                    if maximum.is_some_and(|max| size > max) {
                        return Err(SessionError::rejected(
                            Status::ExceededStorageAllocation,
                            "Message exceeds maximum allowed size",
                        ));
                    }

                    declared_size = Some(size);
                }
                Some((key, value)) if key.eq_ignore_ascii_case("BODY") => {
                    if value.eq_ignore_ascii_case("8BITMIME") {
                        if !connection.has_extension(Extension::EightBitMime) {
                            return Err(SessionError::rejected(
                                Status::CommandParameterNotImplemented,
                                "BODY=8BITMIME is not available",
                            ));
                        }
                        eight_bit = true;
                    } else if !value.eq_ignore_ascii_case("7BIT") {
                        return Err(SessionError::rejected(
                            Status::SyntaxErrorInCommandArguments,
                            format!("Unknown BODY value '{value}'"),
                        ));
                    }
                }
                _ => {
                    return Err(SessionError::rejected(
                        Status::SyntaxErrorInCommandArguments,
                        format!("Unknown parameter '{parameter}'"),
                    ));
                }
            }
        }

        let policy = connection.policy();
        policy
            .message_start(connection.session(), from)
            .await
            .map_err(SessionError::Rejected)?;

        let mut builder = MessageBuilder::new(from.clone(), connection.session().is_secure());
        if let Some(size) = declared_size {
            builder.set_declared_size(size);
        }
        if eight_bit {
            builder.set_eight_bit_transport();
        }
        connection.begin_message(builder);

        connection
            .write_response(&Response::new(Status::Ok, "New message started"))
            .await
    }
}
