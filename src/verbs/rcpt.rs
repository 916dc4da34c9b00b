use async_trait::async_trait;

use crate::{
    channel::SessionStream,
    command::Command,
    connection::Connection,
    error::{SessionError, SmtpResult},
    response::Response,
    status::Status,
};

/// RCPT: adds a forward-path to the open transaction.
pub struct Rcpt;

#[async_trait]
impl<Stream: SessionStream> super::Verb<Stream> for Rcpt {
    async fn process(
        &self,
        connection: &mut Connection<Stream>,
        command: &Command,
    ) -> SmtpResult<()> {
        if connection.message_builder().is_none() {
            return Err(SessionError::rejected(
                Status::BadSequenceOfCommands,
                "No mail transaction in progress",
            ));
        }

        let args = command.arguments();

        if !args
            .first()
            .is_some_and(|arg| arg.eq_ignore_ascii_case("TO"))
        {
            return Err(SessionError::rejected(
                Status::SyntaxErrorInCommandArguments,
                "Expected RCPT TO:<address>",
            ));
        }

        let recipient = match args.get(1) {
            Some(recipient) if !recipient.is_empty() => recipient.clone(),
            _ => {
                return Err(SessionError::rejected(
                    Status::SyntaxErrorInCommandArguments,
                    "Expected RCPT TO:<address>",
                ));
            }
        };

        let policy = connection.policy();
        policy
            .validate_recipient(connection.session(), &recipient)
            .await
            .map_err(SessionError::Rejected)?;

        if let Some(builder) = connection.message_builder_mut() {
            builder.add_recipient(recipient);
        }

        connection
            .write_response(&Response::new(Status::Ok, "Recipient accepted"))
            .await
    }
}
