use std::io;

use async_trait::async_trait;

use crate::{
    channel::SessionStream,
    command::Command,
    connection::Connection,
    error::{SessionError, SmtpResult},
    response::Response,
    status::Status,
};

/// DATA: receives the message body.
///
/// Switches to line-at-a-time data mode until the lone `.` terminator,
/// reversing dot-stuffing as lines arrive. When the accumulated size passes
/// the policy cap the data is no longer stored but the stream is still
/// drained to the terminator, so the 552 lands at the point the protocol
/// allows a reply.
pub struct Data;

#[async_trait]
impl<Stream: SessionStream> super::Verb<Stream> for Data {
    async fn process(
        &self,
        connection: &mut Connection<Stream>,
        _command: &Command,
    ) -> SmtpResult<()> {
        let has_recipients = connection
            .message_builder()
            .is_some_and(|builder| !builder.recipients().is_empty());

        if !has_recipients {
            return Err(SessionError::rejected(
                Status::BadSequenceOfCommands,
                "A mail transaction with at least one recipient is required first",
            ));
        }

        connection
            .write_response(&Response::new(
                Status::StartMailInput,
                "End message with period",
            ))
            .await?;

        // The declared SIZE binds the client to what it promised, on top
        // of whatever cap the policy sets
        let maximum = connection
            .policy()
            .maximum_message_size(connection.session());
        let declared = connection
            .message_builder()
            .and_then(|builder| builder.declared_size());
        let limit = match (maximum, declared) {
            (Some(max), Some(declared)) => Some(max.min(declared)),
            (limit, None) | (None, limit) => limit,
        };
        let mut over_limit = false;

        loop {
            let Some(line) = connection.read_data_line().await? else {
                // Disconnecting mid-DATA loses the transaction entirely
                connection.abort_message();
                return Err(SessionError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed during message data",
                )));
            };

            if line.as_slice() == b"." {
                break;
            }

            let unstuffed = if line.first() == Some(&b'.') {
                &line[1..]
            } else {
                &line[..]
            };

            if let Some(builder) = connection.message_builder_mut() {
                let next_length = builder.data_length() + unstuffed.len() as u64 + 2;
                if limit.is_some_and(|limit| next_length > limit) {
                    over_limit = true;
                }

                if !over_limit {
                    builder.append_line(unstuffed);
                }
            }
        }

        if over_limit {
            connection.abort_message();
            return Err(SessionError::rejected(
                Status::ExceededStorageAllocation,
                "Message exceeds maximum allowed size",
            ));
        }

        let Some(builder) = connection.take_message_builder() else {
            return Err(SessionError::rejected(
                Status::TransactionFailed,
                "Transaction lost",
            ));
        };

        let message = builder.finish();
        let received = message.data().len();
        connection.session_mut().add_message(message.clone());

        let policy = connection.policy();
        policy
            .message_received(connection.session(), &message)
            .await;

        connection
            .write_response(&Response::new(
                Status::Ok,
                format!("{received} bytes received, message accepted"),
            ))
            .await
    }
}
