use async_trait::async_trait;

use crate::{
    channel::SessionStream,
    command::Command,
    connection::Connection,
    error::SmtpResult,
    response::Response,
    status::Status,
};

/// RSET: discards any in-flight transaction. Identity state (client name,
/// authentication) survives.
pub struct Rset;

#[async_trait]
impl<Stream: SessionStream> super::Verb<Stream> for Rset {
    async fn process(
        &self,
        connection: &mut Connection<Stream>,
        _command: &Command,
    ) -> SmtpResult<()> {
        connection.abort_message();
        connection
            .write_response(&Response::new(Status::Ok, "Transaction reset"))
            .await
    }
}

/// NOOP: does nothing, successfully.
pub struct Noop;

#[async_trait]
impl<Stream: SessionStream> super::Verb<Stream> for Noop {
    async fn process(
        &self,
        connection: &mut Connection<Stream>,
        _command: &Command,
    ) -> SmtpResult<()> {
        connection
            .write_response(&Response::new(Status::Ok, "Ok"))
            .await
    }
}

/// QUIT: says goodbye and closes the channel. Any open transaction is
/// discarded unrecorded.
pub struct Quit;

#[async_trait]
impl<Stream: SessionStream> super::Verb<Stream> for Quit {
    async fn process(
        &self,
        connection: &mut Connection<Stream>,
        _command: &Command,
    ) -> SmtpResult<()> {
        connection.abort_message();
        connection
            .write_response(&Response::new(
                Status::ClosingTransmissionChannel,
                "Goodbye",
            ))
            .await?;
        connection.close();

        Ok(())
    }
}
