use async_trait::async_trait;

use crate::{
    channel::SessionStream,
    command::Command,
    connection::Connection,
    error::{SessionError, SmtpResult},
    response::Response,
    status::Status,
};

/// HELO: the RFC 821 greeting. Records the client name and answers with a
/// plain single-line 250.
pub struct Helo;

#[async_trait]
impl<Stream: SessionStream> super::Verb<Stream> for Helo {
    async fn process(
        &self,
        connection: &mut Connection<Stream>,
        command: &Command,
    ) -> SmtpResult<()> {
        let name = client_name(command)?;
        connection.session_mut().set_client_name(name);

        let greeting = format!("{} Hello", connection.policy().domain_name());
        connection
            .write_response(&Response::new(Status::Ok, greeting))
            .await
    }
}

/// EHLO: the extended greeting. Records the client name and advertises one
/// keyword line per active extension capability in a multi-line 250.
pub struct Ehlo;

#[async_trait]
impl<Stream: SessionStream> super::Verb<Stream> for Ehlo {
    async fn process(
        &self,
        connection: &mut Connection<Stream>,
        command: &Command,
    ) -> SmtpResult<()> {
        let name = client_name(command)?;
        connection.session_mut().set_client_name(name);

        let mut lines = vec![connection.policy().domain_name().to_string()];
        lines.extend(connection.ehlo_keywords());

        connection
            .write_response(&Response::new(Status::Ok, lines.join("\r\n")))
            .await
    }
}

fn client_name(command: &Command) -> SmtpResult<String> {
    match command.arguments().first() {
        Some(name) if !name.is_empty() => Ok(name.clone()),
        _ => Err(SessionError::rejected(
            Status::SyntaxErrorInCommandArguments,
            "Domain name required",
        )),
    }
}
