use async_trait::async_trait;

use super::ExtensionProcessor;
use crate::{
    channel::SessionStream,
    command::Command,
    connection::Connection,
    error::{SessionError, SmtpResult},
    policy::Policy,
    response::Response,
    session::Session,
    status::Status,
    verbs::Verb,
};

/// STARTTLS (RFC 3207). The keyword disappears once the channel is secure.
pub struct StartTlsExtension;

impl ExtensionProcessor for StartTlsExtension {
    fn ehlo_keywords(&self, session: &Session, _policy: &dyn Policy) -> Vec<String> {
        if session.is_secure() {
            Vec::new()
        } else {
            vec!["STARTTLS".to_string()]
        }
    }
}

/// The verb STARTTLS registers.
///
/// On success the transport is replaced wholesale and the session reverts
/// to its just-greeted state: no client name, no authentication, no open
/// transaction. The client must EHLO again over the secured channel.
pub struct StartTlsVerb;

#[async_trait]
impl<Stream: SessionStream> Verb<Stream> for StartTlsVerb {
    async fn process(
        &self,
        connection: &mut Connection<Stream>,
        _command: &Command,
    ) -> SmtpResult<()> {
        if connection.session().is_secure() {
            return Err(SessionError::rejected(
                Status::BadSequenceOfCommands,
                "Channel is already secure",
            ));
        }

        let Some(identity) = connection.policy().tls_identity(connection.session()) else {
            return Err(SessionError::rejected(
                Status::CommandNotImplemented,
                "TLS is not available",
            ));
        };

        let acceptor = identity.acceptor()?;

        connection
            .write_response(&Response::new(Status::ServiceReady, "Ready to start TLS"))
            .await?;

        connection.upgrade_tls(&acceptor).await
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use tokio::sync::broadcast;

    use super::StartTlsVerb;
    use crate::{
        command::Command, connection::Connection, error::SessionError, policy::ServerPolicy,
        verbs::Verb, Signal,
    };

    fn connection(policy: ServerPolicy) -> Connection<tokio::io::DuplexStream> {
        let (_client, server) = tokio::io::duplex(1024);
        let (_tx, rx) = broadcast::channel::<Signal>(1);
        Connection::new(server, "127.0.0.1:1".parse().unwrap(), Arc::new(policy), rx)
    }

    #[tokio::test]
    async fn second_starttls_is_out_of_sequence() {
        let mut connection = connection(ServerPolicy::new("test.local"));
        connection.session_mut().set_secure(true);

        let command = Command::parse("STARTTLS");
        match StartTlsVerb.process(&mut connection, &command).await {
            Err(SessionError::Rejected(response)) => assert_eq!(response.code(), 503),
            other => panic!("expected 503 rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn starttls_needs_a_configured_identity() {
        let mut connection = connection(ServerPolicy::new("test.local"));

        let command = Command::parse("STARTTLS");
        match StartTlsVerb.process(&mut connection, &command).await {
            Err(SessionError::Rejected(response)) => assert_eq!(response.code(), 502),
            other => panic!("expected 502 rejection, got {other:?}"),
        }
    }
}
