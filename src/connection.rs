//! The per-client command loop.
//!
//! A [`Connection`] owns the channel, the session record, the verb table,
//! and the active extension processors for one client. It reads lines,
//! parses them, and dispatches; everything protocol-specific happens in
//! the verbs, everything judgemental in the policy.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;

use crate::{
    channel::{Channel, SessionStream},
    command::Command,
    error::{SessionError, SmtpResult},
    extensions::{Extension, ExtensionProcessor},
    incoming, internal,
    message::MessageBuilder,
    outgoing,
    policy::Policy,
    response::Response,
    session::{Session, SessionErrorKind},
    status::Status,
    verbs::{Verb, VerbMap},
    Signal,
};

pub struct Connection<Stream: SessionStream> {
    channel: Channel<Stream>,
    session: Session,
    policy: Arc<dyn Policy>,
    verbs: VerbMap<Stream>,
    processors: Vec<(Extension, Box<dyn ExtensionProcessor>)>,
    current_message: Option<MessageBuilder>,
    bad_commands: u32,
    shutdown: broadcast::Receiver<Signal>,
}

impl<Stream: SessionStream> Connection<Stream> {
    pub fn new(
        stream: Stream,
        peer: std::net::SocketAddr,
        policy: Arc<dyn Policy>,
        shutdown: broadcast::Receiver<Signal>,
    ) -> Self {
        let session = Session::new(peer);

        let mut connection = Self {
            channel: Channel::new(stream),
            session,
            policy,
            verbs: VerbMap::default(),
            processors: Vec::new(),
            current_message: None,
            bad_commands: 0,
            shutdown,
        };

        let policy = Arc::clone(&connection.policy);
        for extension in policy.extensions(&connection.session) {
            let processor = extension.create_processor(&mut connection);
            connection.processors.push((extension, processor));
        }

        connection
    }

    /// Drives the session to completion and returns its record.
    ///
    /// Transport failures, timeouts, and shutdown end the loop; whatever
    /// happened is folded into the session before the completion hook runs,
    /// so the policy always sees exactly one finished session per client.
    pub async fn run(mut self) -> Session {
        internal!("{} connected", self.session.peer());

        let result = self.serve().await;

        self.session.mark_ended();
        if let Err(err) = result {
            let kind = match &err {
                SessionError::Timeout(_) => SessionErrorKind::Timeout,
                SessionError::Shutdown => SessionErrorKind::ServerShutdown,
                SessionError::Io(_) | SessionError::Tls(_) => SessionErrorKind::Network,
                SessionError::Rejected(_) => SessionErrorKind::Unexpected,
            };
            internal!(level = DEBUG, "{} session ended: {err}", self.session.peer());
            self.session.set_error(kind, err.to_string());
        }

        let policy = Arc::clone(&self.policy);
        policy.session_completed(&self.session).await;

        internal!("{} disconnected", self.session.peer());
        self.session
    }

    async fn serve(&mut self) -> SmtpResult<()> {
        let policy = Arc::clone(&self.policy);
        policy.session_started(&self.session).await;

        let greeting = format!("{} ESMTP server ready", policy.domain_name());
        self.write_response(&Response::new(Status::ServiceReady, greeting))
            .await?;

        while !self.channel.is_closed() {
            let Some(line) = self.read_line().await? else {
                break;
            };

            let command = Command::parse(&line);
            policy.command_received(&self.session, &command).await;

            self.dispatch(&command).await?;
        }

        Ok(())
    }

    async fn dispatch(&mut self, command: &Command) -> SmtpResult<()> {
        // An empty line is noise, not abuse; it gets a 500 but does not
        // count towards disconnection
        if command.is_empty() {
            return self
                .write_response(&Response::new(
                    Status::SyntaxErrorCommandUnrecognised,
                    "Command unrecognised",
                ))
                .await;
        }

        if !command.is_valid() {
            return self.unrecognised_command().await;
        }

        let Some(verb) = self.verbs.lookup(command.verb()) else {
            return self.unrecognised_command().await;
        };

        match verb.process(self, command).await {
            Ok(()) => {
                self.bad_commands = 0;
                Ok(())
            }
            Err(SessionError::Rejected(response)) => self.write_response(&response).await,
            Err(other) => Err(other),
        }
    }

    /// Counts strikes against the client; past the policy threshold the
    /// server says goodbye instead of another 500.
    async fn unrecognised_command(&mut self) -> SmtpResult<()> {
        self.bad_commands += 1;

        if self.bad_commands >= self.policy.maximum_bad_commands(&self.session) {
            self.write_response(&Response::new(
                Status::ClosingTransmissionChannel,
                "Too many unrecognised commands, goodbye",
            ))
            .await?;
            self.channel.close();
        } else {
            self.write_response(&Response::new(
                Status::SyntaxErrorCommandUnrecognised,
                "Command unrecognised",
            ))
            .await?;
        }

        Ok(())
    }

    /// Reads one command or continuation line, honoring the receive
    /// timeout and the shutdown broadcast.
    pub async fn read_line(&mut self) -> SmtpResult<Option<String>> {
        let timeout = self.policy.receive_timeout(&self.session);

        let line = tokio::select! {
            // Any broadcast outcome, the signal itself or a closed or
            // lagged channel, means the server is going away
            _ = self.shutdown.recv() => return Err(SessionError::Shutdown),
            line = tokio::time::timeout(timeout, self.channel.read_line()) => {
                line.map_err(|_| SessionError::Timeout(timeout.as_secs()))??
            }
        };

        if let Some(line) = &line {
            incoming!(self.session.peer(), line);
            self.session.log_received(line);
        }

        Ok(line)
    }

    /// Reads one raw data-mode line. Data bytes reach the message builder
    /// untouched; the transcript records them like any other received line.
    pub async fn read_data_line(&mut self) -> SmtpResult<Option<Vec<u8>>> {
        let timeout = self.policy.receive_timeout(&self.session);

        let line = tokio::select! {
            _ = self.shutdown.recv() => return Err(SessionError::Shutdown),
            line = tokio::time::timeout(timeout, self.channel.read_line_bytes()) => {
                line.map_err(|_| SessionError::Timeout(timeout.as_secs()))??
            }
        };

        if let Some(line) = &line {
            let text = String::from_utf8_lossy(line);
            incoming!(self.session.peer(), text);
            self.session.log_received(&text);
        }

        Ok(line)
    }

    pub async fn write_response(&mut self, response: &Response) -> SmtpResult<()> {
        let text = response.to_string();

        outgoing!(self.session.peer(), text);
        for line in text.split("\r\n") {
            self.session.log_sent(line);
        }

        self.channel.send(&text).await.map_err(SessionError::from)
    }

    /// Replaces the transport with its TLS upgrade and resets the session
    /// to its just-greeted state.
    pub async fn upgrade_tls(&mut self, acceptor: &TlsAcceptor) -> SmtpResult<()> {
        let channel = std::mem::replace(&mut self.channel, Channel::Closed);
        let (channel, info) = channel.upgrade(acceptor).await?;
        self.channel = channel;

        internal!(
            level = DEBUG,
            "{} TLS established ({info})",
            self.session.peer()
        );

        self.session.set_secure(true);
        self.session.reset_for_tls();
        self.current_message = None;

        Ok(())
    }

    pub fn register_verb(&mut self, name: &str, verb: Arc<dyn Verb<Stream>>) {
        self.verbs.register(name, verb);
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    #[must_use]
    pub fn policy(&self) -> Arc<dyn Policy> {
        Arc::clone(&self.policy)
    }

    #[must_use]
    pub fn has_extension(&self, extension: Extension) -> bool {
        self.processors.iter().any(|(active, _)| *active == extension)
    }

    /// One keyword line per capability the active extensions want in the
    /// EHLO response, in registration order.
    #[must_use]
    pub fn ehlo_keywords(&self) -> Vec<String> {
        self.processors
            .iter()
            .flat_map(|(_, processor)| {
                processor.ehlo_keywords(&self.session, self.policy.as_ref())
            })
            .collect()
    }

    #[must_use]
    pub const fn message_builder(&self) -> Option<&MessageBuilder> {
        self.current_message.as_ref()
    }

    pub fn message_builder_mut(&mut self) -> Option<&mut MessageBuilder> {
        self.current_message.as_mut()
    }

    pub fn begin_message(&mut self, builder: MessageBuilder) {
        self.current_message = Some(builder);
    }

    pub fn take_message_builder(&mut self) -> Option<MessageBuilder> {
        self.current_message.take()
    }

    pub fn abort_message(&mut self) {
        self.current_message = None;
    }

    pub fn close(&mut self) {
        self.channel.close();
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use tokio::sync::broadcast;

    use super::Connection;
    use crate::{extensions::Extension, policy::ServerPolicy, Signal};

    fn connection(policy: ServerPolicy) -> Connection<tokio::io::DuplexStream> {
        let (_client, server) = tokio::io::duplex(1024);
        let (_tx, rx) = broadcast::channel::<Signal>(1);
        Connection::new(server, "127.0.0.1:1".parse().unwrap(), Arc::new(policy), rx)
    }

    #[tokio::test]
    async fn extensions_snapshot_follows_policy() {
        let bare = connection(ServerPolicy::new("test.local"));
        assert!(bare.has_extension(Extension::Size));
        assert!(bare.has_extension(Extension::EightBitMime));
        assert!(!bare.has_extension(Extension::Auth));
        assert!(!bare.has_extension(Extension::StartTls));

        let with_auth = connection(ServerPolicy::new("test.local").user("u", "p"));
        assert!(with_auth.has_extension(Extension::Auth));
    }

    #[tokio::test]
    async fn ehlo_keywords_come_from_processors() {
        let connection = connection(
            ServerPolicy::new("test.local")
                .with_maximum_message_size(Some(1000))
                .user("u", "p"),
        );

        let keywords = connection.ehlo_keywords();
        assert!(keywords.contains(&"8BITMIME".to_string()));
        assert!(keywords.contains(&"SIZE 1000".to_string()));
        assert!(keywords.iter().any(|kw| kw.starts_with("AUTH ")));
        // No TLS identity configured, so STARTTLS is absent
        assert!(!keywords.contains(&"STARTTLS".to_string()));
    }
}
