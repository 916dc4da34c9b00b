use core::fmt::Write as _;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};

use crate::{credentials::Credentials, message::Message};

/// How a session ended, when it did not end cleanly.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionErrorKind {
    /// The peer disconnected or the transport failed.
    Network,
    /// The peer went silent past the receive timeout.
    Timeout,
    /// The server shut down while the session was live.
    ServerShutdown,
    /// Anything else.
    Unexpected,
}

/// The durable record of one client connection.
///
/// Verb handlers read and mutate this; once the connection loop returns it
/// is the complete account of what happened, messages and transcript
/// included.
#[derive(Clone, Debug)]
pub struct Session {
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    peer: SocketAddr,
    client_name: Option<String>,
    secure: bool,
    authenticated: bool,
    credentials: Option<Credentials>,
    messages: Vec<Message>,
    error: Option<(SessionErrorKind, String)>,
    transcript: String,
}

impl Session {
    #[must_use]
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            start: Utc::now(),
            end: None,
            peer,
            client_name: None,
            secure: false,
            authenticated: false,
            credentials: None,
            messages: Vec::new(),
            error: None,
            transcript: String::new(),
        }
    }

    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    pub fn mark_ended(&mut self) {
        self.end = Some(Utc::now());
    }

    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// The name the client gave in HELO or EHLO, if any yet.
    #[must_use]
    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    pub fn set_client_name(&mut self, name: impl Into<String>) {
        self.client_name = Some(name.into());
    }

    #[must_use]
    pub const fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn set_secure(&mut self, secure: bool) {
        self.secure = secure;
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    #[must_use]
    pub const fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn set_authenticated(&mut self, credentials: Credentials) {
        self.authenticated = true;
        self.credentials = Some(credentials);
    }

    /// Drops identity state that must not survive a STARTTLS upgrade.
    pub fn reset_for_tls(&mut self) {
        self.client_name = None;
        self.authenticated = false;
        self.credentials = None;
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    #[must_use]
    pub const fn error(&self) -> Option<&(SessionErrorKind, String)> {
        self.error.as_ref()
    }

    pub fn set_error(&mut self, kind: SessionErrorKind, detail: impl Into<String>) {
        self.error = Some((kind, detail.into()));
    }

    /// Every line exchanged on this session, each prefixed with its
    /// direction marker.
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn log_received(&mut self, line: &str) {
        let _ = writeln!(self.transcript, "C: {line}");
    }

    pub fn log_sent(&mut self, line: &str) {
        let _ = writeln!(self.transcript, "S: {line}");
    }
}
