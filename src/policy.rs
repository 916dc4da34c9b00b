use std::{collections::HashMap, net::IpAddr, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    channel::TlsIdentity,
    command::Command,
    credentials::Credentials,
    extensions::{auth::Mechanism, Extension},
    message::Message,
    response::Response,
    session::Session,
    status::Status,
};

/// Outcome of a credential check.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AuthResult {
    Success,
    Failure,
}

/// The decision-making collaborator behind every session.
///
/// The connection loop owns mechanics (reading lines, dispatching verbs,
/// assembling messages); everything judgemental is delegated here. Hook
/// methods default to no-ops so implementations only override what they
/// care about.
#[async_trait]
pub trait Policy: Send + Sync {
    /// Domain name announced in the greeting and EHLO response.
    fn domain_name(&self) -> &str;

    /// Address the server listens on.
    fn ip_address(&self) -> IpAddr;

    /// Port the server listens on.
    fn port_number(&self) -> u16;

    /// Extensions advertised and active for this session.
    fn extensions(&self, session: &Session) -> Vec<Extension>;

    /// Cap on message data size, or `None` for unlimited.
    fn maximum_message_size(&self, session: &Session) -> Option<u64>;

    /// TLS identity for STARTTLS, or `None` when the upgrade is
    /// unavailable.
    fn tls_identity(&self, session: &Session) -> Option<TlsIdentity>;

    /// How long to wait for a line from the client before giving up.
    fn receive_timeout(&self, session: &Session) -> Duration;

    /// Consecutive unrecognized commands tolerated before disconnecting.
    fn maximum_bad_commands(&self, session: &Session) -> u32;

    /// Whether a mechanism may be offered and used right now. Called both
    /// when assembling EHLO keywords and when AUTH names a mechanism, so
    /// the answer can change as the session does (e.g. after STARTTLS).
    fn is_auth_mechanism_enabled(&self, session: &Session, mechanism: Mechanism) -> bool;

    /// Judges completed credentials.
    async fn validate_credentials(&self, session: &Session, credentials: &Credentials)
        -> AuthResult;

    /// Gate on MAIL FROM. An `Err` response is sent verbatim and no
    /// transaction starts.
    async fn message_start(&self, session: &Session, from: &str) -> Result<(), Response> {
        let _ = (session, from);
        Ok(())
    }

    /// Gate on each RCPT TO.
    async fn validate_recipient(&self, session: &Session, recipient: &str) -> Result<(), Response> {
        let _ = (session, recipient);
        Ok(())
    }

    /// Called once a message has been accepted and recorded.
    async fn message_received(&self, session: &Session, message: &Message) {
        let _ = (session, message);
    }

    /// Called before the greeting is written.
    async fn session_started(&self, session: &Session) {
        let _ = session;
    }

    /// Called exactly once per connection, after the loop exits for any
    /// reason.
    async fn session_completed(&self, session: &Session) {
        let _ = session;
    }

    /// Called for every complete command line before dispatch.
    async fn command_received(&self, session: &Session, command: &Command) {
        let _ = (session, command);
    }
}

const fn default_port() -> u16 {
    2525
}

const fn default_timeout_secs() -> u64 {
    300
}

const fn default_bad_commands() -> u32 {
    10
}

fn default_ip() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_domain() -> String {
    "localhost".to_string()
}

/// A configurable [`Policy`] covering the common test-server cases.
///
/// Deserializable from the server config file; the builder methods exist
/// for tests that want one inline.
#[derive(Clone, Debug, Deserialize)]
pub struct ServerPolicy {
    #[serde(default = "default_domain")]
    domain: String,
    #[serde(default = "default_ip")]
    address: IpAddr,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    maximum_message_size: Option<u64>,
    #[serde(default = "default_timeout_secs")]
    receive_timeout_seconds: u64,
    #[serde(default = "default_bad_commands")]
    maximum_bad_commands: u32,
    #[serde(default)]
    tls: Option<TlsIdentity>,
    /// Offer plaintext mechanisms (PLAIN, LOGIN) only once the channel is
    /// encrypted.
    #[serde(default)]
    plaintext_auth_requires_tls: bool,
    /// Reject MAIL until the session has authenticated.
    #[serde(default)]
    require_authentication: bool,
    /// Reject MAIL until the channel is encrypted.
    #[serde(default)]
    require_secure_connection: bool,
    #[serde(default)]
    allow_anonymous: bool,
    /// Username to password, for PLAIN, LOGIN, and CRAM-MD5.
    #[serde(default)]
    users: HashMap<String, String>,
    /// Username to bearer token, for XOAUTH2.
    #[serde(default)]
    tokens: HashMap<String, String>,
}

impl Default for ServerPolicy {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            address: default_ip(),
            port: default_port(),
            maximum_message_size: None,
            receive_timeout_seconds: default_timeout_secs(),
            maximum_bad_commands: default_bad_commands(),
            tls: None,
            plaintext_auth_requires_tls: false,
            require_authentication: false,
            require_secure_connection: false,
            allow_anonymous: false,
            users: HashMap::new(),
            tokens: HashMap::new(),
        }
    }
}

impl ServerPolicy {
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn listen(mut self, address: IpAddr, port: u16) -> Self {
        self.address = address;
        self.port = port;
        self
    }

    #[must_use]
    pub const fn with_maximum_message_size(mut self, size: Option<u64>) -> Self {
        self.maximum_message_size = size;
        self
    }

    #[must_use]
    pub const fn receive_timeout_seconds(mut self, seconds: u64) -> Self {
        self.receive_timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_maximum_bad_commands(mut self, count: u32) -> Self {
        self.maximum_bad_commands = count;
        self
    }

    #[must_use]
    pub fn with_tls_identity(mut self, identity: TlsIdentity) -> Self {
        self.tls = Some(identity);
        self
    }

    #[must_use]
    pub const fn plaintext_auth_requires_tls(mut self, required: bool) -> Self {
        self.plaintext_auth_requires_tls = required;
        self
    }

    #[must_use]
    pub const fn require_authentication(mut self, required: bool) -> Self {
        self.require_authentication = required;
        self
    }

    #[must_use]
    pub const fn require_secure_connection(mut self, required: bool) -> Self {
        self.require_secure_connection = required;
        self
    }

    #[must_use]
    pub const fn allow_anonymous(mut self, allowed: bool) -> Self {
        self.allow_anonymous = allowed;
        self
    }

    #[must_use]
    pub fn user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(username.into(), password.into());
        self
    }

    #[must_use]
    pub fn token(mut self, username: impl Into<String>, token: impl Into<String>) -> Self {
        self.tokens.insert(username.into(), token.into());
        self
    }

    fn offers_auth(&self) -> bool {
        self.allow_anonymous || !self.users.is_empty() || !self.tokens.is_empty()
    }
}

#[async_trait]
impl Policy for ServerPolicy {
    fn domain_name(&self) -> &str {
        &self.domain
    }

    fn ip_address(&self) -> IpAddr {
        self.address
    }

    fn port_number(&self) -> u16 {
        self.port
    }

    fn extensions(&self, _session: &Session) -> Vec<Extension> {
        let mut extensions = vec![Extension::EightBitMime, Extension::Size];

        if self.tls.is_some() {
            extensions.push(Extension::StartTls);
        }

        if self.offers_auth() {
            extensions.push(Extension::Auth);
        }

        extensions
    }

    fn maximum_message_size(&self, _session: &Session) -> Option<u64> {
        self.maximum_message_size
    }

    fn tls_identity(&self, _session: &Session) -> Option<TlsIdentity> {
        self.tls.clone()
    }

    fn receive_timeout(&self, _session: &Session) -> Duration {
        Duration::from_secs(self.receive_timeout_seconds)
    }

    fn maximum_bad_commands(&self, _session: &Session) -> u32 {
        self.maximum_bad_commands
    }

    fn is_auth_mechanism_enabled(&self, session: &Session, mechanism: Mechanism) -> bool {
        match mechanism {
            Mechanism::Anonymous => self.allow_anonymous,
            Mechanism::Plain | Mechanism::Login => {
                !self.users.is_empty() && (session.is_secure() || !self.plaintext_auth_requires_tls)
            }
            Mechanism::CramMd5 => !self.users.is_empty(),
            Mechanism::Xoauth2 => !self.tokens.is_empty(),
        }
    }

    async fn validate_credentials(
        &self,
        _session: &Session,
        credentials: &Credentials,
    ) -> AuthResult {
        let valid = match credentials {
            Credentials::Anonymous => self.allow_anonymous,
            Credentials::UsernamePassword { username, password } => self
                .users
                .get(username)
                .is_some_and(|expected| expected == password),
            Credentials::CramMd5 {
                username,
                challenge,
                response,
            } => self
                .users
                .get(username)
                .is_some_and(|password| Credentials::cram_md5_matches(challenge, response, password)),
            Credentials::Bearer { username, token } => self
                .tokens
                .get(username)
                .is_some_and(|expected| expected == token),
        };

        if valid {
            AuthResult::Success
        } else {
            AuthResult::Failure
        }
    }

    async fn message_start(&self, session: &Session, _from: &str) -> Result<(), Response> {
        if self.require_secure_connection && !session.is_secure() {
            return Err(Response::new(
                Status::BadSequenceOfCommands,
                "A secure connection is required before sending mail",
            ));
        }

        if self.require_authentication && !session.is_authenticated() {
            return Err(Response::new(
                Status::BadSequenceOfCommands,
                "Authentication required before sending mail",
            ));
        }

        Ok(())
    }
}
