//! AUTH (RFC 4954) and its mechanism state machines.
//!
//! The AUTH verb owns the challenge/response loop and the base64 framing;
//! each mechanism is a [`MechanismProcessor`] that only sees decoded text
//! and produces either another challenge or finished [`Credentials`]. The
//! policy remains the sole judge of whether those credentials are any good.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::ExtensionProcessor;
use crate::{
    channel::SessionStream,
    command::Command,
    connection::Connection,
    credentials::Credentials,
    error::{SessionError, SmtpResult},
    policy::{AuthResult, Policy},
    response::Response,
    session::Session,
    status::Status,
    verbs::Verb,
};

mod anonymous;
mod cram_md5;
mod login;
mod plain;
mod xoauth2;

use anonymous::AnonymousMechanism;
use cram_md5::CramMd5Mechanism;
use login::LoginMechanism;
use plain::PlainMechanism;
use xoauth2::Xoauth2Mechanism;

/// The SASL mechanisms this server knows how to drive.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mechanism {
    Anonymous,
    Plain,
    Login,
    CramMd5,
    Xoauth2,
}

impl Mechanism {
    pub const ALL: [Self; 5] = [
        Self::Anonymous,
        Self::Plain,
        Self::Login,
        Self::CramMd5,
        Self::Xoauth2,
    ];

    #[must_use]
    pub const fn identifier(self) -> &'static str {
        match self {
            Self::Anonymous => "ANONYMOUS",
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::Xoauth2 => "XOAUTH2",
        }
    }

    #[must_use]
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mechanism| mechanism.identifier().eq_ignore_ascii_case(identifier))
    }

    /// Whether the mechanism sends a reusable secret in the clear.
    #[must_use]
    pub const fn is_plaintext(self) -> bool {
        matches!(self, Self::Plain | Self::Login)
    }

    fn create_processor(self) -> Box<dyn MechanismProcessor> {
        match self {
            Self::Anonymous => Box::new(AnonymousMechanism::default()),
            Self::Plain => Box::new(PlainMechanism),
            Self::Login => Box::new(LoginMechanism::default()),
            Self::CramMd5 => Box::new(CramMd5Mechanism::default()),
            Self::Xoauth2 => Box::new(Xoauth2Mechanism),
        }
    }
}

/// What a mechanism wants next.
pub enum Step {
    /// Send this text (base64-framed by the caller) as a 334 challenge and
    /// come back with the client's answer.
    Challenge(String),
    /// The exchange is complete; hand these to the policy.
    Success(Credentials),
    /// The exchange is structurally broken and cannot continue.
    Failure,
}

/// One in-flight authentication exchange.
///
/// `respond(None)` begins the exchange with no initial response from the
/// client; subsequent calls carry each decoded answer.
#[async_trait]
pub trait MechanismProcessor: Send {
    async fn respond(
        &mut self,
        session: &Session,
        policy: &dyn Policy,
        response: Option<&str>,
    ) -> Result<Step, SessionError>;
}

/// The EHLO face of AUTH. Both the RFC 4954 keyword and the legacy
/// `AUTH=` line are advertised, since older clients only look at the
/// latter.
pub struct AuthExtension;

impl ExtensionProcessor for AuthExtension {
    fn ehlo_keywords(&self, session: &Session, policy: &dyn Policy) -> Vec<String> {
        let enabled: Vec<&str> = Mechanism::ALL
            .into_iter()
            .filter(|mechanism| policy.is_auth_mechanism_enabled(session, *mechanism))
            .map(Mechanism::identifier)
            .collect();

        if enabled.is_empty() {
            return Vec::new();
        }

        let list = enabled.join(" ");
        vec![format!("AUTH={list}"), format!("AUTH {list}")]
    }
}

/// The verb AUTH registers.
pub struct AuthVerb;

#[async_trait]
impl<Stream: SessionStream> Verb<Stream> for AuthVerb {
    async fn process(
        &self,
        connection: &mut Connection<Stream>,
        command: &Command,
    ) -> SmtpResult<()> {
        if connection.session().is_authenticated() {
            return Err(SessionError::rejected(
                Status::BadSequenceOfCommands,
                "Already authenticated",
            ));
        }

        let args = command.arguments();

        let Some(identifier) = args.first() else {
            return Err(SessionError::rejected(
                Status::SyntaxErrorInCommandArguments,
                "AUTH requires a mechanism",
            ));
        };

        let Some(mechanism) = Mechanism::from_identifier(identifier) else {
            return Err(SessionError::rejected(
                Status::CommandParameterNotImplemented,
                format!("Authentication mechanism '{identifier}' is not recognised"),
            ));
        };

        let policy = connection.policy();
        if !policy.is_auth_mechanism_enabled(connection.session(), mechanism) {
            return Err(SessionError::rejected(
                Status::AuthenticationFailure,
                format!(
                    "Authentication mechanism {} is not available",
                    mechanism.identifier()
                ),
            ));
        }

        // RFC 4954: a bare "=" marks an explicitly empty initial response
        let mut data = match args.get(1) {
            None => None,
            Some(initial) if initial == "=" => Some(String::new()),
            Some(initial) => Some(decode_base64(initial)?),
        };

        let mut processor = mechanism.create_processor();

        loop {
            let step = processor
                .respond(connection.session(), policy.as_ref(), data.as_deref())
                .await?;

            match step {
                Step::Challenge(challenge) => {
                    let encoded = BASE64.encode(challenge.as_bytes());
                    connection
                        .write_response(&Response::new(Status::AuthenticationContinue, encoded))
                        .await?;

                    let Some(line) = connection.read_line().await? else {
                        return Err(SessionError::Io(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "connection closed during authentication",
                        )));
                    };

                    if line == "*" {
                        return Err(SessionError::rejected(
                            Status::SyntaxErrorInCommandArguments,
                            "Authentication aborted",
                        ));
                    }

                    data = Some(decode_base64(&line)?);
                }
                Step::Success(credentials) => {
                    let verdict = policy
                        .validate_credentials(connection.session(), &credentials)
                        .await;

                    return match verdict {
                        AuthResult::Success => {
                            connection.session_mut().set_authenticated(credentials);
                            connection
                                .write_response(&Response::new(
                                    Status::AuthenticationOk,
                                    "Authenticated ok",
                                ))
                                .await
                        }
                        AuthResult::Failure => Err(SessionError::rejected(
                            Status::AuthenticationFailure,
                            "Authentication failure",
                        )),
                    };
                }
                Step::Failure => {
                    return Err(SessionError::rejected(
                        Status::AuthenticationFailure,
                        "Authentication failure",
                    ));
                }
            }
        }
    }
}

/// Decodes a base64 response into text. Undecodable input gets the same
/// 535 as a wrong password so probing clients learn nothing structural.
fn decode_base64(encoded: &str) -> SmtpResult<String> {
    BASE64
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| {
            SessionError::rejected(Status::AuthenticationFailure, "Bad Base64 data")
        })
}
