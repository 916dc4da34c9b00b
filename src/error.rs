//! Error types for the mailsink protocol engine.
//!
//! Protocol rejections carry their own wire [`Response`] and are recovered
//! locally by the connection loop; transport errors terminate the session.

use std::io;

use thiserror::Error;

use crate::{response::Response, status::Status};

/// Errors that can occur during TLS operations.
#[derive(Debug, Error)]
pub enum TlsError {
    /// Failed to load the TLS certificate.
    #[error("Failed to load TLS certificate from {path}: {source}")]
    CertificateLoad {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to load the TLS private key.
    #[error("Failed to load TLS private key from {path}: {reason}")]
    KeyLoad { path: String, reason: String },

    /// The TLS handshake failed.
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] io::Error),

    /// The channel is already encrypted.
    #[error("Channel is already encrypted")]
    AlreadyEncrypted,

    /// The channel was closed before the upgrade completed.
    #[error("Channel closed before TLS upgrade")]
    ChannelClosed,

    /// Rustls configuration error.
    #[error("TLS error: {0}")]
    Rustls(String),
}

impl From<tokio_rustls::rustls::Error> for TlsError {
    fn from(err: tokio_rustls::rustls::Error) -> Self {
        Self::Rustls(err.to_string())
    }
}

/// Errors raised while driving a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A recoverable protocol rejection. The carried response is written to
    /// the client verbatim and the command loop continues.
    #[error("Rejected: {0}")]
    Rejected(Response),

    /// I/O failure on the connection channel.
    #[error("Connection error: {0}")]
    Io(#[from] io::Error),

    /// TLS failure during STARTTLS.
    #[error(transparent)]
    Tls(#[from] TlsError),

    /// The client exceeded the per-connection receive timeout.
    #[error("Session timed out after {0} seconds")]
    Timeout(u64),

    /// Shutdown signal received while the session was live.
    #[error("Server shutting down")]
    Shutdown,
}

impl SessionError {
    /// A protocol rejection with the given status and message.
    #[must_use]
    pub fn rejected(status: Status, message: impl Into<String>) -> Self {
        Self::Rejected(Response::new(status, message))
    }
}

/// Errors that can occur in the server accept loop.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the configured socket address.
    #[error("Failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("Failed to accept connection: {0}")]
    AcceptFailed(#[from] io::Error),
}

/// Specialized `Result` for protocol-level operations.
pub type SmtpResult<T> = Result<T, SessionError>;
