//! An SMTP server engine built for testing mail-sending software.
//!
//! Every message a client submits is captured in full, never delivered,
//! and handed back as part of the finished [`session::Session`] record. A
//! [`policy::Policy`] implementation decides everything judgemental:
//! which extensions and auth mechanisms are on, whether credentials and
//! recipients are acceptable, and what limits apply. The engine handles
//! the rest of the protocol, STARTTLS and the SASL mechanisms included.

pub mod channel;
pub mod command;
pub mod connection;
pub mod credentials;
pub mod error;
pub mod extensions;
pub mod logging;
pub mod message;
pub mod policy;
pub mod response;
pub mod server;
pub mod session;
pub mod status;
pub mod verbs;

pub use tracing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}
