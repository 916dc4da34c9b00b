//! ESMTP extensions.
//!
//! An [`Extension`] is a capability the policy switches on per session. At
//! connection setup each active extension creates a processor, which owns
//! the extension's EHLO keyword lines and registers any verbs the
//! extension adds to the dispatch table.

use std::sync::Arc;

use crate::{channel::SessionStream, connection::Connection, policy::Policy, session::Session};

pub mod auth;
mod eightbitmime;
mod size;
mod starttls;

pub use auth::AuthVerb;
pub use starttls::StartTlsVerb;

use auth::AuthExtension;
use eightbitmime::EightBitMimeExtension;
use size::SizeExtension;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Extension {
    StartTls,
    Auth,
    Size,
    EightBitMime,
}

impl Extension {
    /// Activates the extension on a connection, registering its verbs and
    /// returning the processor that will speak for it at EHLO time.
    pub(crate) fn create_processor<Stream: SessionStream>(
        self,
        connection: &mut Connection<Stream>,
    ) -> Box<dyn ExtensionProcessor> {
        match self {
            Self::StartTls => {
                connection.register_verb("STARTTLS", Arc::new(StartTlsVerb));
                Box::new(starttls::StartTlsExtension)
            }
            Self::Auth => {
                connection.register_verb("AUTH", Arc::new(AuthVerb));
                Box::new(AuthExtension)
            }
            Self::Size => Box::new(SizeExtension),
            Self::EightBitMime => Box::new(EightBitMimeExtension),
        }
    }
}

/// Per-connection face of an active extension.
///
/// Keywords are computed fresh on every EHLO because the answer can change
/// mid-session, most obviously for STARTTLS once the channel is secure.
pub trait ExtensionProcessor: Send + Sync {
    fn ehlo_keywords(&self, session: &Session, policy: &dyn Policy) -> Vec<String>;
}
