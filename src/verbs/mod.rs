//! Verb handlers and the dispatch table they live in.
//!
//! Each SMTP verb is a [`Verb`] implementation owning its own argument
//! checks and replies. The connection loop only knows how to look a verb up
//! by name and run it; everything protocol-specific lives behind the trait.

use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;

use crate::{
    channel::SessionStream,
    command::Command,
    connection::Connection,
    error::SmtpResult,
};

mod data;
mod helo;
mod mail;
mod rcpt;
mod simple;

pub use data::Data;
pub use helo::{Ehlo, Helo};
pub use mail::Mail;
pub use rcpt::Rcpt;
pub use simple::{Noop, Quit, Rset};

/// One SMTP verb.
///
/// Handlers mutate the connection directly: writing replies, updating the
/// session, and for DATA and AUTH, reading further lines. A returned
/// `Err(SessionError::Rejected)` is written to the client by the loop and
/// the session continues; other errors end it.
#[async_trait]
pub trait Verb<Stream: SessionStream>: Send + Sync {
    async fn process(
        &self,
        connection: &mut Connection<Stream>,
        command: &Command,
    ) -> SmtpResult<()>;
}

/// Case-insensitive verb registry. Registration is last-wins so extensions
/// and tests can override the built-ins.
pub struct VerbMap<Stream: SessionStream> {
    verbs: AHashMap<String, Arc<dyn Verb<Stream>>>,
}

impl<Stream: SessionStream> Default for VerbMap<Stream> {
    /// A map preloaded with the core RFC 5321 verbs.
    fn default() -> Self {
        let mut map = Self::empty();

        map.register("HELO", Arc::new(Helo));
        map.register("EHLO", Arc::new(Ehlo));
        map.register("MAIL", Arc::new(Mail));
        map.register("RCPT", Arc::new(Rcpt));
        map.register("DATA", Arc::new(Data));
        map.register("RSET", Arc::new(Rset));
        map.register("NOOP", Arc::new(Noop));
        map.register("QUIT", Arc::new(Quit));

        map
    }
}

impl<Stream: SessionStream> VerbMap<Stream> {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            verbs: AHashMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, verb: Arc<dyn Verb<Stream>>) {
        self.verbs.insert(name.to_ascii_uppercase(), verb);
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Verb<Stream>>> {
        self.verbs.get(&name.to_ascii_uppercase()).map(Arc::clone)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::{Noop, VerbMap};
    use tokio::io::DuplexStream;

    #[test]
    fn lookup_is_case_insensitive() {
        let map = VerbMap::<DuplexStream>::default();
        assert!(map.lookup("quit").is_some());
        assert!(map.lookup("QUIT").is_some());
        assert!(map.lookup("QuIt").is_some());
        assert!(map.lookup("BDAT").is_none());
    }

    #[test]
    fn registration_is_last_wins() {
        let mut map = VerbMap::<DuplexStream>::default();
        let replacement: Arc<dyn super::Verb<DuplexStream>> = Arc::new(Noop);
        map.register("quit", Arc::clone(&replacement));

        let looked_up = map.lookup("QUIT").unwrap();
        assert!(Arc::ptr_eq(&looked_up, &replacement));
    }
}
