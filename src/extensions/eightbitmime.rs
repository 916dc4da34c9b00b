use super::ExtensionProcessor;
use crate::{policy::Policy, session::Session};

/// 8BITMIME (RFC 6152): permits `BODY=8BITMIME` on MAIL. The message store
/// keeps raw bytes either way, so the extension is purely declarative.
pub struct EightBitMimeExtension;

impl ExtensionProcessor for EightBitMimeExtension {
    fn ehlo_keywords(&self, _session: &Session, _policy: &dyn Policy) -> Vec<String> {
        vec!["8BITMIME".to_string()]
    }
}
