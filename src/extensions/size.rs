use super::ExtensionProcessor;
use crate::{policy::Policy, session::Session};

/// SIZE (RFC 1870): advertises the message size cap. Enforcement happens in
/// MAIL (declared size) and DATA (actual size).
pub struct SizeExtension;

impl ExtensionProcessor for SizeExtension {
    fn ehlo_keywords(&self, session: &Session, policy: &dyn Policy) -> Vec<String> {
        match policy.maximum_message_size(session) {
            Some(maximum) => vec![format!("SIZE {maximum}")],
            None => vec!["SIZE".to_string()],
        }
    }
}

#[cfg(test)]
mod test {
    use super::{ExtensionProcessor, SizeExtension};
    use crate::{policy::ServerPolicy, session::Session};

    #[test]
    fn keyword_carries_limit_when_set() {
        let session = Session::new("127.0.0.1:1".parse().unwrap());

        let unlimited = ServerPolicy::new("test.local");
        assert_eq!(
            SizeExtension.ehlo_keywords(&session, &unlimited),
            ["SIZE"]
        );

        let capped = ServerPolicy::new("test.local").with_maximum_message_size(Some(10_240));
        assert_eq!(
            SizeExtension.ehlo_keywords(&session, &capped),
            ["SIZE 10240"]
        );
    }
}
