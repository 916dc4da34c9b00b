use async_trait::async_trait;

use super::{MechanismProcessor, Step};
use crate::{credentials::Credentials, error::SessionError, policy::Policy, session::Session};

/// ANONYMOUS (RFC 4505): one challenge inviting trace information, which
/// is accepted and discarded whatever it says.
#[derive(Default)]
pub struct AnonymousMechanism;

#[async_trait]
impl MechanismProcessor for AnonymousMechanism {
    async fn respond(
        &mut self,
        _session: &Session,
        _policy: &dyn Policy,
        response: Option<&str>,
    ) -> Result<Step, SessionError> {
        Ok(match response {
            None => Step::Challenge(String::new()),
            Some(_) => Step::Success(Credentials::Anonymous),
        })
    }
}

#[cfg(test)]
mod test {
    use super::{AnonymousMechanism, MechanismProcessor, Step};
    use crate::{credentials::Credentials, policy::ServerPolicy, session::Session};

    #[tokio::test]
    async fn any_trace_data_succeeds() {
        let session = Session::new("127.0.0.1:1".parse().unwrap());
        let policy = ServerPolicy::new("test.local").allow_anonymous(true);
        let mut mechanism = AnonymousMechanism;

        assert!(matches!(
            mechanism.respond(&session, &policy, None).await.unwrap(),
            Step::Challenge(challenge) if challenge.is_empty()
        ));
        assert!(matches!(
            mechanism
                .respond(&session, &policy, Some("postmaster@example.com"))
                .await
                .unwrap(),
            Step::Success(Credentials::Anonymous)
        ));
    }
}
