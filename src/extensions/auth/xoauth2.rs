use async_trait::async_trait;

use super::{MechanismProcessor, Step};
use crate::{credentials::Credentials, error::SessionError, policy::Policy, session::Session};

/// XOAUTH2: a single response of ^A-separated fields, of which `user=` and
/// `auth=Bearer ` are required.
pub struct Xoauth2Mechanism;

#[async_trait]
impl MechanismProcessor for Xoauth2Mechanism {
    async fn respond(
        &mut self,
        _session: &Session,
        _policy: &dyn Policy,
        response: Option<&str>,
    ) -> Result<Step, SessionError> {
        let Some(response) = response else {
            return Ok(Step::Challenge(String::new()));
        };

        let mut username = None;
        let mut token = None;

        for field in response.split('\x01') {
            if let Some(value) = field.strip_prefix("user=") {
                username = Some(value);
            } else if let Some(value) = field.strip_prefix("auth=Bearer ") {
                token = Some(value);
            }
        }

        match (username, token) {
            (Some(username), Some(token)) if !username.is_empty() && !token.is_empty() => {
                Ok(Step::Success(Credentials::Bearer {
                    username: username.to_string(),
                    token: token.to_string(),
                }))
            }
            _ => Ok(Step::Failure),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{MechanismProcessor, Step, Xoauth2Mechanism};
    use crate::{credentials::Credentials, policy::ServerPolicy, session::Session};

    fn fixtures() -> (Session, ServerPolicy) {
        (
            Session::new("127.0.0.1:1".parse().unwrap()),
            ServerPolicy::new("test.local"),
        )
    }

    #[tokio::test]
    async fn well_formed_assertion_yields_bearer_credentials() {
        let (session, policy) = fixtures();
        let mut mechanism = Xoauth2Mechanism;

        let response = "user=tim\x01auth=Bearer ya29.token\x01\x01";
        match mechanism
            .respond(&session, &policy, Some(response))
            .await
            .unwrap()
        {
            Step::Success(Credentials::Bearer { username, token }) => {
                assert_eq!(username, "tim");
                assert_eq!(token, "ya29.token");
            }
            _ => panic!("expected credentials"),
        }
    }

    #[tokio::test]
    async fn missing_fields_fail() {
        let (session, policy) = fixtures();
        let mut mechanism = Xoauth2Mechanism;

        for bad in [
            "user=tim\x01\x01",
            "auth=Bearer token\x01\x01",
            "user=\x01auth=Bearer token\x01\x01",
            "gibberish",
        ] {
            assert!(matches!(
                mechanism.respond(&session, &policy, Some(bad)).await.unwrap(),
                Step::Failure
            ));
        }
    }
}
