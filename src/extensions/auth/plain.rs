use async_trait::async_trait;

use super::{MechanismProcessor, Step};
use crate::{credentials::Credentials, error::SessionError, policy::Policy, session::Session};

/// PLAIN (RFC 4616): a single `authzid NUL authcid NUL passwd` response,
/// inline with the AUTH command or after one empty challenge.
pub struct PlainMechanism;

#[async_trait]
impl MechanismProcessor for PlainMechanism {
    async fn respond(
        &mut self,
        _session: &Session,
        _policy: &dyn Policy,
        response: Option<&str>,
    ) -> Result<Step, SessionError> {
        let Some(response) = response else {
            return Ok(Step::Challenge(String::new()));
        };

        let parts: Vec<&str> = response.split('\0').collect();
        let [_authzid, username, password] = parts[..] else {
            return Ok(Step::Failure);
        };

        if username.is_empty() {
            return Ok(Step::Failure);
        }

        Ok(Step::Success(Credentials::UsernamePassword {
            username: username.to_string(),
            password: password.to_string(),
        }))
    }
}
