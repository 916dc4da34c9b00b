use async_trait::async_trait;

use super::{MechanismProcessor, Step};
use crate::{credentials::Credentials, error::SessionError, policy::Policy, session::Session};

/// LOGIN: the pre-RFC two-prompt exchange. An initial response with the
/// AUTH command is treated as the username, skipping the first prompt.
#[derive(Default)]
pub struct LoginMechanism {
    username: Option<String>,
}

#[async_trait]
impl MechanismProcessor for LoginMechanism {
    async fn respond(
        &mut self,
        _session: &Session,
        _policy: &dyn Policy,
        response: Option<&str>,
    ) -> Result<Step, SessionError> {
        let Some(response) = response else {
            return Ok(Step::Challenge("Username:".to_string()));
        };

        match self.username.take() {
            None => {
                if response.is_empty() {
                    return Ok(Step::Failure);
                }

                self.username = Some(response.to_string());
                Ok(Step::Challenge("Password:".to_string()))
            }
            Some(username) => Ok(Step::Success(Credentials::UsernamePassword {
                username,
                password: response.to_string(),
            })),
        }
    }
}
