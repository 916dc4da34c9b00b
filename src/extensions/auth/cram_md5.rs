use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

use super::{MechanismProcessor, Step};
use crate::{credentials::Credentials, error::SessionError, policy::Policy, session::Session};

/// CRAM-MD5 (RFC 2195): challenge first, always. The mechanism takes no
/// initial response, so any data sent with AUTH itself is ignored and the
/// exchange starts with a fresh, per-attempt challenge.
#[derive(Default)]
pub struct CramMd5Mechanism {
    challenge: Option<String>,
}

#[async_trait]
impl MechanismProcessor for CramMd5Mechanism {
    async fn respond(
        &mut self,
        _session: &Session,
        policy: &dyn Policy,
        response: Option<&str>,
    ) -> Result<Step, SessionError> {
        let Some(challenge) = self.challenge.clone() else {
            let _ = response;
            let challenge = fresh_challenge(policy.domain_name());
            self.challenge = Some(challenge.clone());
            return Ok(Step::Challenge(challenge));
        };

        let Some(response) = response else {
            return Ok(Step::Failure);
        };

        // Response is "username SP hex-digest"
        let Some((username, digest)) = response.split_once(' ') else {
            return Ok(Step::Failure);
        };

        if username.is_empty() || digest.is_empty() {
            return Ok(Step::Failure);
        }

        Ok(Step::Success(Credentials::CramMd5 {
            username: username.to_string(),
            challenge,
            response: digest.to_string(),
        }))
    }
}

/// Nonce challenge, unique per attempt.
fn fresh_challenge(domain: &str) -> String {
    let random: u32 = rand::thread_rng().gen();
    let now = Utc::now().timestamp_micros();
    format!("{random}.{now}@{domain}")
}

#[cfg(test)]
mod test {
    use super::{fresh_challenge, CramMd5Mechanism, MechanismProcessor, Step};
    use crate::{
        credentials::{hmac_md5_hex, Credentials},
        policy::ServerPolicy,
        session::Session,
    };

    fn fixtures() -> (Session, ServerPolicy) {
        (
            Session::new("127.0.0.1:1".parse().unwrap()),
            ServerPolicy::new("test.local"),
        )
    }

    #[tokio::test]
    async fn full_exchange_produces_verifiable_credentials() {
        let (session, policy) = fixtures();
        let mut mechanism = CramMd5Mechanism::default();

        let Step::Challenge(challenge) =
            mechanism.respond(&session, &policy, None).await.unwrap()
        else {
            panic!("expected challenge");
        };
        assert!(challenge.contains("@test.local"));

        let digest = hmac_md5_hex(b"tanstaaftanstaaf", challenge.as_bytes());
        let answer = format!("tim {digest}");

        match mechanism
            .respond(&session, &policy, Some(&answer))
            .await
            .unwrap()
        {
            Step::Success(Credentials::CramMd5 {
                username,
                challenge: kept,
                response,
            }) => {
                assert_eq!(username, "tim");
                assert_eq!(kept, challenge);
                assert!(Credentials::cram_md5_matches(
                    &kept,
                    &response,
                    "tanstaaftanstaaf"
                ));
            }
            _ => panic!("expected credentials"),
        }
    }

    #[tokio::test]
    async fn initial_response_is_ignored() {
        let (session, policy) = fixtures();
        let mut mechanism = CramMd5Mechanism::default();

        assert!(matches!(
            mechanism
                .respond(&session, &policy, Some("premature"))
                .await
                .unwrap(),
            Step::Challenge(_)
        ));
    }

    #[tokio::test]
    async fn response_without_digest_fails() {
        let (session, policy) = fixtures();
        let mut mechanism = CramMd5Mechanism::default();

        let _ = mechanism.respond(&session, &policy, None).await.unwrap();
        assert!(matches!(
            mechanism
                .respond(&session, &policy, Some("tim"))
                .await
                .unwrap(),
            Step::Failure
        ));
    }

    #[test]
    fn challenges_are_unique() {
        assert_ne!(fresh_challenge("a.local"), fresh_challenge("a.local"));
    }
}
