use hmac::{Hmac, Mac};
use md5::Md5;

/// The proof of identity an authentication exchange produced.
///
/// Each variant carries exactly what its mechanism collected; validation is
/// left entirely to the policy, which has access to whatever secrets it
/// keeps.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Credentials {
    /// ANONYMOUS: no identity at all, only trace data the server ignores.
    Anonymous,
    /// PLAIN and LOGIN both reduce to a cleartext pair.
    UsernamePassword { username: String, password: String },
    /// CRAM-MD5: the password never crosses the wire, only an HMAC-MD5
    /// digest of the server's challenge.
    CramMd5 {
        username: String,
        challenge: String,
        response: String,
    },
    /// XOAUTH2: a bearer token asserted for a username.
    Bearer { username: String, token: String },
}

impl Credentials {
    /// The username this credential claims, where one exists.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::UsernamePassword { username, .. }
            | Self::CramMd5 { username, .. }
            | Self::Bearer { username, .. } => Some(username),
        }
    }

    /// Checks a CRAM-MD5 response against a known password, ignoring hex
    /// digit case.
    #[must_use]
    pub fn cram_md5_matches(challenge: &str, response: &str, password: &str) -> bool {
        hmac_md5_hex(password.as_bytes(), challenge.as_bytes()).eq_ignore_ascii_case(response)
    }
}

/// Lowercase hex HMAC-MD5 digest of `text` keyed by `key` (RFC 2195).
#[must_use]
pub fn hmac_md5_hex(key: &[u8], text: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac =
        <Hmac<Md5> as Mac>::new_from_slice(key).expect("HMAC key length is unrestricted");
    mac.update(text);

    mac.finalize()
        .into_bytes()
        .iter()
        .fold(String::with_capacity(32), |mut hex, byte| {
            let _ = core::fmt::Write::write_fmt(&mut hex, format_args!("{byte:02x}"));
            hex
        })
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{hmac_md5_hex, Credentials};

    // RFC 2195 section 2 example
    #[test]
    fn rfc_2195_vector() {
        let digest = hmac_md5_hex(
            b"tanstaaftanstaaf",
            b"<1896.697170952@postoffice.reston.mci.net>",
        );
        assert_eq!(digest, "b913a602c7eda7a495b4e6e7334d3890");
    }

    #[test]
    fn digest_comparison_ignores_case() {
        assert!(Credentials::cram_md5_matches(
            "<1896.697170952@postoffice.reston.mci.net>",
            "B913A602C7EDA7A495B4E6E7334D3890",
            "tanstaaftanstaaf",
        ));
        assert!(!Credentials::cram_md5_matches(
            "<1896.697170952@postoffice.reston.mci.net>",
            "b913a602c7eda7a495b4e6e7334d3890",
            "wrong",
        ));
    }

    #[test]
    fn username_per_variant() {
        assert_eq!(Credentials::Anonymous.username(), None);
        assert_eq!(
            Credentials::UsernamePassword {
                username: "tim".to_string(),
                password: "secret".to_string(),
            }
            .username(),
            Some("tim")
        );
    }
}
