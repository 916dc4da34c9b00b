use core::fmt::{self, Display, Formatter};

use crate::status::Status;

/// A reply from server to client: a numeric code plus descriptive text.
///
/// The message may contain embedded line breaks, in which case `Display`
/// renders the RFC 5321 multi-line continuation format: every line but the
/// last is `CODE-text`, the last is `CODE text`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Response {
    code: u16,
    message: String,
}

impl Response {
    #[must_use]
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            code: status.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> u16 {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Error replies have a code in the range 500-599.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.code >= 500 && self.code <= 599
    }

    /// Successful replies have a code in the range 200-299.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code <= 299
    }
}

impl Display for Response {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let lines: Vec<&str> = self.message.lines().collect();

        match lines.split_last() {
            None => write!(fmt, "{} ", self.code),
            Some((last, rest)) => {
                for line in rest {
                    write!(fmt, "{}-{line}\r\n", self.code)?;
                }
                write!(fmt, "{} {last}", self.code)
            }
        }
    }
}
