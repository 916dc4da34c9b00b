use core::fmt::{self, Display, Formatter};

/// The closed set of SMTP reply codes this server emits.
#[repr(u16)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Debug)]
pub enum Status {
    SystemStatus = 211,
    HelpMessage = 214,
    ServiceReady = 220,
    ClosingTransmissionChannel = 221,
    AuthenticationOk = 235,
    Ok = 250,
    UserNotLocal = 251,
    AuthenticationContinue = 334,
    StartMailInput = 354,
    SyntaxErrorCommandUnrecognised = 500,
    SyntaxErrorInCommandArguments = 501,
    CommandNotImplemented = 502,
    BadSequenceOfCommands = 503,
    CommandParameterNotImplemented = 504,
    AuthenticationFailure = 535,
    RecipientRejected = 550,
    ExceededStorageAllocation = 552,
    TransactionFailed = 554,
}

impl Status {
    /// Checks if the status is a permanent rejection
    #[must_use]
    pub fn is_permanent(self) -> bool {
        u16::from(self) >= 500
    }

    /// Checks if the status indicates success
    #[must_use]
    pub fn is_success(self) -> bool {
        (200..300).contains(&u16::from(self))
    }
}

impl From<Status> for u16 {
    fn from(value: Status) -> Self {
        value as Self
    }
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(fmt, "{}", u16::from(*self))
    }
}
