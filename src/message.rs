use chrono::{DateTime, Utc};

/// A message as it accumulates across MAIL, RCPT, and DATA.
///
/// The builder exists from the moment MAIL is accepted and is either
/// committed into a [`Message`] when DATA completes or discarded on RSET,
/// rejection, or disconnect.
#[derive(Clone, Debug)]
pub struct MessageBuilder {
    received: DateTime<Utc>,
    from: String,
    recipients: Vec<String>,
    declared_size: Option<u64>,
    eight_bit_transport: bool,
    secure: bool,
    data: Vec<u8>,
}

impl MessageBuilder {
    #[must_use]
    pub fn new(from: impl Into<String>, secure: bool) -> Self {
        Self {
            received: Utc::now(),
            from: from.into(),
            recipients: Vec::new(),
            declared_size: None,
            eight_bit_transport: false,
            secure,
            data: Vec::new(),
        }
    }

    /// The reverse-path from MAIL FROM. Empty for the null sender `<>`.
    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }

    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn add_recipient(&mut self, recipient: impl Into<String>) {
        self.recipients.push(recipient.into());
    }

    #[must_use]
    pub const fn declared_size(&self) -> Option<u64> {
        self.declared_size
    }

    pub fn set_declared_size(&mut self, size: u64) {
        self.declared_size = Some(size);
    }

    pub fn set_eight_bit_transport(&mut self) {
        self.eight_bit_transport = true;
    }

    /// Appends one already-unstuffed line of message data plus its CRLF.
    pub fn append_line(&mut self, line: &[u8]) {
        self.data.extend_from_slice(line);
        self.data.extend_from_slice(b"\r\n");
    }

    /// Bytes accumulated so far, CRLF terminators included.
    #[must_use]
    pub fn data_length(&self) -> u64 {
        self.data.len() as u64
    }

    #[must_use]
    pub fn finish(self) -> Message {
        Message {
            received: self.received,
            from: self.from,
            recipients: self.recipients,
            declared_size: self.declared_size,
            eight_bit_transport: self.eight_bit_transport,
            secure: self.secure,
            data: self.data,
        }
    }
}

/// A completed message, immutable once DATA has been accepted.
#[derive(Clone, Debug)]
pub struct Message {
    received: DateTime<Utc>,
    from: String,
    recipients: Vec<String>,
    declared_size: Option<u64>,
    eight_bit_transport: bool,
    secure: bool,
    data: Vec<u8>,
}

impl Message {
    #[must_use]
    pub const fn received(&self) -> DateTime<Utc> {
        self.received
    }

    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }

    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    #[must_use]
    pub const fn declared_size(&self) -> Option<u64> {
        self.declared_size
    }

    #[must_use]
    pub const fn eight_bit_transport(&self) -> bool {
        self.eight_bit_transport
    }

    /// Whether the message was received over an encrypted channel.
    #[must_use]
    pub const fn secure(&self) -> bool {
        self.secure
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
