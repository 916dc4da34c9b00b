use core::fmt::{self, Display, Formatter};
use std::{fs::File, io, io::BufReader, path::PathBuf, sync::Arc};

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_rustls::{
    rustls::{
        pki_types::{CertificateDer, PrivateKeyDer},
        ProtocolVersion, ServerConfig, ServerConnection, SupportedCipherSuite,
    },
    server::TlsStream,
    TlsAcceptor,
};

use crate::error::TlsError;

/// Bound alias for the byte streams a session can run over.
pub trait SessionStream: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static> SessionStream for T {}

const READ_CHUNK: usize = 4096;

// Generous next to the RFC 5321 line limits, but it keeps a client that
// never sends a terminator from growing the buffer without bound
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Certificate and key used to answer STARTTLS.
#[derive(Clone, Debug, Deserialize)]
pub struct TlsIdentity {
    pub certificate: PathBuf,
    pub key: PathBuf,
}

impl TlsIdentity {
    /// Builds a TLS acceptor from the PEM files this identity points at.
    ///
    /// # Errors
    /// Returns [`TlsError`] if either file cannot be read or parsed.
    pub fn acceptor(&self) -> Result<TlsAcceptor, TlsError> {
        let certs = load_certs(&self.certificate)?;
        let key = load_key(&self.key)?;

        let config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;

        Ok(TlsAcceptor::from(Arc::new(config)))
    }
}

fn load_certs(path: &PathBuf) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let file = File::open(path).map_err(|source| TlsError::CertificateLoad {
        path: path.display().to_string(),
        source,
    })?;

    rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<_, _>>()
        .map_err(|source| TlsError::CertificateLoad {
            path: path.display().to_string(),
            source,
        })
}

fn load_key(path: &PathBuf) -> Result<PrivateKeyDer<'static>, TlsError> {
    let path_str = path.display().to_string();
    let file = File::open(path).map_err(|e| TlsError::KeyLoad {
        path: path_str.clone(),
        reason: e.to_string(),
    })?;
    let mut reader = BufReader::new(file);

    match rustls_pemfile::read_one(&mut reader).map_err(|e| TlsError::KeyLoad {
        path: path_str.clone(),
        reason: e.to_string(),
    })? {
        Some(rustls_pemfile::Item::Pkcs1Key(key)) => Ok(PrivateKeyDer::Pkcs1(key)),
        Some(rustls_pemfile::Item::Pkcs8Key(key)) => Ok(PrivateKeyDer::Pkcs8(key)),
        Some(rustls_pemfile::Item::Sec1Key(key)) => Ok(PrivateKeyDer::Sec1(key)),
        _ => Err(TlsError::KeyLoad {
            path: path_str,
            reason: "Unable to determine key file format (expected PKCS1, PKCS8, or SEC1)"
                .to_string(),
        }),
    }
}

/// Details of a negotiated TLS session, for logging.
#[derive(Debug)]
pub struct TlsInfo {
    version: Option<ProtocolVersion>,
    cipher: Option<SupportedCipherSuite>,
}

impl TlsInfo {
    fn of(conn: &ServerConnection) -> Self {
        Self {
            version: conn.protocol_version(),
            cipher: conn.negotiated_cipher_suite(),
        }
    }
}

impl Display for TlsInfo {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        let version = self
            .version
            .and_then(|version| version.as_str())
            .unwrap_or("unknown");
        let cipher = self
            .cipher
            .and_then(|suite| suite.suite().as_str())
            .unwrap_or("unknown");
        write!(fmt, "{version} {cipher}")
    }
}

/// The owned, replaceable transport a connection reads and writes through.
///
/// STARTTLS swaps the whole value for the `Tls` variant; the plaintext
/// stream is consumed by the handshake and can never be read again.
pub enum Channel<Stream: SessionStream> {
    Plain { stream: Stream, buf: Vec<u8> },
    Tls {
        stream: Box<TlsStream<Stream>>,
        buf: Vec<u8>,
    },
    Closed,
}

impl<Stream: SessionStream> Channel<Stream> {
    pub(crate) fn new(stream: Stream) -> Self {
        Self::Plain {
            stream,
            buf: Vec::new(),
        }
    }

    pub(crate) const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub(crate) fn close(&mut self) {
        *self = Self::Closed;
    }

    /// Writes one line, appending CRLF, and flushes.
    pub(crate) async fn send(&mut self, text: &str) -> io::Result<()> {
        match self {
            Self::Plain { stream, .. } => {
                stream.write_all(text.as_bytes()).await?;
                stream.write_all(b"\r\n").await?;
                stream.flush().await
            }
            Self::Tls { stream, .. } => {
                stream.write_all(text.as_bytes()).await?;
                stream.write_all(b"\r\n").await?;
                stream.flush().await
            }
            Self::Closed => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "channel is closed",
            )),
        }
    }

    /// Reads one line, stripped of its CRLF (or bare LF) terminator.
    ///
    /// Returns `Ok(None)` once the peer has closed the stream. A trailing
    /// partial line with no terminator is discarded. A line longer than
    /// [`MAX_LINE_LENGTH`] fails the read instead of buffering forever.
    pub(crate) async fn read_line_bytes(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            if let Some(buf) = self.buf_mut() {
                if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                    let mut line: Vec<u8> = buf.drain(..=pos).collect();
                    line.pop();
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    return Ok(Some(line));
                }

                if buf.len() > MAX_LINE_LENGTH {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "line exceeds maximum length",
                    ));
                }
            }

            if self.fill().await? == 0 {
                return Ok(None);
            }
        }
    }

    /// Reads one line as text; command lines are not byte-sensitive, so
    /// invalid UTF-8 is replaced rather than rejected.
    pub(crate) async fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self
            .read_line_bytes()
            .await?
            .map(|line| String::from_utf8_lossy(&line).into_owned()))
    }

    /// Performs the in-place TLS handshake, consuming the plaintext stream.
    ///
    /// Any bytes buffered before the handshake are deliberately dropped:
    /// nothing sent in the clear may be replayed into the secured reader.
    pub(crate) async fn upgrade(self, acceptor: &TlsAcceptor) -> Result<(Self, TlsInfo), TlsError> {
        match self {
            Self::Plain { stream, .. } => {
                let stream = acceptor
                    .accept(stream)
                    .await
                    .map_err(TlsError::Handshake)?;
                let info = TlsInfo::of(stream.get_ref().1);

                Ok((
                    Self::Tls {
                        stream: Box::new(stream),
                        buf: Vec::new(),
                    },
                    info,
                ))
            }
            Self::Tls { .. } => Err(TlsError::AlreadyEncrypted),
            Self::Closed => Err(TlsError::ChannelClosed),
        }
    }

    fn buf_mut(&mut self) -> Option<&mut Vec<u8>> {
        match self {
            Self::Plain { buf, .. } | Self::Tls { buf, .. } => Some(buf),
            Self::Closed => None,
        }
    }

    async fn fill(&mut self) -> io::Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];

        match self {
            Self::Plain { stream, buf } => {
                let read = stream.read(&mut chunk).await?;
                buf.extend_from_slice(&chunk[..read]);
                Ok(read)
            }
            Self::Tls { stream, buf } => {
                let read = stream.read(&mut chunk).await?;
                buf.extend_from_slice(&chunk[..read]);
                Ok(read)
            }
            Self::Closed => Ok(0),
        }
    }
}

#[cfg(test)]
mod test {
    use tokio::io::AsyncWriteExt;

    use super::Channel;

    #[tokio::test]
    async fn line_reads_split_on_crlf() {
        let (client, server) = tokio::io::duplex(1024);
        let mut channel = Channel::new(server);

        let mut client = client;
        client.write_all(b"EHLO one\r\nQUIT\r\n").await.unwrap();
        drop(client);

        assert_eq!(channel.read_line().await.unwrap().as_deref(), Some("EHLO one"));
        assert_eq!(channel.read_line().await.unwrap().as_deref(), Some("QUIT"));
        assert_eq!(channel.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn bare_lf_is_tolerated() {
        let (client, server) = tokio::io::duplex(1024);
        let mut channel = Channel::new(server);

        let mut client = client;
        client.write_all(b"NOOP\n").await.unwrap();
        drop(client);

        assert_eq!(channel.read_line().await.unwrap().as_deref(), Some("NOOP"));
    }

    #[tokio::test]
    async fn partial_trailing_line_is_discarded() {
        let (client, server) = tokio::io::duplex(1024);
        let mut channel = Channel::new(server);

        let mut client = client;
        client.write_all(b"QUIT\r\nleftover").await.unwrap();
        drop(client);

        assert_eq!(channel.read_line().await.unwrap().as_deref(), Some("QUIT"));
        assert_eq!(channel.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn unterminated_input_is_bounded() {
        let (client, server) = tokio::io::duplex(1024);
        let mut channel = Channel::new(server);

        let writer = tokio::spawn(async move {
            let mut client = client;
            let chunk = [b'a'; 1024];
            for _ in 0..80 {
                if client.write_all(&chunk).await.is_err() {
                    break;
                }
            }
        });

        let result = channel.read_line_bytes().await;
        assert_eq!(
            result.unwrap_err().kind(),
            std::io::ErrorKind::InvalidData
        );

        writer.abort();
    }

    #[tokio::test]
    async fn send_appends_crlf() {
        let (client, server) = tokio::io::duplex(1024);
        let mut channel = Channel::new(server);

        channel.send("220 ready").await.unwrap();
        channel.close();

        let mut received = Vec::new();
        let mut client = client;
        tokio::io::AsyncReadExt::read_to_end(&mut client, &mut received)
            .await
            .unwrap();
        assert_eq!(received, b"220 ready\r\n");
    }
}
