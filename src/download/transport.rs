//! Byte-level transport over plaintext TCP or TLS.
//!
//! [`Transport`] opens a [`Connection`] to one host and port; the connection
//! is a plain byte channel implementing tokio's `AsyncRead`/`AsyncWrite`, so
//! the request writer and response framer do not care whether TLS is in use.
//! A connection closes when it is dropped; [`Connection::close`] additionally
//! attempts a graceful shutdown.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpStream, lookup_host};
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore};
use tracing::{debug, instrument, trace};

use super::error::FetchError;
use crate::parser::{ParsedUrl, Scheme};

/// An open byte channel to one `{host, port}` pair.
pub enum Connection {
    /// Plaintext TCP.
    Plain(TcpStream),
    /// TCP wrapped in a client TLS session.
    Tls(Box<TlsStream<TcpStream>>),
}

impl Connection {
    /// Whether the channel is TLS-wrapped.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Shuts the connection down and releases the socket.
    ///
    /// Shutdown errors are ignored: the peer may already have closed its end,
    /// which is the normal way a response ends.
    pub async fn close(mut self) {
        if let Err(error) = self.shutdown().await {
            trace!(error = %error, "connection shutdown failed");
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(stream) => f.debug_tuple("Plain").field(&stream.peer_addr().ok()).finish(),
            Self::Tls(stream) => f
                .debug_tuple("Tls")
                .field(&stream.get_ref().0.peer_addr().ok())
                .finish(),
        }
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(&mut **stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(&mut **stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(&mut **stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(&mut **stream).poll_shutdown(cx),
        }
    }
}

/// Opens connections, performing the TLS handshake for secure schemes.
///
/// The TLS configuration is built once and shared by every connection; the
/// transport is cheap to clone into spawned tasks.
#[derive(Clone)]
pub struct Transport {
    tls: TlsConnector,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    /// Creates a transport trusting the bundled web PKI roots.
    ///
    /// # Panics
    ///
    /// Panics if the TLS configuration cannot be built from the static
    /// provider and protocol versions. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let config =
            default_tls_config().expect("failed to build TLS configuration with static settings");
        Self::with_tls_config(Arc::new(config))
    }

    /// Creates a transport with a caller-supplied TLS configuration.
    #[must_use]
    pub fn with_tls_config(config: Arc<ClientConfig>) -> Self {
        Self {
            tls: TlsConnector::from(config),
        }
    }

    /// Connects to `host:port`, wrapping the socket in TLS when `scheme` is secure.
    ///
    /// Every resolved address is tried in order and the first successful
    /// connection is used.
    ///
    /// # Errors
    ///
    /// - [`FetchError::ConnectionFailed`] if resolution fails or every address refuses
    /// - [`FetchError::TlsHandshakeFailed`] if the handshake fails; the socket is closed
    #[instrument(skip(self), fields(secure = scheme.is_secure()))]
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        scheme: Scheme,
    ) -> Result<Connection, FetchError> {
        let addresses = lookup_host((host, port)).await.map_err(|e| {
            FetchError::connection_failed(host, port, "address resolution failed", Some(e))
        })?;

        let mut last_error = None;
        let mut connected = None;
        for address in addresses {
            match TcpStream::connect(address).await {
                Ok(stream) => {
                    debug!(%address, "connected");
                    connected = Some(stream);
                    break;
                }
                Err(e) => {
                    debug!(%address, error = %e, "connect attempt failed");
                    last_error = Some(e);
                }
            }
        }

        let Some(stream) = connected else {
            return Err(FetchError::connection_failed(
                host,
                port,
                "no address accepted the connection",
                last_error,
            ));
        };

        if !scheme.is_secure() {
            return Ok(Connection::Plain(stream));
        }

        let server_name = ServerName::try_from(host.to_string()).map_err(|e| {
            FetchError::tls_handshake(host, io::Error::new(io::ErrorKind::InvalidInput, e))
        })?;

        // On failure the TCP stream is dropped inside `connect`, closing the socket
        let stream = self
            .tls
            .connect(server_name, stream)
            .await
            .map_err(|e| FetchError::tls_handshake(host, e))?;

        debug!("TLS handshake complete");
        Ok(Connection::Tls(Box::new(stream)))
    }
}

fn default_tls_config() -> Result<ClientConfig, rustls::Error> {
    let roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_root_certificates(roots)
    .with_no_client_auth();
    Ok(config)
}

/// Formats the only request this client sends.
#[must_use]
pub fn build_request(target: &ParsedUrl) -> String {
    format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        target.path, target.host
    )
}

/// Writes all of `bytes` and flushes.
///
/// # Errors
///
/// Returns the underlying IO error.
pub async fn send<W>(stream: &mut W, bytes: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    stream.write_all(bytes).await?;
    stream.flush().await
}

/// Appends at most `max_bytes` from `stream` to `buffer`.
///
/// Returns the number of bytes appended; `0` means the peer closed the
/// connection. A TLS peer closing without `close_notify` also counts as a
/// close, since response bodies are delimited by connection close.
///
/// # Errors
///
/// Returns the underlying IO error. `buffer` is left unchanged on error.
pub async fn receive_chunk<R>(
    stream: &mut R,
    buffer: &mut Vec<u8>,
    max_bytes: usize,
) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let start = buffer.len();
    buffer.resize(start + max_bytes, 0);

    let read = match stream.read(&mut buffer[start..]).await {
        Ok(read) => read,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => 0,
        Err(e) => {
            buffer.truncate(start);
            return Err(e);
        }
    };

    buffer.truncate(start + read);
    trace!(read, total = buffer.len(), "received chunk");
    Ok(read)
}
