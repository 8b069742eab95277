//! Integration tests for request writing and response framing over real sockets.
//!
//! A raw `TcpListener` stands in for the server so the tests control every
//! byte of the response, including how it is split across writes. The TLS
//! tests wrap the listener in a `TlsAcceptor` using the certificates under
//! `tests/fixtures/tls/`.

use std::sync::Arc;
use std::time::Duration;

use mirror_core::download::{EXIT_FAILURE, EXIT_PROTOCOL_ERROR, Transport};
use mirror_core::{Destination, FetchConfig, FetchEngine, FetchError};
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore, ServerConfig};

mod support;
use support::loopback::loopback_listener;

// Test CA and a leaf certificate for `localhost` signed by it
const TEST_CA_DER: &[u8] = include_bytes!("fixtures/tls/ca.der");
const LOCALHOST_CERT_DER: &[u8] = include_bytes!("fixtures/tls/localhost.der");
const LOCALHOST_KEY_DER: &[u8] = include_bytes!("fixtures/tls/localhost.key.der");

/// Reads from `stream` until the blank line ending a request head, or EOF.
async fn read_request_head<S: AsyncRead + Unpin>(stream: &mut S) -> Vec<u8> {
    let mut request = Vec::new();
    let mut buf = [0u8; 512];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let read = stream.read(&mut buf).await.unwrap();
        if read == 0 {
            break;
        }
        request.extend_from_slice(&buf[..read]);
    }
    request
}

/// Accepts one connection, records the request, and replies with `chunks`
/// written separately before closing the connection.
fn serve_once(listener: TcpListener, chunks: Vec<Vec<u8>>) -> JoinHandle<Vec<u8>> {
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request_head(&mut socket).await;

        for chunk in chunks {
            socket.write_all(&chunk).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let _ = socket.shutdown().await;
        request
    })
}

/// Starts a one-shot server and returns its port and request recorder.
async fn start_server(chunks: Vec<Vec<u8>>) -> Option<(u16, JoinHandle<Vec<u8>>)> {
    let listener = loopback_listener().await?;
    let port = listener.local_addr().unwrap().port();
    Some((port, serve_once(listener, chunks)))
}

async fn fetch(port: u16, url_path: &str, dir: &std::path::Path) -> Result<(), FetchError> {
    let config = FetchConfig::new(format!("http://127.0.0.1{url_path}"))
        .with_port(port)
        .with_destination(Destination::Directory(dir.to_path_buf()));
    FetchEngine::new(1).unwrap().run(&config).await.map(|_| ())
}

#[tokio::test]
async fn test_request_has_exact_wire_format() {
    let Some((port, server)) =
        start_server(vec![b"HTTP/1.1 200 OK\r\n\r\nok".to_vec()]).await
    else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();

    fetch(port, "/a/b.html?x=1", temp_dir.path()).await.unwrap();

    let request = server.await.unwrap();
    assert_eq!(
        request,
        b"GET /a/b.html?x=1 HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n"
    );
}

#[tokio::test]
async fn test_body_split_across_many_writes_is_reassembled() {
    let body: Vec<u8> = (0..5_000u32).map(|i| (i % 251) as u8).collect();
    let mut chunks = vec![
        b"HTTP/1.1 200 OK\r\nContent-Type: app".to_vec(),
        b"lication/octet-stream\r\n\r".to_vec(),
        b"\n".to_vec(),
    ];
    chunks.extend(body.chunks(700).map(<[u8]>::to_vec));
    let Some((port, server)) = start_server(chunks).await else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();

    fetch(port, "/data.bin", temp_dir.path()).await.unwrap();
    server.await.unwrap();

    let written = std::fs::read(temp_dir.path().join("data.bin")).unwrap();
    assert_eq!(written, body);
}

#[tokio::test]
async fn test_body_without_content_length_is_read_until_close() {
    let Some((port, server)) = start_server(vec![
        b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\nfirst ".to_vec(),
        b"second".to_vec(),
    ])
    .await
    else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();

    fetch(port, "/", temp_dir.path()).await.unwrap();
    server.await.unwrap();

    let written = std::fs::read(temp_dir.path().join("index.html")).unwrap();
    assert_eq!(written, b"first second");
}

#[tokio::test]
async fn test_unsupported_protocol_is_protocol_error() {
    let Some((port, server)) =
        start_server(vec![b"HTTP/1.0 200 OK\r\n\r\nold".to_vec()]).await
    else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();

    let error = fetch(port, "/", temp_dir.path()).await.unwrap_err();
    server.await.unwrap();

    assert!(
        matches!(error, FetchError::UnsupportedProtocol { ref protocol, .. } if protocol == "HTTP/1.0"),
        "unexpected error: {error}"
    );
    assert_eq!(error.exit_code(), EXIT_PROTOCOL_ERROR);
    assert!(!temp_dir.path().join("index.html").exists());
}

#[tokio::test]
async fn test_non_numeric_status_is_protocol_error() {
    let Some((port, server)) =
        start_server(vec![b"HTTP/1.1 abc OK\r\n\r\n".to_vec()]).await
    else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();

    let error = fetch(port, "/", temp_dir.path()).await.unwrap_err();
    server.await.unwrap();

    assert!(
        matches!(error, FetchError::NonNumericStatus { .. }),
        "unexpected error: {error}"
    );
    assert_eq!(error.exit_code(), EXIT_PROTOCOL_ERROR);
}

#[tokio::test]
async fn test_short_status_line_is_malformed() {
    let Some((port, server)) = start_server(vec![b"HTTP/1.1 200\r\n\r\n".to_vec()]).await else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();

    let error = fetch(port, "/", temp_dir.path()).await.unwrap_err();
    server.await.unwrap();

    assert!(
        matches!(error, FetchError::MalformedStatusLine { .. }),
        "unexpected error: {error}"
    );
}

#[tokio::test]
async fn test_close_before_header_terminator_is_incomplete() {
    let Some((port, server)) =
        start_server(vec![b"HTTP/1.1 200 OK\r\nX-Partial: 1\r\n".to_vec()]).await
    else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();

    let error = fetch(port, "/", temp_dir.path()).await.unwrap_err();
    server.await.unwrap();

    assert!(
        matches!(error, FetchError::IncompleteHeader { .. }),
        "unexpected error: {error}"
    );
    assert_eq!(error.exit_code(), EXIT_PROTOCOL_ERROR);
}

#[tokio::test]
async fn test_refused_connection_reports_connection_failed() {
    let Some(listener) = loopback_listener().await else {
        return;
    };
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let temp_dir = TempDir::new().unwrap();

    let error = fetch(port, "/", temp_dir.path()).await.unwrap_err();

    assert!(
        matches!(error, FetchError::ConnectionFailed { port: p, .. } if p == port),
        "unexpected error: {error}"
    );
    assert_eq!(error.exit_code(), EXIT_FAILURE);
}

fn ring_provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn localhost_acceptor() -> TlsAcceptor {
    let cert = CertificateDer::from(LOCALHOST_CERT_DER.to_vec());
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(LOCALHOST_KEY_DER.to_vec()));
    let config = ServerConfig::builder_with_provider(ring_provider())
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

/// A transport that trusts only the test CA.
fn test_ca_transport() -> Transport {
    let mut roots = RootCertStore::empty();
    roots.add(CertificateDer::from(TEST_CA_DER.to_vec())).unwrap();
    let config = ClientConfig::builder_with_provider(ring_provider())
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Transport::with_tls_config(Arc::new(config))
}

#[tokio::test]
async fn test_tls_handshake_against_plaintext_server_fails() {
    let Some(listener) = loopback_listener().await else {
        return;
    };
    let port = listener.local_addr().unwrap().port();

    // Answers the ClientHello with plaintext HTTP, then reports whether the client hung up
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await.unwrap();
        socket
            .write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n")
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(3), async {
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => return true,
                    Ok(_) => {}
                }
            }
        })
        .await
        .unwrap_or(false)
    });

    let temp_dir = TempDir::new().unwrap();
    let config = FetchConfig::new("https://localhost/")
        .with_port(port)
        .with_destination(Destination::Directory(temp_dir.path().to_path_buf()));
    let error = FetchEngine::new(1).unwrap().run(&config).await.unwrap_err();

    assert!(
        matches!(error, FetchError::TlsHandshakeFailed { .. }),
        "unexpected error: {error}"
    );
    assert_eq!(error.exit_code(), EXIT_FAILURE);
    assert!(server.await.unwrap(), "client kept the socket open");
    assert!(!temp_dir.path().join("index.html").exists());
}

#[tokio::test]
async fn test_tls_fetch_with_custom_root_writes_body() {
    let Some(listener) = loopback_listener().await else {
        return;
    };
    let port = listener.local_addr().unwrap().port();
    let acceptor = localhost_acceptor();

    // Drops the session without close_notify once the response is written
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut stream = acceptor.accept(socket).await.unwrap();
        let request = read_request_head(&mut stream).await;
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nsecure body")
            .await
            .unwrap();
        stream.flush().await.unwrap();
        request
    });

    let temp_dir = TempDir::new().unwrap();
    let config = FetchConfig::new("https://localhost/notes.txt")
        .with_port(port)
        .with_destination(Destination::Directory(temp_dir.path().to_path_buf()));
    let engine = FetchEngine::with_transport(1, test_ca_transport()).unwrap();
    let report = engine.run(&config).await.unwrap();

    assert_eq!(report.fetched(), 1);
    let request = server.await.unwrap();
    assert_eq!(
        request,
        b"GET /notes.txt HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
    );
    let written = std::fs::read(temp_dir.path().join("notes.txt")).unwrap();
    assert_eq!(written, b"secure body");
}
