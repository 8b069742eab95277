//! Error types for the download module.
//!
//! One enum covers every way a fetch branch can end early, from URL
//! resolution to writing the body. Each variant carries the host, URL or
//! path it concerns so a failed child can be reported on its own.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::parser::ParseError;

/// Exit status for a successful run.
pub const EXIT_SUCCESS: u8 = 0;

/// Exit status for invalid input, network failures and write failures.
pub const EXIT_FAILURE: u8 = 1;

/// Exit status when the server response could not be framed or parsed.
pub const EXIT_PROTOCOL_ERROR: u8 = 2;

/// Exit status when the root resource answered with a status other than 200.
pub const EXIT_HTTP_STATUS: u8 = 3;

/// Errors that can occur while fetching, framing or persisting a resource.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL could not be resolved, or a discovery pattern failed to compile.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Address resolution failed or no candidate address accepted the connection.
    #[error("failed to connect to {host}:{port}: {reason}")]
    ConnectionFailed {
        /// The host being connected to.
        host: String,
        /// The port being connected to.
        port: u16,
        /// Short description of the failing step.
        reason: String,
        /// The last underlying IO error, if any.
        #[source]
        source: Option<io::Error>,
    },

    /// The TCP connection succeeded but the TLS handshake did not.
    #[error("TLS handshake with {host} failed: {source}")]
    TlsHandshakeFailed {
        /// The host the handshake was attempted with.
        host: String,
        /// The underlying handshake error.
        #[source]
        source: io::Error,
    },

    /// Sending the request or receiving the response failed after connecting.
    #[error("transport error talking to {host}: {source}")]
    Transport {
        /// The connected host.
        host: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The peer closed the connection before the header terminator arrived.
    #[error("response from {host} ended after {received} bytes without a complete header")]
    IncompleteHeader {
        /// The responding host.
        host: String,
        /// Number of bytes received before the connection closed.
        received: usize,
    },

    /// The status line has fewer than three tokens.
    #[error("malformed status line from {host}: {line:?}")]
    MalformedStatusLine {
        /// The responding host.
        host: String,
        /// The offending first line.
        line: String,
    },

    /// The protocol token is not `HTTP/1.1`.
    #[error("unsupported protocol {protocol:?} from {host}, expected HTTP/1.1")]
    UnsupportedProtocol {
        /// The responding host.
        host: String,
        /// The protocol token received.
        protocol: String,
    },

    /// The status token is not a decimal status code.
    #[error("non-numeric status {status:?} from {host}")]
    NonNumericStatus {
        /// The responding host.
        host: String,
        /// The status token received.
        status: String,
    },

    /// The server answered with a status other than 200.
    #[error("HTTP {code} {reason} fetching {url}")]
    HttpStatus {
        /// The URL that was fetched.
        url: String,
        /// The numeric status code.
        code: u32,
        /// The reason phrase.
        reason: String,
    },

    /// An explicit output file name failed validation, or a derived path is unsafe.
    #[error("invalid output file name {name:?}: {reason}")]
    InvalidFileName {
        /// The rejected name or derived path.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The destination directory could not be created.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreateFailed {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Writing the body failed.
    #[error("failed to write {target}: {source}")]
    Persist {
        /// The output path, or `standard output`.
        target: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    /// Creates a connection failure.
    pub fn connection_failed(
        host: impl Into<String>,
        port: u16,
        reason: impl Into<String>,
        source: Option<io::Error>,
    ) -> Self {
        Self::ConnectionFailed {
            host: host.into(),
            port,
            reason: reason.into(),
            source,
        }
    }

    /// Creates a TLS handshake failure.
    pub fn tls_handshake(host: impl Into<String>, source: io::Error) -> Self {
        Self::TlsHandshakeFailed {
            host: host.into(),
            source,
        }
    }

    /// Creates a send/receive failure.
    pub fn transport(host: impl Into<String>, source: io::Error) -> Self {
        Self::Transport {
            host: host.into(),
            source,
        }
    }

    /// Creates a non-200 status outcome.
    pub fn http_status(url: impl Into<String>, code: u32, reason: impl Into<String>) -> Self {
        Self::HttpStatus {
            url: url.into(),
            code,
            reason: reason.into(),
        }
    }

    /// Creates an invalid file name error.
    pub fn invalid_file_name(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidFileName {
            name: name.into(),
            reason,
        }
    }

    /// Creates a directory creation failure.
    pub fn directory_create(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::DirectoryCreateFailed {
            path: path.into(),
            source,
        }
    }

    /// Creates a write failure.
    pub fn persist(target: impl Into<String>, source: io::Error) -> Self {
        Self::Persist {
            target: target.into(),
            source,
        }
    }

    /// Returns the status code for [`FetchError::HttpStatus`].
    #[must_use]
    pub fn http_code(&self) -> Option<u32> {
        match self {
            Self::HttpStatus { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether the response bytes violated the supported response grammar.
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::IncompleteHeader { .. }
                | Self::MalformedStatusLine { .. }
                | Self::UnsupportedProtocol { .. }
                | Self::NonNumericStatus { .. }
        )
    }

    /// Whether the URL itself could not be resolved.
    #[must_use]
    pub fn is_invalid_url(&self) -> bool {
        matches!(self, Self::Parse(ParseError::InvalidUrl { .. }))
    }

    /// Process exit status for a run whose root fetch ended with this error.
    ///
    /// - protocol errors → [`EXIT_PROTOCOL_ERROR`]
    /// - non-200 status → [`EXIT_HTTP_STATUS`]
    /// - everything else → [`EXIT_FAILURE`]
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        if self.is_protocol_error() {
            EXIT_PROTOCOL_ERROR
        } else if self.http_code().is_some() {
            EXIT_HTTP_STATUS
        } else {
            EXIT_FAILURE
        }
    }
}
