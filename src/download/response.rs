//! Framing of a raw response stream into status, headers and body.
//!
//! The client sends `Connection: close` and performs no `Content-Length` or
//! chunked decoding: the header block ends at the first `\r\n\r\n` and the
//! body is everything that arrives after it until the peer closes.

use tokio::io::AsyncRead;
use tracing::{debug, instrument, trace};

use super::constants::{HEADER_TERMINATOR, RECEIVE_CHUNK_SIZE, SUPPORTED_PROTOCOL};
use super::error::FetchError;
use super::transport::receive_chunk;

/// The three tokens of a status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseStatus {
    /// Protocol token; always `HTTP/1.1` once validated.
    pub protocol: String,
    /// Numeric status code. Digit strings too long for `u32` saturate.
    pub code: u32,
    /// Reason phrase, which may contain spaces.
    pub reason: String,
}

impl ResponseStatus {
    /// Parses and validates a status line such as `HTTP/1.1 200 OK`.
    ///
    /// # Errors
    ///
    /// - [`FetchError::MalformedStatusLine`] if fewer than three tokens are present
    /// - [`FetchError::UnsupportedProtocol`] if the protocol is not `HTTP/1.1`
    /// - [`FetchError::NonNumericStatus`] if the status token is not all digits
    pub fn parse(line: &str, host: &str) -> Result<Self, FetchError> {
        let malformed = || FetchError::MalformedStatusLine {
            host: host.to_string(),
            line: line.to_string(),
        };

        let (protocol, rest) = line
            .trim_start_matches(' ')
            .split_once(' ')
            .ok_or_else(malformed)?;
        let (code, reason) = rest
            .trim_start_matches(' ')
            .split_once(' ')
            .ok_or_else(malformed)?;
        let reason = reason.trim();
        if code.is_empty() || reason.is_empty() {
            return Err(malformed());
        }

        if protocol != SUPPORTED_PROTOCOL {
            return Err(FetchError::UnsupportedProtocol {
                host: host.to_string(),
                protocol: protocol.to_string(),
            });
        }

        if !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FetchError::NonNumericStatus {
                host: host.to_string(),
                status: code.to_string(),
            });
        }
        // Only overflow can fail here
        let code = code.parse::<u32>().unwrap_or(u32::MAX);

        Ok(Self {
            protocol: protocol.to_string(),
            code,
            reason: reason.to_string(),
        })
    }

    /// Only `200` counts as success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == 200
    }
}

/// A response split at the header terminator.
///
/// The body is a view into the receive buffer rather than a second copy.
#[derive(Debug, Clone)]
pub struct FramedResponse {
    status: ResponseStatus,
    headers: Vec<(String, String)>,
    buffer: Vec<u8>,
    header_len: usize,
}

impl FramedResponse {
    /// The validated status line.
    #[must_use]
    pub fn status(&self) -> &ResponseStatus {
        &self.status
    }

    /// Header fields after the status line, in arrival order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive lookup of the first header with `name`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Bytes after the terminator.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.buffer[self.header_len + HEADER_TERMINATOR.len()..]
    }
}

/// Finds the start of `\r\n\r\n` in `buffer`, scanning from `from`.
#[must_use]
pub fn find_header_terminator(buffer: &[u8], from: usize) -> Option<usize> {
    buffer
        .get(from..)?
        .windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
        .map(|position| position + from)
}

/// Reads a complete response from `reader`.
///
/// Chunks are appended to one buffer until the header terminator appears;
/// each scan restarts three bytes before the previous end so a terminator
/// split across chunks is still found. The status line is validated as soon
/// as the header block is complete. A `200` body is then read until the peer
/// closes; other statuses return at once with whatever body bytes arrived.
///
/// # Errors
///
/// - [`FetchError::Transport`] if a receive fails
/// - [`FetchError::IncompleteHeader`] if the peer closes before `\r\n\r\n`
/// - status line errors from [`ResponseStatus::parse`]
#[instrument(skip(reader))]
pub async fn read_response<R>(reader: &mut R, host: &str) -> Result<FramedResponse, FetchError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::with_capacity(RECEIVE_CHUNK_SIZE);
    let mut scan_from = 0;

    let header_len = loop {
        let read = receive_chunk(reader, &mut buffer, RECEIVE_CHUNK_SIZE)
            .await
            .map_err(|e| FetchError::transport(host, e))?;

        if let Some(position) = find_header_terminator(&buffer, scan_from) {
            break position;
        }
        if read == 0 {
            return Err(FetchError::IncompleteHeader {
                host: host.to_string(),
                received: buffer.len(),
            });
        }
        scan_from = buffer.len().saturating_sub(HEADER_TERMINATOR.len() - 1);
    };

    let header_text = String::from_utf8_lossy(&buffer[..header_len]);
    let mut lines = header_text.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let status = ResponseStatus::parse(status_line, host)?;
    let headers = parse_header_fields(lines);

    debug!(
        code = status.code,
        reason = %status.reason,
        header_len,
        "framed response header"
    );

    if status.is_success() {
        loop {
            let read = receive_chunk(reader, &mut buffer, RECEIVE_CHUNK_SIZE)
                .await
                .map_err(|e| FetchError::transport(host, e))?;
            if read == 0 {
                break;
            }
        }
    }

    let response = FramedResponse {
        status,
        headers,
        buffer,
        header_len,
    };
    trace!(body_len = response.body().len(), "response complete");
    Ok(response)
}

fn parse_header_fields<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<(String, String)> {
    lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}
