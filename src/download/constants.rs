//! Constants for the download module (framing, persistence, fan-out).

/// Maximum number of bytes requested per receive call.
pub const RECEIVE_CHUNK_SIZE: usize = 2048;

/// Separates the header block from the body.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// The only protocol token a response may carry.
pub const SUPPORTED_PROTOCOL: &str = "HTTP/1.1";

/// File name used when the request path is `/`.
pub const INDEX_FILE_NAME: &str = "index.html";

/// Maximum length of an explicit output file name, in bytes.
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Characters rejected in an explicit output file name.
pub const FORBIDDEN_FILE_NAME_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Directory children are written to when the root fetch is not in directory mode.
pub const FALLBACK_DIRECTORY: &str = "download";
