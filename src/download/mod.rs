//! Fetching, framing and persisting resources, and the recursive engine.
//!
//! This module talks HTTP/1.1 directly over TCP or TLS: it sends one fixed
//! `GET` request per resource, frames the response by its header terminator
//! and connection close, and writes 200 bodies to standard output, a named
//! file, or a directory tree.
//!
//! # Features
//!
//! - Plain TCP and TLS (rustls with bundled web PKI roots)
//! - Strict status line checks (`HTTP/1.1`, numeric status)
//! - Directory-mode output paths derived from the request path
//! - Recursive asset fetching bounded by depth and a concurrency semaphore
//!
//! # Example
//!
//! ```no_run
//! use mirror_core::download::{Destination, FetchConfig, FetchEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FetchConfig::new("https://example.com/")
//!     .with_destination(Destination::Directory("./site".into()));
//! let report = FetchEngine::new(4)?.run(&config).await?;
//! println!("fetched {} resources", report.fetched());
//! # Ok(())
//! # }
//! ```

mod config;
pub mod constants;
mod engine;
mod error;
mod persist;
mod response;
mod transport;

pub use config::{Destination, FetchConfig};
pub use engine::{DEFAULT_CONCURRENCY, EngineError, FetchEngine, FetchReport};
pub use error::{
    EXIT_FAILURE, EXIT_HTTP_STATUS, EXIT_PROTOCOL_ERROR, EXIT_SUCCESS, FetchError,
};
pub use persist::{Written, derive_output_path, persist, validate_file_name};
pub use response::{FramedResponse, ResponseStatus, find_header_terminator, read_response};
pub use transport::{Connection, Transport, build_request, receive_chunk, send};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, FetchError>` explicitly in function signatures.
