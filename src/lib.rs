//! Mirror Core Library
//!
//! This library provides the fetch-and-discover engine behind the `mirror`
//! tool: it fetches one resource over HTTP or HTTPS, persists it, scans the
//! body for referenced assets and optionally fetches those too, up to a
//! bounded recursion depth.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`parser`] - URL resolution and asset discovery in fetched bodies
//! - [`download`] - Transport, response framing, persistence and the recursive engine

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod parser;

// Re-export commonly used types
pub use download::{
    DEFAULT_CONCURRENCY, Destination, EngineError, FetchConfig, FetchEngine, FetchError,
    FetchReport,
};
pub use parser::{DiscoveredAsset, ParseError, ParsedUrl, PatternClass, Scheme, discover, resolve};
