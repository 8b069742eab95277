//! Parsing module for connection targets and asset references.
//!
//! This module turns user- or body-supplied strings into something the
//! download engine can act on.
//!
//! # Current Support
//!
//! - URL resolution into host and request path ([`resolve`])
//! - Absolute URL discovery in fetched bodies
//! - Quoted `.js`/`.png`/`.jpg`/`.jpeg`/`.css` filename discovery
//!
//! # Example
//!
//! ```
//! use mirror_core::parser::{discover, resolve};
//!
//! let target = resolve("http://example.com").unwrap();
//! assert_eq!(target.path, "/");
//!
//! let assets = discover(br#"<img src="logo.png">"#);
//! assert_eq!(assets[0].value, "logo.png");
//! ```

mod assets;
mod error;
mod target;

pub use assets::{DiscoveredAsset, PatternClass, discover, extract};
pub use error::ParseError;
pub use target::{ParsedUrl, Scheme, resolve};
