//! Error types for URL resolution and asset discovery.

use thiserror::Error;

/// Errors that can occur while resolving a URL or compiling a discovery pattern.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// URL cannot be split into a host and a path
    #[error("invalid URL '{url}': {reason}\n  Suggestion: {suggestion}")]
    InvalidUrl {
        /// The URL that failed resolution
        url: String,
        /// Why the URL is invalid
        reason: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// A discovery pattern failed to compile
    #[error("failed to compile {class} pattern: {source}")]
    PatternCompile {
        /// Name of the pattern class
        class: &'static str,
        /// The underlying regex error
        #[source]
        source: regex::Error,
    },
}

impl ParseError {
    /// Creates an `InvalidUrl` error for an input that is empty once the scheme is stripped.
    #[must_use]
    pub fn empty(url: &str) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: "nothing follows the scheme".to_string(),
            suggestion: "Provide a host, e.g. http://example.com/".to_string(),
        }
    }

    /// Creates an `InvalidUrl` error for a URL without a host.
    #[must_use]
    pub fn no_host(url: &str) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: "URL has no host".to_string(),
            suggestion: "Ensure the URL starts with a domain (e.g., example.com)".to_string(),
        }
    }

    /// Creates a `PatternCompile` error.
    #[must_use]
    pub fn pattern_compile(class: &'static str, source: regex::Error) -> Self {
        Self::PatternCompile { class, source }
    }
}
