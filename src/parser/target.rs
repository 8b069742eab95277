//! Resolution of a URL string into a connection target.
//!
//! The split is plain offset arithmetic on the input: the host ends at the
//! first of `; / ? : @ = &` and everything from that delimiter on is the
//! request path. Ports and query strings are not told apart from the path.

use std::fmt;

use tracing::trace;

use super::error::ParseError;

const HTTP_PREFIX: &str = "http://";
const HTTPS_PREFIX: &str = "https://";

/// Characters that terminate the host segment.
const HOST_DELIMITERS: [char; 7] = [';', '/', '?', ':', '@', '=', '&'];

/// Scheme named by a URL prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plaintext HTTP.
    Http,
    /// HTTP inside a TLS session.
    Https,
}

impl Scheme {
    /// Port used when none is configured.
    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }

    /// Whether the connection must be wrapped in TLS.
    #[must_use]
    pub fn is_secure(self) -> bool {
        matches!(self, Self::Https)
    }

    /// Scheme name without the `://` separator.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// Detects a case-insensitive `http://` or `https://` prefix.
    ///
    /// Returns the scheme and the length of the prefix.
    #[must_use]
    pub fn from_prefix(url: &str) -> Option<(Self, usize)> {
        let has_prefix = |prefix: &str| {
            url.get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        };

        if has_prefix(HTTPS_PREFIX) {
            Some((Self::Https, HTTPS_PREFIX.len()))
        } else if has_prefix(HTTP_PREFIX) {
            Some((Self::Http, HTTP_PREFIX.len()))
        } else {
            None
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A URL split into the parts needed to issue a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    /// Host to connect to and to send in the `Host` header. Never empty.
    pub host: String,
    /// Request target. Always starts with `/`.
    pub path: String,
    /// Scheme named by the URL prefix; `None` leaves the choice to the caller.
    pub scheme: Option<Scheme>,
}

/// Splits a URL into host and path.
///
/// # Errors
///
/// Returns [`ParseError::InvalidUrl`] when nothing follows the scheme prefix
/// or when the host segment is empty (e.g. `http://:8080/`).
///
/// # Examples
///
/// ```
/// use mirror_core::parser::resolve;
///
/// let target = resolve("http://example.com/a/b?x=1").unwrap();
/// assert_eq!(target.host, "example.com");
/// assert_eq!(target.path, "/a/b?x=1");
/// ```
pub fn resolve(url: &str) -> Result<ParsedUrl, ParseError> {
    let (scheme, offset) = match Scheme::from_prefix(url) {
        Some((scheme, len)) => (Some(scheme), len),
        None => (None, 0),
    };

    let rest = &url[offset..];
    if rest.is_empty() {
        return Err(ParseError::empty(url));
    }

    let (host, path) = match rest.find(HOST_DELIMITERS) {
        None => (rest, "/".to_string()),
        Some(index) if rest[index..].starts_with('/') => {
            (&rest[..index], rest[index..].to_string())
        }
        Some(index) => (&rest[..index], format!("/{}", &rest[index..])),
    };

    if host.is_empty() {
        return Err(ParseError::no_host(url));
    }

    trace!(host, path = %path, ?scheme, "resolved URL");

    Ok(ParsedUrl {
        host: host.to_string(),
        path,
        scheme,
    })
}
