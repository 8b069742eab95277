//! Run configuration handed from the CLI layer to the engine.

use std::path::{Path, PathBuf};

use super::constants::FALLBACK_DIRECTORY;
use super::engine::DEFAULT_CONCURRENCY;
use crate::parser::Scheme;

/// Where a fetched body is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Write the body to standard output.
    Stdout,
    /// Write the body to one explicitly named file.
    File(PathBuf),
    /// Derive a file name from the request path inside this directory.
    Directory(PathBuf),
}

impl Destination {
    /// Destination used by the children of a branch writing to `self`.
    ///
    /// Children always write into a directory: the parent's own directory,
    /// or `fallback` when the parent wrote to a file or standard output.
    #[must_use]
    pub fn for_children(&self, fallback: &Path) -> Self {
        match self {
            Self::Directory(dir) => Self::Directory(dir.clone()),
            Self::Stdout | Self::File(_) => Self::Directory(fallback.to_path_buf()),
        }
    }
}

/// Immutable settings for one run, built once by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// URL of the root resource.
    pub url: String,
    /// Port to connect to; the scheme's default when `None`.
    pub port: Option<u16>,
    /// Use TLS even when the URL has no `https://` prefix.
    pub tls: bool,
    /// Where the root resource is written.
    pub destination: Destination,
    /// How many levels of discovered assets to follow below the root.
    pub max_depth: u32,
    /// Directory for children when the root is not written to a directory.
    pub fallback_dir: PathBuf,
    /// Maximum number of branches talking to the network at once.
    pub concurrency: usize,
}

impl FetchConfig {
    /// Creates a configuration that fetches `url` to standard output without recursion.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            port: None,
            tls: false,
            destination: Destination::Stdout,
            max_depth: 0,
            fallback_dir: PathBuf::from(FALLBACK_DIRECTORY),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Sets the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Forces TLS.
    #[must_use]
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Sets the destination of the root resource.
    #[must_use]
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Sets the recursion depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets the directory used for children of a non-directory root.
    #[must_use]
    pub fn with_fallback_dir(mut self, fallback_dir: impl Into<PathBuf>) -> Self {
        self.fallback_dir = fallback_dir.into();
        self
    }

    /// Sets the concurrency bound.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Scheme of the root fetch: TLS if forced or named by the URL prefix.
    #[must_use]
    pub fn root_scheme(&self) -> Scheme {
        match Scheme::from_prefix(&self.url) {
            Some((Scheme::Https, _)) => Scheme::Https,
            _ if self.tls => Scheme::Https,
            _ => Scheme::Http,
        }
    }

    /// Port of the root fetch.
    #[must_use]
    pub fn root_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.root_scheme().default_port())
    }
}
