//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use mirror_core::download::constants::FALLBACK_DIRECTORY;
use mirror_core::{DEFAULT_CONCURRENCY, Destination, FetchConfig};

/// Fetch a web resource and, optionally, the assets it references.
///
/// Mirror sends a plain HTTP/1.1 GET (over TLS when requested), writes the
/// body to standard output, a file, or a directory, and follows absolute
/// URLs and quoted script/style/image file names found in the body.
#[derive(Parser, Debug)]
#[command(name = "mirror")]
#[command(author, version, about)]
pub struct Args {
    /// URL to fetch (e.g. http://example.com/index.html)
    pub url: String,

    /// Port to connect to (default 80, or 443 with TLS)
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Write the root resource to this file
    #[arg(short, long, value_name = "FILE", conflicts_with = "dir")]
    pub output: Option<PathBuf>,

    /// Write resources into this directory, named after their request paths
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Levels of discovered assets to fetch below the root
    #[arg(short = 'r', long = "recursion", value_name = "DEPTH", default_value_t = 0)]
    pub recursion: u32,

    /// Use TLS even without an https:// prefix
    #[arg(short = 's', long)]
    pub tls: bool,

    /// Directory for discovered assets when the root is not written to a directory
    #[arg(long, value_name = "DIR", default_value = FALLBACK_DIRECTORY)]
    pub fallback_dir: PathBuf,

    /// Maximum concurrent network exchanges (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Where the root resource goes: `-o`, then `-d`, else standard output.
    pub fn destination(&self) -> Destination {
        match (&self.output, &self.dir) {
            (Some(file), _) => Destination::File(file.clone()),
            (None, Some(dir)) => Destination::Directory(dir.clone()),
            (None, None) => Destination::Stdout,
        }
    }

    /// Builds the immutable run configuration.
    pub fn to_config(&self) -> FetchConfig {
        let mut config = FetchConfig::new(self.url.clone())
            .with_tls(self.tls)
            .with_destination(self.destination())
            .with_max_depth(self.recursion)
            .with_fallback_dir(self.fallback_dir.clone())
            .with_concurrency(usize::from(self.concurrency));
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        config
    }
}
