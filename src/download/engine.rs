//! Recursive fetch engine.
//!
//! The engine fetches one root resource, writes it, scans the body for
//! assets and, while the recursion budget allows, fetches every asset as a
//! child branch. Children run as Tokio tasks; a parent awaits all of its
//! children before it completes.
//!
//! # Concurrency Model
//!
//! - Each child branch runs in its own Tokio task
//! - A semaphore permit is held from connect until the body is written
//! - The permit is released before a branch dispatches its children, so a
//!   waiting parent never blocks its own descendants
//! - Counters travel back by value in a [`FetchReport`]; nothing else is shared
//!
//! # Example
//!
//! ```no_run
//! use mirror_core::{Destination, FetchConfig, FetchEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FetchConfig::new("http://example.com/")
//!     .with_destination(Destination::Directory("site".into()))
//!     .with_max_depth(1);
//! let engine = FetchEngine::new(config.concurrency)?;
//! let report = engine.run(&config).await?;
//! println!("fetched {}, failed {}", report.fetched(), report.failed());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use super::config::{Destination, FetchConfig};
use super::error::FetchError;
use super::persist::persist;
use super::response::{FramedResponse, read_response};
use super::transport::{Connection, Transport, build_request, send};
use crate::parser::{DiscoveredAsset, ParsedUrl, PatternClass, Scheme, discover, resolve};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Error type for fetch engine construction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Outcome counters for a branch and everything below it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchReport {
    fetched: usize,
    failed: usize,
    discovered: usize,
    dispatched: usize,
}

impl FetchReport {
    /// Resources fetched with status 200 and written.
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// Child branches that ended with an error.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Assets found in fetched bodies, duplicates included.
    #[must_use]
    pub fn discovered(&self) -> usize {
        self.discovered
    }

    /// Child branches started.
    #[must_use]
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Adds another report's counters to this one.
    pub fn merge(&mut self, other: Self) {
        self.fetched += other.fetched;
        self.failed += other.failed;
        self.discovered += other.discovered;
        self.dispatched += other.dispatched;
    }
}

/// Fetch engine bounding how many branches use the network at once.
#[derive(Debug)]
pub struct FetchEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    transport: Transport,
}

impl FetchEngine {
    /// Creates an engine with the default TLS trust roots.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    ///
    /// # Example
    ///
    /// ```
    /// use mirror_core::FetchEngine;
    ///
    /// let engine = FetchEngine::new(4).unwrap();
    /// assert_eq!(engine.concurrency(), 4);
    /// assert!(FetchEngine::new(0).is_err());
    /// ```
    pub fn new(concurrency: usize) -> Result<Self, EngineError> {
        Self::with_transport(concurrency, Transport::new())
    }

    /// Creates an engine that opens connections through `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    #[instrument(level = "debug", skip(transport))]
    pub fn with_transport(concurrency: usize, transport: Transport) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(concurrency, "creating fetch engine");

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            transport,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetches the root resource of `config` and, recursively, its assets.
    ///
    /// # Errors
    ///
    /// Any failure of the root fetch is returned and ends the run. Failures
    /// of child branches are logged and counted in [`FetchReport::failed`].
    #[instrument(skip(self, config), fields(url = %config.url, max_depth = config.max_depth))]
    pub async fn run(&self, config: &FetchConfig) -> Result<FetchReport, FetchError> {
        let shared = Shared {
            semaphore: Arc::clone(&self.semaphore),
            transport: self.transport.clone(),
            fallback_dir: Arc::new(config.fallback_dir.clone()),
        };

        info!("starting fetch");
        let report = fetch_branch(shared, Branch::root(config)).await?;

        info!(
            fetched = report.fetched,
            failed = report.failed,
            discovered = report.discovered,
            dispatched = report.dispatched,
            "fetch complete"
        );
        Ok(report)
    }
}

/// State cloned into every branch task.
#[derive(Clone)]
struct Shared {
    semaphore: Arc<Semaphore>,
    transport: Transport,
    fallback_dir: Arc<PathBuf>,
}

/// One root-or-child fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Branch {
    url: String,
    scheme: Scheme,
    port: u16,
    destination: Destination,
    budget: u32,
    depth: u32,
}

impl Branch {
    fn root(config: &FetchConfig) -> Self {
        Self {
            url: config.url.clone(),
            scheme: config.root_scheme(),
            port: config.root_port(),
            destination: config.destination.clone(),
            budget: config.max_depth,
            depth: 0,
        }
    }

    /// Child branch fetching `asset`, found in a body served by `host`.
    fn child(&self, host: &str, asset: &DiscoveredAsset, fallback_dir: &Path) -> Self {
        let (url, scheme, port) = match asset.kind {
            PatternClass::AbsoluteUrl => {
                let scheme = Scheme::from_prefix(&asset.value).map_or(self.scheme, |(s, _)| s);
                // The parent's port only carries over to the same scheme and host
                let same_origin = scheme == self.scheme
                    && resolve(&asset.value).is_ok_and(|t| t.host.eq_ignore_ascii_case(host));
                let port = if same_origin {
                    self.port
                } else {
                    scheme.default_port()
                };
                (asset.value.clone(), scheme, port)
            }
            PatternClass::QuotedFilename => {
                let name = asset.value.trim_start_matches('/');
                (
                    format!("{}://{host}/{name}", self.scheme),
                    self.scheme,
                    self.port,
                )
            }
        };

        Self {
            url,
            scheme,
            port,
            destination: self.destination.for_children(fallback_dir),
            budget: self.budget.saturating_sub(1),
            depth: self.depth + 1,
        }
    }
}

/// Runs one branch to completion, children included.
fn fetch_branch(
    shared: Shared,
    branch: Branch,
) -> BoxFuture<'static, Result<FetchReport, FetchError>> {
    async move {
        let (target, response) = fetch_resource(&shared, &branch).await?;

        let assets = discover(response.body());
        let mut report = FetchReport {
            fetched: 1,
            discovered: assets.len(),
            ..FetchReport::default()
        };
        debug!(assets = assets.len(), budget = branch.budget, "assets discovered");

        if branch.budget == 0 || assets.is_empty() {
            return Ok(report);
        }
        // The body is no longer needed while children run.
        drop(response);

        report.merge(dispatch_children(&shared, &branch, &target, &assets).await);
        Ok(report)
    }
    .boxed()
}

/// Resolves, connects, frames and persists one resource.
///
/// The concurrency permit is held for the whole exchange and released on return.
async fn fetch_resource(
    shared: &Shared,
    branch: &Branch,
) -> Result<(ParsedUrl, FramedResponse), FetchError> {
    let target = resolve(&branch.url)?;
    debug!(host = %target.host, path = %target.path, "resolved");

    // The semaphore is never closed, so acquiring only fails in theory.
    let _permit = shared.semaphore.acquire().await.ok();

    let mut connection = shared
        .transport
        .connect(&target.host, branch.port, branch.scheme)
        .await?;
    debug!(port = branch.port, secure = connection.is_secure(), "connected");

    let exchanged = exchange(&mut connection, &target).await;
    connection.close().await;
    let response = exchanged?;

    let status = response.status();
    debug!(
        code = status.code,
        reason = %status.reason,
        headers = response.headers().len(),
        content_type = response.header("content-type").unwrap_or("-"),
        "response framed"
    );
    if !status.is_success() {
        return Err(FetchError::http_status(
            &branch.url,
            status.code,
            &status.reason,
        ));
    }

    let written = persist(response.body(), &branch.destination, &target.path).await?;
    info!(url = %branch.url, bytes = written.bytes(), "resource fetched");

    Ok((target, response))
}

async fn exchange(
    connection: &mut Connection,
    target: &ParsedUrl,
) -> Result<FramedResponse, FetchError> {
    let request = build_request(target);
    send(connection, request.as_bytes())
        .await
        .map_err(|e| FetchError::transport(&target.host, e))?;
    read_response(connection, &target.host).await
}

/// Spawns one child per asset and waits for all of them.
async fn dispatch_children(
    shared: &Shared,
    branch: &Branch,
    target: &ParsedUrl,
    assets: &[DiscoveredAsset],
) -> FetchReport {
    let mut report = FetchReport::default();
    let mut handles = Vec::with_capacity(assets.len());

    for asset in assets {
        let child = branch.child(&target.host, asset, &shared.fallback_dir);
        let span = info_span!("branch", url = %child.url, depth = child.depth);
        debug!(url = %child.url, kind = asset.kind.name(), "dispatching child");

        let url = child.url.clone();
        let task = fetch_branch(shared.clone(), child).instrument(span);
        handles.push((url, tokio::spawn(task)));
        report.dispatched += 1;
    }

    for (url, handle) in handles {
        match handle.await {
            Ok(Ok(child_report)) => report.merge(child_report),
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "child fetch failed");
                report.failed += 1;
            }
            Err(e) => {
                warn!(url = %url, error = %e, "child fetch task panicked");
                report.failed += 1;
            }
        }
    }

    report
}
