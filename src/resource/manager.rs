//! Resource Manager
//!
//! Owns the periodically refreshed view of one cluster's ingestion
//! resources. Readers get the current [`ResourceSnapshot`] lock-free through
//! an `ArcSwapOption`; refreshes build a whole new snapshot and swap it in.
//!
//! Refreshes are single-flight: a caller that queued behind a refresh which
//! completed in the meantime gets that refresh's outcome instead of issuing
//! another management call. A cancelled attempt is the exception; whoever
//! queued behind it tries again under their own token.

use super::identity::Identity;
use super::model::{
    decode_auth_context, decode_resources, Resource, IDENTITY_TOKEN_COMMAND,
    INGESTION_RESOURCES_COMMAND, MGMT_DATABASE,
};
use super::snapshot::ResourceSnapshot;
use crate::config::ManagerConfig;
use crate::error::{ResourceError, Result};
use crate::kusto::{ManagementClient, RowSet};
use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Cached ingestion identity token
struct AuthContext {
    token: String,
    fetched: Instant,
}

struct ManagerInner {
    identity: Identity,
    client: Arc<dyn ManagementClient>,
    config: ManagerConfig,
    snapshot: ArcSwapOption<ResourceSnapshot>,
    last_error: ArcSwapOption<ResourceError>,
    /// Serializes refreshes
    refresh_lock: Mutex<()>,
    /// Completed refresh attempts, bumped after the outcome is published
    attempts: AtomicU64,
    /// Set while a stale-while-revalidate refresh is spawned
    revalidating: AtomicBool,
    auth_context: ArcSwapOption<AuthContext>,
    auth_lock: Mutex<()>,
    started: AtomicBool,
    shutdown: CancellationToken,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Shared handle to one endpoint's resource cache
#[derive(Clone)]
pub struct Manager(Arc<ManagerInner>);

impl Manager {
    /// Create a manager without starting its background loop
    pub fn new(
        identity: Identity,
        client: Arc<dyn ManagementClient>,
        config: ManagerConfig,
    ) -> Self {
        Self(Arc::new(ManagerInner {
            identity,
            client,
            config,
            snapshot: ArcSwapOption::empty(),
            last_error: ArcSwapOption::empty(),
            refresh_lock: Mutex::new(()),
            attempts: AtomicU64::new(0),
            revalidating: AtomicBool::new(false),
            auth_context: ArcSwapOption::empty(),
            auth_lock: Mutex::new(()),
            started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }))
    }

    /// Whether two handles refer to the same manager
    pub fn ptr_eq(a: &Manager, b: &Manager) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn identity(&self) -> &Identity {
        &self.0.identity
    }

    /// Endpoint as the client reported it
    pub fn endpoint(&self) -> &str {
        self.0.client.endpoint()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.0.config
    }

    /// Current snapshot, if any refresh has succeeded
    pub fn snapshot(&self) -> Option<Arc<ResourceSnapshot>> {
        self.0.snapshot.load_full()
    }

    /// Error of the most recent refresh, cleared by the next success
    pub fn last_error(&self) -> Option<ResourceError> {
        self.0.last_error.load_full().map(|err| (*err).clone())
    }

    /// Number of completed refresh attempts, successful or not
    pub fn refresh_count(&self) -> u64 {
        self.0.attempts.load(Ordering::Acquire)
    }

    pub fn is_started(&self) -> bool {
        self.0.started.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        self.0.shutdown.is_cancelled()
    }

    /// Resources of `kind` from the current snapshot
    ///
    /// Blocks on the first refresh when nothing has been fetched yet. A stale
    /// snapshot is returned as-is while a refresh runs in the background.
    pub async fn get(&self, kind: &str) -> Result<Vec<Resource>> {
        self.get_with_cancel(kind, &CancellationToken::new()).await
    }

    pub async fn get_with_cancel(
        &self,
        kind: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Resource>> {
        if let Some(snapshot) = self.0.snapshot.load_full() {
            if snapshot.is_stale(self.0.config.stale_after) {
                self.revalidate();
            }
            return Ok(snapshot.get(kind).to_vec());
        }

        let outcome = self.refresh_with_cancel(cancel).await;

        // A concurrent refresh may have filled the cache even if ours failed
        match (self.0.snapshot.load_full(), outcome) {
            (Some(snapshot), _) => Ok(snapshot.get(kind).to_vec()),
            (None, Err(err)) => Err(ResourceError::NoResourcesAvailable {
                endpoint: self.endpoint().to_string(),
                cause: Some(Box::new(err)),
            }),
            (None, Ok(())) => Err(ResourceError::NoResourcesAvailable {
                endpoint: self.endpoint().to_string(),
                cause: None,
            }),
        }
    }

    /// Fetch and swap in a new snapshot
    pub async fn refresh(&self) -> Result<()> {
        self.refresh_with_cancel(&CancellationToken::new()).await
    }

    /// Fetch and swap in a new snapshot, giving up when `cancel` fires
    ///
    /// On failure the current snapshot is kept and the error recorded.
    pub async fn refresh_with_cancel(&self, cancel: &CancellationToken) -> Result<()> {
        let seen = self.0.attempts.load(Ordering::Acquire);
        self.refresh_since(seen, cancel).await
    }

    /// Refresh unless an attempt finished after `seen` was read
    async fn refresh_since(&self, seen: u64, cancel: &CancellationToken) -> Result<()> {
        let _guard = tokio::select! {
            guard = self.0.refresh_lock.lock() => guard,
            _ = cancel.cancelled() => {
                let err = ResourceError::cancelled(self.endpoint());
                self.0.last_error.store(Some(Arc::new(err.clone())));
                return Err(err);
            }
        };

        // Adopt a finished attempt's outcome unless it was cancelled
        if self.0.attempts.load(Ordering::Acquire) != seen {
            match self.0.last_error.load_full() {
                None => {
                    tracing::debug!("Coalesced refresh of {}", self.0.identity);
                    return Ok(());
                }
                Some(err) if !err.is_cancelled() => {
                    tracing::debug!("Coalesced refresh of {}", self.0.identity);
                    return Err((*err).clone());
                }
                Some(_) => {}
            }
        }

        let outcome = match self.fetch_snapshot(cancel).await {
            Ok(snapshot) => {
                tracing::debug!(
                    "Refreshed {}: {} resources across {} kinds",
                    self.0.identity,
                    snapshot.len(),
                    snapshot.resources().len()
                );
                self.0.snapshot.store(Some(Arc::new(snapshot)));
                self.0.last_error.store(None);
                Ok(())
            }
            Err(err) => {
                tracing::warn!("Refresh of {} failed: {}", self.0.identity, err);
                self.0.last_error.store(Some(Arc::new(err.clone())));
                Err(err)
            }
        };
        self.0.attempts.fetch_add(1, Ordering::AcqRel);

        outcome
    }

    /// Identity token used to authorize queued ingestion messages
    pub async fn auth_context(&self) -> Result<String> {
        self.auth_context_with_cancel(&CancellationToken::new()).await
    }

    /// Cached identity token, fetched when missing or stale
    ///
    /// A failed fetch falls back to a stale cached token when one exists.
    pub async fn auth_context_with_cancel(&self, cancel: &CancellationToken) -> Result<String> {
        if let Some(token) = self.fresh_auth_context() {
            return Ok(token);
        }

        let _guard = tokio::select! {
            guard = self.0.auth_lock.lock() => guard,
            _ = cancel.cancelled() => return Err(ResourceError::cancelled(self.endpoint())),
        };

        if let Some(token) = self.fresh_auth_context() {
            return Ok(token);
        }

        let fetched = self
            .mgmt(IDENTITY_TOKEN_COMMAND, cancel)
            .await
            .and_then(|rows| decode_auth_context(&rows));

        match fetched {
            Ok(token) => {
                self.0.auth_context.store(Some(Arc::new(AuthContext {
                    token: token.clone(),
                    fetched: Instant::now(),
                })));
                Ok(token)
            }
            Err(err) => match self.0.auth_context.load_full() {
                Some(stale) => {
                    tracing::warn!(
                        "Identity token refresh for {} failed, using cached token: {}",
                        self.0.identity,
                        err
                    );
                    Ok(stale.token.clone())
                }
                None => Err(err),
            },
        }
    }

    /// Start the background refresh loop
    ///
    /// Returns `false` if the loop was already running or no tokio runtime
    /// is available, in which case the manager fills lazily on `get`.
    pub fn start(&self) -> bool {
        if self.0.started.swap(true, Ordering::AcqRel) {
            return false;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                "No tokio runtime, {} will refresh on demand only",
                self.0.identity
            );
            self.0.started.store(false, Ordering::Release);
            return false;
        };

        tracing::info!(
            "Starting resource refresh for {} every {:?}",
            self.0.identity,
            self.0.config.refresh_interval
        );

        handle.spawn(run_refresh_loop(
            Arc::downgrade(&self.0),
            self.0.shutdown.clone(),
            self.0.config.refresh_interval,
        ));
        true
    }

    /// Stop the background loop and abort its in-flight refresh
    pub fn stop(&self) {
        self.0.shutdown.cancel();
    }

    fn fresh_auth_context(&self) -> Option<String> {
        self.0
            .auth_context
            .load_full()
            .filter(|ctx| ctx.fetched.elapsed() < self.0.config.stale_after)
            .map(|ctx| ctx.token.clone())
    }

    /// Kick off a refresh without waiting for it
    ///
    /// Stopped managers keep serving what they have.
    fn revalidate(&self) {
        if self.is_stopped() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        if self
            .0
            .revalidating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let manager = self.clone();
        let cancel = self.0.shutdown.child_token();
        handle.spawn(async move {
            // Outcome is recorded on the manager
            let _ = manager.refresh_with_cancel(&cancel).await;
            manager.0.revalidating.store(false, Ordering::Release);
        });
    }

    async fn fetch_snapshot(&self, cancel: &CancellationToken) -> Result<ResourceSnapshot> {
        let rows = self.mgmt(INGESTION_RESOURCES_COMMAND, cancel).await?;
        let resources = decode_resources(&rows)?;
        Ok(ResourceSnapshot::new(resources))
    }

    /// Run a management command bounded by the request timeout and `cancel`
    async fn mgmt(&self, command: &str, cancel: &CancellationToken) -> Result<RowSet> {
        let call = self.0.client.mgmt(MGMT_DATABASE, command);

        tokio::select! {
            _ = cancel.cancelled() => Err(ResourceError::cancelled(self.endpoint())),
            result = tokio::time::timeout(self.0.config.request_timeout, call) => {
                result.unwrap_or_else(|_| Err(ResourceError::cancelled(self.endpoint())))
            }
        }
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("identity", &self.0.identity)
            .field("populated", &self.0.snapshot.load().is_some())
            .field("refresh_count", &self.refresh_count())
            .field("started", &self.is_started())
            .finish()
    }
}

/// Refresh on a fixed schedule until stopped or the manager is dropped
async fn run_refresh_loop(
    manager: Weak<ManagerInner>,
    shutdown: CancellationToken,
    interval: Duration,
) {
    loop {
        let Some(inner) = manager.upgrade() else {
            break;
        };
        let current = Manager(inner);
        let seen = current.refresh_count();

        // Someone else refreshed within the last interval
        let fresh = current
            .snapshot()
            .is_some_and(|snapshot| snapshot.age() < interval);

        if fresh {
            tracing::trace!("Skipping refresh of {}, snapshot is fresh", current.identity());
        } else if let Err(err) = current.refresh_since(seen, &shutdown).await {
            if shutdown.is_cancelled() {
                break;
            }
            tracing::debug!(
                "Background refresh of {} failed, retrying in {:?}: {}",
                current.identity(),
                interval,
                err
            );
        }
        drop(current);

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::debug!("Resource refresh loop exited");
}
