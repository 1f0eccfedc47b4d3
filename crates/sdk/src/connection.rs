//! Connection management: the single current cluster target.
//!
//! [`ClusterConnection`] is what the call layer holds. It caches the most
//! recent [`DiscoveryResult`], re-enters discovery when there is none, and
//! accepts failure reports (`invalidate`) from calls that hit a not-leader or
//! unavailable signal. The cached result is the only mutable shared state and
//! is replaced atomically, never mutated in place; the discovery coordinator's
//! coalescing guarantees a single writer.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    cluster::{GossipClient, NodeSelector},
    config::ClientSettings,
    discovery::{DiscoveryResult, DiscoveryService},
    error::Result,
};

/// Owns the currently selected cluster target for one client instance.
///
/// Cloning is cheap; clones share the cached target, the discovery
/// coordinator, and the shutdown token.
#[derive(Debug, Clone)]
pub struct ClusterConnection {
    inner: Arc<ConnectionInner>,
}

#[derive(Debug)]
struct ConnectionInner {
    settings: Arc<ClientSettings>,
    discovery: DiscoveryService,
    current: RwLock<Option<DiscoveryResult>>,
    shutdown: CancellationToken,
}

impl ClusterConnection {
    /// Creates a connection manager over the given gossip capability.
    ///
    /// No discovery happens here; the first [`current_target`](Self::current_target)
    /// call triggers it.
    #[must_use]
    pub fn new(settings: ClientSettings, gossip: Arc<dyn GossipClient>) -> Self {
        let settings = Arc::new(settings);
        let shutdown = CancellationToken::new();
        let discovery = DiscoveryService::new(Arc::clone(&settings), gossip, shutdown.clone());
        Self::assemble(settings, discovery, shutdown)
    }

    /// Creates a connection manager with an explicit node selector, letting
    /// tests pin the tie-break randomness.
    #[must_use]
    pub fn with_selector(
        settings: ClientSettings,
        gossip: Arc<dyn GossipClient>,
        selector: NodeSelector,
    ) -> Self {
        let settings = Arc::new(settings);
        let shutdown = CancellationToken::new();
        let discovery = DiscoveryService::with_selector(
            Arc::clone(&settings),
            gossip,
            selector,
            shutdown.clone(),
        );
        Self::assemble(settings, discovery, shutdown)
    }

    fn assemble(
        settings: Arc<ClientSettings>,
        discovery: DiscoveryService,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                settings,
                discovery,
                current: RwLock::new(None),
                shutdown,
            }),
        }
    }

    /// Returns the client settings.
    #[must_use]
    pub fn settings(&self) -> &ClientSettings {
        &self.inner.settings
    }

    /// Returns the current cluster target, discovering one if none is held.
    ///
    /// `token` cancels only this caller's wait; a discovery shared with other
    /// callers keeps running.
    ///
    /// # Errors
    ///
    /// Surfaces terminal discovery errors
    /// ([`SdkError::DiscoveryFailed`](crate::SdkError::DiscoveryFailed)),
    /// cancellation, and shutdown.
    pub async fn current_target(&self, token: &CancellationToken) -> Result<DiscoveryResult> {
        // Fast path: a target is already cached.
        {
            let guard = self.inner.current.read();
            if let Some(current) = guard.as_ref() {
                return Ok(current.clone());
            }
        }

        let discovered = self.inner.discovery.discover(token).await?;

        let mut guard = self.inner.current.write();
        match guard.as_ref() {
            // Another caller installed a newer result while we waited; a
            // generation never regresses.
            Some(existing) if existing.generation() >= discovered.generation() => {
                Ok(existing.clone())
            },
            _ => {
                *guard = Some(discovered.clone());
                Ok(discovered)
            },
        }
    }

    /// Discards the cached target if it is still the one reported stale.
    ///
    /// Called by the call layer on not-leader or unavailable signals. The
    /// generation guard makes a late report about an old target a no-op once
    /// a newer discovery has been installed. In-flight calls against the
    /// stale target are not aborted; they fail naturally.
    pub fn invalidate(&self, stale: &DiscoveryResult) {
        let mut guard = self.inner.current.write();
        if let Some(current) = guard.as_ref() {
            if current.generation() == stale.generation() {
                debug!(
                    endpoint = %stale.endpoint(),
                    generation = stale.generation(),
                    "invalidating cached cluster target"
                );
                *guard = None;
            }
        }
    }

    /// Shuts the client down, aborting any in-flight discovery and failing
    /// its waiters with [`SdkError::Shutdown`](crate::SdkError::Shutdown).
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }
}
