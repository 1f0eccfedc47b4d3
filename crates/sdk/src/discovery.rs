//! Discovery: turning seed addresses into one resolved cluster target.
//!
//! An attempt sequence moves Idle → Discovering → Resolved, or Discovering →
//! Exhausted once the configured attempt budget is spent. Each round resolves
//! the seed list, probes seeds in order, and runs node selection; a failed
//! round backs off for the discovery interval before the next one.
//!
//! # Coalescing
//!
//! At most one attempt sequence is in flight per client. Callers arriving
//! while one is running attach to it instead of starting another; every
//! attached waiter observes the same outcome. The sequence runs as a spawned
//! task publishing into a `tokio::sync::watch` channel, so one waiter
//! cancelling its own wait never disturbs the others. The client-level
//! shutdown token is the only thing that aborts the sequence itself.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cluster::{ClusterMember, GossipClient, MemberState, NodeSelector, SeedResolver, probe_seeds},
    config::{Addressing, ClientSettings, Endpoint},
    error::{CancelledSnafu, DiscoveryFailedSnafu, NoUsableSeedSnafu, Result, ShutdownSnafu},
};

/// A resolved cluster target.
///
/// Carries the member list it was chosen from and a generation counter that
/// strictly increases across successful re-discoveries and is never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryResult {
    endpoint: Endpoint,
    members: Vec<ClusterMember>,
    generation: u64,
}

impl DiscoveryResult {
    /// Returns the endpoint calls should be issued against.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns the member list the target was chosen from.
    #[must_use]
    pub fn members(&self) -> &[ClusterMember] {
        &self.members
    }

    /// Returns the discovery generation this result belongs to.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Terminal outcome of an attempt sequence, shared by every waiter.
#[derive(Debug, Clone)]
enum DiscoveryFailure {
    Exhausted { attempts: u32 },
    Shutdown,
}

type Outcome = std::result::Result<DiscoveryResult, DiscoveryFailure>;

/// Coordinates discovery attempt sequences for one client instance.
///
/// Cloning is cheap; clones share the in-flight sequence, the generation
/// counter, and the shutdown token.
#[derive(Debug, Clone)]
pub struct DiscoveryService {
    inner: Arc<DiscoveryInner>,
}

#[derive(Debug)]
struct DiscoveryInner {
    settings: Arc<ClientSettings>,
    gossip: Arc<dyn GossipClient>,
    seeds: SeedResolver,
    selector: NodeSelector,
    generation: AtomicU64,

    /// The in-flight attempt sequence, if any. A receiver still holding
    /// `None` marks a sequence in progress; once the outcome is published the
    /// slot is stale and the next caller starts a fresh sequence.
    flight: Mutex<Option<watch::Receiver<Option<Outcome>>>>,

    shutdown: CancellationToken,
}

impl DiscoveryService {
    /// Creates a coordinator for the given settings and gossip capability.
    ///
    /// `shutdown` is the client-level token: cancelling it aborts any
    /// in-flight attempt sequence and fails its waiters.
    #[must_use]
    pub fn new(
        settings: Arc<ClientSettings>,
        gossip: Arc<dyn GossipClient>,
        shutdown: CancellationToken,
    ) -> Self {
        let selector = NodeSelector::new(settings.node_preference());
        Self::with_selector(settings, gossip, selector, shutdown)
    }

    /// Creates a coordinator with an explicit selector, letting tests pin
    /// the tie-break randomness.
    #[must_use]
    pub fn with_selector(
        settings: Arc<ClientSettings>,
        gossip: Arc<dyn GossipClient>,
        selector: NodeSelector,
        shutdown: CancellationToken,
    ) -> Self {
        let seeds = SeedResolver::new(settings.addressing().clone());
        Self {
            inner: Arc::new(DiscoveryInner {
                settings,
                gossip,
                seeds,
                selector,
                generation: AtomicU64::new(0),
                flight: Mutex::new(None),
                shutdown,
            }),
        }
    }

    /// Resolves a cluster target, starting or joining an attempt sequence.
    ///
    /// `token` cancels only this caller's wait; the shared sequence keeps
    /// running for any other waiter.
    ///
    /// # Errors
    ///
    /// - [`SdkError::DiscoveryFailed`](crate::SdkError::DiscoveryFailed) once
    ///   the attempt budget is exhausted
    /// - [`SdkError::Cancelled`](crate::SdkError::Cancelled) if `token` fires
    /// - [`SdkError::Shutdown`](crate::SdkError::Shutdown) if the client shut
    ///   down mid-sequence
    pub async fn discover(&self, token: &CancellationToken) -> Result<DiscoveryResult> {
        let mut rx = self.subscribe();

        loop {
            let published = rx.borrow_and_update().as_ref().cloned();
            if let Some(outcome) = published {
                return match outcome {
                    Ok(result) => Ok(result),
                    Err(DiscoveryFailure::Exhausted { attempts }) => {
                        DiscoveryFailedSnafu { attempts }.fail()
                    },
                    Err(DiscoveryFailure::Shutdown) => ShutdownSnafu.fail(),
                };
            }

            tokio::select! {
                biased;
                () = token.cancelled() => return CancelledSnafu.fail(),
                changed = rx.changed() => {
                    // The sender only drops after publishing; a closed
                    // channel without a value means the task was torn down.
                    if changed.is_err() {
                        return ShutdownSnafu.fail();
                    }
                }
            }
        }
    }

    /// Joins the in-flight attempt sequence or starts a new one.
    fn subscribe(&self) -> watch::Receiver<Option<Outcome>> {
        let mut flight = self.inner.flight.lock();

        if let Some(rx) = flight.as_ref() {
            if rx.borrow().is_none() {
                debug!("joining in-flight discovery");
                return rx.clone();
            }
        }

        let (tx, rx) = watch::channel(None);
        *flight = Some(rx.clone());

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = inner.run_attempts().await;
            // Every waiter may have cancelled already; that is fine.
            let _ = tx.send(Some(outcome));
        });

        rx
    }
}

impl DiscoveryInner {
    /// Runs rounds until one resolves, the budget is spent, or shutdown.
    async fn run_attempts(&self) -> Outcome {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let round = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return Err(DiscoveryFailure::Shutdown),
                round = self.attempt_round() => round,
            };

            match round {
                Ok(result) => {
                    info!(
                        endpoint = %result.endpoint,
                        generation = result.generation,
                        attempt = attempts,
                        "discovery resolved"
                    );
                    return Ok(result);
                },
                Err(error) => {
                    debug!(attempt = attempts, error = %error, "discovery round failed");

                    if let Some(max) = self.settings.max_discover_attempts() {
                        if attempts >= max {
                            warn!(attempts, "discovery attempts exhausted");
                            return Err(DiscoveryFailure::Exhausted { attempts });
                        }
                    }

                    tokio::select! {
                        biased;
                        () = self.shutdown.cancelled() => {
                            return Err(DiscoveryFailure::Shutdown);
                        },
                        () = tokio::time::sleep(self.settings.discovery_interval()) => {},
                    }
                },
            }
        }
    }

    /// One discovery round: resolve seeds, probe, select.
    async fn attempt_round(&self) -> Result<DiscoveryResult> {
        if let Addressing::Single(endpoint) = self.settings.addressing() {
            // Direct target: gossip is bypassed and the configured node is
            // the sole cluster member, leading.
            let members =
                vec![ClusterMember::new(endpoint.clone(), MemberState::Leader, true)];
            return Ok(self.resolved(endpoint.clone(), members));
        }

        let seeds = self.seeds.seeds().await?;
        let members = probe_seeds(self.gossip.as_ref(), &seeds, self.settings.gossip_timeout())
            .await
            .ok_or_else(|| NoUsableSeedSnafu.build())?;

        let selected = self.selector.select(&members)?;
        Ok(self.resolved(selected.endpoint, members))
    }

    fn resolved(&self, endpoint: Endpoint, members: Vec<ClusterMember>) -> DiscoveryResult {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        DiscoveryResult { endpoint, members, generation }
    }
}
