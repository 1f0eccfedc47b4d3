//! Gossip topology queries and the per-round seed probing procedure.
//!
//! A gossip exchange asks one cluster member for its view of the whole
//! cluster. The wire call itself lives behind the [`GossipClient`] trait so
//! the transport layer (and tests) can supply it; this module owns the
//! probing policy: seeds are tried in configured order, each probe is bounded
//! by the gossip timeout, failures are skipped rather than retried, and the
//! first seed returning a non-empty member list wins the round.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use tracing::debug;

use crate::{config::Endpoint, error::Result};

/// Role a cluster member reported for itself in a gossip response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberState {
    /// The elected leader, accepting writes.
    Leader,
    /// A follower replicating from the leader.
    Follower,
    /// A read-only replica outside the quorum.
    ReadOnlyReplica,
    /// A replica still catching up before joining.
    PreReplica,
    /// A clone node copying data without voting.
    Clone,
    /// A manager process, never serving client traffic.
    Manager,
    /// A leader stepping down.
    ResigningLeader,
    /// A member in the process of shutting down.
    ShuttingDown,
    /// Any state the client does not recognize.
    Unknown,
}

impl fmt::Display for MemberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Leader => "leader",
            Self::Follower => "follower",
            Self::ReadOnlyReplica => "read-only replica",
            Self::PreReplica => "pre-replica",
            Self::Clone => "clone",
            Self::Manager => "manager",
            Self::ResigningLeader => "resigning leader",
            Self::ShuttingDown => "shutting down",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// One cluster member as reported by a gossip response.
///
/// Produced fresh on every response and never mutated, only replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterMember {
    /// Where the member can be reached.
    pub endpoint: Endpoint,
    /// The role the member reported.
    pub state: MemberState,
    /// Whether the responding member considered this member alive.
    pub is_alive: bool,
}

impl ClusterMember {
    /// Creates a member record.
    #[must_use]
    pub fn new(endpoint: Endpoint, state: MemberState, is_alive: bool) -> Self {
        Self { endpoint, state, is_alive }
    }
}

/// The topology-query capability consumed by discovery.
///
/// One call probes one candidate endpoint and returns that member's view of
/// the cluster. Implementations should bound their own I/O by `timeout`; the
/// discovery round additionally enforces the same bound externally, so a
/// hung implementation cannot stall a round.
#[async_trait]
pub trait GossipClient: Send + Sync + fmt::Debug {
    /// Queries `seed` for the cluster topology.
    ///
    /// # Errors
    ///
    /// Any error is treated as "this seed was not usable this round" and the
    /// next seed is tried; it is never retried within the round.
    async fn read_topology(
        &self,
        seed: &Endpoint,
        timeout: Duration,
    ) -> Result<Vec<ClusterMember>>;
}

/// Probes seeds in order, returning the first non-empty member list.
///
/// A seed that errors, times out, or returns an empty list is skipped.
/// Returns `None` when no seed produced a usable view.
pub(crate) async fn probe_seeds(
    gossip: &dyn GossipClient,
    seeds: &[Endpoint],
    timeout: Duration,
) -> Option<Vec<ClusterMember>> {
    for seed in seeds {
        match tokio::time::timeout(timeout, gossip.read_topology(seed, timeout)).await {
            Ok(Ok(members)) if !members.is_empty() => {
                debug!(seed = %seed, members = members.len(), "gossip seed answered");
                return Some(members);
            },
            Ok(Ok(_)) => {
                debug!(seed = %seed, "gossip seed returned an empty member list, skipping");
            },
            Ok(Err(error)) => {
                debug!(seed = %seed, error = %error, "gossip seed failed, skipping");
            },
            Err(_) => {
                debug!(seed = %seed, timeout_ms = timeout.as_millis() as u64,
                    "gossip seed timed out, skipping");
            },
        }
    }

    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mock::{GossipReply, MockGossip};

    fn seed(n: u16) -> Endpoint {
        Endpoint::new(format!("node{n}"), 2113)
    }

    fn member(n: u16, state: MemberState) -> ClusterMember {
        ClusterMember::new(seed(n), state, true)
    }

    #[tokio::test]
    async fn first_answering_seed_short_circuits() {
        let gossip = MockGossip::new();
        gossip.script(&seed(1), GossipReply::Members(vec![member(1, MemberState::Leader)]));
        gossip.script(&seed(2), GossipReply::Members(vec![member(2, MemberState::Leader)]));

        let seeds = [seed(1), seed(2)];
        let members = probe_seeds(&gossip, &seeds, Duration::from_millis(100))
            .await
            .expect("first seed should answer");

        assert_eq!(members, vec![member(1, MemberState::Leader)]);
        assert_eq!(gossip.probes_of(&seed(2)), 0);
    }

    #[tokio::test]
    async fn failing_seed_is_skipped_not_retried() {
        let gossip = MockGossip::new();
        gossip.script(&seed(1), GossipReply::Error("connection refused".into()));
        gossip.script(&seed(2), GossipReply::Members(vec![member(2, MemberState::Leader)]));

        let seeds = [seed(1), seed(2)];
        let members = probe_seeds(&gossip, &seeds, Duration::from_millis(100))
            .await
            .expect("second seed should answer");

        assert_eq!(members[0].endpoint, seed(2));
        assert_eq!(gossip.probes_of(&seed(1)), 1);
    }

    #[tokio::test]
    async fn hanging_seed_is_bounded_by_timeout() {
        let gossip = MockGossip::new();
        gossip.script(&seed(1), GossipReply::Hang);
        gossip.script(&seed(2), GossipReply::Members(vec![member(2, MemberState::Leader)]));

        let seeds = [seed(1), seed(2)];
        let started = std::time::Instant::now();
        let members = probe_seeds(&gossip, &seeds, Duration::from_millis(50)).await;

        assert!(members.is_some());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn empty_member_list_is_not_usable() {
        let gossip = MockGossip::new();
        gossip.script(&seed(1), GossipReply::Members(vec![]));

        let seeds = [seed(1)];
        assert!(probe_seeds(&gossip, &seeds, Duration::from_millis(100)).await.is_none());
    }

    #[tokio::test]
    async fn all_seeds_failing_yields_none() {
        let gossip = MockGossip::new();
        gossip.script(&seed(1), GossipReply::Error("refused".into()));
        gossip.script(&seed(2), GossipReply::Error("refused".into()));

        let seeds = [seed(1), seed(2)];
        assert!(probe_seeds(&gossip, &seeds, Duration::from_millis(100)).await.is_none());
        assert_eq!(gossip.probes(), 2);
    }
}
