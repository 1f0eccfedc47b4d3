//! Scripted in-memory collaborators for testing discovery without a cluster.
//!
//! [`MockGossip`] implements [`GossipClient`] with per-seed reply scripts:
//! member lists, injected failures, and hangs (to exercise the per-seed
//! timeout). Probes are counted so tests can assert how many rounds ran and
//! which seeds were consulted.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use streamlog_sdk::mock::{GossipReply, MockGossip};
//! use streamlog_sdk::{ClusterMember, Endpoint, MemberState};
//!
//! let gossip = Arc::new(MockGossip::new());
//! let seed = Endpoint::new("node1", 2113);
//! gossip.script(
//!     &seed,
//!     GossipReply::Members(vec![ClusterMember::new(
//!         seed.clone(),
//!         MemberState::Leader,
//!         true,
//!     )]),
//! );
//! ```

use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    cluster::{ClusterMember, GossipClient},
    config::Endpoint,
    error::{GossipSnafu, Result},
};

/// One scripted reply to a gossip probe.
#[derive(Debug, Clone)]
pub enum GossipReply {
    /// Answer with this member list.
    Members(Vec<ClusterMember>),
    /// Fail the probe with this message.
    Error(String),
    /// Never answer; the caller's timeout decides.
    Hang,
}

/// Controllable [`GossipClient`] for tests.
///
/// Replies are consumed per seed in the order they were scripted. When a
/// seed's script runs dry the fallback reply is used (by default an injected
/// error), so "this seed always fails" needs no repeated scripting.
#[derive(Debug, Default)]
pub struct MockGossip {
    scripts: Mutex<HashMap<Endpoint, VecDeque<GossipReply>>>,
    fallback: Mutex<Option<GossipReply>>,
    probes: AtomicUsize,
    probes_by_seed: Mutex<HashMap<Endpoint, usize>>,
}

impl MockGossip {
    /// Creates a mock with no scripted replies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a reply to a seed's script.
    pub fn script(&self, seed: &Endpoint, reply: GossipReply) {
        self.scripts.lock().entry(seed.clone()).or_default().push_back(reply);
    }

    /// Sets the reply used when a seed's script is exhausted.
    pub fn set_fallback(&self, reply: GossipReply) {
        *self.fallback.lock() = Some(reply);
    }

    /// Returns the total number of probes issued.
    #[must_use]
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Returns the number of probes issued against one seed.
    #[must_use]
    pub fn probes_of(&self, seed: &Endpoint) -> usize {
        self.probes_by_seed.lock().get(seed).copied().unwrap_or(0)
    }

    fn next_reply(&self, seed: &Endpoint) -> GossipReply {
        if let Some(reply) =
            self.scripts.lock().get_mut(seed).and_then(VecDeque::pop_front)
        {
            return reply;
        }
        self.fallback
            .lock()
            .clone()
            .unwrap_or_else(|| GossipReply::Error("unscripted gossip probe".to_owned()))
    }
}

#[async_trait]
impl GossipClient for MockGossip {
    async fn read_topology(
        &self,
        seed: &Endpoint,
        _timeout: Duration,
    ) -> Result<Vec<ClusterMember>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        *self.probes_by_seed.lock().entry(seed.clone()).or_insert(0) += 1;

        match self.next_reply(seed) {
            GossipReply::Members(members) => Ok(members),
            GossipReply::Error(message) => {
                GossipSnafu { endpoint: seed.to_string(), message }.fail()
            },
            GossipReply::Hang => {
                std::future::pending::<()>().await;
                unreachable!("pending future never resolves")
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::cluster::MemberState;

    fn seed() -> Endpoint {
        Endpoint::new("node1", 2113)
    }

    #[tokio::test]
    async fn scripted_replies_are_consumed_in_order() {
        let gossip = MockGossip::new();
        gossip.script(&seed(), GossipReply::Error("first".into()));
        gossip.script(
            &seed(),
            GossipReply::Members(vec![ClusterMember::new(
                seed(),
                MemberState::Leader,
                true,
            )]),
        );

        assert!(gossip.read_topology(&seed(), Duration::from_secs(1)).await.is_err());
        assert!(gossip.read_topology(&seed(), Duration::from_secs(1)).await.is_ok());
        assert_eq!(gossip.probes(), 2);
        assert_eq!(gossip.probes_of(&seed()), 2);
    }

    #[tokio::test]
    async fn exhausted_script_falls_back() {
        let gossip = MockGossip::new();

        let err = gossip.read_topology(&seed(), Duration::from_secs(1)).await.unwrap_err();
        assert!(err.to_string().contains("unscripted"));

        gossip.set_fallback(GossipReply::Members(vec![]));
        assert!(gossip.read_topology(&seed(), Duration::from_secs(1)).await.is_ok());
    }
}
