//! Node selection by preference.
//!
//! Given a gossip member list, the selector picks exactly one endpoint.
//! Members must be alive and in an acceptable state for the configured
//! preference; ties within a state are broken uniformly at random to spread
//! load across equivalent replicas. The randomness source is injectable so
//! tests can force deterministic picks.

use parking_lot::Mutex;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    config::NodePreference,
    error::{NoCandidateFoundSnafu, Result},
};

use super::gossip::{ClusterMember, MemberState};

/// Acceptable member states per preference, in preference order.
///
/// Members in states not listed here (managers, clones, pre-replicas,
/// resigning or shutting-down members, unknown states) are never selectable.
fn acceptable_states(preference: NodePreference) -> &'static [MemberState] {
    match preference {
        NodePreference::Leader => &[MemberState::Leader],
        NodePreference::Follower => &[MemberState::Follower],
        NodePreference::ReadOnlyReplica => &[MemberState::ReadOnlyReplica],
        NodePreference::Any => {
            &[MemberState::Leader, MemberState::Follower, MemberState::ReadOnlyReplica]
        },
    }
}

/// Chooses one member from a gossip result according to preference policy.
///
/// Selection among equally-preferred candidates is intentionally
/// non-deterministic; construct with [`NodeSelector::with_seed`] in tests to
/// pin the outcome.
#[derive(Debug)]
pub struct NodeSelector {
    preference: NodePreference,
    rng: Mutex<StdRng>,
}

impl NodeSelector {
    /// Creates a selector with an OS-seeded randomness source.
    #[must_use]
    pub fn new(preference: NodePreference) -> Self {
        Self { preference, rng: Mutex::new(StdRng::from_os_rng()) }
    }

    /// Creates a selector with a fixed seed for deterministic tests.
    #[must_use]
    pub fn with_seed(preference: NodePreference, seed: u64) -> Self {
        Self { preference, rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    /// Returns the preference this selector enforces.
    #[must_use]
    pub fn preference(&self) -> NodePreference {
        self.preference
    }

    /// Picks one member from `members`.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::NoCandidateFound`](crate::SdkError::NoCandidateFound)
    /// when no alive member is in an acceptable state. The discovery
    /// coordinator treats that as a failed round, not a terminal error.
    pub fn select(&self, members: &[ClusterMember]) -> Result<ClusterMember> {
        let alive: Vec<&ClusterMember> = members.iter().filter(|m| m.is_alive).collect();

        for state in acceptable_states(self.preference) {
            let candidates: Vec<&ClusterMember> =
                alive.iter().copied().filter(|m| m.state == *state).collect();

            if !candidates.is_empty() {
                let index = self.rng.lock().random_range(0..candidates.len());
                return Ok(candidates[index].clone());
            }
        }

        NoCandidateFoundSnafu { preference: self.preference, alive: alive.len() }.fail()
    }
}
