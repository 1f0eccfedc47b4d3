//! Cluster topology: gossip queries, seed resolution, and node selection.
//!
//! ```text
//! Addressing (settings)
//!       │
//!       ▼
//! SeedResolver (static list / DNS expansion)
//!       │
//!       ▼
//! GossipClient (one probe per seed, first usable view wins)
//!       │
//!       ▼
//! NodeSelector (preference policy + random tie-break)
//! ```

mod gossip;
mod seeds;
mod selector;

pub use gossip::{ClusterMember, GossipClient, MemberState};
pub use selector::NodeSelector;

pub(crate) use gossip::probe_seeds;
pub(crate) use seeds::SeedResolver;
