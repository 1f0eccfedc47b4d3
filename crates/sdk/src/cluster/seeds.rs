//! Seed resolution: turning the configured addressing into a probing list.
//!
//! Static seed lists pass through unchanged. Under the discovering scheme a
//! single DNS name stands for the cluster; it is re-resolved at the start of
//! every discovery round so membership changes are picked up, and the
//! configured port is applied to every resolved address.

use hickory_resolver::{Resolver, config::ResolverConfig, name_server::TokioConnectionProvider};
use parking_lot::RwLock;
use snafu::ResultExt;

use crate::{
    config::{Addressing, Endpoint},
    error::{DnsSnafu, Result},
};

/// Resolves the configured addressing into the ordered seed list for one
/// discovery round.
#[derive(Debug)]
pub(crate) struct SeedResolver {
    addressing: Addressing,

    /// DNS resolver, lazily created on the first DNS round.
    dns: RwLock<Option<Resolver<TokioConnectionProvider>>>,
}

impl SeedResolver {
    pub(crate) fn new(addressing: Addressing) -> Self {
        Self { addressing, dns: RwLock::new(None) }
    }

    /// Produces the seeds to probe this round, in probing order.
    ///
    /// # Errors
    ///
    /// DNS failures surface as [`SdkError::Dns`](crate::SdkError::Dns); the
    /// coordinator counts them as a failed round and retries with backoff.
    pub(crate) async fn seeds(&self) -> Result<Vec<Endpoint>> {
        match &self.addressing {
            Addressing::Single(endpoint) => Ok(vec![endpoint.clone()]),
            Addressing::Seeds(seeds) => Ok(seeds.clone()),
            Addressing::Dns(endpoint) => self.resolve_dns(endpoint).await,
        }
    }

    async fn resolve_dns(&self, endpoint: &Endpoint) -> Result<Vec<Endpoint>> {
        let resolver = self.dns_resolver();

        let lookup = resolver
            .lookup_ip(endpoint.host.as_str())
            .await
            .context(DnsSnafu { host: endpoint.host.clone() })?;

        Ok(lookup.iter().map(|ip| Endpoint::new(ip.to_string(), endpoint.port)).collect())
    }

    /// Gets or creates the shared DNS resolver.
    fn dns_resolver(&self) -> Resolver<TokioConnectionProvider> {
        {
            let guard = self.dns.read();
            if let Some(resolver) = guard.as_ref() {
                return resolver.clone();
            }
        }

        let resolver = Resolver::builder_with_config(
            ResolverConfig::default(),
            TokioConnectionProvider::default(),
        )
        .build();

        let mut guard = self.dns.write();
        if guard.is_none() {
            *guard = Some(resolver.clone());
        }

        resolver
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_address_is_its_own_seed() {
        let resolver = SeedResolver::new(Addressing::Single(Endpoint::new("localhost", 2113)));
        let seeds = resolver.seeds().await.unwrap();
        assert_eq!(seeds, vec![Endpoint::new("localhost", 2113)]);
    }

    #[tokio::test]
    async fn static_seed_order_is_preserved() {
        let configured = vec![
            Endpoint::new("node3", 2113),
            Endpoint::new("node1", 2113),
            Endpoint::new("node2", 2113),
        ];
        let resolver = SeedResolver::new(Addressing::Seeds(configured.clone()));
        assert_eq!(resolver.seeds().await.unwrap(), configured);
    }
}
