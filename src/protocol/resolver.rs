// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! TTL-aware DNS cache that spreads requests across resolved addresses.
//!
//! The cloud service answers on several equivalent addresses. Instead of
//! pinning every request to the first one, [`ResolverCache`] keeps the full
//! record set for each hostname and hands out a random address that is still
//! within its TTL. Once every cached address has expired the hostname is
//! looked up again.
//!
//! The cache is installed as the HTTP client's resolver through its
//! [`reqwest::dns::Resolve`] implementation.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{LookupIpStrategy, ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::Record;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tokio::time::Instant;

use crate::error::ProtocolError;

/// A resolved address and how long it may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAddress {
    /// The address.
    pub address: IpAddr,
    /// Time to live, counted from the lookup.
    pub ttl: Duration,
}

/// Future returned by [`AddressLookup::lookup`].
pub type LookupFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<ResolvedAddress>, ProtocolError>> + Send + 'a>>;

/// Source of address records with TTL metadata.
pub trait AddressLookup: Send + Sync {
    /// Looks up the IPv4 addresses of `host`.
    fn lookup<'a>(&'a self, host: &'a str) -> LookupFuture<'a>;
}

/// [`AddressLookup`] backed by the system's DNS configuration.
///
/// Falls back to the resolver library's default upstream servers when the
/// system configuration cannot be read.
pub struct SystemLookup {
    resolver: TokioAsyncResolver,
}

impl SystemLookup {
    /// Creates a lookup using the system resolver configuration.
    #[must_use]
    pub fn new() -> Self {
        let (config, mut options) = hickory_resolver::system_conf::read_system_conf()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Cannot read system DNS configuration, using defaults");
                (ResolverConfig::default(), ResolverOpts::default())
            });
        options.ip_strategy = LookupIpStrategy::Ipv4Only;

        Self {
            resolver: TokioAsyncResolver::tokio(config, options),
        }
    }
}

impl Default for SystemLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SystemLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemLookup").finish_non_exhaustive()
    }
}

impl AddressLookup for SystemLookup {
    fn lookup<'a>(&'a self, host: &'a str) -> LookupFuture<'a> {
        Box::pin(async move {
            let response =
                self.resolver
                    .lookup_ip(host)
                    .await
                    .map_err(|e| ProtocolError::Dns {
                        host: host.to_string(),
                        message: e.to_string(),
                    })?;

            Ok(addresses_of(response.as_lookup().records()))
        })
    }
}

/// Extracts the IPv4 addresses of an answer, each with its own record TTL.
fn addresses_of(records: &[Record]) -> Vec<ResolvedAddress> {
    records
        .iter()
        .filter_map(|record| {
            let address = record.data()?.ip_addr()?;
            address.is_ipv4().then(|| ResolvedAddress {
                address,
                ttl: Duration::from_secs(u64::from(record.ttl())),
            })
        })
        .collect()
}

#[derive(Debug)]
struct CacheEntry {
    addresses: Vec<ResolvedAddress>,
    fetched_at: Instant,
}

/// Per-hostname cache of resolved addresses.
///
/// Cloning is cheap; clones share the same cache.
///
/// # Examples
///
/// ```no_run
/// use melcloud_mqtt::protocol::ResolverCache;
///
/// # async fn example() -> melcloud_mqtt::Result<()> {
/// let cache = ResolverCache::system();
/// let address = cache.resolve("app.melcloud.com").await?;
/// println!("using {address}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ResolverCache {
    lookup: Arc<dyn AddressLookup>,
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl ResolverCache {
    /// Creates a cache over the given address source.
    pub fn new(lookup: impl AddressLookup + 'static) -> Self {
        Self {
            lookup: Arc::new(lookup),
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Creates a cache over the system resolver.
    #[must_use]
    pub fn system() -> Self {
        Self::new(SystemLookup::new())
    }

    /// Resolves `host` to one of its live addresses, chosen at random.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Dns`] if the lookup fails or yields no
    /// address.
    pub async fn resolve(&self, host: &str) -> Result<IpAddr, ProtocolError> {
        if let Some(address) = self.cached(host) {
            return Ok(address);
        }

        let addresses = self.lookup.lookup(host).await?;
        let Some(picked) = addresses.choose(&mut rand::thread_rng()).map(|a| a.address) else {
            return Err(ProtocolError::Dns {
                host: host.to_string(),
                message: "no IPv4 address".to_string(),
            });
        };

        tracing::debug!(host, count = addresses.len(), address = %picked, "Resolved host");

        self.entries.lock().insert(
            host.to_string(),
            CacheEntry {
                addresses,
                fetched_at: Instant::now(),
            },
        );

        Ok(picked)
    }

    /// Drops expired addresses of `host` and picks one of the survivors.
    fn cached(&self, host: &str) -> Option<IpAddr> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(host)?;

        let age = entry.fetched_at.elapsed();
        entry.addresses.retain(|a| age < a.ttl);

        entry
            .addresses
            .choose(&mut rand::thread_rng())
            .map(|a| a.address)
    }
}

impl fmt::Debug for ResolverCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverCache")
            .field("hosts", &self.entries.lock().len())
            .finish_non_exhaustive()
    }
}

impl Resolve for ResolverCache {
    fn resolve(&self, name: Name) -> Resolving {
        let cache = self.clone();
        Box::pin(async move {
            let address = cache.resolve(name.as_str()).await?;
            // reqwest substitutes the URL's port
            let addrs: Addrs = Box::new(std::iter::once(SocketAddr::new(address, 0)));
            Ok(addrs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Lookup returning a fixed record set and counting calls.
    struct Scripted {
        addresses: Vec<ResolvedAddress>,
        calls: Arc<AtomicUsize>,
    }

    impl AddressLookup for Scripted {
        fn lookup<'a>(&'a self, _host: &'a str) -> LookupFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let addresses = self.addresses.clone();
            Box::pin(async move { Ok(addresses) })
        }
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn record(last: u8, ttl_secs: u64) -> ResolvedAddress {
        ResolvedAddress {
            address: ip(last),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    fn scripted(addresses: Vec<ResolvedAddress>) -> (ResolverCache, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ResolverCache::new(Scripted {
            addresses,
            calls: Arc::clone(&calls),
        });
        (cache, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn address_is_cached_within_ttl() {
        let (cache, calls) = scripted(vec![record(1, 10)]);

        assert_eq!(cache.resolve("cloud").await.unwrap(), ip(1));
        tokio::time::advance(Duration::from_millis(9_999)).await;
        assert_eq!(cache.resolve("cloud").await.unwrap(), ip(1));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_address_triggers_fresh_lookup() {
        let (cache, calls) = scripted(vec![record(1, 10)]);

        cache.resolve("cloud").await.unwrap();
        tokio::time::advance(Duration::from_millis(10_001)).await;
        cache.resolve("cloud").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_addresses_leave_the_pool() {
        let (cache, calls) = scripted(vec![record(1, 5), record(2, 60)]);

        cache.resolve("cloud").await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        for _ in 0..20 {
            assert_eq!(cache.resolve("cloud").await.unwrap(), ip(2));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rotates_across_live_addresses() {
        let (cache, _) = scripted(vec![record(1, 300), record(2, 300), record(3, 300)]);

        let mut seen = HashSet::new();
        for _ in 0..200 {
            seen.insert(cache.resolve("cloud").await.unwrap());
        }

        assert_eq!(seen.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn hostnames_are_cached_independently() {
        let (cache, calls) = scripted(vec![record(1, 10)]);

        cache.resolve("a.example").await.unwrap();
        cache.resolve("b.example").await.unwrap();
        cache.resolve("a.example").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_lookup_is_an_error() {
        let (cache, _) = scripted(Vec::new());

        let err = cache.resolve("cloud").await.unwrap_err();
        assert!(matches!(err, ProtocolError::Dns { host, .. } if host == "cloud"));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_is_never_served_from_cache() {
        let (cache, calls) = scripted(vec![record(1, 0)]);

        cache.resolve("cloud").await.unwrap();
        cache.resolve("cloud").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn each_address_keeps_its_record_ttl() {
        use hickory_resolver::proto::rr::rdata::{A, AAAA, CNAME};
        use hickory_resolver::proto::rr::{Name, RData};
        use std::net::Ipv6Addr;

        let name = Name::from_ascii("app.example.").unwrap();
        let records = [
            Record::from_rdata(name.clone(), 60, RData::CNAME(CNAME(name.clone()))),
            Record::from_rdata(name.clone(), 30, RData::A(A(Ipv4Addr::new(10, 0, 0, 1)))),
            Record::from_rdata(name.clone(), 300, RData::A(A(Ipv4Addr::new(10, 0, 0, 2)))),
            Record::from_rdata(name, 300, RData::AAAA(AAAA(Ipv6Addr::LOCALHOST))),
        ];

        assert_eq!(addresses_of(&records), [record(1, 30), record(2, 300)]);
    }
}
