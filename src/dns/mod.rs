//! DNS facade: MX resolution and realtime-blacklist checks, memoized
//! through a pluggable key/value cache.
//!
//! The facade probes resolver availability once at construction. When the
//! system resolver cannot be built, every MX query short-circuits to the
//! empty list and RBL checks report nothing listed.

mod cache;
mod error;
mod rbl;
mod source;
mod types;

pub use cache::{CacheValue, KvCache, MemoryCache};
pub use error::DnsError;
pub use source::{DnsSource, SystemDnsSource};
pub use types::{MxRecord, RblServer, RblStatus};

use std::net::IpAddr;
use std::time::Duration;

/// How long MX answers stay cached.
const MX_TTL: Duration = Duration::from_secs(3600);
/// How long RBL verdicts stay cached.
const RBL_TTL: Duration = Duration::from_secs(3600);

pub struct DnsFacade {
    source: Option<Box<dyn DnsSource>>,
    cache: Box<dyn KvCache>,
    rbl_servers: Vec<RblServer>,
}

impl DnsFacade {
    /// Facade over the system resolver with an in-process cache.
    pub fn system() -> Self {
        let source: Option<Box<dyn DnsSource>> = match SystemDnsSource::new() {
            Ok(source) => Some(Box::new(source)),
            Err(_) => None,
        };
        Self::from_parts(source, Box::new(MemoryCache::new()))
    }

    /// Facade over injected collaborators. `source: None` models an
    /// environment without DNS.
    pub fn from_parts(source: Option<Box<dyn DnsSource>>, cache: Box<dyn KvCache>) -> Self {
        Self {
            source,
            cache,
            rbl_servers: rbl::default_servers(),
        }
    }

    /// Replaces the RBL zone list consulted by [`DnsFacade::check_rbl`].
    pub fn set_rbl_servers(&mut self, servers: Vec<RblServer>) {
        self.rbl_servers = servers;
    }

    /// MX exchanges for `domain`, ascending by preference, ties broken by
    /// exchange name. An empty list means the domain does not route mail.
    pub fn mx_hosts_for_domain(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        let trimmed = domain.trim().trim_end_matches('.');
        if trimmed.is_empty() {
            return Err(DnsError::EmptyDomain);
        }
        let ascii = idna::domain_to_ascii(trimmed).map_err(DnsError::idna)?;
        let fqdn = crate::canonical::canonical_fqdn(&ascii);
        let key = format!("domain:{fqdn}");

        if let Some(CacheValue::MxHosts(hosts)) = self.cache.get(&key) {
            return Ok(hosts);
        }
        let Some(source) = self.source.as_deref() else {
            return Ok(Vec::new());
        };

        let mut records = source.mx_lookup(&fqdn)?;
        records.sort();
        records.dedup();
        let hosts: Vec<String> = records.into_iter().map(|record| record.exchange).collect();
        self.cache
            .set(&key, CacheValue::MxHosts(hosts.clone()), Some(MX_TTL));
        Ok(hosts)
    }

    /// Extracts the domain at the rightmost `@` and delegates to
    /// [`DnsFacade::mx_hosts_for_domain`].
    pub fn mx_hosts_for_email(&self, email: &str) -> Result<Vec<String>, DnsError> {
        let trimmed = email.trim();
        match trimmed.rsplit_once('@') {
            Some((_, domain)) if !domain.is_empty() => self.mx_hosts_for_domain(domain),
            _ => Err(DnsError::MissingDomain {
                input: trimmed.to_string(),
            }),
        }
    }

    /// Checks whether `ip` is listed on every configured RBL zone.
    ///
    /// IPv6 addresses cannot be checked and are memoized as clear. A
    /// listing reports the last zone that matched, with the original
    /// address appended to its review URL.
    pub fn check_rbl(&self, ip: &str) -> Result<RblStatus, DnsError> {
        let trimmed = ip.trim();
        if trimmed.is_empty() {
            return Err(DnsError::EmptyIp);
        }
        let parsed: IpAddr = trimmed.parse().map_err(|_| DnsError::InvalidIp {
            input: trimmed.to_string(),
        })?;
        let IpAddr::V4(v4) = parsed else {
            let key = format!("rbl:{trimmed}");
            self.cache.set(&key, CacheValue::RblClear, Some(RBL_TTL));
            return Ok(RblStatus::NotListed);
        };

        let reversed = rbl::reverse_octets(v4);
        let key = format!("rbl:{reversed}");
        match self.cache.get(&key) {
            Some(CacheValue::RblClear) => return Ok(RblStatus::NotListed),
            Some(CacheValue::RblListing { server, lookup_url }) => {
                return Ok(RblStatus::Listed { server, lookup_url });
            }
            _ => {}
        }

        let status = match self.source.as_deref() {
            None => RblStatus::NotListed,
            Some(source) => {
                let mut last_match: Option<&RblServer> = None;
                for server in &self.rbl_servers {
                    let name = format!("{reversed}.{}.", server.host);
                    if source.host_exists(&name)? {
                        last_match = Some(server);
                    } else {
                        last_match = None;
                        break;
                    }
                }
                match last_match {
                    Some(server) => RblStatus::Listed {
                        server: server.host.clone(),
                        lookup_url: rbl::listing_url(server, v4),
                    },
                    None => RblStatus::NotListed,
                }
            }
        };

        let cached = match &status {
            RblStatus::NotListed => CacheValue::RblClear,
            RblStatus::Listed { server, lookup_url } => CacheValue::RblListing {
                server: server.clone(),
                lookup_url: lookup_url.clone(),
            },
        };
        self.cache.set(&key, cached, Some(RBL_TTL));
        Ok(status)
    }
}
