use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::Resolver;

use super::error::DnsError;
use super::types::MxRecord;

/// Raw DNS lookups the facade depends on. Implemented by the system
/// resolver; tests substitute stubs.
pub trait DnsSource: Send + Sync {
    /// MX records for an FQDN. No records at all must be `Ok(vec![])`.
    fn mx_lookup(&self, fqdn: &str) -> Result<Vec<MxRecord>, DnsError>;

    /// Whether `name` resolves to at least one address record.
    fn host_exists(&self, name: &str) -> Result<bool, DnsError>;
}

/// [`DnsSource`] backed by the system resolver configuration.
pub struct SystemDnsSource {
    resolver: Resolver,
}

impl SystemDnsSource {
    pub fn new() -> Result<Self, DnsError> {
        let resolver = Resolver::from_system_conf().map_err(DnsError::resolver_init)?;
        Ok(Self { resolver })
    }
}

impl DnsSource for SystemDnsSource {
    fn mx_lookup(&self, fqdn: &str) -> Result<Vec<MxRecord>, DnsError> {
        match self.resolver.mx_lookup(fqdn) {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|mx| {
                    let exchange = normalize_exchange(mx.exchange().to_utf8());
                    MxRecord::new(mx.preference(), exchange)
                })
                .collect()),
            Err(err) => match err.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(Vec::new()),
                _ => Err(DnsError::lookup(err)),
            },
        }
    }

    fn host_exists(&self, name: &str) -> Result<bool, DnsError> {
        match self.resolver.lookup_ip(name) {
            Ok(lookup) => Ok(lookup.iter().next().is_some()),
            Err(err) => match err.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(false),
                _ => Err(DnsError::lookup(err)),
            },
        }
    }
}

/// Exchange names come back as FQDNs; strip the root dot and lowercase.
pub(crate) fn normalize_exchange(exchange: String) -> String {
    exchange.trim_end_matches('.').to_ascii_lowercase()
}
