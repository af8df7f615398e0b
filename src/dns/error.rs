use thiserror::Error;

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("domain is empty")]
    EmptyDomain,
    #[error("address '{input}' has no domain part")]
    MissingDomain { input: String },
    #[error("IP address is empty")]
    EmptyIp,
    #[error("'{input}' is not an IP address")]
    InvalidIp { input: String },
    #[error("domain IDNA conversion failed")]
    IdnaConversion {
        #[source]
        source: idna::Errors,
    },
    #[error("resolver initialization failed: {source}")]
    ResolverInit {
        #[source]
        source: std::io::Error,
    },
    #[error("DNS lookup failed: {source}")]
    Lookup {
        #[source]
        source: trust_dns_resolver::error::ResolveError,
    },
}

impl DnsError {
    pub(crate) fn idna(source: idna::Errors) -> Self {
        Self::IdnaConversion { source }
    }

    pub(crate) fn resolver_init(source: std::io::Error) -> Self {
        Self::ResolverInit { source }
    }

    pub(crate) fn lookup(source: trust_dns_resolver::error::ResolveError) -> Self {
        Self::Lookup { source }
    }
}
