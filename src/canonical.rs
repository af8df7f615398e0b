//! Canonical forms for addresses and domains.
//!
//! Free functions shared by the address containers, the blacklist and the
//! DNS facade, so that none of them depend on each other for normalization.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonicalError {
    #[error("domain is empty")]
    EmptyDomain,
    #[error("domain IDNA conversion failed")]
    IdnaConversion {
        #[source]
        source: idna::Errors,
    },
}

/// Canonical form of a full address: trimmed and lowercased.
///
/// Used as the identity key for collections and blacklists.
pub fn canonical_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Canonical form of a domain: IDN converted to ASCII (Punycode), lowercase.
pub fn canonical_domain(domain: &str) -> Result<String, CanonicalError> {
    let trimmed = domain.trim();
    if trimmed.is_empty() {
        return Err(CanonicalError::EmptyDomain);
    }
    let ascii = idna::domain_to_ascii(trimmed)
        .map_err(|source| CanonicalError::IdnaConversion { source })?;
    Ok(ascii.to_ascii_lowercase())
}

/// Fully qualified form: surrounding whitespace and trailing dots removed,
/// exactly one trailing dot appended, ASCII-lowercased. Idempotent.
pub fn canonical_fqdn(domain: &str) -> String {
    let trimmed = domain.trim().trim_end_matches('.');
    let mut fqdn = trimmed.to_ascii_lowercase();
    fqdn.push('.');
    fqdn
}
