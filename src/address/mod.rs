//! Address value types and containers.

mod blacklist;
mod collection;

pub use blacklist::Blacklist;
pub use collection::AddressCollection;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::canonical::{self, CanonicalError};
use crate::validator::check_email;

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("address contains CR or LF")]
    ControlCharacters,
    #[error("address '{input}' failed syntax validation")]
    InvalidSyntax { input: String },
    #[error("address domain could not be canonicalized")]
    Canonical(#[from] CanonicalError),
}

/// An immutable, validated email address.
///
/// Constructed from a trimmed input string; the split happens at the
/// rightmost `@`, and the canonical (ASCII, lowercase) domain is computed
/// once at construction.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress {
    address: String,
    local: String,
    domain: String,
    canonical_domain: String,
}

impl EmailAddress {
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }
        if trimmed.contains('\r') || trimmed.contains('\n') {
            return Err(AddressError::ControlCharacters);
        }
        if !check_email(trimmed) {
            return Err(AddressError::InvalidSyntax {
                input: trimmed.to_string(),
            });
        }
        // check_email guarantees the delimiter is present
        let (local, domain) = trimmed
            .rsplit_once('@')
            .ok_or_else(|| AddressError::InvalidSyntax {
                input: trimmed.to_string(),
            })?;
        let canonical_domain = if domain.starts_with('[') {
            domain.to_ascii_lowercase()
        } else {
            canonical::canonical_domain(domain)?
        };
        Ok(Self {
            address: trimmed.to_string(),
            local: local.to_string(),
            domain: domain.to_string(),
            canonical_domain,
        })
    }

    pub fn local_part(&self) -> &str {
        &self.local
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The ASCII (Punycode) lowercase form of the domain.
    pub fn canonical_domain(&self) -> &str {
        &self.canonical_domain
    }

    pub fn as_str(&self) -> &str {
        &self.address
    }

    /// The lowercase full address, the identity key used by collections.
    pub fn canonical(&self) -> String {
        canonical::canonical_email(&self.address)
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

impl FromStr for EmailAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
