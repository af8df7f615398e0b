use std::collections::HashSet;

use crate::canonical::{self, CanonicalError};

/// Banned senders, tracked as canonical strings only.
///
/// Emails are keyed by the lowercase full address, domains by their ASCII
/// (Punycode) lowercase form.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    emails: HashSet<String>,
    domains: HashSet<String>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ban_email(&mut self, email: &str) {
        self.emails.insert(canonical::canonical_email(email));
    }

    /// Lifts a ban; returns `true` when the address was banned.
    pub fn allow_email(&mut self, email: &str) -> bool {
        self.emails.remove(&canonical::canonical_email(email))
    }

    pub fn ban_domain(&mut self, domain: &str) -> Result<(), CanonicalError> {
        self.domains.insert(canonical::canonical_domain(domain)?);
        Ok(())
    }

    pub fn allow_domain(&mut self, domain: &str) -> Result<bool, CanonicalError> {
        Ok(self.domains.remove(&canonical::canonical_domain(domain)?))
    }

    pub fn is_email_banned(&self, email: &str) -> bool {
        let key = canonical::canonical_email(email);
        if self.emails.contains(&key) {
            return true;
        }
        key.rsplit_once('@')
            .and_then(|(_, domain)| canonical::canonical_domain(domain).ok())
            .is_some_and(|domain| self.domains.contains(&domain))
    }

    pub fn is_domain_banned(&self, domain: &str) -> bool {
        canonical::canonical_domain(domain)
            .map(|key| self.domains.contains(&key))
            .unwrap_or(false)
    }
}
