use std::collections::HashMap;

use crate::canonical;

use super::{AddressError, EmailAddress};

#[derive(Debug, Clone)]
struct Entry {
    address: EmailAddress,
    display_name: Option<String>,
}

/// An insertion-ordered set of addresses keyed by the lowercase of the
/// full address string. Inserting a duplicate key is a no-op.
#[derive(Debug, Clone, Default)]
pub struct AddressCollection {
    order: Vec<String>,
    entries: HashMap<String, Entry>,
}

impl AddressCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an address; returns `false` when the key was already present.
    pub fn add(&mut self, address: EmailAddress) -> bool {
        self.insert(address, None)
    }

    /// Inserts an address together with a display name.
    pub fn add_named(&mut self, address: EmailAddress, name: impl Into<String>) -> bool {
        self.insert(address, Some(name.into()))
    }

    /// Parses and inserts a batch of address strings; returns the number of
    /// newly inserted entries. The first invalid string aborts the batch.
    pub fn add_many<I, S>(&mut self, emails: I) -> Result<usize, AddressError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for email in emails {
            if self.add(EmailAddress::parse(email.as_ref())?) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// The mapping form: address strings paired with display names.
    pub fn add_many_named<I, S, N>(&mut self, pairs: I) -> Result<usize, AddressError>
    where
        I: IntoIterator<Item = (S, N)>,
        S: AsRef<str>,
        N: Into<String>,
    {
        let mut added = 0;
        for (email, name) in pairs {
            if self.add_named(EmailAddress::parse(email.as_ref())?, name) {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn has(&self, email: &str) -> bool {
        self.entries.contains_key(&canonical::canonical_email(email))
    }

    pub fn get(&self, email: &str) -> Option<&EmailAddress> {
        self.entries
            .get(&canonical::canonical_email(email))
            .map(|entry| &entry.address)
    }

    pub fn display_name(&self, email: &str) -> Option<&str> {
        self.entries
            .get(&canonical::canonical_email(email))?
            .display_name
            .as_deref()
    }

    /// Removes an address; returns `true` when it was present.
    pub fn remove(&mut self, email: &str) -> bool {
        let key = canonical::canonical_email(email);
        if self.entries.remove(&key).is_none() {
            return false;
        }
        self.order.retain(|existing| *existing != key);
        true
    }

    /// Absorbs every entry of `other`, keeping existing entries on key clash.
    pub fn merge(&mut self, other: &AddressCollection) {
        for key in &other.order {
            if let Some(entry) = other.entries.get(key) {
                self.insert(entry.address.clone(), entry.display_name.clone());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Addresses in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &EmailAddress> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(key))
            .map(|entry| &entry.address)
    }

    /// Distinct canonical domains, ordered by first encounter.
    pub fn domains(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for address in self.iter() {
            let domain = address.canonical_domain();
            if !seen.iter().any(|existing: &String| existing == domain) {
                seen.push(domain.to_string());
            }
        }
        seen
    }

    /// Lowercase address strings whose canonical domain matches `domain`.
    ///
    /// The query is trimmed of surrounding whitespace and dots before being
    /// canonicalized, so `"Example.COM.."` matches `example.com` entries.
    pub fn emails_in_domain(&self, domain: &str) -> Vec<String> {
        let stripped = domain.trim().trim_matches('.');
        let Ok(wanted) = canonical::canonical_domain(stripped) else {
            return Vec::new();
        };
        self.order
            .iter()
            .filter(|key| {
                self.entries
                    .get(*key)
                    .is_some_and(|entry| entry.address.canonical_domain() == wanted)
            })
            .cloned()
            .collect()
    }

    fn insert(&mut self, address: EmailAddress, display_name: Option<String>) -> bool {
        let key = address.canonical();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.order.push(key.clone());
        self.entries.insert(
            key,
            Entry {
                address,
                display_name,
            },
        );
        true
    }
}
