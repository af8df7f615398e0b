//! Pluggable key/value cache consulted by the DNS facade.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Values the facade memoizes. Keys are ASCII strings of the form
/// `domain:<fqdn>` or `rbl:<reversed-octets>`.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    /// MX exchanges for a domain, possibly empty.
    MxHosts(Vec<String>),
    /// The address is not listed (or is IPv6 and cannot be checked).
    RblClear,
    /// The address is listed; `lookup_url` carries the `?ip=` query.
    RblListing { server: String, lookup_url: String },
}

/// Key/value store contract. Writes must tolerate failures silently;
/// lookups on a failed store simply miss.
pub trait KvCache: Send + Sync {
    fn has(&self, key: &str) -> bool;
    fn get(&self, key: &str) -> Option<CacheValue>;
    fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>);
}

/// In-process cache with lazy TTL expiry.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (CacheValue, Option<Instant>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn live<'a>(
        entries: &'a HashMap<String, (CacheValue, Option<Instant>)>,
        key: &str,
    ) -> Option<&'a CacheValue> {
        let (value, deadline) = entries.get(key)?;
        match deadline {
            Some(deadline) if *deadline <= Instant::now() => None,
            _ => Some(value),
        }
    }
}

impl KvCache for MemoryCache {
    fn has(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| Self::live(&entries, key).is_some())
            .unwrap_or(false)
    }

    fn get(&self, key: &str) -> Option<CacheValue> {
        let mut entries = self.entries.lock().ok()?;
        if Self::live(&entries, key).is_none() {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|(value, _)| value.clone())
    }

    fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) {
        // a poisoned lock drops the write, never the caller
        if let Ok(mut entries) = self.entries.lock() {
            let deadline = ttl.map(|ttl| Instant::now() + ttl);
            entries.insert(key.to_string(), (value, deadline));
        }
    }
}
