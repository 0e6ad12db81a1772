//! Connection-string scheme table and the discovery cache modules
//! populate with capabilities they find.

use std::time::Instant;

use dashmap::DashMap;

use crate::module::ServerCapability;

/// Schemes a connection string's `scheme://` prefix may carry, matching
/// the module family that understands it.
pub const KNOWN_SCHEMES: &[&str] = &["daqmock", "daqref", "daq.nd", "daq.ns", "daq.lt", "daq.opcua", "daq"];

#[must_use]
pub fn is_known_scheme(scheme: &str) -> bool {
    KNOWN_SCHEMES.contains(&scheme)
}

/// One discovered device, keyed by its primary connection string.
#[derive(Debug, Clone)]
pub struct DiscoveryEntry {
    pub capability: ServerCapability,
    pub last_seen: Instant,
}

/// Concurrent cache of devices found via module-driven discovery,
/// refreshed as modules re-announce their availability.
#[derive(Default)]
pub struct DiscoveryCache {
    entries: DashMap<String, DiscoveryEntry>,
}

impl DiscoveryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, connection_string: impl Into<String>, capability: ServerCapability, now: Instant) {
        self.entries.insert(
            connection_string.into(),
            DiscoveryEntry {
                capability,
                last_seen: now,
            },
        );
    }

    #[must_use]
    pub fn get(&self, connection_string: &str) -> Option<DiscoveryEntry> {
        self.entries.get(connection_string).map(|e| e.clone())
    }

    /// Drop entries not seen since `cutoff`.
    pub fn evict_stale(&self, cutoff: Instant) {
        self.entries.retain(|_, entry| entry.last_seen >= cutoff);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ProtocolType, ServerCapability};
    use std::time::Duration;

    #[test]
    fn is_known_scheme_matches_the_registered_table() {
        assert!(is_known_scheme("daqref"));
        assert!(!is_known_scheme("ftp"));
    }

    #[test]
    fn record_then_get_round_trips() {
        let cache = DiscoveryCache::new();
        let capability = ServerCapability::new("daq.nd", ProtocolType::Configuration, "daq.nd://");
        cache.record("daq.nd://192.168.0.1", capability.clone(), Instant::now());
        let found = cache.get("daq.nd://192.168.0.1").unwrap();
        assert_eq!(found.capability.protocol_id, "daq.nd");
        assert!(cache.get("daq.nd://missing").is_none());
    }

    #[test]
    fn evict_stale_drops_entries_older_than_the_cutoff() {
        let cache = DiscoveryCache::new();
        let capability = ServerCapability::new("daqref", ProtocolType::Configuration, "daqref://");
        cache.record("daqref://a", capability.clone(), Instant::now());
        let cutoff = Instant::now() + Duration::from_millis(1);
        std::thread::sleep(Duration::from_millis(2));
        cache.record("daqref://b", capability, Instant::now());
        cache.evict_stale(cutoff);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("daqref://a").is_none());
        assert!(cache.get("daqref://b").is_some());
    }
}
