use std::time::{Duration, Instant};

use dashmap::DashMap;

/// A bounded, TTL-expiring `sessionId -> endpoint` cache (§4.7 "consulting
/// the Control-Plane or a local cache with TTL"; §9 "express as an
/// interface that provides get-or-create + background eviction"). Reads
/// that find a stale entry behave as a miss; a background sweep removes
/// expired entries opportunistically so the map doesn't grow unbounded
/// across session churn.
pub struct EndpointCache {
    entries: DashMap<String, (String, Instant)>,
    ttl: Duration,
}

impl EndpointCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<String> {
        let entry = self.entries.get(session_id)?;
        let (endpoint, inserted_at) = entry.value();
        if inserted_at.elapsed() > self.ttl {
            drop(entry);
            self.entries.remove(session_id);
            return None;
        }
        Some(endpoint.clone())
    }

    pub fn insert(&self, session_id: String, endpoint: String) {
        self.entries.insert(session_id, (endpoint, Instant::now()));
    }

    pub fn invalidate(&self, session_id: &str) {
        self.entries.remove(session_id);
    }

    /// Drop every entry whose TTL has elapsed. Run periodically from a
    /// background task rather than relying solely on lazy eviction in
    /// [`Self::get`], so an endpoint nobody reads again still gets reclaimed.
    pub fn sweep_expired(&self) {
        self.entries.retain(|_, (_, inserted_at)| inserted_at.elapsed() <= self.ttl);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
