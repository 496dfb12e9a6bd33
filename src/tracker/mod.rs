use std::collections::HashMap;
use std::sync::Mutex;

use agentcube_types::{SandboxResource, SessionId};

/// In-memory, thread-safe mapping `sessionId -> [SandboxResource]` (C2,
/// §4.2). A single lock guards every operation; reads always return a copy
/// so callers can never alias the tracker's internal state. This structure
/// is the sole authority for which resources get cleaned up on delete — the
/// K8s API is never re-scanned to discover what a session owns.
#[derive(Default)]
pub struct ResourceTracker {
    inner: Mutex<HashMap<SessionId, Vec<SandboxResource>>>,
}

impl ResourceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `resource` was created on behalf of `session_id`.
    pub fn track(&self, session_id: SessionId, resource: SandboxResource) {
        let mut guard = self.inner.lock().expect("tracker lock poisoned");
        guard.entry(session_id).or_default().push(resource);
    }

    /// Return a copy of the resources currently tracked for `session_id`.
    #[must_use]
    pub fn get_resources(&self, session_id: SessionId) -> Vec<SandboxResource> {
        let guard = self.inner.lock().expect("tracker lock poisoned");
        guard.get(&session_id).cloned().unwrap_or_default()
    }

    /// Remove and return every resource tracked for `session_id`, leaving
    /// nothing behind — the caller is now responsible for actually deleting
    /// them from the cluster.
    pub fn release(&self, session_id: SessionId) -> Vec<SandboxResource> {
        let mut guard = self.inner.lock().expect("tracker lock poisoned");
        guard.remove(&session_id).unwrap_or_default()
    }

    /// `true` if at least one resource is tracked for `session_id`.
    #[must_use]
    pub fn is_tracked(&self, session_id: SessionId) -> bool {
        let guard = self.inner.lock().expect("tracker lock poisoned");
        guard.get(&session_id).is_some_and(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcube_types::SandboxKind;
    use uuid::Uuid;

    fn resource(kind: SandboxKind, name: &str) -> SandboxResource {
        SandboxResource::new(kind, name.to_owned(), "agentcube-sandboxes".to_owned())
    }

    #[test]
    fn track_and_get_returns_copy() {
        let tracker = ResourceTracker::new();
        let sid = Uuid::new_v4();
        tracker.track(sid, resource(SandboxKind::Pod, "sess-abc"));
        tracker.track(sid, resource(SandboxKind::ConfigMap, "sess-abc-config"));

        let first = tracker.get_resources(sid);
        assert_eq!(first.len(), 2);

        // Mutating the returned Vec must not affect the tracker's state.
        let mut mutated = first;
        mutated.clear();
        let second = tracker.get_resources(sid);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn release_empties_and_returns_entries() {
        let tracker = ResourceTracker::new();
        let sid = Uuid::new_v4();
        tracker.track(sid, resource(SandboxKind::Pod, "sess-abc"));

        let released = tracker.release(sid);
        assert_eq!(released.len(), 1);
        assert!(tracker.get_resources(sid).is_empty());
        assert!(!tracker.is_tracked(sid));
    }

    #[test]
    fn unknown_session_returns_empty() {
        let tracker = ResourceTracker::new();
        assert!(tracker.get_resources(Uuid::new_v4()).is_empty());
        assert!(tracker.release(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn sessions_are_independent() {
        let tracker = ResourceTracker::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        tracker.track(a, resource(SandboxKind::Pod, "a"));
        tracker.track(b, resource(SandboxKind::Pod, "b"));

        tracker.release(a);
        assert!(tracker.get_resources(a).is_empty());
        assert_eq!(tracker.get_resources(b).len(), 1);
    }
}
