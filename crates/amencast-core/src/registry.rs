//! Per-stream session registry.
//!
//! Each stage owns one registry keyed by [`StreamId`]. Entries are created
//! only through [`SessionRegistry::insert_new`], which never overwrites, so a
//! duplicate `start` cannot replace a live session.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::ids::StreamId;

/// Concurrent map of active per-stream sessions.
pub struct SessionRegistry<T> {
    sessions: Arc<DashMap<StreamId, T>>,
}

impl<T> Clone for SessionRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
        }
    }
}

impl<T> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }
}

impl<T> SessionRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session for a stream that has none.
    ///
    /// Returns the value back if the stream already has a session.
    pub fn insert_new(&self, stream_id: StreamId, session: T) -> Result<(), T> {
        match self.sessions.entry(stream_id) {
            Entry::Occupied(_) => Err(session),
            Entry::Vacant(slot) => {
                let _ = slot.insert(session);
                Ok(())
            }
        }
    }

    /// Whether the stream has a session.
    pub fn contains(&self, stream_id: &StreamId) -> bool {
        self.sessions.contains_key(stream_id)
    }

    /// Run `f` against the stream's session, if any.
    pub fn with<R>(&self, stream_id: &StreamId, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.sessions.get(stream_id).map(|entry| f(entry.value()))
    }

    /// Remove and return the stream's session.
    pub fn remove(&self, stream_id: &StreamId) -> Option<T> {
        self.sessions.remove(stream_id).map(|(_, v)| v)
    }

    /// Remove the stream's session only when `predicate` holds for it.
    pub fn remove_if(&self, stream_id: &StreamId, predicate: impl FnOnce(&T) -> bool) -> Option<T> {
        self.sessions
            .remove_if(stream_id, |_, v| predicate(v))
            .map(|(_, v)| v)
    }

    /// Remove every session.
    pub fn drain(&self) -> Vec<(StreamId, T)> {
        let ids = self.ids();
        ids.into_iter()
            .filter_map(|id| self.sessions.remove(&id))
            .collect()
    }

    /// IDs of all active streams.
    pub fn ids(&self) -> Vec<StreamId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of active streams.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no streams are active.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_new_never_overwrites() {
        let reg = SessionRegistry::new();
        assert!(reg.insert_new(StreamId::from("s1"), 1).is_ok());
        assert_eq!(reg.insert_new(StreamId::from("s1"), 2), Err(2));
        assert_eq!(reg.with(&StreamId::from("s1"), |v| *v), Some(1));
    }

    #[test]
    fn remove_if_checks_predicate() {
        let reg = SessionRegistry::new();
        let id = StreamId::from("s1");
        reg.insert_new(id.clone(), 7u64).unwrap();

        assert_eq!(reg.remove_if(&id, |g| *g == 6), None);
        assert!(reg.contains(&id));
        assert_eq!(reg.remove_if(&id, |g| *g == 7), Some(7));
        assert!(reg.is_empty());
    }

    #[test]
    fn clones_share_state() {
        let reg = SessionRegistry::new();
        let other = reg.clone();
        reg.insert_new(StreamId::from("a"), ()).unwrap();
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn drain_empties() {
        let reg = SessionRegistry::new();
        reg.insert_new(StreamId::from("a"), 1).unwrap();
        reg.insert_new(StreamId::from("b"), 2).unwrap();
        let mut drained: Vec<i32> = reg.drain().into_iter().map(|(_, v)| v).collect();
        drained.sort_unstable();
        assert_eq!(drained, vec![1, 2]);
        assert!(reg.is_empty());
    }

    #[test]
    fn missing_stream_is_inactive() {
        let reg: SessionRegistry<()> = SessionRegistry::new();
        assert!(!reg.contains(&StreamId::from("ghost")));
        assert!(reg.remove(&StreamId::from("ghost")).is_none());
    }
}
