//! Payload Store
//!
//! Where the scheduler keeps completed payloads, keyed by task id.

use crate::cache::{DownloadCache, Payload, SharedCache};

/// Completed-payload registry used by the scheduler.
pub trait PayloadStore: Send + Sync {
    fn put(&self, id: &str, payload: Payload);
    fn load(&self, id: &str) -> Option<Payload>;
    fn count(&self) -> usize;
    fn clear(&self);
}

impl PayloadStore for DownloadCache {
    fn put(&self, id: &str, payload: Payload) {
        self.set(id, payload, None);
    }

    fn load(&self, id: &str) -> Option<Payload> {
        self.get(id)
    }

    fn count(&self) -> usize {
        self.len()
    }

    fn clear(&self) {
        DownloadCache::clear(self);
    }
}

impl PayloadStore for SharedCache<String, Payload> {
    fn put(&self, id: &str, payload: Payload) {
        self.set(id.to_string(), payload, None);
    }

    fn load(&self, id: &str) -> Option<Payload> {
        self.get(&id.to_string())
    }

    fn count(&self) -> usize {
        self.len()
    }

    fn clear(&self) {
        SharedCache::clear(self);
    }
}
