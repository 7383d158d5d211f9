//! TTL-bounded table of in-flight HTTP requests.
//!
//! Each inbound request parks a oneshot sender here under its UUID until
//! the graph produces the matching response. The request side owns the
//! receiver; whoever takes the sender out of the map owns the single send.
//! Entries disappear on response, on timeout, when the request task gives
//! up, or when the sweeper catches an expired one.

use super::server::ServerResponse;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

struct PendingEntry {
    sender: oneshot::Sender<ServerResponse>,
    expires_at: Instant,
}

/// In-flight request table keyed by request UUID.
#[derive(Default)]
pub struct PendingMap {
    inner: Mutex<HashMap<String, PendingEntry>>,
}

impl PendingMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a response sender under `id` with the given time to live.
    ///
    /// Expired entries are purged on the way in, so an abandoned map does
    /// not grow without bound between sweeps.
    pub fn insert(&self, id: impl Into<String>, sender: oneshot::Sender<ServerResponse>, ttl: Duration) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.retain(|_, entry| entry.expires_at > now);
        inner.insert(
            id.into(),
            PendingEntry {
                sender,
                expires_at: now + ttl,
            },
        );
    }

    /// Take the sender for `id`, removing the entry.
    ///
    /// Returns `None` when the id is unknown or the entry has expired;
    /// the caller that gets `Some` owns the send.
    pub fn take(&self, id: &str) -> Option<oneshot::Sender<ServerResponse>> {
        let mut inner = self.inner.lock();
        let entry = inner.remove(id)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.sender)
    }

    /// Drop the entry for `id`, if any. Idempotent.
    pub fn remove(&self, id: &str) {
        self.inner.lock().remove(id);
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let before = inner.len();
        inner.retain(|_, entry| entry.expires_at > now);
        before - inner.len()
    }

    /// Whether `id` is currently pending.
    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().contains_key(id)
    }

    /// Number of pending entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
