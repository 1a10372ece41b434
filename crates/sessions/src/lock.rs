use std::sync::Arc;

use {
    dashmap::DashMap,
    tokio::sync::{Mutex, OwnedMutexGuard},
};

/// Idle entries are swept once the map grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

/// Keyed async mutex: one lock per sender identifier.
///
/// Serializes read-modify-write sequences for a single sender while leaving
/// unrelated senders free to proceed.
#[derive(Debug, Default)]
pub struct SenderLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SenderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `sender_id`, waiting if another task holds it.
    pub async fn lock(&self, sender_id: &str) -> OwnedMutexGuard<()> {
        if self.locks.len() > PRUNE_THRESHOLD {
            self.locks.retain(|_, m| Arc::strong_count(m) > 1);
        }
        let mutex = Arc::clone(self.locks.entry(sender_id.to_string()).or_default().value());
        mutex.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}
