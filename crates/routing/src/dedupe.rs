use std::{
    collections::{HashSet, VecDeque},
    sync::Mutex,
};

/// Bounded set of recently seen inbound message ids.
///
/// The webhook provider redelivers messages it believes were not
/// acknowledged; the oldest id is evicted once `capacity` is reached.
#[derive(Debug)]
pub struct RecentIds {
    capacity: usize,
    inner: Mutex<Window>,
}

#[derive(Debug, Default)]
struct Window {
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl RecentIds {
    /// A `capacity` of zero disables duplicate detection.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Window::default()),
        }
    }

    /// Record `id`. Returns `false` when it was already present.
    pub fn insert(&self, id: &str) -> bool {
        if self.capacity == 0 {
            return true;
        }
        let mut window = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if window.seen.contains(id) {
            return false;
        }
        while window.order.len() >= self.capacity {
            if let Some(old) = window.order.pop_front() {
                window.seen.remove(&old);
            }
        }
        window.seen.insert(id.to_string());
        window.order.push_back(id.to_string());
        true
    }

    /// Drop `id` so a redelivery is processed again.
    pub fn forget(&self, id: &str) {
        let mut window = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if window.seen.remove(id) {
            window.order.retain(|x| x != id);
        }
    }
}
