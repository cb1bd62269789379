// src/watch/filter.rs

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::SystemTime;

use tracing::debug;

/// Backing table for the dedup filter: last observed modification time per
/// file name.
///
/// `swap` stores the new time and returns the previously stored one. Keeping
/// this behind a trait lets a bounded table replace the unbounded default
/// without touching the filter's contract.
pub trait SeenStore: Send {
    fn swap(&mut self, name: &str, modified: SystemTime) -> Option<SystemTime>;
}

/// Unbounded store: one entry per distinct file name ever seen.
#[derive(Debug, Default)]
pub struct InMemorySeenStore {
    seen: HashMap<String, SystemTime>,
}

impl SeenStore for InMemorySeenStore {
    fn swap(&mut self, name: &str, modified: SystemTime) -> Option<SystemTime> {
        self.seen.insert(name.to_string(), modified)
    }
}

/// Bounded store: evicts the oldest-inserted name once capacity is reached.
///
/// Evicting a name means the file will be re-admitted on its next sighting,
/// which trades a duplicate dispatch for bounded memory.
#[derive(Debug)]
pub struct BoundedSeenStore {
    capacity: usize,
    seen: HashMap<String, SystemTime>,
    order: VecDeque<String>,
}

impl BoundedSeenStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            seen: HashMap::new(),
            order: VecDeque::new(),
        }
    }
}

impl SeenStore for BoundedSeenStore {
    fn swap(&mut self, name: &str, modified: SystemTime) -> Option<SystemTime> {
        let previous = self.seen.insert(name.to_string(), modified);

        if previous.is_none() {
            self.order.push_back(name.to_string());
            while self.seen.len() > self.capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.seen.remove(&evicted);
                    debug!(file = %evicted, "evicted from seen table");
                }
            }
        }

        previous
    }
}

/// Gate that decides whether a candidate file is new relative to what has
/// been seen before.
///
/// A file is admitted on first sighting, rejected while its modification
/// time is unchanged, and re-admitted when the time differs (a rewritten or
/// appended file must be reprocessed).
///
/// The check-and-update is a single critical section: the poll timer can fire
/// while a previous scan is still being evaluated, and two scans must never
/// both admit the same unchanged file.
pub struct LastModifiedFilter {
    store: Mutex<Box<dyn SeenStore>>,
}

impl LastModifiedFilter {
    pub fn new(store: Box<dyn SeenStore>) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Unbounded filter, the default behaviour.
    pub fn unbounded() -> Self {
        Self::new(Box::new(InMemorySeenStore::default()))
    }

    /// Filter over a bounded table evicting the oldest name at `capacity`.
    pub fn bounded(capacity: usize) -> Self {
        Self::new(Box::new(BoundedSeenStore::new(capacity)))
    }

    pub fn accept(&self, name: &str, modified: SystemTime) -> bool {
        let mut store = self.store.lock().expect("seen store poisoned");
        match store.swap(name, modified) {
            None => true,
            Some(previous) => previous != modified,
        }
    }
}
