use crate::error::{BlockchainError, Result};
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;

/// How many keys a [`SeenSet`] remembers before forgetting the oldest
pub const SEEN_CAPACITY: usize = 4096;

/// Bounded memory of flooded packets this node has already handled.
///
/// Checking and recording a key is one critical section, so of several
/// concurrent copies exactly one is treated as new.
pub struct SeenSet<K> {
    capacity: usize,
    inner: Mutex<(HashSet<K>, VecDeque<K>)>,
}

impl<K: Eq + Hash + Clone> SeenSet<K> {
    pub fn new(capacity: usize) -> SeenSet<K> {
        SeenSet {
            capacity: capacity.max(1),
            inner: Mutex::new((HashSet::new(), VecDeque::new())),
        }
    }

    /// Records `key`, returning true the first time it is seen.
    pub fn insert(&self, key: K) -> Result<bool> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|e| BlockchainError::Lock(format!("Failed to acquire seen-set lock: {e}")))?;
        let (keys, order) = &mut *guard;
        if !keys.insert(key.clone()) {
            return Ok(false);
        }
        order.push_back(key);
        if order.len() > self.capacity {
            if let Some(oldest) = order.pop_front() {
                keys.remove(&oldest);
            }
        }
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|guard| guard.1.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
