use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::resolver::ResolvedPair;

/// Maximum number of translations kept in memory
pub const DEFAULT_CAPACITY: usize = 100;

/// Separator between fingerprint parts, not expected in normal text
pub const FINGERPRINT_DELIMITER: char = '§';

/// Build the cache key for a text and its resolved pair
pub fn fingerprint(text: &str, pair: &ResolvedPair) -> String {
    format!(
        "{}{}{}{}{}",
        text,
        FINGERPRINT_DELIMITER,
        pair.from.name(),
        FINGERPRINT_DELIMITER,
        pair.to.name()
    )
}

#[derive(Default)]
struct Entries {
    map: HashMap<String, String>,
    order: VecDeque<String>,
}

/// Bounded in-memory translation cache with insertion-order (FIFO) eviction.
///
/// Reads never refresh an entry; the oldest inserted key is evicted first.
pub struct TranslationCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().map.get(key).cloned()
    }

    pub fn put(&self, key: String, value: String) {
        let mut entries = self.lock();

        if let Some(existing) = entries.map.get_mut(&key) {
            *existing = value;
            return;
        }

        while entries.map.len() >= self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.map.remove(&oldest);
            debug!("Evicted oldest cache entry ({} bytes key)", oldest.len());
        }

        entries.order.push_back(key.clone());
        entries.map.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new()
    }
}
