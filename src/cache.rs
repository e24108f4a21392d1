//! Bounded memoization of finished analyses.
//!
//! Keys are a SHA-256 digest over the focus text, the uploaded image bytes
//! and the preamble, so identical resubmissions never reach the remote API.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::debug;

use crate::dispatcher::AnalysisOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn new(focus: &str, image: &[u8], preamble: &str) -> Self {
        let mut hasher = Sha256::new();
        // Length prefixes keep ("ab", "c") and ("a", "bc") apart.
        for field in [focus.as_bytes(), image, preamble.as_bytes()] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct Entries {
    values: HashMap<RequestKey, AnalysisOutcome>,
    // Front is least recently used.
    order: VecDeque<RequestKey>,
}

impl Entries {
    fn touch(&mut self, key: &RequestKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }
}

/// Least-recently-used cache of analysis outcomes.
pub struct ReportCache {
    capacity: NonZeroUsize,
    entries: Mutex<Entries>,
}

impl ReportCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Entries {
                values: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn get(&self, key: &RequestKey) -> Option<AnalysisOutcome> {
        let mut entries = self.lock();
        let value = entries.values.get(key).cloned()?;
        entries.touch(key);
        Some(value)
    }

    pub fn insert(&self, key: RequestKey, value: AnalysisOutcome) {
        let mut entries = self.lock();
        if entries.values.insert(key.clone(), value).is_some() {
            entries.touch(&key);
            return;
        }
        entries.order.push_back(key);

        while entries.order.len() > self.capacity.get() {
            if let Some(evicted) = entries.order.pop_front() {
                entries.values.remove(&evicted);
                debug!("Evicted cached report {}", evicted.as_str());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries> {
        // Entries stay consistent if a holder panicked.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
