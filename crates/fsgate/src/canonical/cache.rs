//! Time-bounded LRU cache of resolutions.
//!
//! # Architecture
//!
//! ```text
//! entries: HashMap<requested, Slot { entry, last_used }>
//! recency: BTreeMap<last_used, requested>   (oldest first)
//! ```
//!
//! Every hit bumps the slot's tick, so `recency.pop_first()` always yields the
//! least-recently-used key.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;

use super::CanonicalPath;

/// One cached resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    /// The path string as requested
    pub requested_path: String,
    /// What it resolved to
    pub canonical_path: CanonicalPath,
    /// When the resolution completed
    pub resolved_at: Instant,
}

#[derive(Debug)]
struct Slot {
    entry: ResolvedEntry,
    last_used: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, Slot>,
    recency: BTreeMap<u64, String>,
    tick: u64,
}

impl CacheState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, requested: &str) -> Option<Slot> {
        let slot = self.entries.remove(requested)?;
        self.recency.remove(&slot.last_used);
        Some(slot)
    }
}

/// Bounded map from requested path to [`ResolvedEntry`]
///
/// Entries older than the TTL are never returned. When an insert pushes the
/// count past capacity, the least-recently-used entry is evicted.
#[derive(Debug)]
pub(crate) struct ResolutionCache {
    state: Mutex<CacheState>,
    capacity: usize,
    ttl: Duration,
}

impl ResolutionCache {
    pub(crate) fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity,
            ttl,
        }
    }

    /// Fresh canonical path for `requested`, bumping its recency
    pub(crate) fn get(&self, requested: &str) -> Option<CanonicalPath> {
        let now = Instant::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let resolved_at = state.entries.get(requested)?.entry.resolved_at;
        if now.duration_since(resolved_at) >= self.ttl {
            state.remove(requested);
            return None;
        }

        let tick = state.next_tick();
        let slot = state.entries.get_mut(requested)?;
        let previous = std::mem::replace(&mut slot.last_used, tick);
        let canonical = slot.entry.canonical_path.clone();
        state.recency.remove(&previous);
        state.recency.insert(tick, requested.to_string());
        Some(canonical)
    }

    /// Record a resolution that just completed
    pub(crate) fn insert(&self, requested: String, canonical_path: CanonicalPath) {
        if self.capacity == 0 {
            return;
        }

        let mut state = self.state.lock();
        let tick = state.next_tick();
        let slot = Slot {
            entry: ResolvedEntry {
                requested_path: requested.clone(),
                canonical_path,
                resolved_at: Instant::now(),
            },
            last_used: tick,
        };

        if let Some(old) = state.entries.insert(requested.clone(), slot) {
            state.recency.remove(&old.last_used);
        }
        state.recency.insert(tick, requested);

        while state.entries.len() > self.capacity {
            let Some((_, oldest)) = state.recency.pop_first() else {
                break;
            };
            state.entries.remove(&oldest);
        }
    }

    /// The stored entry, without touching recency or checking the TTL
    pub(crate) fn peek(&self, requested: &str) -> Option<ResolvedEntry> {
        self.state
            .lock()
            .entries
            .get(requested)
            .map(|slot| slot.entry.clone())
    }

    pub(crate) fn invalidate(&self, requested: &str) -> bool {
        self.state.lock().remove(requested).is_some()
    }

    pub(crate) fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.recency.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().entries.len()
    }
}
