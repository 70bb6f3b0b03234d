//! Descriptor and handle lifecycle tracking
//!
//! Every open descriptor is bound to the canonical path it was authorized
//! against. Later operations addressed by descriptor look the binding up and
//! re-check the *current* rules at that path; the tracker never stores a
//! permission verdict.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │  register()  │ → Check ceiling, insert id → TrackedDescriptor
//! └──────┬───────┘
//!        │
//!        ├─ Live: HashMap<DescriptorId, TrackedDescriptor>
//!        │
//!        ↓
//! ┌──────────────┐
//! │  release()   │ → Remove record (idempotent)
//! └──────────────┘
//! ```
//!
//! Handle-style resources use [`DescriptorTracker::register_handle`], which
//! returns a [`HandleRegistration`] that releases itself on drop.
//!
//! # Example
//!
//! ```
//! use fsgate::tracker::{DescriptorId, DescriptorTracker};
//! use fsgate::canonical::CanonicalPath;
//!
//! let tracker = DescriptorTracker::new(2);
//! let path = CanonicalPath::assume_canonical("/srv/data.bin");
//!
//! tracker.register(DescriptorId::Fd(3), path.clone()).unwrap();
//! assert_eq!(tracker.lookup(DescriptorId::Fd(3)).unwrap().canonical_path, path);
//!
//! tracker.release(DescriptorId::Fd(3));
//! assert!(tracker.lookup(DescriptorId::Fd(3)).is_err());
//! ```

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::canonical::CanonicalPath;
use crate::error::GateError;

mod handle;

pub use handle::{HandleId, HandleRegistration};

/// Identity of an open resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorId {
    /// Numeric file descriptor
    Fd(u64),
    /// Opaque handle
    Handle(HandleId),
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorId::Fd(fd) => write!(f, "fd:{fd}"),
            DescriptorId::Handle(handle) => write!(f, "handle:{handle}"),
        }
    }
}

impl From<HandleId> for DescriptorId {
    fn from(handle: HandleId) -> Self {
        DescriptorId::Handle(handle)
    }
}

/// A live descriptor's binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedDescriptor {
    /// The descriptor identity
    pub id: DescriptorId,
    /// Path authorized at open time; fixed for the descriptor's lifetime
    pub canonical_path: CanonicalPath,
    /// When the descriptor was registered
    pub opened_at: Instant,
}

#[derive(Debug)]
pub(crate) struct TrackerState {
    live: Mutex<HashMap<DescriptorId, TrackedDescriptor>>,
    max_descriptors: usize,
}

impl TrackerState {
    pub(crate) fn release(&self, id: &DescriptorId) -> bool {
        let removed = self.live.lock().remove(id).is_some();
        if removed {
            debug!(%id, "released descriptor");
        }
        removed
    }
}

/// Records the canonical path of every open descriptor and handle
///
/// # Thread Safety
///
/// The live map is protected by a single mutex that is never held across an
/// await. Clones share the same map.
#[derive(Clone, Debug)]
pub struct DescriptorTracker {
    state: Arc<TrackerState>,
}

impl DescriptorTracker {
    /// Create a tracker allowing at most `max_descriptors` live records
    pub fn new(max_descriptors: usize) -> Self {
        Self {
            state: Arc::new(TrackerState {
                live: Mutex::new(HashMap::new()),
                max_descriptors,
            }),
        }
    }

    /// Bind `id` to `canonical_path`
    ///
    /// Registering an id that is already live rebinds it; the count does not
    /// change. This happens when a numeric descriptor is reused after a close
    /// that was never reported.
    ///
    /// # Errors
    ///
    /// [`GateError::ResourceExhausted`] if a new record would exceed the ceiling.
    pub fn register(&self, id: DescriptorId, canonical_path: CanonicalPath) -> Result<(), GateError> {
        let mut live = self.state.live.lock();

        if !live.contains_key(&id) && live.len() >= self.state.max_descriptors {
            warn!(%id, limit = self.state.max_descriptors, "descriptor limit reached");
            return Err(GateError::ResourceExhausted {
                limit: self.state.max_descriptors,
            });
        }

        let record = TrackedDescriptor {
            id,
            canonical_path,
            opened_at: Instant::now(),
        };
        if live.insert(id, record).is_some() {
            warn!(%id, "descriptor re-registered without release");
        } else {
            debug!(%id, live = live.len(), "registered descriptor");
        }
        Ok(())
    }

    /// Register a fresh handle identity bound to `canonical_path`
    ///
    /// The slot is released when the returned registration is dropped.
    pub fn register_handle(
        &self,
        canonical_path: CanonicalPath,
    ) -> Result<HandleRegistration, GateError> {
        let id = DescriptorId::Handle(HandleId::new());
        self.register(id, canonical_path)?;
        Ok(HandleRegistration::new(id, Arc::downgrade(&self.state)))
    }

    /// The record for `id`
    ///
    /// # Errors
    ///
    /// [`GateError::UnknownDescriptor`] if `id` is not live.
    pub fn lookup(&self, id: DescriptorId) -> Result<TrackedDescriptor, GateError> {
        self.state
            .live
            .lock()
            .get(&id)
            .cloned()
            .ok_or(GateError::UnknownDescriptor(id))
    }

    /// Remove the record for `id`
    ///
    /// # Returns
    ///
    /// Whether a record was removed. Releasing an unknown id is not an error.
    pub fn release(&self, id: DescriptorId) -> bool {
        self.state.release(&id)
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.state.live.lock().len()
    }

    /// Whether no descriptor is live
    pub fn is_empty(&self) -> bool {
        self.state.live.lock().is_empty()
    }

    /// The configured ceiling
    pub fn max_descriptors(&self) -> usize {
        self.state.max_descriptors
    }
}
