//! Opaque handle identities and their release-on-drop registrations.

use std::fmt;
use std::sync::Weak;
use uuid::Uuid;

use super::{DescriptorId, TrackerState};

/// Identity of a handle-style resource (a stream, a promise-style file handle)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(Uuid);

impl HandleId {
    /// A fresh random identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Live registration of a handle in a [`DescriptorTracker`](super::DescriptorTracker)
///
/// Embed this in the handle object. When the handle is dropped, the
/// registration is dropped with it and the tracker slot is released, whether
/// or not an explicit close ever ran.
///
/// The registration holds only a weak reference to the tracker, and the
/// tracker holds nothing of the handle, so neither keeps the other alive.
pub struct HandleRegistration {
    id: DescriptorId,
    tracker: Weak<TrackerState>,
}

impl HandleRegistration {
    pub(super) fn new(id: DescriptorId, tracker: Weak<TrackerState>) -> Self {
        Self { id, tracker }
    }

    /// The tracked identity
    pub fn id(&self) -> DescriptorId {
        self.id
    }

    /// Release the slot now instead of at drop
    pub fn release(self) {
        // Drop does the work
    }
}

impl fmt::Debug for HandleRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistration")
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for HandleRegistration {
    fn drop(&mut self) {
        if let Some(state) = self.tracker.upgrade() {
            state.release(&self.id);
        }
    }
}
