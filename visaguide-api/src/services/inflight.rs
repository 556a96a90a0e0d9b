//! In-process launch guard keyed on composite id.

use dashmap::DashMap;
use std::sync::Arc;
use visaguide_core::CompositeId;

/// Set of composite ids with a regeneration job running in this process.
///
/// Only guards this process. Jobs in other processes are not seen, and the
/// job itself is idempotent, so a duplicate launch elsewhere is harmless.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    running: DashMap<CompositeId, ()>,
}

impl InFlightRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim `id`. Returns `None` if a job for it is already running.
    ///
    /// The claim is released when the returned permit is dropped.
    pub fn try_acquire(self: &Arc<Self>, id: CompositeId) -> Option<InFlightPermit> {
        use dashmap::mapref::entry::Entry;

        match self.running.entry(id.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(InFlightPermit {
                    registry: Arc::clone(self),
                    id,
                })
            }
        }
    }

    pub fn is_running(&self, id: &CompositeId) -> bool {
        self.running.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }
}

/// Claim on one composite id. Dropping it releases the id.
#[derive(Debug)]
pub struct InFlightPermit {
    registry: Arc<InFlightRegistry>,
    id: CompositeId,
}

impl InFlightPermit {
    pub fn id(&self) -> &CompositeId {
        &self.id
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.registry.running.remove(&self.id);
    }
}
