//! Per-resource holder counting around access brackets

use super::access::ScopedAccess;
use crate::error::{Error, Result};
use crate::types::{ResourceIdentity, ScopeEntry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Single-use capability for one acquired holder.
///
/// Redeem it through [`ScopeRegistrar::release`]. Redeeming twice is a no-op.
/// Dropping it unredeemed leaks the holder and keeps the bracket open.
#[derive(Debug)]
pub struct ReleaseHandle {
    id: Uuid,
    registrar_id: Uuid,
    identity: ResourceIdentity,
    redeemed: AtomicBool,
}

impl ReleaseHandle {
    fn new(registrar_id: Uuid, identity: ResourceIdentity) -> Self {
        Self {
            id: Uuid::new_v4(),
            registrar_id,
            identity,
            redeemed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    pub fn is_redeemed(&self) -> bool {
        self.redeemed.load(Ordering::Acquire)
    }
}

/// Process-wide holder table keyed by resource identity.
///
/// The table lock only guards lookup/insert. Each entry has its own lock,
/// held across the count change and the begin/end primitive, so brackets on
/// one resource never interleave. Entries live as long as the registrar.
pub struct ScopeRegistrar {
    id: Uuid,
    access: Arc<dyn ScopedAccess>,
    entries: Mutex<HashMap<ResourceIdentity, Arc<Mutex<ScopeEntry>>>>,
}

impl ScopeRegistrar {
    pub fn new(access: Arc<dyn ScopedAccess>) -> Self {
        Self {
            id: Uuid::new_v4(),
            access,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, identity: &ResourceIdentity) -> Arc<Mutex<ScopeEntry>> {
        let mut entries = self.entries.lock();
        Arc::clone(entries.entry(identity.clone()).or_default())
    }

    fn existing_slot(&self, identity: &ResourceIdentity) -> Option<Arc<Mutex<ScopeEntry>>> {
        self.entries.lock().get(identity).cloned()
    }

    /// Add a holder, opening the bracket if this is the first one
    pub fn acquire(&self, identity: &ResourceIdentity) -> Result<ReleaseHandle> {
        let slot = self.slot(identity);
        let mut entry = slot.lock();

        if entry.holder_count == 0 {
            if !self.access.begin_access(identity) {
                warn!("Begin access refused for {}", identity);
                return Err(Error::resolve_failed(format!(
                    "access to {} was denied",
                    identity
                )));
            }
            entry.bracket_open = true;
            info!("Opened access bracket for {}", identity);
        }

        entry.holder_count += 1;
        let handle = ReleaseHandle::new(self.id, identity.clone());
        debug!(
            "Acquired holder {} for {} (holders: {})",
            handle.id, identity, entry.holder_count
        );

        Ok(handle)
    }

    /// Redeem a handle, closing the bracket when the last holder leaves
    pub fn release(&self, handle: &ReleaseHandle) {
        if handle.registrar_id != self.id {
            warn!("Ignoring holder {} issued by another registrar", handle.id);
            return;
        }

        if handle.redeemed.swap(true, Ordering::AcqRel) {
            debug!("Holder {} already released", handle.id);
            return;
        }

        let Some(slot) = self.existing_slot(&handle.identity) else {
            warn!("No scope entry for {}", handle.identity);
            return;
        };
        let mut entry = slot.lock();

        let Some(remaining) = entry.holder_count.checked_sub(1) else {
            warn!("Release with no holders for {}", handle.identity);
            return;
        };
        entry.holder_count = remaining;
        debug!(
            "Released holder {} for {} (holders: {})",
            handle.id, handle.identity, remaining
        );

        if remaining == 0 {
            self.access.end_access(&handle.identity);
            entry.bracket_open = false;
            info!("Closed access bracket for {}", handle.identity);
        }
    }

    /// Snapshot of the entry for an identity
    pub fn entry(&self, identity: &ResourceIdentity) -> Option<ScopeEntry> {
        let slot = self.existing_slot(identity)?;
        let entry = *slot.lock();
        Some(entry)
    }

    pub fn holder_count(&self, identity: &ResourceIdentity) -> usize {
        self.entry(identity).map(|e| e.holder_count).unwrap_or(0)
    }

    /// Identities whose bracket is currently open, sorted
    pub fn open_scopes(&self) -> Vec<ResourceIdentity> {
        let slots: Vec<_> = self
            .entries
            .lock()
            .iter()
            .map(|(identity, slot)| (identity.clone(), Arc::clone(slot)))
            .collect();

        let mut open: Vec<_> = slots
            .into_iter()
            .filter(|(_, slot)| slot.lock().bracket_open)
            .map(|(identity, _)| identity)
            .collect();
        open.sort();
        open
    }
}

impl std::fmt::Debug for ScopeRegistrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeRegistrar")
            .field("id", &self.id)
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}
