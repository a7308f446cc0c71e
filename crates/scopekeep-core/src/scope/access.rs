//! Host primitives for security-scoped bookmarks

use crate::error::Result;
use crate::types::{RecoveredResource, ResourceIdentity, Token};
use std::path::Path;

/// The OS-level bookmark and access-bracket primitives.
///
/// Implementations mint and recover tokens and open/close the per-resource
/// access bracket. They keep no holder counts of their own; balancing
/// brackets is the job of [`super::ScopeRegistrar`].
#[cfg_attr(test, mockall::automock)]
pub trait ScopedAccess: Send + Sync {
    /// Mint a durable token for a currently accessible path
    fn mint_token(&self, path: &Path) -> Result<Token>;

    /// Recover the resource a token names, possibly flagged stale
    fn recover_resource(&self, token: &Token) -> Result<RecoveredResource>;

    /// Begin an access bracket. Returns false when the OS refuses.
    fn begin_access(&self, identity: &ResourceIdentity) -> bool;

    /// End an access bracket previously begun
    fn end_access(&self, identity: &ResourceIdentity);

    /// Map a path to its canonical identity, if the backend can
    fn identify(&self, _path: &Path) -> Option<ResourceIdentity> {
        None
    }
}
