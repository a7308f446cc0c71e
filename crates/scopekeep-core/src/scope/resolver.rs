//! Token resolution and holder acquisition

use super::access::ScopedAccess;
use super::registrar::{ReleaseHandle, ScopeRegistrar};
use crate::error::{Error, Result};
use crate::types::{ResourceIdentity, Token};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// A resolved token with one acquired holder
#[derive(Debug)]
pub struct ResolveResult {
    pub identity: ResourceIdentity,
    pub path: PathBuf,
    /// The token still works but should be reissued from `path`
    pub stale: bool,
    pub handle: ReleaseHandle,
}

/// Recovers the resource behind a token and opens its access bracket
pub struct TokenResolver {
    access: Arc<dyn ScopedAccess>,
    registrar: Arc<ScopeRegistrar>,
}

impl TokenResolver {
    pub fn new(access: Arc<dyn ScopedAccess>, registrar: Arc<ScopeRegistrar>) -> Self {
        Self { access, registrar }
    }

    pub fn resolve(&self, token: &Token) -> Result<ResolveResult> {
        if token.is_empty() {
            return Err(Error::invalid_argument("missing bookmark data"));
        }

        let recovered = self.access.recover_resource(token).map_err(|e| match e {
            Error::Bookmark(_) => e,
            other => Error::resolve_failed(other.to_string()),
        })?;

        if recovered.stale {
            warn!(
                "Token {} is stale, resource now at {:?}",
                token.fingerprint(),
                recovered.path
            );
        }

        let handle = self.registrar.acquire(&recovered.identity)?;
        debug!(
            "Resolved token {} to {:?} ({})",
            token.fingerprint(),
            recovered.path,
            recovered.identity
        );

        Ok(ResolveResult {
            identity: recovered.identity,
            path: recovered.path,
            stale: recovered.stale,
            handle,
        })
    }
}
