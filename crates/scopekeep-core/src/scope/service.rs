//! Application-facing bookmark operations

use super::access::ScopedAccess;
use super::file_bookmarks::FileBookmarks;
use super::issuer::TokenIssuer;
use super::registrar::{ReleaseHandle, ScopeRegistrar};
use super::resolver::TokenResolver;
use crate::config::ScopeConfig;
use crate::error::Result;
use crate::types::{RefreshedResolve, ResolvedPath, ResourceIdentity, Token};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handles acquired through `resolve_token` that the application has not
/// released yet. Keyed by identity; paths only index into it, by the exact
/// string handed back in [`ResolvedPath`].
#[derive(Default)]
struct Outstanding {
    handles: HashMap<ResourceIdentity, Vec<ReleaseHandle>>,
    paths: HashMap<String, ResourceIdentity>,
}

/// Create, resolve and release bookmarks by path
pub struct BookmarkService {
    config: ScopeConfig,
    access: Arc<dyn ScopedAccess>,
    issuer: TokenIssuer,
    resolver: TokenResolver,
    registrar: Arc<ScopeRegistrar>,
    outstanding: Mutex<Outstanding>,
}

impl BookmarkService {
    pub fn new(access: Arc<dyn ScopedAccess>, config: ScopeConfig) -> Self {
        let registrar = Arc::new(ScopeRegistrar::new(Arc::clone(&access)));
        Self {
            config,
            issuer: TokenIssuer::new(Arc::clone(&access)),
            resolver: TokenResolver::new(Arc::clone(&access), Arc::clone(&registrar)),
            access,
            registrar,
            outstanding: Mutex::new(Outstanding::default()),
        }
    }

    /// Service over [`FileBookmarks`] using the configured search depth
    pub fn with_file_bookmarks(config: ScopeConfig) -> Self {
        let access = Arc::new(FileBookmarks::with_search_depth(config.search_depth));
        Self::new(access, config)
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    pub fn registrar(&self) -> &Arc<ScopeRegistrar> {
        &self.registrar
    }

    pub fn create_token(&self, path: impl AsRef<Path>) -> Result<Token> {
        self.issuer.issue(path)
    }

    /// Resolve a token and take one holder on its resource
    pub fn resolve_token(&self, token: &Token) -> Result<ResolvedPath> {
        self.track(token).map(|(resolved, _)| resolved)
    }

    /// Resolve and record the holder, returning the real path alongside the
    /// string handed to the caller
    fn track(&self, token: &Token) -> Result<(ResolvedPath, PathBuf)> {
        let result = self.resolver.resolve(token)?;
        let path = result.path.to_string_lossy().into_owned();

        let mut outstanding = self.outstanding.lock();
        outstanding
            .paths
            .insert(path.clone(), result.identity.clone());
        outstanding
            .handles
            .entry(result.identity)
            .or_default()
            .push(result.handle);

        let resolved = ResolvedPath {
            path,
            stale: result.stale,
        };
        Ok((resolved, result.path))
    }

    /// Resolve, reissuing the token when it came back stale
    pub fn resolve_and_refresh(&self, token: &Token) -> Result<RefreshedResolve> {
        let (resolved, real_path) = self.track(token)?;

        if resolved.stale && self.config.refresh_stale_tokens {
            match self.issuer.issue(&real_path) {
                Ok(fresh) => {
                    info!("Reissued stale token for {:?}", resolved.path);
                    return Ok(RefreshedResolve {
                        path: resolved.path,
                        stale: true,
                        token: fresh,
                        reissued: true,
                    });
                }
                Err(e) => warn!("Failed to reissue token for {:?}: {}", resolved.path, e),
            }
        }

        Ok(RefreshedResolve {
            path: resolved.path,
            stale: resolved.stale,
            token: token.clone(),
            reissued: false,
        })
    }

    fn identity_of(&self, path: &Path) -> Option<ResourceIdentity> {
        let key = path.to_string_lossy();
        let known = self.outstanding.lock().paths.get(key.as_ref()).cloned();
        known.or_else(|| self.access.identify(path))
    }

    /// Drop one holder for the resource at `path`. Never fails.
    pub fn release_access(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();

        let Some(identity) = self.identity_of(path) else {
            debug!("No open bracket for {:?}", path);
            return;
        };

        let handle = {
            let mut outstanding = self.outstanding.lock();
            let handle = outstanding
                .handles
                .get_mut(&identity)
                .and_then(|handles| handles.pop());
            if outstanding
                .handles
                .get(&identity)
                .map_or(false, |handles| handles.is_empty())
            {
                outstanding.handles.remove(&identity);
                outstanding.paths.retain(|_, id| *id != identity);
            }
            handle
        };

        match handle {
            Some(handle) => self.registrar.release(&handle),
            None => debug!("No outstanding holder for {:?} ({})", path, identity),
        }
    }

    /// Holders currently open on the resource at `path`
    pub fn open_holders(&self, path: impl AsRef<Path>) -> usize {
        self.identity_of(path.as_ref())
            .map(|identity| self.registrar.holder_count(&identity))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BookmarkError, Error};
    use crate::scope::access::MockScopedAccess;
    use crate::types::RecoveredResource;

    fn report() -> ResourceIdentity {
        ResourceIdentity::from_file_id(1, 7)
    }

    fn report_access(stale: bool) -> MockScopedAccess {
        let mut access = MockScopedAccess::new();
        access
            .expect_mint_token()
            .returning(|_| Ok(Token::from_bytes(b"fresh".to_vec())));
        access.expect_recover_resource().returning(move |_| {
            Ok(RecoveredResource {
                identity: report(),
                path: PathBuf::from("/docs/report.pdf"),
                stale,
            })
        });
        access.expect_identify().returning(|_| None);
        access
    }

    #[test]
    fn test_release_access_twice_closes_once() {
        let mut access = report_access(false);
        access.expect_begin_access().times(1).return_const(true);
        access.expect_end_access().times(1).return_const(());
        let service = BookmarkService::new(Arc::new(access), ScopeConfig::default());

        let resolved = service
            .resolve_token(&Token::from_bytes(b"old".to_vec()))
            .unwrap();
        assert_eq!(service.open_holders(&resolved.path), 1);

        service.release_access(&resolved.path);
        service.release_access(&resolved.path);
        assert_eq!(service.registrar().holder_count(&report()), 0);
    }

    #[test]
    fn test_each_release_drops_one_holder() {
        let mut access = report_access(false);
        access.expect_begin_access().times(1).return_const(true);
        access.expect_end_access().times(1).return_const(());
        let service = BookmarkService::new(Arc::new(access), ScopeConfig::default());
        let token = Token::from_bytes(b"old".to_vec());

        service.resolve_token(&token).unwrap();
        service.resolve_token(&token).unwrap();
        assert_eq!(service.open_holders("/docs/report.pdf"), 2);

        service.release_access("/docs/report.pdf");
        assert_eq!(service.registrar().holder_count(&report()), 1);
        service.release_access("/docs/report.pdf");
        assert_eq!(service.registrar().holder_count(&report()), 0);
    }

    #[test]
    fn test_release_unknown_path_is_silent() {
        let mut access = MockScopedAccess::new();
        access.expect_identify().returning(|_| None);
        access.expect_end_access().never();
        let service = BookmarkService::new(Arc::new(access), ScopeConfig::default());

        service.release_access("/never/resolved");
        assert_eq!(service.open_holders("/never/resolved"), 0);
    }

    #[test]
    fn test_release_by_alias_path_uses_identity() {
        let mut access = MockScopedAccess::new();
        access.expect_recover_resource().returning(|_| {
            Ok(RecoveredResource {
                identity: report(),
                path: PathBuf::from("/docs/report.pdf"),
                stale: false,
            })
        });
        access
            .expect_identify()
            .withf(|p| p.starts_with("/Users/me"))
            .returning(|_| Some(report()));
        access.expect_begin_access().times(1).return_const(true);
        access.expect_end_access().times(1).return_const(());
        let service = BookmarkService::new(Arc::new(access), ScopeConfig::default());

        service
            .resolve_token(&Token::from_bytes(b"t".to_vec()))
            .unwrap();
        service.release_access("/Users/me/docs/report.pdf");
        assert_eq!(service.registrar().holder_count(&report()), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_release_by_handed_out_path_for_non_utf8_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let mut access = MockScopedAccess::new();
        access.expect_recover_resource().returning(|_| {
            Ok(RecoveredResource {
                identity: report(),
                path: Path::new("/docs").join(OsStr::from_bytes(b"rep\xffort.pdf")),
                stale: false,
            })
        });
        access.expect_identify().returning(|_| None);
        access.expect_begin_access().times(1).return_const(true);
        access.expect_end_access().times(1).return_const(());
        let service = BookmarkService::new(Arc::new(access), ScopeConfig::default());

        let resolved = service
            .resolve_token(&Token::from_bytes(b"t".to_vec()))
            .unwrap();
        assert_eq!(resolved.path, "/docs/rep\u{FFFD}ort.pdf");
        assert_eq!(service.open_holders(&resolved.path), 1);

        service.release_access(&resolved.path);
        assert_eq!(service.registrar().holder_count(&report()), 0);
    }

    #[test]
    fn test_stale_resolve_reissues_token() {
        let mut access = report_access(true);
        access.expect_begin_access().return_const(true);
        let service = BookmarkService::new(Arc::new(access), ScopeConfig::default());

        let old = Token::from_bytes(b"old".to_vec());
        let refreshed = service.resolve_and_refresh(&old).unwrap();
        assert!(refreshed.stale);
        assert!(refreshed.reissued);
        assert_eq!(refreshed.token.as_bytes(), b"fresh");
    }

    #[test]
    fn test_refresh_disabled_keeps_old_token() {
        let mut access = report_access(true);
        access.expect_begin_access().return_const(true);
        let config = ScopeConfig {
            refresh_stale_tokens: false,
            ..ScopeConfig::default()
        };
        let service = BookmarkService::new(Arc::new(access), config);

        let old = Token::from_bytes(b"old".to_vec());
        let refreshed = service.resolve_and_refresh(&old).unwrap();
        assert!(refreshed.stale);
        assert!(!refreshed.reissued);
        assert_eq!(refreshed.token, old);
    }

    #[test]
    fn test_failed_resolve_records_nothing() {
        let mut access = MockScopedAccess::new();
        access
            .expect_recover_resource()
            .returning(|_| Err(Error::resolve_failed("revoked")));
        access.expect_identify().returning(|_| None);
        let service = BookmarkService::new(Arc::new(access), ScopeConfig::default());

        assert!(matches!(
            service.resolve_token(&Token::from_bytes(b"t".to_vec())),
            Err(Error::Bookmark(BookmarkError::ResolveFailed(_)))
        ));
        assert_eq!(service.open_holders("/docs/report.pdf"), 0);
    }
}
