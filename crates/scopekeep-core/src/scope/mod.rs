//! Security-scoped bookmark lifecycle
//!
//! This module provides:
//! - The host primitive seam (`ScopedAccess`) and a filesystem backend
//! - Token issuing and resolving
//! - Holder counting so each resource's access bracket opens once and
//!   closes only when its last holder releases
//! - The path-based service the application talks to

mod access;
mod file_bookmarks;
mod issuer;
mod registrar;
mod resolver;
mod service;

pub use access::ScopedAccess;
pub use file_bookmarks::{FileBookmarks, DEFAULT_SEARCH_DEPTH};
pub use issuer::TokenIssuer;
pub use registrar::{ReleaseHandle, ScopeRegistrar};
pub use resolver::{ResolveResult, TokenResolver};
pub use service::BookmarkService;
