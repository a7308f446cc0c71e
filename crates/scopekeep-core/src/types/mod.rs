//! Core type definitions for Scopekeep
//!
//! Tokens, resource identities and the records exchanged between the
//! issuer, resolver and registrar.

mod identity;
mod token;

pub use identity::ResourceIdentity;
pub use token::Token;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output of the recover primitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredResource {
    pub identity: ResourceIdentity,
    pub path: PathBuf,
    /// The resource moved or was renamed since the token was minted
    pub stale: bool,
}

/// Per-identity holder bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeEntry {
    pub holder_count: usize,
    pub bracket_open: bool,
}

/// Path handed back to the application after a resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPath {
    pub path: String,
    pub stale: bool,
}

/// Resolve result carrying a replacement token when the old one went stale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedResolve {
    pub path: String,
    pub stale: bool,
    pub token: Token,
    /// True when `token` differs from the token that was resolved
    pub reissued: bool,
}

/// Token persisted under an application-chosen label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBookmark {
    pub label: String,
    pub token: Token,
    /// Path the token resolved to when last saved
    pub path: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
