//! Scopekeep Core Library
//!
//! Persistent, revocable access to filesystem resources outside a sandbox,
//! using opaque bookmark tokens instead of raw paths:
//! - Token issuing and resolving over host bookmark primitives
//! - Per-resource holder counting around access brackets
//! - The host method channel
//! - SQLite-based token persistence
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     scopekeep-core                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  scope/        - Issuer, resolver, registrar, service       │
//! │  channel/      - Method channel dispatch and server         │
//! │  storage/      - SQLite token store                         │
//! │  types/        - Tokens, identities, shared records         │
//! │  config.rs     - Runtime configuration                      │
//! │  error.rs      - Error types                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod scope;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;

pub use channel::{ChannelHandle, ChannelServer, MethodCall, MethodHandler, MethodResponse};
pub use config::ScopeConfig;
pub use scope::{
    BookmarkService, FileBookmarks, ReleaseHandle, ResolveResult, ScopeRegistrar, ScopedAccess,
    TokenIssuer, TokenResolver,
};
pub use storage::BookmarkStore;
