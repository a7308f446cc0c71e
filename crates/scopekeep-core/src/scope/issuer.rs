//! Token issuing

use super::access::ScopedAccess;
use crate::error::{Error, Result};
use crate::types::Token;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Turns a currently accessible path into a durable token.
///
/// Issuing never opens an access bracket.
pub struct TokenIssuer {
    access: Arc<dyn ScopedAccess>,
}

impl TokenIssuer {
    pub fn new(access: Arc<dyn ScopedAccess>) -> Self {
        Self { access }
    }

    pub fn issue(&self, path: impl AsRef<Path>) -> Result<Token> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_argument("missing path"));
        }

        debug!("Issuing token for: {:?}", path);

        let token = self.access.mint_token(path).map_err(|e| match e {
            Error::Bookmark(_) => e,
            other => Error::issue_failed(other.to_string()),
        })?;

        if token.is_empty() {
            warn!("Bookmark primitive returned an empty token for {:?}", path);
            return Err(Error::issue_failed(format!(
                "no bookmark data produced for {}",
                path.display()
            )));
        }

        debug!("Issued token {} for {:?}", token.fingerprint(), path);
        Ok(token)
    }
}
