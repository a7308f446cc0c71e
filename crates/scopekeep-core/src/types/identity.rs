//! Canonical resource identity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Canonical key for a filesystem resource.
///
/// Two path strings can name the same resource and one path string can name
/// different resources over time, so scope bookkeeping never keys on raw paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceIdentity(String);

impl ResourceIdentity {
    /// Identity from a device/inode pair
    pub fn from_file_id(device: u64, inode: u64) -> Self {
        Self(format!("file:{}:{}", device, inode))
    }

    /// Identity from a path the OS already canonicalized
    pub fn from_canonical_path(path: impl AsRef<Path>) -> Self {
        Self(format!("path:{}", path.as_ref().to_string_lossy()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_identity() {
        let a = ResourceIdentity::from_file_id(16777220, 4242);
        assert_eq!(a.as_str(), "file:16777220:4242");
        assert_eq!(a, ResourceIdentity::from_file_id(16777220, 4242));
        assert_ne!(a, ResourceIdentity::from_file_id(16777220, 4243));
    }

    #[test]
    fn test_path_and_file_ids_never_collide() {
        let by_path = ResourceIdentity::from_canonical_path("/docs/report.pdf");
        assert_eq!(by_path.to_string(), "path:/docs/report.pdf");
        assert_ne!(by_path, ResourceIdentity::from_file_id(0, 0));
    }
}
