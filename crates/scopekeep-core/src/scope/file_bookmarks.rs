//! Filesystem-backed bookmark primitives
//!
//! Tokens record the canonical path and, on Unix, the device/inode pair of
//! the resource. Recovery follows the file id when the path no longer names
//! the same file, which is how renames surface as stale tokens.
//!
//! Token layout: `SKBM`, one version byte, a JSON record, then a SHA-256
//! digest over everything before it. The record keeps the path as base64 of
//! the raw OS bytes so names that are not UTF-8 survive.

use super::access::ScopedAccess;
use crate::error::{Error, Result};
use crate::types::{RecoveredResource, ResourceIdentity, Token};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const MAGIC: &[u8; 4] = b"SKBM";
const FORMAT_VERSION: u8 = 2;
const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + 1;

/// Default number of directory levels searched for a moved resource
pub const DEFAULT_SEARCH_DEPTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct FileId {
    device: u64,
    inode: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookmarkRecord {
    #[serde(with = "os_path")]
    path: PathBuf,
    file_id: Option<FileId>,
    is_dir: bool,
    issued_at: chrono::DateTime<chrono::Utc>,
}

/// Paths as base64 of their raw OS bytes
mod os_path {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{de, ser, Deserialize, Deserializer, Serializer};
    use std::path::{Path, PathBuf};

    #[cfg(unix)]
    fn to_bytes(path: &Path) -> Option<Vec<u8>> {
        use std::os::unix::ffi::OsStrExt;
        Some(path.as_os_str().as_bytes().to_vec())
    }

    #[cfg(not(unix))]
    fn to_bytes(path: &Path) -> Option<Vec<u8>> {
        path.to_str().map(|s| s.as_bytes().to_vec())
    }

    #[cfg(unix)]
    fn from_bytes(bytes: Vec<u8>) -> Option<PathBuf> {
        use std::os::unix::ffi::OsStringExt;
        Some(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
    }

    #[cfg(not(unix))]
    fn from_bytes(bytes: Vec<u8>) -> Option<PathBuf> {
        String::from_utf8(bytes).ok().map(PathBuf::from)
    }

    pub fn serialize<S>(path: &Path, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bytes = to_bytes(path).ok_or_else(|| {
            <S::Error as ser::Error>::custom(format!("unrepresentable path {:?}", path))
        })?;
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        let bytes = STANDARD
            .decode(text)
            .map_err(<D::Error as de::Error>::custom)?;
        from_bytes(bytes).ok_or_else(|| de::Error::custom("path is not valid on this platform"))
    }
}

#[cfg(unix)]
fn file_id(metadata: &Metadata) -> Option<FileId> {
    use std::os::unix::fs::MetadataExt;
    Some(FileId {
        device: metadata.dev(),
        inode: metadata.ino(),
    })
}

#[cfg(not(unix))]
fn file_id(_metadata: &Metadata) -> Option<FileId> {
    None
}

/// Portable [`ScopedAccess`] over plain filesystem metadata
pub struct FileBookmarks {
    search_depth: usize,
    /// Last known location of each identity, used to check bracket opens
    locations: Mutex<HashMap<ResourceIdentity, PathBuf>>,
}

impl FileBookmarks {
    pub fn new() -> Self {
        Self::with_search_depth(DEFAULT_SEARCH_DEPTH)
    }

    pub fn with_search_depth(search_depth: usize) -> Self {
        Self {
            search_depth,
            locations: Mutex::new(HashMap::new()),
        }
    }

    fn identity_for(path: &Path, metadata: &Metadata) -> ResourceIdentity {
        match file_id(metadata) {
            Some(id) => ResourceIdentity::from_file_id(id.device, id.inode),
            None => ResourceIdentity::from_canonical_path(path),
        }
    }

    fn remember(&self, identity: &ResourceIdentity, path: &Path) {
        self.locations
            .lock()
            .insert(identity.clone(), path.to_path_buf());
    }

    fn encode(record: &BookmarkRecord) -> Result<Token> {
        let body = serde_json::to_vec(record)?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + body.len() + DIGEST_LEN);
        bytes.extend_from_slice(MAGIC);
        bytes.push(FORMAT_VERSION);
        bytes.extend_from_slice(&body);
        let digest = Sha256::digest(&bytes);
        bytes.extend_from_slice(&digest);
        Ok(Token::from_bytes(bytes))
    }

    fn decode(token: &Token) -> Result<BookmarkRecord> {
        let bytes = token.as_bytes();
        if bytes.len() < HEADER_LEN + DIGEST_LEN || !bytes.starts_with(MAGIC) {
            return Err(Error::resolve_failed("malformed token"));
        }
        if bytes[MAGIC.len()] != FORMAT_VERSION {
            return Err(Error::resolve_failed(format!(
                "unsupported token version {}",
                bytes[MAGIC.len()]
            )));
        }

        let (signed, digest) = bytes.split_at(bytes.len() - DIGEST_LEN);
        if Sha256::digest(signed).as_slice() != digest {
            return Err(Error::resolve_failed("malformed token: digest mismatch"));
        }

        serde_json::from_slice(&signed[HEADER_LEN..])
            .map_err(|e| Error::resolve_failed(format!("malformed token: {}", e)))
    }

    fn matches(record: &BookmarkRecord, metadata: &Metadata) -> bool {
        if record.is_dir != metadata.is_dir() {
            return false;
        }
        match (record.file_id, file_id(metadata)) {
            (Some(recorded), Some(current)) => recorded == current,
            _ => true,
        }
    }

    /// Look for the recorded file id near its old location
    fn search_moved(&self, record: &BookmarkRecord) -> Option<PathBuf> {
        let wanted = record.file_id?;
        let parent = record.path.parent()?;
        let root = if parent.is_dir() {
            parent
        } else {
            // The containing directory itself moved
            parent.parent().filter(|p| p.is_dir())?
        };

        debug!(
            "Searching {:?} (depth {}) for moved resource",
            root, self.search_depth
        );

        WalkDir::new(root)
            .min_depth(1)
            .max_depth(self.search_depth)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .find(|entry| {
                entry
                    .metadata()
                    .ok()
                    .and_then(|m| file_id(&m))
                    .map(|id| id == wanted)
                    .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
    }
}

impl Default for FileBookmarks {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopedAccess for FileBookmarks {
    fn mint_token(&self, path: &Path) -> Result<Token> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::issue_failed(format!("resource does not exist: {}", path.display()))
            } else {
                Error::issue_failed(format!("cannot read {}: {}", path.display(), e))
            }
        })?;

        if !metadata.is_file() && !metadata.is_dir() {
            return Err(Error::issue_failed(format!(
                "not eligible for bookmarking: {}",
                path.display()
            )));
        }

        let canonical = path.canonicalize().map_err(|e| {
            Error::issue_failed(format!(
                "failed to canonicalize {}: {}",
                path.display(),
                e
            ))
        })?;

        let record = BookmarkRecord {
            path: canonical,
            file_id: file_id(&metadata),
            is_dir: metadata.is_dir(),
            issued_at: chrono::Utc::now(),
        };

        let token = Self::encode(&record)
            .map_err(|e| Error::issue_failed(format!("not eligible for bookmarking: {}", e)))?;
        info!("Minted bookmark for: {:?}", record.path);
        Ok(token)
    }

    fn recover_resource(&self, token: &Token) -> Result<RecoveredResource> {
        let record = Self::decode(token)?;

        let in_place = std::fs::metadata(&record.path)
            .ok()
            .filter(|m| Self::matches(&record, m));

        let (path, metadata, stale) = match in_place {
            Some(metadata) => (record.path.clone(), metadata, false),
            None => {
                let moved = self.search_moved(&record).ok_or_else(|| {
                    Error::resolve_failed(format!(
                        "resource no longer exists: {}",
                        record.path.display()
                    ))
                })?;
                let metadata = std::fs::metadata(&moved).map_err(|e| {
                    Error::resolve_failed(format!("cannot read {}: {}", moved.display(), e))
                })?;
                warn!("Bookmarked resource moved: {:?} -> {:?}", record.path, moved);
                (moved, metadata, true)
            }
        };

        let identity = Self::identity_for(&path, &metadata);
        self.remember(&identity, &path);

        Ok(RecoveredResource {
            identity,
            path,
            stale,
        })
    }

    fn begin_access(&self, identity: &ResourceIdentity) -> bool {
        let Some(path) = self.locations.lock().get(identity).cloned() else {
            warn!("Begin access for unknown resource {}", identity);
            return false;
        };

        match std::fs::metadata(&path) {
            Ok(_) => {
                debug!("Began access to {:?}", path);
                true
            }
            Err(e) => {
                warn!("Cannot access {:?}: {}", path, e);
                false
            }
        }
    }

    fn end_access(&self, identity: &ResourceIdentity) {
        debug!("Ended access to {}", identity);
    }

    fn identify(&self, path: &Path) -> Option<ResourceIdentity> {
        let canonical = path.canonicalize().ok()?;
        let metadata = std::fs::metadata(&canonical).ok()?;
        Some(Self::identity_for(&canonical, &metadata))
    }
}
