//! Error types for Scopekeep Core

use thiserror::Error;

/// Main error type for Scopekeep operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Bookmark error: {0}")]
    Bookmark(#[from] BookmarkError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Token issue/resolve errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookmarkError {
    #[error("Issue failed: {0}")]
    IssueFailed(String),

    #[error("Resolve failed: {0}")]
    ResolveFailed(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Connection pool error: {0}")]
    Pool(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse config {path}: {reason}")]
    Parse { path: String, reason: String },
}

impl Error {
    pub fn issue_failed(reason: impl Into<String>) -> Self {
        Error::Bookmark(BookmarkError::IssueFailed(reason.into()))
    }

    pub fn resolve_failed(reason: impl Into<String>) -> Self {
        Error::Bookmark(BookmarkError::ResolveFailed(reason.into()))
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Error::Bookmark(BookmarkError::InvalidArgument(reason.into()))
    }

    /// Error code reported to the host over the method channel
    pub fn channel_code(&self) -> &'static str {
        match self {
            Error::Bookmark(BookmarkError::IssueFailed(_)) => "BOOKMARK",
            Error::Bookmark(BookmarkError::ResolveFailed(_)) => "RESOLVE",
            Error::Bookmark(BookmarkError::InvalidArgument(_)) => "ARG",
            Error::Storage(_) => "STORAGE",
            Error::Config(_) => "CONFIG",
            Error::Json(_) | Error::Io(_) | Error::Internal(_) => "INTERNAL",
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<r2d2::Error> for Error {
    fn from(err: r2d2::Error) -> Self {
        Error::Storage(StorageError::Pool(err.to_string()))
    }
}

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;
