//! Error types for the watch engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for watch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors that can occur while validating or running a watch.
#[derive(Error, Debug)]
pub enum WatchError {
    /// Watched directory does not exist.
    #[error("directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// Configured path is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Name pattern failed to compile.
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The keep/max pair violates `max >= keep`.
    #[error("max {max} must not be below keep {keep}")]
    InvalidLimits { keep: usize, max: usize },

    /// A watch with the same name is already registered.
    #[error("already watching: {0}")]
    AlreadyWatching(String),

    /// Directory scan failed.
    #[error("scan error: {0}")]
    Scan(#[from] walkdir::Error),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
