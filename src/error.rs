//! Library error types

use thiserror::Error;

use crate::document::ParseError;

/// Errors surfaced by library operations
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Operating on an id no longer in the snapshot
    #[error("Not found: {0}")]
    NotFound(String),

    /// Durable-store read/write failure; in-memory state remains the source
    /// of truth for the session, durability is not guaranteed until resolved
    #[error("Storage failure: {0}")]
    Storage(#[source] anyhow::Error),

    /// Document payload could not be parsed for search or relocation
    #[error("Parse failure: {0}")]
    Parse(#[from] ParseError),
}

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, LibraryError>;
