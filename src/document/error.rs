//! Parser error types
//!
//! Failures reported by the external parser/renderer collaborator. Any
//! payload may fail to parse; callers surface this per operation.

use thiserror::Error;

/// Errors from parsing a document payload
#[derive(Debug, Error)]
pub enum ParseError {
    /// Payload is not a parseable document
    #[error("Malformed document: {0}")]
    Malformed(String),

    /// Requested page does not exist
    #[error("Page {page} out of bounds (document has {page_count} pages)")]
    PageOutOfBounds { page: u32, page_count: u32 },

    /// Text layer could not be extracted for a page
    #[error("Text extraction failed on page {page}: {reason}")]
    TextExtraction { page: u32, reason: String },
}

/// Result type alias for parser operations
pub type Result<T> = std::result::Result<T, ParseError>;
