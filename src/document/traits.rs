//! Document parser contract
//!
//! The parser/renderer is an external collaborator: the library hands it a
//! payload and gets back page count and per-page text tokens. Implementations
//! may fail on any payload; failures are surfaced per operation.

use async_trait::async_trait;

use super::error::Result;
use super::types::TextToken;

/// Format-agnostic document parser
///
/// `parse` consumes its own copy of the payload, so callers are free to reuse
/// or drop their buffer while extraction is in flight.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Parse a payload into a paginated text view
    async fn parse(&self, bytes: Vec<u8>) -> Result<Box<dyn ParsedPages>>;
}

/// A parsed document's paginated text layer
///
/// Pages are 1-based, matching page numbers everywhere else in the library.
pub trait ParsedPages: Send + Sync {
    /// Number of pages in the document
    fn page_count(&self) -> u32;

    /// Ordered text tokens for one page
    fn page_tokens(&self, page: u32) -> Result<Vec<TextToken>>;
}
