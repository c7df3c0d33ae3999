//! Unified document abstraction
//!
//! Format-agnostic types and the parser contract the library consumes. The
//! actual parsers/renderers live with the host; the core only depends on the
//! trait objects defined here.

mod error;
mod traits;
mod types;

pub use error::{ParseError, Result};
pub use traits::{DocumentParser, ParsedPages};
pub use types::{DocumentFormat, DocumentUpload, Rect, TextToken};
