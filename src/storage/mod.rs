//! Storage module for the dual-store persistence model
//!
//! Small mutable metadata goes through the snapshot store (keyed serialized
//! blobs); large immutable payloads go through the blob store (keyed by
//! document id). Both are injected ports so the library can run against
//! in-memory fakes in tests.

mod blob;
mod snapshot;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use snapshot::{MemorySnapshotStore, SnapshotStore, SqliteSnapshotStore};

/// Fixed logical keys for the snapshot store
pub mod keys {
    pub const DOCUMENTS: &str = "library.documents";
    pub const ANNOTATIONS: &str = "library.annotations";
    pub const CATEGORIES: &str = "library.categories";
    pub const THEME: &str = "library.theme";
}
