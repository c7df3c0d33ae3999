//! Library coordination
//!
//! The coordinator owns the in-memory snapshot and is the single authority
//! for mutations; the arrange engine derives the shelf view from it. The two
//! never call each other: the host reads documents from the coordinator and
//! hands them to `arrange`.

mod arrange;
mod coordinator;
mod types;

pub use arrange::{arrange, GroupBy, Shelf, SortBy};
pub use coordinator::{Library, MAX_RATING};
pub use types::{
    AddOutcome, Annotation, BatchDeleteFailure, BatchDeleteOutcome, Category, CloseProgress,
    Document, DocumentPatch, LibrarySnapshot, LibraryStats, OpenedDocument, ReadingStatus,
    RemovedDocument, SkipReason, SkippedUpload, Theme,
};
