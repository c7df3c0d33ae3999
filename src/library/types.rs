//! Library entity types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Document
// ============================================================================

/// A stored paginated content item with reading-progress metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique identifier, also the blob store key
    pub id: String,

    /// Document title
    pub title: String,

    /// Author, when known
    pub author: Option<String>,

    /// When the document was uploaded
    pub uploaded_at: DateTime<Utc>,

    /// Total page count; 0 until the first successful open backfills it
    pub total_pages: u32,

    /// Current reading position (1-based)
    pub current_page: u32,

    /// Reading status
    pub status: ReadingStatus,

    /// Owning category, if any
    pub category_id: Option<String>,

    /// User rating, 0 (unrated) to 5
    pub rating: u8,

    /// SHA-256 of the payload, used to skip duplicate uploads
    pub content_hash: String,
}

impl Document {
    /// Create a freshly uploaded document with default reading state
    pub fn new(title: String, author: Option<String>, content_hash: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            author,
            uploaded_at: Utc::now(),
            total_pages: 0,
            current_page: 1,
            status: ReadingStatus::Queued,
            category_id: None,
            rating: 0,
            content_hash,
        }
    }

    /// Display author (or a placeholder)
    pub fn display_author(&self) -> &str {
        self.author.as_deref().unwrap_or("Unknown Author")
    }

    pub fn is_finished(&self) -> bool {
        self.status == ReadingStatus::Finished
    }
}

/// Reading status of a document
///
/// The only enforced transition is the automatic queued -> active on open;
/// everything else is a direct user edit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    #[default]
    Queued,
    Active,
    Paused,
    Finished,
    Abandoned,
}

impl ReadingStatus {
    /// Human-readable label, used for status shelves
    pub fn label(&self) -> &'static str {
        match self {
            ReadingStatus::Queued => "Queued",
            ReadingStatus::Active => "Reading",
            ReadingStatus::Paused => "Paused",
            ReadingStatus::Finished => "Finished",
            ReadingStatus::Abandoned => "Abandoned",
        }
    }
}

// ============================================================================
// Annotation
// ============================================================================

/// A user note tied to a page and optionally a quoted excerpt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Unique identifier
    pub id: String,

    /// Owning document (cascade-deleted with it)
    pub document_id: String,

    /// Page the note refers to (1-based; may exceed the current total page
    /// count, pages can be added later)
    pub page: u32,

    /// Free-form note body
    pub body: String,

    /// Exact substring the user selected when creating the note
    pub quote: Option<String>,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Annotation {
    pub fn new(document_id: String, page: u32, body: String, quote: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id,
            page,
            body,
            quote,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Category
// ============================================================================

/// A user-defined document grouping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    /// Non-empty after trim
    pub name: String,
}

impl Category {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
        }
    }
}

// ============================================================================
// Theme
// ============================================================================

/// Display theme, persisted with the library
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Sepia,
}

// ============================================================================
// Snapshot
// ============================================================================

/// The full in-memory library state
///
/// Hydrated once at startup, written through to the snapshot store after
/// every mutation. Annotations stay in insertion order (most recent first).
#[derive(Debug, Clone, Default)]
pub struct LibrarySnapshot {
    pub documents: Vec<Document>,
    pub annotations: Vec<Annotation>,
    pub categories: Vec<Category>,
    pub theme: Theme,
}

impl LibrarySnapshot {
    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn document_mut(&mut self, id: &str) -> Option<&mut Document> {
        self.documents.iter_mut().find(|d| d.id == id)
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }
}

// ============================================================================
// Operation shapes
// ============================================================================

/// Partial update applied to a document record
///
/// `category_id` is doubly optional so a patch can distinguish "leave as is"
/// (`None`) from "clear the category" (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    pub status: Option<ReadingStatus>,
    pub category_id: Option<Option<String>>,
    pub rating: Option<u8>,
    pub current_page: Option<u32>,
    pub total_pages: Option<u32>,
}

impl DocumentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: ReadingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_category(mut self, category_id: Option<String>) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_rating(mut self, rating: u8) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_current_page(mut self, page: u32) -> Self {
        self.current_page = Some(page);
        self
    }

    pub fn with_total_pages(mut self, pages: u32) -> Self {
        self.total_pages = Some(pages);
        self
    }
}

/// Why an upload was not ingested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Magic bytes matched no supported format
    UnrecognizedFormat,
    /// Payload hash matches an existing document (its id)
    DuplicateOf(String),
    /// Blob write failed
    StorageFailed(String),
}

/// An upload the batch left out, with the reason
#[derive(Debug, Clone)]
pub struct SkippedUpload {
    pub file_name: String,
    pub reason: SkipReason,
}

/// Result of `add_documents`
#[derive(Debug, Clone, Default)]
pub struct AddOutcome {
    /// Records created, in input order
    pub added: Vec<Document>,
    /// Inputs skipped, with per-file reasons
    pub skipped: Vec<SkippedUpload>,
}

impl AddOutcome {
    pub fn added_count(&self) -> usize {
        self.added.len()
    }
}

/// Result of `delete_document`
#[derive(Debug, Clone)]
pub struct RemovedDocument {
    pub document: Document,
    /// The caller should close its viewer when this was the open document
    pub was_open: bool,
}

/// One failed item of a batch delete
#[derive(Debug, Clone)]
pub struct BatchDeleteFailure {
    pub id: String,
    pub reason: String,
}

/// Result of `batch_delete`; partial failures do not block the rest
#[derive(Debug, Clone, Default)]
pub struct BatchDeleteOutcome {
    /// Titles of documents actually removed, for user feedback
    pub removed_titles: Vec<String>,
    pub failures: Vec<BatchDeleteFailure>,
}

/// Result of `open_document`
#[derive(Debug, Clone)]
pub struct OpenedDocument {
    /// Record after the queued -> active transition
    pub document: Document,
    /// Payload for the rendering collaborator
    pub payload: Vec<u8>,
}

/// Reading position written back on close
#[derive(Debug, Clone, Copy)]
pub struct CloseProgress {
    pub current_page: u32,
    /// Backfills `total_pages` on the first successful open
    pub total_pages: u32,
}

/// Aggregate counts over the library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryStats {
    pub total_documents: usize,
    pub total_annotations: usize,
    pub total_categories: usize,
    pub by_status: HashMap<String, usize>,
}
