//! Library coordinator
//!
//! Single mutation authority over the in-memory library snapshot. Every
//! mutating operation takes the write lock for its whole body, including the
//! port I/O it performs, so no two mutations interleave. Durable writes go
//! through after each mutation; a failed write is returned as an error while
//! the in-memory change stands, so the session keeps a consistent view.
//!
//! Cross-entity invariants enforced here:
//! - a document record never becomes visible before its blob is stored
//! - deleting a document removes its blob first and cascades its annotations
//! - deleting a category clears `category_id` on referencing documents

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::document::{DocumentFormat, DocumentUpload};
use crate::error::{LibraryError, Result};
use crate::export::{self, ExportFormat};
use crate::storage::{keys, BlobStore, SnapshotStore};

use super::types::{
    AddOutcome, Annotation, BatchDeleteFailure, BatchDeleteOutcome, Category, CloseProgress,
    Document, DocumentPatch, LibrarySnapshot, LibraryStats, OpenedDocument, ReadingStatus,
    RemovedDocument, SkipReason, SkippedUpload, Theme,
};

/// Highest rating a document can carry
pub const MAX_RATING: u8 = 5;

// ============================================================================
// Coordinator
// ============================================================================

/// The library coordinator
///
/// Cheap to clone; all clones share the same snapshot and ports.
#[derive(Clone)]
pub struct Library {
    inner: Arc<LibraryInner>,
}

struct LibraryInner {
    /// In-memory snapshot, the source of truth for the session
    state: RwLock<LibrarySnapshot>,

    /// Id of the currently open document, if any
    open_id: RwLock<Option<String>>,

    /// Durable small-object store for the snapshot collections
    snapshot_store: Arc<dyn SnapshotStore>,

    /// Durable large-object store for document payloads
    blob_store: Arc<dyn BlobStore>,
}

impl Library {
    /// Hydrate the library from durable storage
    ///
    /// Absent or corrupt entries degrade to empty collections with a warning;
    /// hydration itself never fails.
    pub async fn hydrate(
        snapshot_store: Arc<dyn SnapshotStore>,
        blob_store: Arc<dyn BlobStore>,
    ) -> Self {
        let documents: Vec<Document> = load_entry(&*snapshot_store, keys::DOCUMENTS).await;
        let annotations: Vec<Annotation> = load_entry(&*snapshot_store, keys::ANNOTATIONS).await;
        let categories: Vec<Category> = load_entry(&*snapshot_store, keys::CATEGORIES).await;
        let theme: Theme = load_entry(&*snapshot_store, keys::THEME).await;

        tracing::info!(
            documents = documents.len(),
            annotations = annotations.len(),
            categories = categories.len(),
            "Hydrated library snapshot"
        );

        Self {
            inner: Arc::new(LibraryInner {
                state: RwLock::new(LibrarySnapshot {
                    documents,
                    annotations,
                    categories,
                    theme,
                }),
                open_id: RwLock::new(None),
                snapshot_store,
                blob_store,
            }),
        }
    }

    // ========================================================================
    // Document lifecycle
    // ========================================================================

    /// Ingest a batch of uploads
    ///
    /// Each valid input gets its blob stored before its record is appended.
    /// Non-document inputs, duplicates of a live document's payload, and
    /// per-file blob failures are skipped without aborting the batch; the
    /// outcome carries a reason for every skip.
    pub async fn add_documents(&self, uploads: Vec<DocumentUpload>) -> Result<AddOutcome> {
        if uploads.is_empty() {
            return Ok(AddOutcome::default());
        }

        let mut state = self.inner.state.write().await;
        let mut outcome = AddOutcome::default();

        for upload in uploads {
            if DocumentFormat::from_magic_bytes(&upload.bytes).is_none() {
                tracing::debug!(file_name = %upload.file_name, "Skipped unrecognized upload");
                outcome.skipped.push(SkippedUpload {
                    file_name: upload.file_name,
                    reason: SkipReason::UnrecognizedFormat,
                });
                continue;
            }

            let content_hash = compute_hash(&upload.bytes);
            if let Some(existing) = state
                .documents
                .iter()
                .find(|d| d.content_hash == content_hash)
            {
                tracing::info!(
                    file_name = %upload.file_name,
                    duplicate_of = %existing.id,
                    "Skipped duplicate upload"
                );
                outcome.skipped.push(SkippedUpload {
                    file_name: upload.file_name,
                    reason: SkipReason::DuplicateOf(existing.id.clone()),
                });
                continue;
            }

            let document = Document::new(upload.title_or_stem(), upload.author.clone(), content_hash);

            // Blob write must land before the record becomes visible
            if let Err(e) = self.inner.blob_store.put(&document.id, &upload.bytes).await {
                tracing::warn!(
                    file_name = %upload.file_name,
                    error = %e,
                    "Blob write failed, upload skipped"
                );
                outcome.skipped.push(SkippedUpload {
                    file_name: upload.file_name,
                    reason: SkipReason::StorageFailed(e.to_string()),
                });
                continue;
            }

            tracing::info!(document_id = %document.id, title = %document.title, "Added document");
            outcome.added.push(document.clone());
            state.documents.push(document);
        }

        if !outcome.added.is_empty() {
            self.inner.persist_documents(&state).await?;
        }

        Ok(outcome)
    }

    /// Delete one document, its blob, and all its annotations
    ///
    /// The blob is removed first; if that fails the metadata stays untouched,
    /// so no record can outlive losing its payload half-way. `was_open` tells
    /// the caller to close its viewer.
    pub async fn delete_document(&self, id: &str) -> Result<RemovedDocument> {
        let mut state = self.inner.state.write().await;

        let position = state
            .documents
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| LibraryError::NotFound(format!("document {id}")))?;

        self.inner
            .blob_store
            .delete(id)
            .await
            .map_err(LibraryError::Storage)?;

        let document = state.documents.remove(position);
        state.annotations.retain(|a| a.document_id != id);

        let was_open = {
            let mut open = self.inner.open_id.write().await;
            if open.as_deref() == Some(id) {
                *open = None;
                true
            } else {
                false
            }
        };

        self.inner.persist_documents(&state).await?;
        self.inner.persist_annotations(&state).await?;

        tracing::info!(document_id = %id, title = %document.title, "Deleted document");
        Ok(RemovedDocument { document, was_open })
    }

    /// Delete a set of documents
    ///
    /// Per-id failures (unknown id, missing blob, storage error) are logged
    /// and collected without blocking the remaining ids. Returns the titles
    /// actually removed, in library order, for user feedback.
    pub async fn batch_delete(&self, ids: &HashSet<String>) -> Result<BatchDeleteOutcome> {
        if ids.is_empty() {
            return Ok(BatchDeleteOutcome::default());
        }

        let mut state = self.inner.state.write().await;
        let mut outcome = BatchDeleteOutcome::default();

        // Attempt deletions in library order so removed titles read naturally
        let targets: Vec<String> = state
            .documents
            .iter()
            .filter(|d| ids.contains(&d.id))
            .map(|d| d.id.clone())
            .collect();

        let mut removed_ids: HashSet<String> = HashSet::new();
        for id in &targets {
            match self.inner.blob_store.delete(id).await {
                Ok(()) => {
                    if let Some(position) = state.documents.iter().position(|d| &d.id == id) {
                        let document = state.documents.remove(position);
                        outcome.removed_titles.push(document.title);
                        removed_ids.insert(document.id);
                    }
                }
                Err(e) => {
                    tracing::warn!(document_id = %id, error = %e, "Batch delete item failed");
                    outcome.failures.push(BatchDeleteFailure {
                        id: id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        // Ids that matched no document
        let mut unknown: Vec<&String> = ids.iter().filter(|id| !targets.contains(id)).collect();
        unknown.sort();
        for id in unknown {
            outcome.failures.push(BatchDeleteFailure {
                id: id.clone(),
                reason: "not found".to_string(),
            });
        }

        if !removed_ids.is_empty() {
            state
                .annotations
                .retain(|a| !removed_ids.contains(&a.document_id));

            {
                let mut open = self.inner.open_id.write().await;
                if open.as_deref().map_or(false, |id| removed_ids.contains(id)) {
                    *open = None;
                }
            }

            self.inner.persist_documents(&state).await?;
            self.inner.persist_annotations(&state).await?;
        }

        tracing::info!(
            removed = outcome.removed_titles.len(),
            failed = outcome.failures.len(),
            "Batch delete finished"
        );
        Ok(outcome)
    }

    /// Merge a partial update into a document record
    ///
    /// The user-edit entry to the patch path shared with open and close.
    /// Silently ignores unknown ids.
    pub async fn update_document(&self, id: &str, patch: DocumentPatch) -> Result<()> {
        let mut state = self.inner.state.write().await;

        let Some(document) = state.document_mut(id) else {
            tracing::debug!(document_id = %id, "Update for unknown document ignored");
            return Ok(());
        };

        apply_patch(document, patch);
        self.inner.persist_documents(&state).await
    }

    /// Open a document for reading
    ///
    /// Returns the payload for the rendering collaborator and records the
    /// open id. Opening a queued document activates it; that is the only
    /// enforced status transition.
    pub async fn open_document(&self, id: &str) -> Result<OpenedDocument> {
        let mut state = self.inner.state.write().await;

        let Some(document) = state.document_mut(id) else {
            return Err(LibraryError::NotFound(format!("document {id}")));
        };

        let payload = self
            .inner
            .blob_store
            .get(id)
            .await
            .map_err(LibraryError::Storage)?
            .ok_or_else(|| {
                LibraryError::Storage(anyhow::anyhow!("no blob stored for document {id}"))
            })?;

        let went_active = document.status == ReadingStatus::Queued;
        if went_active {
            apply_patch(document, DocumentPatch::new().with_status(ReadingStatus::Active));
        }
        let opened = document.clone();

        {
            let mut open = self.inner.open_id.write().await;
            *open = Some(opened.id.clone());
        }

        if went_active {
            self.inner.persist_documents(&state).await?;
        }

        tracing::info!(document_id = %id, title = %opened.title, "Opened document");
        Ok(OpenedDocument {
            document: opened,
            payload,
        })
    }

    /// Close a document, writing back reading progress
    ///
    /// The explicit call site for the current-page write-back and the
    /// total-page backfill after the first successful open. No-op for
    /// unknown ids.
    pub async fn close_document(&self, id: &str, progress: CloseProgress) -> Result<()> {
        let mut state = self.inner.state.write().await;

        let Some(document) = state.document_mut(id) else {
            tracing::debug!(document_id = %id, "Close for unknown document ignored");
            return Ok(());
        };

        apply_patch(
            document,
            DocumentPatch::new()
                .with_current_page(progress.current_page)
                .with_total_pages(progress.total_pages),
        );

        {
            let mut open = self.inner.open_id.write().await;
            if open.as_deref() == Some(id) {
                *open = None;
            }
        }

        self.inner.persist_documents(&state).await?;

        tracing::info!(
            document_id = %id,
            current_page = progress.current_page,
            total_pages = progress.total_pages,
            "Closed document"
        );
        Ok(())
    }

    /// Fetch a document's payload for search
    ///
    /// Takes no library lock across the blob read, so an in-flight search
    /// holds its own copy and may outlive a concurrent delete; stale results
    /// are the caller's to discard.
    pub async fn document_payload(&self, id: &str) -> Result<Vec<u8>> {
        {
            let state = self.inner.state.read().await;
            if state.document(id).is_none() {
                return Err(LibraryError::NotFound(format!("document {id}")));
            }
        }

        match self
            .inner
            .blob_store
            .get(id)
            .await
            .map_err(LibraryError::Storage)?
        {
            Some(bytes) => Ok(bytes),
            None => {
                // Deleted between the existence check and the blob read
                let state = self.inner.state.read().await;
                if state.document(id).is_none() {
                    Err(LibraryError::NotFound(format!("document {id}")))
                } else {
                    Err(LibraryError::Storage(anyhow::anyhow!(
                        "no blob stored for document {id}"
                    )))
                }
            }
        }
    }

    // ========================================================================
    // Categories
    // ========================================================================

    /// Create a category; blank-after-trim names are a no-op
    pub async fn add_category(&self, name: &str) -> Result<Option<Category>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let mut state = self.inner.state.write().await;
        let category = Category::new(name.to_string());
        state.categories.push(category.clone());
        self.inner.persist_categories(&state).await?;

        tracing::info!(category_id = %category.id, name = %category.name, "Added category");
        Ok(Some(category))
    }

    /// Delete a category, clearing it from every referencing document
    ///
    /// Documents survive; referential integrity is kept by clearing, not
    /// cascading. No-op for unknown ids.
    pub async fn delete_category(&self, id: &str) -> Result<()> {
        let mut state = self.inner.state.write().await;

        let before = state.categories.len();
        state.categories.retain(|c| c.id != id);
        if state.categories.len() == before {
            return Ok(());
        }

        let mut cleared = 0usize;
        for document in state
            .documents
            .iter_mut()
            .filter(|d| d.category_id.as_deref() == Some(id))
        {
            document.category_id = None;
            cleared += 1;
        }

        self.inner.persist_categories(&state).await?;
        if cleared > 0 {
            self.inner.persist_documents(&state).await?;
        }

        tracing::info!(category_id = %id, cleared, "Deleted category");
        Ok(())
    }

    // ========================================================================
    // Annotations
    // ========================================================================

    /// Add an annotation to a live document
    ///
    /// No-op when both body and quote are empty after trim, or when the
    /// document does not exist. New annotations are prepended; the
    /// most-recent-first ordering comes from insertion, not timestamp sorting,
    /// so same-millisecond inserts keep their order.
    pub async fn add_annotation(
        &self,
        document_id: &str,
        page: u32,
        body: &str,
        quote: Option<&str>,
    ) -> Result<Option<Annotation>> {
        let body_empty = body.trim().is_empty();
        let quote_empty = quote.map_or(true, |q| q.trim().is_empty());
        if body_empty && quote_empty {
            return Ok(None);
        }

        let mut state = self.inner.state.write().await;
        if state.document(document_id).is_none() {
            tracing::debug!(document_id = %document_id, "Annotation for unknown document ignored");
            return Ok(None);
        }

        let annotation = Annotation::new(
            document_id.to_string(),
            page.max(1),
            body.to_string(),
            quote.map(str::to_string),
        );
        state.annotations.insert(0, annotation.clone());
        self.inner.persist_annotations(&state).await?;

        tracing::info!(
            annotation_id = %annotation.id,
            document_id = %document_id,
            page = annotation.page,
            "Added annotation"
        );
        Ok(Some(annotation))
    }

    /// Delete an annotation; no-op for unknown ids
    pub async fn delete_annotation(&self, id: &str) -> Result<()> {
        let mut state = self.inner.state.write().await;

        let before = state.annotations.len();
        state.annotations.retain(|a| a.id != id);
        if state.annotations.len() == before {
            return Ok(());
        }

        self.inner.persist_annotations(&state).await?;
        tracing::info!(annotation_id = %id, "Deleted annotation");
        Ok(())
    }

    /// Export a document's notes, sorted by page ascending
    ///
    /// `None` when the document has no annotations; the caller shows the
    /// user-facing notice.
    pub async fn export_notes(
        &self,
        document_id: &str,
        format: ExportFormat,
    ) -> Result<Option<String>> {
        let state = self.inner.state.read().await;

        let Some(document) = state.document(document_id) else {
            return Err(LibraryError::NotFound(format!("document {document_id}")));
        };

        let mut annotations: Vec<Annotation> = state
            .annotations
            .iter()
            .filter(|a| a.document_id == document_id)
            .cloned()
            .collect();
        // Export order is by page, not recency; sort is stable so ties keep
        // their insertion order
        annotations.sort_by_key(|a| a.page);

        Ok(export::render(document, &annotations, format))
    }

    // ========================================================================
    // Theme
    // ========================================================================

    pub async fn set_theme(&self, theme: Theme) -> Result<()> {
        let mut state = self.inner.state.write().await;
        state.theme = theme;
        self.inner.persist_theme(&state).await
    }

    pub async fn theme(&self) -> Theme {
        self.inner.state.read().await.theme
    }

    // ========================================================================
    // Read accessors
    // ========================================================================

    /// All documents, in upload order
    pub async fn documents(&self) -> Vec<Document> {
        self.inner.state.read().await.documents.clone()
    }

    pub async fn document(&self, id: &str) -> Option<Document> {
        self.inner.state.read().await.document(id).cloned()
    }

    pub async fn categories(&self) -> Vec<Category> {
        self.inner.state.read().await.categories.clone()
    }

    /// A document's annotations, most recent first
    pub async fn annotations_for(&self, document_id: &str) -> Vec<Annotation> {
        self.inner
            .state
            .read()
            .await
            .annotations
            .iter()
            .filter(|a| a.document_id == document_id)
            .cloned()
            .collect()
    }

    /// Id of the currently open document, if any
    pub async fn open_document_id(&self) -> Option<String> {
        self.inner.open_id.read().await.clone()
    }

    /// Aggregate counts over the library
    pub async fn stats(&self) -> LibraryStats {
        let state = self.inner.state.read().await;

        let mut by_status: HashMap<String, usize> = HashMap::new();
        for document in &state.documents {
            *by_status.entry(document.status.label().to_string()).or_default() += 1;
        }

        LibraryStats {
            total_documents: state.documents.len(),
            total_annotations: state.annotations.len(),
            total_categories: state.categories.len(),
            by_status,
        }
    }
}

// ============================================================================
// Write-through persistence
// ============================================================================

impl LibraryInner {
    async fn persist_documents(&self, state: &LibrarySnapshot) -> Result<()> {
        self.persist(keys::DOCUMENTS, &state.documents).await
    }

    async fn persist_annotations(&self, state: &LibrarySnapshot) -> Result<()> {
        self.persist(keys::ANNOTATIONS, &state.annotations).await
    }

    async fn persist_categories(&self, state: &LibrarySnapshot) -> Result<()> {
        self.persist(keys::CATEGORIES, &state.categories).await
    }

    async fn persist_theme(&self, state: &LibrarySnapshot) -> Result<()> {
        self.persist(keys::THEME, &state.theme).await
    }

    async fn persist<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| LibraryError::Storage(e.into()))?;
        self.snapshot_store
            .set(key, &bytes)
            .await
            .map_err(LibraryError::Storage)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Read one snapshot entry, degrading to the default on any failure
async fn load_entry<T: DeserializeOwned + Default>(store: &dyn SnapshotStore, key: &str) -> T {
    let bytes = match store.get(key).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(key, error = %e, "Snapshot read failed, starting empty");
            return T::default();
        }
    };

    match bytes {
        Some(bytes) => match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Corrupt snapshot entry, starting empty");
                T::default()
            }
        },
        None => T::default(),
    }
}

/// Merge a patch into a document record
///
/// The one place field changes happen: `update_document` routes user edits
/// here, `open_document` the queued -> active transition, `close_document`
/// the progress write-back. Rating is clamped and pages stay 1-based.
fn apply_patch(document: &mut Document, patch: DocumentPatch) {
    if let Some(status) = patch.status {
        document.status = status;
    }
    if let Some(category_id) = patch.category_id {
        document.category_id = category_id;
    }
    if let Some(rating) = patch.rating {
        document.rating = rating.min(MAX_RATING);
    }
    if let Some(page) = patch.current_page {
        document.current_page = page.max(1);
    }
    if let Some(pages) = patch.total_pages {
        document.total_pages = pages;
    }
}

/// Compute the SHA-256 hash of a payload as lowercase hex
fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryBlobStore, MemorySnapshotStore};

    fn pdf_upload(name: &str, seed: &str) -> DocumentUpload {
        DocumentUpload::new(name, format!("%PDF-1.4 {seed}").into_bytes())
    }

    async fn memory_library() -> (Library, Arc<MemorySnapshotStore>, Arc<MemoryBlobStore>) {
        let snapshot_store = Arc::new(MemorySnapshotStore::new());
        let blob_store = Arc::new(MemoryBlobStore::new());
        let library = Library::hydrate(snapshot_store.clone(), blob_store.clone()).await;
        (library, snapshot_store, blob_store)
    }

    /// Snapshot store whose writes always fail
    struct FailingSnapshotStore;

    #[async_trait::async_trait]
    impl SnapshotStore for FailingSnapshotStore {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &[u8]) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[tokio::test]
    async fn test_add_documents_defaults_and_count() {
        let (library, _, blobs) = memory_library().await;

        let outcome = library
            .add_documents(vec![pdf_upload("dune.pdf", "a"), pdf_upload("emma.pdf", "b")])
            .await
            .unwrap();

        assert_eq!(outcome.added_count(), 2);
        assert!(outcome.skipped.is_empty());
        assert_eq!(blobs.len().await, 2);

        let documents = library.documents().await;
        assert_eq!(documents.len(), 2);
        for document in &documents {
            assert_eq!(document.status, ReadingStatus::Queued);
            assert_eq!(document.rating, 0);
            assert_eq!(document.current_page, 1);
            assert_eq!(document.total_pages, 0);
        }
        assert_eq!(documents[0].title, "dune");
    }

    #[tokio::test]
    async fn test_add_documents_skips_non_documents() {
        let (library, _, blobs) = memory_library().await;

        let outcome = library
            .add_documents(vec![
                DocumentUpload::new("notes.txt", b"just some text".to_vec()),
                pdf_upload("real.pdf", "x"),
            ])
            .await
            .unwrap();

        assert_eq!(outcome.added_count(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].reason, SkipReason::UnrecognizedFormat);
        assert_eq!(blobs.len().await, 1);
    }

    #[tokio::test]
    async fn test_add_documents_skips_duplicate_payloads() {
        let (library, _, _) = memory_library().await;

        let first = library
            .add_documents(vec![pdf_upload("dune.pdf", "same")])
            .await
            .unwrap();
        let original_id = first.added[0].id.clone();

        let second = library
            .add_documents(vec![pdf_upload("dune-copy.pdf", "same")])
            .await
            .unwrap();

        assert_eq!(second.added_count(), 0);
        assert_eq!(
            second.skipped[0].reason,
            SkipReason::DuplicateOf(original_id)
        );
        assert_eq!(library.documents().await.len(), 1);
    }

    #[tokio::test]
    async fn test_deleting_document_frees_its_hash() {
        let (library, _, _) = memory_library().await;

        let outcome = library
            .add_documents(vec![pdf_upload("dune.pdf", "same")])
            .await
            .unwrap();
        library
            .delete_document(&outcome.added[0].id)
            .await
            .unwrap();

        let again = library
            .add_documents(vec![pdf_upload("dune.pdf", "same")])
            .await
            .unwrap();
        assert_eq!(again.added_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_document_cascades_annotations() {
        let (library, snapshots, blobs) = memory_library().await;

        let outcome = library
            .add_documents(vec![pdf_upload("dune.pdf", "a")])
            .await
            .unwrap();
        let id = outcome.added[0].id.clone();

        library
            .add_annotation(&id, 3, "the spice", Some("fear is the mind-killer"))
            .await
            .unwrap();
        library.add_annotation(&id, 7, "arrakis", None).await.unwrap();
        assert_eq!(library.annotations_for(&id).await.len(), 2);

        let removed = library.delete_document(&id).await.unwrap();
        assert_eq!(removed.document.id, id);
        assert!(!removed.was_open);

        assert!(library.annotations_for(&id).await.is_empty());
        assert!(library.document(&id).await.is_none());
        assert_eq!(blobs.len().await, 0);

        // Durable state agrees with memory
        let stored = snapshots.get(keys::ANNOTATIONS).await.unwrap().unwrap();
        let stored: Vec<Annotation> = serde_json::from_slice(&stored).unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_delete_document_not_found() {
        let (library, _, _) = memory_library().await;
        let result = library.delete_document("missing").await;
        assert!(matches!(result, Err(LibraryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_aborts_when_blob_delete_fails() {
        let (library, _, blobs) = memory_library().await;

        let outcome = library
            .add_documents(vec![pdf_upload("dune.pdf", "a")])
            .await
            .unwrap();
        let id = outcome.added[0].id.clone();

        // Simulate a lost blob; the delete must fail and keep the record
        blobs.evict(&id).await;
        assert!(library.delete_document(&id).await.is_err());
        assert!(library.document(&id).await.is_some());
    }

    #[tokio::test]
    async fn test_batch_delete_partial_failure() {
        let (library, _, blobs) = memory_library().await;

        let outcome = library
            .add_documents(vec![
                pdf_upload("a.pdf", "1"),
                pdf_upload("b.pdf", "2"),
                pdf_upload("c.pdf", "3"),
            ])
            .await
            .unwrap();
        let ids: Vec<String> = outcome.added.iter().map(|d| d.id.clone()).collect();

        // One blob goes missing; the other deletions still run
        blobs.evict(&ids[1]).await;

        let mut requested: HashSet<String> = ids.iter().cloned().collect();
        requested.insert("ghost".to_string());

        let result = library.batch_delete(&requested).await.unwrap();

        assert_eq!(result.removed_titles, vec!["a", "c"]);
        assert_eq!(result.failures.len(), 2);
        assert!(result.failures.iter().any(|f| f.id == ids[1]));
        assert!(result.failures.iter().any(|f| f.id == "ghost"));

        let remaining = library.documents().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, ids[1]);
    }

    #[tokio::test]
    async fn test_batch_delete_empty_set_is_noop() {
        let (library, _, _) = memory_library().await;
        let result = library.batch_delete(&HashSet::new()).await.unwrap();
        assert!(result.removed_titles.is_empty());
        assert!(result.failures.is_empty());
    }

    #[tokio::test]
    async fn test_update_document_merges_and_clamps() {
        let (library, _, _) = memory_library().await;

        let outcome = library
            .add_documents(vec![pdf_upload("dune.pdf", "a")])
            .await
            .unwrap();
        let id = outcome.added[0].id.clone();

        library
            .update_document(
                &id,
                DocumentPatch::new()
                    .with_status(ReadingStatus::Paused)
                    .with_rating(9)
                    .with_current_page(42),
            )
            .await
            .unwrap();

        let document = library.document(&id).await.unwrap();
        assert_eq!(document.status, ReadingStatus::Paused);
        assert_eq!(document.rating, MAX_RATING);
        assert_eq!(document.current_page, 42);
        // Untouched fields survive the merge
        assert_eq!(document.total_pages, 0);
    }

    #[tokio::test]
    async fn test_update_unknown_document_is_silent_noop() {
        let (library, _, _) = memory_library().await;
        library
            .update_document("missing", DocumentPatch::new().with_rating(3))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_open_activates_queued_document() {
        let (library, _, _) = memory_library().await;

        let outcome = library
            .add_documents(vec![pdf_upload("dune.pdf", "a")])
            .await
            .unwrap();
        let id = outcome.added[0].id.clone();

        let opened = library.open_document(&id).await.unwrap();
        assert_eq!(opened.document.status, ReadingStatus::Active);
        assert_eq!(opened.payload, b"%PDF-1.4 a");
        assert_eq!(library.open_document_id().await.as_deref(), Some(id.as_str()));

        // Re-opening an already active document keeps its status
        library
            .update_document(&id, DocumentPatch::new().with_status(ReadingStatus::Finished))
            .await
            .unwrap();
        let reopened = library.open_document(&id).await.unwrap();
        assert_eq!(reopened.document.status, ReadingStatus::Finished);
    }

    #[tokio::test]
    async fn test_open_unknown_document_is_not_found() {
        let (library, _, _) = memory_library().await;
        assert!(matches!(
            library.open_document("missing").await,
            Err(LibraryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_close_writes_back_progress_and_clears_open_id() {
        let (library, _, _) = memory_library().await;

        let outcome = library
            .add_documents(vec![pdf_upload("dune.pdf", "a")])
            .await
            .unwrap();
        let id = outcome.added[0].id.clone();

        library.open_document(&id).await.unwrap();
        library
            .close_document(
                &id,
                CloseProgress {
                    current_page: 57,
                    total_pages: 412,
                },
            )
            .await
            .unwrap();

        let document = library.document(&id).await.unwrap();
        assert_eq!(document.current_page, 57);
        assert_eq!(document.total_pages, 412);
        assert!(library.open_document_id().await.is_none());

        // Closing an unknown id is a no-op
        library
            .close_document("missing", CloseProgress { current_page: 1, total_pages: 0 })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_signals_when_open_document_removed() {
        let (library, _, _) = memory_library().await;

        let outcome = library
            .add_documents(vec![pdf_upload("dune.pdf", "a")])
            .await
            .unwrap();
        let id = outcome.added[0].id.clone();

        library.open_document(&id).await.unwrap();
        let removed = library.delete_document(&id).await.unwrap();

        assert!(removed.was_open);
        assert!(library.open_document_id().await.is_none());
    }

    #[tokio::test]
    async fn test_category_lifecycle_clears_references() {
        let (library, _, _) = memory_library().await;

        let outcome = library
            .add_documents(vec![pdf_upload("dune.pdf", "a"), pdf_upload("emma.pdf", "b")])
            .await
            .unwrap();
        let doc_a = outcome.added[0].id.clone();
        let doc_b = outcome.added[1].id.clone();

        let category = library.add_category("  Sci-Fi  ").await.unwrap().unwrap();
        assert_eq!(category.name, "Sci-Fi");

        library
            .update_document(
                &doc_a,
                DocumentPatch::new().with_category(Some(category.id.clone())),
            )
            .await
            .unwrap();
        library
            .update_document(
                &doc_b,
                DocumentPatch::new().with_category(Some(category.id.clone())).with_rating(2),
            )
            .await
            .unwrap();

        library.delete_category(&category.id).await.unwrap();

        let a = library.document(&doc_a).await.unwrap();
        let b = library.document(&doc_b).await.unwrap();
        assert!(a.category_id.is_none());
        assert!(b.category_id.is_none());
        // Other fields are untouched by the null-out
        assert_eq!(b.rating, 2);
        assert!(library.categories().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_category_rejects_blank_names() {
        let (library, _, _) = memory_library().await;
        assert!(library.add_category("   ").await.unwrap().is_none());
        assert!(library.add_category("").await.unwrap().is_none());
        assert!(library.categories().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_category_is_noop() {
        let (library, _, _) = memory_library().await;
        library.delete_category("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_annotations_prepend_most_recent_first() {
        let (library, _, _) = memory_library().await;

        let outcome = library
            .add_documents(vec![pdf_upload("dune.pdf", "a")])
            .await
            .unwrap();
        let id = outcome.added[0].id.clone();

        library.add_annotation(&id, 1, "first", None).await.unwrap();
        library.add_annotation(&id, 2, "second", None).await.unwrap();
        library.add_annotation(&id, 3, "third", None).await.unwrap();

        let annotations = library.annotations_for(&id).await;
        let bodies: Vec<&str> = annotations.iter().map(|a| a.body.as_str()).collect();
        assert_eq!(bodies, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_add_annotation_requires_body_or_quote() {
        let (library, _, _) = memory_library().await;

        let outcome = library
            .add_documents(vec![pdf_upload("dune.pdf", "a")])
            .await
            .unwrap();
        let id = outcome.added[0].id.clone();

        assert!(library
            .add_annotation(&id, 1, "  ", None)
            .await
            .unwrap()
            .is_none());
        assert!(library
            .add_annotation(&id, 1, "", Some("   "))
            .await
            .unwrap()
            .is_none());

        // Quote alone is enough
        let quoted = library
            .add_annotation(&id, 1, "", Some("hello world"))
            .await
            .unwrap();
        assert!(quoted.is_some());

        // Unknown document is a no-op, never an orphaned annotation
        assert!(library
            .add_annotation("missing", 1, "body", None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_annotation_noop_when_absent() {
        let (library, _, _) = memory_library().await;
        library.delete_annotation("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_export_notes_sorted_by_page() {
        let (library, _, _) = memory_library().await;

        let outcome = library
            .add_documents(vec![pdf_upload("dune.pdf", "a"), pdf_upload("emma.pdf", "b")])
            .await
            .unwrap();
        let id = outcome.added[0].id.clone();

        // Stored most recent first; export re-orders by page
        library.add_annotation(&id, 9, "later", None).await.unwrap();
        library.add_annotation(&id, 2, "earlier", None).await.unwrap();

        let notes = library
            .export_notes(&id, ExportFormat::PlainText)
            .await
            .unwrap()
            .unwrap();
        assert!(notes.find("Page 2").unwrap() < notes.find("Page 9").unwrap());

        let unannotated = library
            .export_notes(&outcome.added[1].id, ExportFormat::PlainText)
            .await
            .unwrap();
        assert!(unannotated.is_none());

        assert!(matches!(
            library.export_notes("missing", ExportFormat::PlainText).await,
            Err(LibraryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_theme_round_trip() {
        let (library, snapshots, _) = memory_library().await;

        library.set_theme(Theme::Sepia).await.unwrap();
        assert_eq!(library.theme().await, Theme::Sepia);

        let stored = snapshots.get(keys::THEME).await.unwrap().unwrap();
        assert_eq!(stored, b"\"sepia\"");
    }

    #[tokio::test]
    async fn test_stats_counts_by_status() {
        let (library, _, _) = memory_library().await;

        let outcome = library
            .add_documents(vec![
                pdf_upload("a.pdf", "1"),
                pdf_upload("b.pdf", "2"),
                pdf_upload("c.pdf", "3"),
            ])
            .await
            .unwrap();
        library.open_document(&outcome.added[0].id).await.unwrap();
        library.add_annotation(&outcome.added[1].id, 1, "note", None).await.unwrap();
        library.add_category("History").await.unwrap();

        let stats = library.stats().await;
        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.total_annotations, 1);
        assert_eq!(stats.total_categories, 1);
        assert_eq!(stats.by_status.get("Reading"), Some(&1));
        assert_eq!(stats.by_status.get("Queued"), Some(&2));
    }

    #[tokio::test]
    async fn test_write_through_after_every_mutation() {
        let (library, snapshots, _) = memory_library().await;

        library
            .add_documents(vec![pdf_upload("dune.pdf", "a")])
            .await
            .unwrap();

        let stored = snapshots.get(keys::DOCUMENTS).await.unwrap().unwrap();
        let stored: Vec<Document> = serde_json::from_slice(&stored).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "dune");
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_memory_state() {
        let snapshot_store = Arc::new(FailingSnapshotStore);
        let blob_store = Arc::new(MemoryBlobStore::new());
        let library = Library::hydrate(snapshot_store, blob_store).await;

        let result = library
            .add_documents(vec![pdf_upload("dune.pdf", "a")])
            .await;

        // The durable write failed but the session state holds the document
        assert!(matches!(result, Err(LibraryError::Storage(_))));
        assert_eq!(library.documents().await.len(), 1);
    }

    #[tokio::test]
    async fn test_hydrate_recovers_previous_session() {
        let snapshot_store = Arc::new(MemorySnapshotStore::new());
        let blob_store = Arc::new(MemoryBlobStore::new());

        {
            let library =
                Library::hydrate(snapshot_store.clone(), blob_store.clone()).await;
            library
                .add_documents(vec![pdf_upload("dune.pdf", "a")])
                .await
                .unwrap();
            library.set_theme(Theme::Dark).await.unwrap();
        }

        let revived = Library::hydrate(snapshot_store, blob_store).await;
        assert_eq!(revived.documents().await.len(), 1);
        assert_eq!(revived.theme().await, Theme::Dark);
    }

    #[tokio::test]
    async fn test_hydrate_tolerates_corrupt_entries() {
        let snapshot_store = Arc::new(MemorySnapshotStore::new());
        snapshot_store
            .seed(keys::DOCUMENTS, b"{not json".to_vec())
            .await;
        snapshot_store.seed(keys::THEME, b"\"plaid\"".to_vec()).await;

        let library = Library::hydrate(snapshot_store, Arc::new(MemoryBlobStore::new())).await;
        assert!(library.documents().await.is_empty());
        assert_eq!(library.theme().await, Theme::default());
    }

    #[tokio::test]
    async fn test_payload_survives_concurrent_delete() {
        let (library, _, _) = memory_library().await;

        let outcome = library
            .add_documents(vec![pdf_upload("dune.pdf", "a")])
            .await
            .unwrap();
        let id = outcome.added[0].id.clone();

        // The payload copy taken before the delete stays usable
        let payload = library.document_payload(&id).await.unwrap();
        library.delete_document(&id).await.unwrap();
        assert_eq!(payload, b"%PDF-1.4 a");

        assert!(matches!(
            library.document_payload(&id).await,
            Err(LibraryError::NotFound(_))
        ));
    }
}
