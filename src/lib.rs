//! Lectern Library Core
//!
//! Persistence, search and annotation engine for a personal document
//! library. Hosts embed [`library::Library`] and wire in the storage
//! ports and a document parser.
//!
//! # Modules
//!
//! - `library`: Coordinator, shelf arrangement and the stored data model
//! - `storage`: Snapshot and blob store ports plus the bundled backends
//! - `search`: Per-document full-text search over parsed page text
//! - `highlight`: Annotation highlight relocation and transient marks
//! - `export`: Notes export formatting
//! - `document`: Parser seam and upload/format types

pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod highlight;
pub mod library;
pub mod search;
pub mod storage;
pub mod text;
