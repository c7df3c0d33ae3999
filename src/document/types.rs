//! Core document types
//!
//! Format-agnostic types shared between the library coordinator, the search
//! engine, and the external parser/renderer collaborator.

use serde::{Deserialize, Serialize};

/// Document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Epub,
}

impl DocumentFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "epub" => Some(Self::Epub),
            _ => None,
        }
    }

    /// Detect format from magic bytes
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // PDF magic: %PDF
        if bytes.starts_with(b"%PDF") {
            return Some(Self::Pdf);
        }

        // EPUB magic: PK (ZIP) with a mimetype entry containing "epub".
        // Plain ZIPs are not assumed to be EPUBs to avoid false positives
        // with .docx, .apk and other ZIP-based formats. Lossy decode: the
        // header contains arbitrary CRC bytes.
        if bytes.starts_with(b"PK") && bytes.len() > 30 {
            let head = String::from_utf8_lossy(&bytes[..bytes.len().min(58)]);
            if head.contains("epub") {
                return Some(Self::Epub);
            }
        }

        None
    }
}

/// Rectangle (bounding box) in page coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }
}

/// A positioned unit of extracted text, as reported by the renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextToken {
    /// Token text content
    pub text: String,
    /// Bounding box on the rendered page
    pub bounds: Rect,
}

impl TextToken {
    pub fn new(text: impl Into<String>, bounds: Rect) -> Self {
        Self {
            text: text.into(),
            bounds,
        }
    }
}

/// A file handed to the library for ingestion
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    /// Original file name (used for the title fallback)
    pub file_name: String,
    /// Title override, when the host already extracted metadata
    pub title: Option<String>,
    /// Author, when known
    pub author: Option<String>,
    /// Raw payload
    pub bytes: Vec<u8>,
}

impl DocumentUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            title: None,
            author: None,
            bytes,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Title to use when none was supplied: file name without its extension
    pub fn title_or_stem(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        match self.file_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => self.file_name.clone(),
        }
    }
}
