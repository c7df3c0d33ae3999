//! Notes export
//!
//! Renders a document's annotations in a small set of formats. Callers pass
//! the annotations pre-sorted by page ascending; an empty set yields `None`
//! and the caller shows the user-facing notice.

use serde::{Deserialize, Serialize};

use crate::library::{Annotation, Document};

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    PlainText,
    Markdown,
}

/// Render annotations in the requested format
///
/// `None` when there is nothing to export.
pub fn render(
    document: &Document,
    annotations: &[Annotation],
    format: ExportFormat,
) -> Option<String> {
    if annotations.is_empty() {
        return None;
    }

    let text = match format {
        ExportFormat::PlainText => render_plain(document, annotations),
        ExportFormat::Markdown => render_markdown(document, annotations),
    };
    Some(text)
}

/// Plain-text rendering
///
/// ```text
/// Notes for "Dune" by Frank Herbert
///
/// Page 3
///   > fear is the mind-killer
///   The litany against fear.
/// ```
fn render_plain(document: &Document, annotations: &[Annotation]) -> String {
    let mut lines = vec![format!(
        "Notes for \"{}\" by {}",
        document.title,
        document.display_author()
    )];

    for annotation in annotations {
        lines.push(String::new());
        lines.push(format!("Page {}", annotation.page));
        if let Some(quote) = &annotation.quote {
            lines.push(format!("  > {quote}"));
        }
        if !annotation.body.trim().is_empty() {
            lines.push(format!("  {}", annotation.body));
        }
    }

    lines.join("\n")
}

/// Markdown rendering, quotes as blockquotes under per-page headings
fn render_markdown(document: &Document, annotations: &[Annotation]) -> String {
    let mut lines = vec![
        format!("# Notes: {}", document.title),
        String::new(),
        format!("*{}*", document.display_author()),
    ];

    for annotation in annotations {
        lines.push(String::new());
        lines.push(format!("## Page {}", annotation.page));
        lines.push(String::new());
        if let Some(quote) = &annotation.quote {
            lines.push(format!("> {quote}"));
            lines.push(String::new());
        }
        if !annotation.body.trim().is_empty() {
            lines.push(annotation.body.clone());
        }
    }

    lines.join("\n")
}
