//! In-document full-text search
//!
//! Scans a document's extracted text page by page and returns bounded,
//! snippet-annotated matches. There is no index: every search re-parses the
//! payload it is handed, and ranking is first-occurrence page order.
//!
//! The engine works on its own copy of the payload and never retains it, so
//! a search can run while the same document is rendered, re-searched, or even
//! deleted; stale results are the caller's to discard.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::{DocumentParser, TextToken};
use crate::error::Result;
use crate::text;

/// Hard cap on results per search; further matches are silently dropped
pub const MAX_RESULTS: usize = 50;

/// Characters of context kept on each side of a match
const SNIPPET_CONTEXT: usize = 30;

/// Marker wrapped around every snippet
const ELLIPSIS: &str = "...";

/// One search hit: the page it occurs on and a preview around the first match
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMatch {
    /// Page number (1-based)
    pub page: u32,
    /// Context window around the first occurrence on this page
    pub snippet: String,
}

/// Search engine over a parser collaborator
pub struct TextSearch {
    parser: Arc<dyn DocumentParser>,
}

impl TextSearch {
    pub fn new(parser: Arc<dyn DocumentParser>) -> Self {
        Self { parser }
    }

    /// Find the query in a document payload
    ///
    /// Pages are scanned in ascending order and each matching page yields one
    /// result for its first occurrence, up to [`MAX_RESULTS`]. Matching is
    /// case-insensitive; the snippet is sliced from the original page text.
    /// An empty or whitespace-only query returns no results without touching
    /// the payload.
    pub async fn search(&self, payload: &[u8], query: &str) -> Result<Vec<PageMatch>> {
        let query = text::normalize(query);
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let query_chars: Vec<char> = query.chars().collect();

        // Independent copy: the caller's buffer may be in concurrent use
        let pages = self.parser.parse(payload.to_vec()).await?;

        let mut results = Vec::new();
        for page in 1..=pages.page_count() {
            if results.len() >= MAX_RESULTS {
                break;
            }

            let tokens = pages.page_tokens(page)?;
            let page_text = join_tokens(&tokens);
            let original: Vec<char> = page_text.chars().collect();
            let folded = text::fold_chars(&page_text);

            // One snippet per page: first occurrence only
            if let Some(offset) = find_chars(&folded, &query_chars) {
                results.push(PageMatch {
                    page,
                    snippet: snippet_at(&original, offset, query_chars.len()),
                });
            }
        }

        Ok(results)
    }
}

/// Concatenate a page's tokens with single-space separators
fn join_tokens(tokens: &[TextToken]) -> String {
    tokens
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// First occurrence of `needle` in `haystack`, as a character offset
fn find_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Context window around a match, clamped to the text bounds
///
/// Up to [`SNIPPET_CONTEXT`] characters on each side; when fewer are
/// available the window shortens without padding. The ellipsis markers are
/// emitted on both ends regardless.
fn snippet_at(original: &[char], offset: usize, match_len: usize) -> String {
    let start = offset.saturating_sub(SNIPPET_CONTEXT);
    let end = (offset + match_len + SNIPPET_CONTEXT).min(original.len());

    let mut snippet = String::with_capacity(end - start + 2 * ELLIPSIS.len());
    snippet.push_str(ELLIPSIS);
    snippet.extend(&original[start..end]);
    snippet.push_str(ELLIPSIS);
    snippet
}
