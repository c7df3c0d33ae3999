//! Highlight relocation
//!
//! Re-finds a saved quote or search hit among the text tokens the renderer
//! reports for the visible page. Renderers tokenize by word or run, collapse
//! whitespace differently than the source, and change case, so the match is
//! fuzzy: normalized two-way substring containment with a minimum length
//! guard against short-word false positives.
//!
//! Marks expire after a fixed exposure so re-opening the same note can
//! re-trigger them without stale visual state. The registry keeps no timers;
//! the host scheduler passes the clock in, which keeps expiry testable.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::document::TextToken;
use crate::text;

/// How long marks stay active before they expire
pub const MARK_EXPOSURE: Duration = Duration::from_millis(3000);

/// Normalized token or target text this short never matches on its own
const MIN_MATCH_CHARS: usize = 3;

// ============================================================================
// Relocation
// ============================================================================

/// Indices of the tokens that should be visually marked for `target`
///
/// A token matches when its normalized text is a substring of the normalized
/// target (token shorter than the quote, the common case) or the normalized
/// target is a substring of the token (quote inside one merged run). Either
/// side must be longer than three characters to count, so "the" or "cat"
/// never light up on their own. Every passing token is returned; ambiguous
/// short quotes may legitimately mark several disjoint regions.
pub fn relocate(target: &str, tokens: &[TextToken]) -> Vec<usize> {
    let target = text::normalize(target);
    if target.is_empty() {
        return Vec::new();
    }
    let target_len = target.chars().count();

    let mut matched = Vec::new();
    for (index, token) in tokens.iter().enumerate() {
        let token_text = text::normalize(&token.text);
        if token_text.is_empty() {
            continue;
        }
        let token_len = token_text.chars().count();

        let token_in_target = token_len > MIN_MATCH_CHARS && target.contains(&token_text);
        let target_in_token = target_len > MIN_MATCH_CHARS && token_text.contains(&target);
        if token_in_target || target_in_token {
            matched.push(index);
        }
    }
    matched
}

// ============================================================================
// Expiring marks
// ============================================================================

/// The currently marked tokens of a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMarks {
    /// Page the marks belong to (1-based)
    pub page: u32,
    /// Token indices to render marked
    pub token_indices: Vec<usize>,
}

struct ActiveMark {
    marks: PageMarks,
    expires_at: Instant,
}

/// Registry for the active highlight marks
///
/// One mark set is active at a time: a page settles, `relocate` picks the
/// token indices, and `mark` arms them until the exposure runs out. Marking
/// again before expiry restarts the clock.
#[derive(Default)]
pub struct MarkRegistry {
    active: Mutex<Option<ActiveMark>>,
}

impl MarkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm marks for a page
    ///
    /// An empty index set is a no-op: nothing is marked and no exposure
    /// starts, leaving any previous marks to their own deadline.
    pub fn mark(&self, page: u32, token_indices: Vec<usize>, now: Instant) {
        if token_indices.is_empty() {
            return;
        }

        let mut active = self.active.lock();
        *active = Some(ActiveMark {
            marks: PageMarks { page, token_indices },
            expires_at: now + MARK_EXPOSURE,
        });
    }

    /// Marks still within their exposure, if any
    pub fn active(&self, now: Instant) -> Option<PageMarks> {
        let active = self.active.lock();
        active
            .as_ref()
            .filter(|mark| now < mark.expires_at)
            .map(|mark| mark.marks.clone())
    }

    /// Drop marks whose exposure has run out
    ///
    /// Returns whether anything was cleared; the host scheduler calls this
    /// periodically.
    pub fn clear_expired(&self, now: Instant) -> bool {
        let mut active = self.active.lock();
        match active.as_ref() {
            Some(mark) if now >= mark.expires_at => {
                *active = None;
                true
            }
            _ => false,
        }
    }
}
