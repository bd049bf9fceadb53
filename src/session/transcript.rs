//! Transcript accumulation state
//!
//! Holds the committed segment history, the accumulated transcript string,
//! and the single live partial transcript.

use chrono::{DateTime, Utc};

/// One committed (final) recognition result
///
/// Immutable once created; segments are only destroyed collectively when the
/// history is cleared.
#[derive(Debug, Clone)]
pub struct TranscriptSegment {
    /// Opaque identifier, unique per segment
    pub id: String,
    /// Committed text, trimmed
    pub text: String,
    /// Creation time; insertion order equals chronological order
    pub created_at: DateTime<Utc>,
}

/// Committed history plus the live partial transcript
///
/// Invariant: `accumulated()` equals the segment texts joined with a single
/// space, in arrival order.
#[derive(Debug, Default)]
pub struct TranscriptStore {
    segments: Vec<TranscriptSegment>,
    accumulated: String,
    partial: Option<String>,
}

impl TranscriptStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the live partial transcript wholesale
    ///
    /// Last write wins; intermediate values are never retained.
    pub fn apply_partial(&mut self, text: &str) {
        self.partial = Some(text.to_string());
    }

    /// Append a committed segment
    ///
    /// Text that is empty after trimming is dropped without creating a
    /// segment or touching the accumulated transcript. Returns whether a
    /// segment was stored.
    pub fn commit(&mut self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            tracing::trace!("dropping empty committed transcript");
            return false;
        }

        if !self.accumulated.is_empty() {
            self.accumulated.push(' ');
        }
        self.accumulated.push_str(trimmed);

        self.segments.push(TranscriptSegment {
            id: uuid::Uuid::new_v4().to_string(),
            text: trimmed.to_string(),
            created_at: Utc::now(),
        });

        tracing::debug!(segments = self.segments.len(), text = %trimmed, "committed transcript segment");
        true
    }

    /// The current live partial transcript, if any
    #[must_use]
    pub fn partial(&self) -> Option<&str> {
        self.partial.as_deref()
    }

    /// Take the live partial transcript, clearing it
    pub fn take_partial(&mut self) -> Option<String> {
        self.partial.take()
    }

    /// Clear the live partial transcript
    pub fn clear_partial(&mut self) {
        self.partial = None;
    }

    /// The committed segment history, in arrival order
    #[must_use]
    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    /// The accumulated transcript (committed texts joined by single spaces)
    #[must_use]
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Join the segment history with single spaces
    ///
    /// Used as the fallback spoken text when folding the partial yields an
    /// empty string, and as the copy-out text.
    #[must_use]
    pub fn joined(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether the history holds no segments
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Drop the entire history and the accumulated transcript
    ///
    /// The live partial is left alone; it belongs to the connection, not the
    /// history.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.accumulated.clear();
        tracing::debug!("transcript history cleared");
    }
}
