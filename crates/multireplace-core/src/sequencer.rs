//! Delta-tracked edit application.
//!
//! Matches are enumerated against a snapshot, but every applied replacement
//! shrinks or grows the document, so the stored offsets of all later matches
//! drift. The sequencer keeps a cumulative signed length delta per rule
//! application: before applying match *i* it translates the stored offset by
//! the delta accumulated from matches *0..i*, and afterwards adds
//! `new_len - old_len`. Matches must be fed in ascending original-offset
//! order. Mark-only passes never touch the sequencer.

use crate::document::Document;
use crate::matcher::Match;

/// Applies one rule's replacements left to right, keeping snapshot offsets
/// valid across cascading edits.
#[derive(Debug, Default)]
pub struct EditSequencer {
    delta: isize,
}

impl EditSequencer {
    /// A fresh sequencer with zero accumulated delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulated length delta, in bytes.
    pub fn delta(&self) -> isize {
        self.delta
    }

    /// Translate a snapshot offset into the live document.
    pub fn translated(&self, offset: usize) -> usize {
        offset.saturating_add_signed(self.delta)
    }

    /// Replace `m` (snapshot coordinates) with `replacement` in the live
    /// document and fold the length change into the delta.
    pub fn apply(&mut self, doc: &mut dyn Document, m: &Match, replacement: &str) {
        let start = self.translated(m.start);
        doc.replace(start..start + m.len, replacement);
        self.delta += replacement.len() as isize - m.len as isize;
    }
}
