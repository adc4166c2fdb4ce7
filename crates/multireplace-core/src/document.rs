//! The document collaborator.
//!
//! The engine never owns the text it operates on. It sees the host's buffer
//! through the [`Document`] trait: byte-offset reads, byte-offset replaces,
//! and line bookkeeping. Every mutation, whether issued by the host or by
//! the engine's own edit sequencer, enqueues a typed [`ChangeEvent`]; the
//! delimiter model drains the queue before the next column-scoped operation
//! and rescans only what the events touched.
//!
//! [`RopeDocument`] is a ready-made implementation over [`ropey::Rope`] for
//! tests and for embedders without their own buffer. All offsets are byte
//! offsets into UTF-8 text; implementations may assume edits land on char
//! boundaries (matches are produced against `&str` snapshots, so the engine
//! can only ever ask for boundary-aligned edits).

use std::borrow::Cow;
use std::collections::VecDeque;
use std::ops::Range;

use ropey::Rope;

/// What kind of change a [`ChangeEvent`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// One or more lines were inserted starting at `line`.
    Insert,
    /// One or more lines were deleted starting at `line`.
    Delete,
    /// The content of `line` changed without adding or removing lines.
    Modify,
}

/// A typed change notification, queued per mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    /// The kind of change.
    pub kind: ChangeKind,
    /// 0-based line number the change starts at.
    pub line: usize,
}

/// Abstract host buffer: read/replace by byte offset plus line bookkeeping.
pub trait Document {
    /// Total length in bytes.
    fn len_bytes(&self) -> usize;

    /// Read the given byte range.
    fn read(&self, range: Range<usize>) -> Cow<'_, str>;

    /// Replace the given byte range with `text` and enqueue change events.
    fn replace(&mut self, range: Range<usize>, text: &str);

    /// Number of lines. An empty document has one (empty) line.
    fn line_count(&self) -> usize;

    /// Byte range of a line's content, excluding its line terminator.
    fn line_range(&self, line: usize) -> Range<usize>;

    /// 0-based line containing the given byte offset.
    fn line_of(&self, offset: usize) -> usize;

    /// Drain all change events queued since the last drain, oldest first.
    fn drain_changes(&mut self) -> Vec<ChangeEvent>;

    /// Read the whole document.
    fn read_all(&self) -> Cow<'_, str> {
        self.read(0..self.len_bytes())
    }
}

/// A [`Document`] backed by [`ropey::Rope`].
#[derive(Debug, Clone, Default)]
pub struct RopeDocument {
    rope: Rope,
    pending: VecDeque<ChangeEvent>,
}

impl RopeDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document from initial text.
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            pending: VecDeque::new(),
        }
    }

    /// Full document text.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    fn enqueue_edit(&mut self, line: usize, removed_breaks: usize, inserted_breaks: usize) {
        use std::cmp::Ordering;
        match inserted_breaks.cmp(&removed_breaks) {
            Ordering::Greater => {
                for _ in 0..inserted_breaks - removed_breaks {
                    self.pending.push_back(ChangeEvent {
                        kind: ChangeKind::Insert,
                        line,
                    });
                }
            }
            Ordering::Less => {
                for _ in 0..removed_breaks - inserted_breaks {
                    self.pending.push_back(ChangeEvent {
                        kind: ChangeKind::Delete,
                        line,
                    });
                }
            }
            Ordering::Equal => {}
        }
        // Every line the edit touched gets a Modify so incremental
        // consumers rescan all of them, not just the first.
        for touched in line..=line + inserted_breaks {
            self.pending.push_back(ChangeEvent {
                kind: ChangeKind::Modify,
                line: touched,
            });
        }
    }
}

impl Document for RopeDocument {
    fn len_bytes(&self) -> usize {
        self.rope.len_bytes()
    }

    fn read(&self, range: Range<usize>) -> Cow<'_, str> {
        let start = self.rope.byte_to_char(range.start.min(self.rope.len_bytes()));
        let end = self.rope.byte_to_char(range.end.min(self.rope.len_bytes()));
        Cow::Owned(self.rope.slice(start..end).to_string())
    }

    fn replace(&mut self, range: Range<usize>, text: &str) {
        let start_char = self.rope.byte_to_char(range.start.min(self.rope.len_bytes()));
        let end_char = self.rope.byte_to_char(range.end.min(self.rope.len_bytes()));
        let line = self.rope.char_to_line(start_char);

        let removed = self.rope.slice(start_char..end_char);
        let removed_breaks = removed.chars().filter(|&c| c == '\n').count();
        let inserted_breaks = text.matches('\n').count();

        self.rope.remove(start_char..end_char);
        self.rope.insert(start_char, text);
        self.enqueue_edit(line, removed_breaks, inserted_breaks);
    }

    fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    fn line_range(&self, line: usize) -> Range<usize> {
        if line >= self.rope.len_lines() {
            let len = self.rope.len_bytes();
            return len..len;
        }
        let start = self.rope.line_to_byte(line);
        let mut end = if line + 1 < self.rope.len_lines() {
            self.rope.line_to_byte(line + 1)
        } else {
            self.rope.len_bytes()
        };
        // Trim the line terminator.
        let slice = self.rope.byte_slice(start..end);
        let mut trailing = 0;
        let mut rev = slice.chars_at(slice.len_chars());
        if let Some('\n') = rev.prev() {
            trailing += 1;
            if let Some('\r') = rev.prev() {
                trailing += 1;
            }
        }
        end -= trailing;
        start..end
    }

    fn line_of(&self, offset: usize) -> usize {
        let offset = offset.min(self.rope.len_bytes());
        self.rope.byte_to_line(offset)
    }

    fn drain_changes(&mut self) -> Vec<ChangeEvent> {
        self.pending.drain(..).collect()
    }
}
