//! Quote-aware delimiter scanning.
//!
//! The delimiter model turns a document into an addressable grid: one
//! [`LineInfo`] per line, holding the byte offsets of every delimiter
//! occurrence on that line. Delimiters inside an open quote span are not
//! counted; an unterminated quote extends to the end of the line.
//!
//! The model is rebuilt lazily. [`DelimiterModel::sync`] drains the
//! document's change-event queue first: a delimiter or quote change forces a
//! full rescan, while plain content changes rescan only the affected lines.
//! Delimiter offsets are stored relative to the line start, so edits on one
//! line never invalidate the scan results of the lines below it; only their
//! absolute start/end offsets change, and those are refreshed from the
//! document.

use crate::columns::ColumnSelection;
use crate::control::{CHUNK_SIZE, PassControl, Stage};
use crate::document::{ChangeKind, Document};
use crate::error::ReplaceError;

/// Scan results for one document line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineInfo {
    /// Byte offsets of delimiter occurrences, relative to `start`,
    /// strictly increasing.
    pub delimiters: Vec<usize>,
    /// Absolute byte offset of the line's first byte.
    pub start: usize,
    /// Absolute byte offset one past the line's last content byte
    /// (excludes the line terminator).
    pub end: usize,
}

/// Per-line delimiter positions for a whole document.
#[derive(Debug, Default)]
pub struct DelimiterModel {
    lines: Vec<LineInfo>,
    delimiter: String,
    quote: Option<char>,
    scanned: bool,
}

impl DelimiterModel {
    /// Create an empty, unscanned model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the model holds a complete scan.
    pub fn is_scanned(&self) -> bool {
        self.scanned
    }

    /// Discard the scan; the next [`DelimiterModel::sync`] rescans fully.
    pub fn invalidate(&mut self) {
        self.scanned = false;
        self.lines.clear();
    }

    /// All scanned lines, in document order.
    pub fn lines(&self) -> &[LineInfo] {
        &self.lines
    }

    /// Scan results for one line.
    pub fn line(&self, line: usize) -> Option<&LineInfo> {
        self.lines.get(line)
    }

    /// Bring the model up to date with the document and selection.
    ///
    /// Drains the document's change queue. A changed delimiter or quote
    /// character (or an invalidated model) triggers a full rescan; otherwise
    /// only lines named by the drained events are rescanned. If the pass is
    /// cancelled mid-scan the model stays unscanned and `Ok` is returned;
    /// the caller observes the cancellation through its own control block.
    pub fn sync(
        &mut self,
        doc: &mut dyn Document,
        sel: &ColumnSelection,
        ctl: &mut PassControl<'_>,
    ) -> Result<(), ReplaceError> {
        let events = doc.drain_changes();

        if !self.scanned || self.delimiter != sel.delimiter() || self.quote != sel.quote() {
            self.delimiter = sel.delimiter().to_string();
            self.quote = sel.quote();
            return self.full_rescan(doc, ctl);
        }
        if events.is_empty() {
            return Ok(());
        }

        let mut first_affected = usize::MAX;
        for event in events {
            let line = event.line.min(self.lines.len().saturating_sub(1));
            first_affected = first_affected.min(line);
            match event.kind {
                ChangeKind::Modify => self.rescan_line(doc, line),
                ChangeKind::Insert => {
                    self.lines.insert(line + 1, LineInfo::default());
                    self.rescan_line(doc, line);
                    self.rescan_line(doc, line + 1);
                }
                ChangeKind::Delete => {
                    if line + 1 < self.lines.len() {
                        self.lines.remove(line + 1);
                    }
                    self.rescan_line(doc, line);
                }
            }
        }

        if self.lines.len() != doc.line_count() {
            // The event stream and the document disagree; trust the document.
            return self.full_rescan(doc, ctl);
        }
        self.refresh_offsets(doc, first_affected);
        Ok(())
    }

    fn full_rescan(
        &mut self,
        doc: &dyn Document,
        ctl: &mut PassControl<'_>,
    ) -> Result<(), ReplaceError> {
        let total = doc.line_count();
        self.lines.clear();
        self.lines.reserve(total);
        self.scanned = false;

        for line in 0..total {
            if line % CHUNK_SIZE == 0 {
                ctl.report(Stage::Scan, line, total);
                if ctl.is_cancelled() {
                    self.lines.clear();
                    return Ok(());
                }
            }
            let range = doc.line_range(line);
            let text = doc.read(range.clone());
            self.lines.push(LineInfo {
                delimiters: scan_line(&text, &self.delimiter, self.quote),
                start: range.start,
                end: range.end,
            });
        }
        ctl.report(Stage::Scan, total, total);
        self.scanned = true;
        Ok(())
    }

    fn rescan_line(&mut self, doc: &dyn Document, line: usize) {
        let Some(info) = self.lines.get_mut(line) else {
            return;
        };
        let range = doc.line_range(line);
        let text = doc.read(range.clone());
        info.delimiters = scan_line(&text, &self.delimiter, self.quote);
        info.start = range.start;
        info.end = range.end;
    }

    fn refresh_offsets(&mut self, doc: &dyn Document, from_line: usize) {
        for line in from_line..self.lines.len() {
            let range = doc.line_range(line);
            self.lines[line].start = range.start;
            self.lines[line].end = range.end;
        }
    }
}

/// Scan one line for delimiter occurrences outside quote spans.
///
/// Returned offsets are byte offsets into `text`, strictly increasing;
/// overlapping occurrences are not counted (the scan advances past each
/// hit). Quote characters toggle an open/closed state; a quote left open at
/// end of line suppresses all remaining delimiters.
fn scan_line(text: &str, delimiter: &str, quote: Option<char>) -> Vec<usize> {
    let bytes = text.as_bytes();
    let delim = delimiter.as_bytes();
    // Both accepted quote characters are ASCII, so byte comparison is safe
    // in UTF-8 text.
    let quote_byte = quote.map(|q| q as u8);

    let mut offsets = Vec::new();
    let mut in_quote = false;
    let mut i = 0;
    while i < bytes.len() {
        if Some(bytes[i]) == quote_byte {
            in_quote = !in_quote;
            i += 1;
            continue;
        }
        if !in_quote && bytes[i..].starts_with(delim) {
            offsets.push(i);
            i += delim.len();
            continue;
        }
        i += 1;
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::CancelFlag;
    use crate::document::RopeDocument;

    fn sel(delimiter: &str, quote: Option<char>) -> ColumnSelection {
        ColumnSelection::new([1], delimiter, quote).unwrap()
    }

    fn synced(doc: &mut RopeDocument, sel: &ColumnSelection) -> DelimiterModel {
        let mut model = DelimiterModel::new();
        model.sync(doc, sel, &mut PassControl::default()).unwrap();
        model
    }

    #[test]
    fn test_scan_line_basic() {
        assert_eq!(scan_line("a,b,c", ",", None), vec![1, 3]);
        assert_eq!(scan_line("abc", ",", None), Vec::<usize>::new());
        assert_eq!(scan_line(",,", ",", None), vec![0, 1]);
    }

    #[test]
    fn test_scan_line_quote_aware() {
        // The comma inside quotes is not counted.
        assert_eq!(scan_line(r#"a,"b,c",d"#, ",", Some('"')), vec![1, 7]);
    }

    #[test]
    fn test_scan_line_unterminated_quote() {
        // Quote extends to end of line; no delimiter after it is counted.
        assert_eq!(scan_line(r#"a,"b,c,d"#, ",", Some('"')), vec![1]);
    }

    #[test]
    fn test_scan_line_multibyte_delimiter() {
        assert_eq!(scan_line("a::b::c", "::", None), vec![1, 4]);
        // Non-overlapping: ":::" holds one occurrence, not two.
        assert_eq!(scan_line("a:::b", "::", None), vec![1]);
    }

    #[test]
    fn test_rescan_is_idempotent() {
        let mut doc = RopeDocument::from_text("a,b\nc,d,e\nf");
        let sel = sel(",", None);
        let mut model = DelimiterModel::new();
        model.sync(&mut doc, &sel, &mut PassControl::default()).unwrap();
        let first: Vec<LineInfo> = model.lines().to_vec();

        model.invalidate();
        model.sync(&mut doc, &sel, &mut PassControl::default()).unwrap();
        assert_eq!(model.lines(), first.as_slice());
    }

    #[test]
    fn test_full_scan_offsets() {
        let mut doc = RopeDocument::from_text("a,b\ncc,dd");
        let model = synced(&mut doc, &sel(",", None));
        assert_eq!(
            model.lines(),
            &[
                LineInfo {
                    delimiters: vec![1],
                    start: 0,
                    end: 3
                },
                LineInfo {
                    delimiters: vec![2],
                    start: 4,
                    end: 9
                },
            ]
        );
    }

    #[test]
    fn test_incremental_modify() {
        let mut doc = RopeDocument::from_text("a,b\nc,d");
        let sel = sel(",", None);
        let mut model = synced(&mut doc, &sel);

        // Lengthen line 0; line 1's delimiters stay put relative to its
        // (shifted) start.
        doc.replace(0..1, "aaa");
        model.sync(&mut doc, &sel, &mut PassControl::default()).unwrap();

        assert_eq!(model.line(0).unwrap().delimiters, vec![3]);
        assert_eq!(model.line(1).unwrap().start, 6);
        assert_eq!(model.line(1).unwrap().delimiters, vec![1]);
    }

    #[test]
    fn test_incremental_insert_and_delete_line() {
        let mut doc = RopeDocument::from_text("a,b\nc,d");
        let sel = sel(",", None);
        let mut model = synced(&mut doc, &sel);

        doc.replace(3..3, "\nx,y");
        model.sync(&mut doc, &sel, &mut PassControl::default()).unwrap();
        assert_eq!(model.lines().len(), 3);
        assert_eq!(model.line(1).unwrap().delimiters, vec![1]);
        assert_eq!(model.line(2).unwrap().start, 8);

        doc.replace(3..7, "");
        model.sync(&mut doc, &sel, &mut PassControl::default()).unwrap();
        assert_eq!(model.lines().len(), 2);
        assert_eq!(model.line(1).unwrap().start, 4);
    }

    #[test]
    fn test_delimiter_change_forces_full_rescan() {
        let mut doc = RopeDocument::from_text("a,b;c");
        let mut model = synced(&mut doc, &sel(",", None));
        assert_eq!(model.line(0).unwrap().delimiters, vec![1]);

        model
            .sync(&mut doc, &sel(";", None), &mut PassControl::default())
            .unwrap();
        assert_eq!(model.line(0).unwrap().delimiters, vec![3]);
    }

    #[test]
    fn test_cancelled_scan_leaves_model_unscanned() {
        let mut doc = RopeDocument::from_text("a,b\nc,d");
        let sel = sel(",", None);
        let mut model = DelimiterModel::new();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut ctl = PassControl::with_cancel(cancel);
        model.sync(&mut doc, &sel, &mut ctl).unwrap();
        assert!(!model.is_scanned());
    }
}
