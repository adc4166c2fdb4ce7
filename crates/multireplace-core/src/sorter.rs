//! Column-based line sorting with exact restore.
//!
//! The sorter reorders a document's data rows by the value of one column,
//! using a numeric-aware, stable comparison. Header lines never move. The
//! permutation of one sorted view is retained so the original order can be
//! reconstructed exactly later (including after a descending sort), and
//! restore is a no-op when no sort is active.
//!
//! Key extraction runs in chunks, reporting [`Stage::Sort`] progress and
//! polling the cancel flag; a cancelled sort leaves the document untouched.
//! Reordering itself is a single region rewrite through the document trait,
//! so the delimiter model is invalidated through the normal change-event
//! path.

use std::cmp::Ordering;
use std::ops::Range;

use crate::columns::{ColumnIndex, ColumnSelection};
use crate::control::{CHUNK_SIZE, PassControl, Stage};
use crate::delimiter::DelimiterModel;
use crate::document::Document;
use crate::error::ReplaceError;
use crate::session::PassOutcome;

/// Sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest value first.
    Ascending,
    /// Largest value first.
    Descending,
}

/// Maps each post-sort data row position to the original data row index.
///
/// Row indices are 0-based and counted from the first data row (the row
/// after the header lines).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortPermutation {
    order: Vec<usize>,
    header_lines: usize,
}

impl SortPermutation {
    /// `order()[new_position] == original_row_index`.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Number of leading lines excluded from the sort.
    pub fn header_lines(&self) -> usize {
        self.header_lines
    }
}

/// Sorts data rows by a column's value and restores the original order.
#[derive(Debug, Default)]
pub struct ColumnSorter {
    active: Option<SortPermutation>,
}

impl ColumnSorter {
    /// A sorter with no active sort.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while a sorted view is active.
    pub fn is_sorted(&self) -> bool {
        self.active.is_some()
    }

    /// The active permutation, if any.
    pub fn permutation(&self) -> Option<&SortPermutation> {
        self.active.as_ref()
    }

    /// Stably sort the data rows by the given 1-based column.
    ///
    /// Values that fully parse as numbers order numerically and sort ahead
    /// of values that do not; everything else compares lexicographically by
    /// code point. A row without that column sorts as the empty string. The
    /// first `header_lines` lines are excluded and never move.
    ///
    /// Cancellation through `ctl` stops the sort before any edit is applied
    /// and returns [`PassOutcome::Cancelled`] with the document and any
    /// previously saved permutation unchanged.
    ///
    /// A completed sort replaces any previously saved permutation: restore
    /// always undoes the *latest* sort against the order it started from.
    #[allow(clippy::too_many_arguments)]
    pub fn sort_by_column(
        &mut self,
        doc: &mut dyn Document,
        model: &mut DelimiterModel,
        selection: &ColumnSelection,
        column: usize,
        direction: SortDirection,
        header_lines: usize,
        ctl: &mut PassControl<'_>,
    ) -> Result<PassOutcome, ReplaceError> {
        model.sync(doc, selection, ctl)?;
        if !model.is_scanned() {
            // Cancelled mid-scan.
            return Ok(PassOutcome::Cancelled);
        }

        let data = data_rows(doc, header_lines);
        let total = data.len();
        let index = ColumnIndex::new(model);
        let mut keys = Vec::with_capacity(total);
        for (i, line) in data.enumerate() {
            if i % CHUNK_SIZE == 0 {
                ctl.report(Stage::Sort, i, total);
                if ctl.is_cancelled() {
                    return Ok(PassOutcome::Cancelled);
                }
            }
            let text = index
                .column_range_for_line(line, column, selection.delimiter_len())
                .map(|range| doc.read(range).into_owned())
                .unwrap_or_default();
            keys.push(sort_key(&text));
        }

        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_by(|&a, &b| {
            let ord = compare_keys(&keys[a], &keys[b]);
            match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });

        if ctl.is_cancelled() {
            return Ok(PassOutcome::Cancelled);
        }
        apply_row_order(doc, header_lines, &order)?;
        ctl.report(Stage::Sort, total, total);
        self.active = Some(SortPermutation {
            order,
            header_lines,
        });
        Ok(PassOutcome::Completed)
    }

    /// Undo the active sort, reproducing the pre-sort row order exactly.
    ///
    /// A no-op when no sort is active. Fails with
    /// [`ReplaceError::SortRestore`] when the document's row count no
    /// longer matches the saved permutation.
    pub fn restore_original_order(&mut self, doc: &mut dyn Document) -> Result<(), ReplaceError> {
        let Some(permutation) = self.active.take() else {
            return Ok(());
        };
        let rows = data_rows(doc, permutation.header_lines).count();
        if rows != permutation.order.len() {
            self.active = Some(permutation);
            return Err(ReplaceError::SortRestore(
                "document row count changed since the sort",
            ));
        }

        // Invert: the row now at position i must return to position
        // order[i].
        let mut inverse = vec![0usize; permutation.order.len()];
        for (position, &original) in permutation.order.iter().enumerate() {
            inverse[original] = position;
        }
        apply_row_order(doc, permutation.header_lines, &inverse)
    }
}

/// The sortable line index range: everything after the header, excluding a
/// trailing empty line produced by a final line terminator.
fn data_rows(doc: &dyn Document, header_lines: usize) -> Range<usize> {
    let mut count = doc.line_count();
    if count > 1 {
        let last = doc.line_range(count - 1);
        if last.is_empty() && last.start == doc.len_bytes() {
            count -= 1;
        }
    }
    header_lines.min(count)..count
}

/// Rewrite the data region so that new row `i` is old row `order[i]`.
fn apply_row_order(
    doc: &mut dyn Document,
    header_lines: usize,
    order: &[usize],
) -> Result<(), ReplaceError> {
    let rows = data_rows(doc, header_lines);
    if rows.len() != order.len() {
        return Err(ReplaceError::SortRestore("row count mismatch"));
    }
    if order.is_empty() {
        return Ok(());
    }

    let texts: Vec<String> = rows
        .clone()
        .map(|line| doc.read(doc.line_range(line)).into_owned())
        .collect();

    let region = doc.line_range(rows.start).start..doc.line_range(rows.end - 1).end;
    let eol = if doc.read(region.clone()).contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    };
    let reordered: Vec<&str> = order.iter().map(|&row| texts[row].as_str()).collect();
    doc.replace(region, &reordered.join(eol));
    Ok(())
}

/// A precomputed comparison key. Numbers bucket ahead of text, which keeps
/// the comparator a total order even when number-like and text values mix.
#[derive(Debug)]
enum SortKey {
    Number(f64),
    Text(String),
}

fn sort_key(text: &str) -> SortKey {
    match parse_number(text) {
        Some(n) => SortKey::Number(n),
        None => SortKey::Text(text.to_string()),
    }
}

fn compare_keys(a: &SortKey, b: &SortKey) -> Ordering {
    match (a, b) {
        // parse_number only yields finite values, so partial_cmp is total.
        (SortKey::Number(x), SortKey::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
        (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
        (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
    }
}

fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{CancelFlag, Progress};
    use crate::document::RopeDocument;

    fn sorted(
        text: &str,
        column: usize,
        direction: SortDirection,
        header_lines: usize,
    ) -> (RopeDocument, ColumnSorter) {
        let mut doc = RopeDocument::from_text(text);
        let mut model = DelimiterModel::new();
        let selection = ColumnSelection::new([column], ",", None).unwrap();
        let mut sorter = ColumnSorter::new();
        let outcome = sorter
            .sort_by_column(
                &mut doc,
                &mut model,
                &selection,
                column,
                direction,
                header_lines,
                &mut PassControl::default(),
            )
            .unwrap();
        assert_eq!(outcome, PassOutcome::Completed);
        (doc, sorter)
    }

    #[test]
    fn test_lexicographic_sort() {
        let (doc, _) = sorted("b,1\na,2\nc,0", 1, SortDirection::Ascending, 0);
        assert_eq!(doc.text(), "a,2\nb,1\nc,0");
    }

    #[test]
    fn test_numeric_sort_when_all_values_parse() {
        let (doc, _) = sorted("x,10\ny,9\nz,-2", 2, SortDirection::Ascending, 0);
        assert_eq!(doc.text(), "z,-2\ny,9\nx,10");
    }

    #[test]
    fn test_numbers_sort_before_text() {
        // "10" and "2" order numerically; "beta" buckets after all numbers.
        let (doc, _) = sorted("a,10\nb,beta\nc,2", 2, SortDirection::Ascending, 0);
        assert_eq!(doc.text(), "c,2\na,10\nb,beta");
    }

    #[test]
    fn test_mixed_keys_order_deterministically() {
        // "2" < "10" numerically, "10" < "1z" and "1z" < "2" as text; the
        // bucketed keys make one consistent order out of it.
        let (doc, _) = sorted("a,10\nb,1z\nc,2", 2, SortDirection::Ascending, 0);
        assert_eq!(doc.text(), "c,2\na,10\nb,1z");
    }

    #[test]
    fn test_descending() {
        let (doc, _) = sorted("a,1\nb,3\nc,2", 2, SortDirection::Descending, 0);
        assert_eq!(doc.text(), "b,3\nc,2\na,1");
    }

    #[test]
    fn test_stable_on_ties() {
        let (doc, _) = sorted("b,1\na,1\nc,0", 2, SortDirection::Ascending, 0);
        assert_eq!(doc.text(), "c,0\nb,1\na,1");
    }

    #[test]
    fn test_header_lines_pinned() {
        let (doc, _) = sorted("name,n\nb,2\na,1", 2, SortDirection::Ascending, 1);
        assert_eq!(doc.text(), "name,n\na,1\nb,2");
    }

    #[test]
    fn test_missing_column_sorts_as_empty() {
        let (doc, _) = sorted("a,2\njustone\nb,1", 2, SortDirection::Ascending, 0);
        assert_eq!(doc.text(), "justone\nb,1\na,2");
    }

    #[test]
    fn test_round_trip_restores_exactly() {
        let original = "h,h\nq,3\nw,1\ne,2\nr,1";
        let (mut doc, mut sorter) = sorted(original, 2, SortDirection::Ascending, 1);
        assert_eq!(doc.text(), "h,h\nw,1\nr,1\ne,2\nq,3");
        sorter.restore_original_order(&mut doc).unwrap();
        assert_eq!(doc.text(), original);
        assert!(!sorter.is_sorted());
    }

    #[test]
    fn test_restore_without_sort_is_noop() {
        let mut doc = RopeDocument::from_text("b\na");
        let mut sorter = ColumnSorter::new();
        sorter.restore_original_order(&mut doc).unwrap();
        assert_eq!(doc.text(), "b\na");
    }

    #[test]
    fn test_trailing_newline_preserved() {
        let (doc, _) = sorted("b,2\na,1\n", 2, SortDirection::Ascending, 0);
        assert_eq!(doc.text(), "a,1\nb,2\n");
    }

    #[test]
    fn test_restore_detects_row_count_change() {
        let (mut doc, mut sorter) = sorted("b,2\na,1\nc,3", 2, SortDirection::Ascending, 0);
        doc.replace(0..0, "new,0\n");
        let err = sorter.restore_original_order(&mut doc).unwrap_err();
        assert!(matches!(err, ReplaceError::SortRestore(_)));
        // The permutation survives a failed restore.
        assert!(sorter.is_sorted());
    }

    #[test]
    fn test_permutation_maps_new_to_original() {
        let (_, sorter) = sorted("c\na\nb", 1, SortDirection::Ascending, 0);
        assert_eq!(sorter.permutation().unwrap().order(), &[1, 2, 0]);
    }

    #[test]
    fn test_cancelled_sort_leaves_document_untouched() {
        let mut doc = RopeDocument::from_text("b,2\na,1");
        let mut model = DelimiterModel::new();
        let selection = ColumnSelection::new([2], ",", None).unwrap();
        let mut sorter = ColumnSorter::new();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut ctl = PassControl::with_cancel(cancel);

        let outcome = sorter
            .sort_by_column(
                &mut doc,
                &mut model,
                &selection,
                2,
                SortDirection::Ascending,
                0,
                &mut ctl,
            )
            .unwrap();
        assert_eq!(outcome, PassOutcome::Cancelled);
        assert_eq!(doc.text(), "b,2\na,1");
        assert!(!sorter.is_sorted());
    }

    #[test]
    fn test_sort_reports_progress() {
        let mut doc = RopeDocument::from_text("b,2\na,1\nc,3");
        let mut model = DelimiterModel::new();
        let selection = ColumnSelection::new([2], ",", None).unwrap();
        let mut sorter = ColumnSorter::new();
        let mut stages = Vec::new();
        let mut sink = |p: Progress| stages.push(p.stage);
        let mut ctl = PassControl::with_progress(CancelFlag::new(), &mut sink);

        sorter
            .sort_by_column(
                &mut doc,
                &mut model,
                &selection,
                2,
                SortDirection::Ascending,
                0,
                &mut ctl,
            )
            .unwrap();
        drop(ctl);
        assert!(stages.contains(&Stage::Scan));
        assert!(stages.contains(&Stage::Sort));
    }
}
