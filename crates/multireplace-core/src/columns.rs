//! Column selection and column-range queries.
//!
//! A [`ColumnSelection`] is the user's column-scoping request: which 1-based
//! columns to operate on, the (extended-syntax) delimiter that separates
//! them, and an optional quote character. [`ColumnIndex`] answers range
//! queries against a scanned [`crate::DelimiterModel`]: the byte ranges a
//! selection covers on a line, and which line/column a document offset falls
//! in.

use std::collections::BTreeSet;
use std::ops::Range;

use crate::delimiter::DelimiterModel;
use crate::error::ReplaceError;
use crate::escape::decode_extended;

/// A validated set of selected columns plus the delimiter model inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSelection {
    columns: BTreeSet<usize>,
    delimiter: String,
    quote: Option<char>,
}

impl ColumnSelection {
    /// Build a selection from 1-based column indices, a raw (extended-syntax)
    /// delimiter string, and an optional quote character.
    ///
    /// Fails with [`ReplaceError::InvalidDelimiter`] when the decoded
    /// delimiter is empty, the column set is empty or contains 0, or the
    /// quote character is not `"` or `'`.
    pub fn new(
        columns: impl IntoIterator<Item = usize>,
        delimiter: &str,
        quote: Option<char>,
    ) -> Result<Self, ReplaceError> {
        let decoded = decode_extended(delimiter);
        if decoded.is_empty() {
            return Err(ReplaceError::InvalidDelimiter("delimiter is empty"));
        }
        if let Some(q) = quote
            && q != '"'
            && q != '\''
        {
            return Err(ReplaceError::InvalidDelimiter(
                "quote character must be \" or '",
            ));
        }
        let columns: BTreeSet<usize> = columns.into_iter().collect();
        if columns.is_empty() {
            return Err(ReplaceError::InvalidDelimiter("no columns selected"));
        }
        if columns.contains(&0) {
            return Err(ReplaceError::InvalidDelimiter("columns are 1-based"));
        }
        Ok(Self {
            columns,
            delimiter: decoded,
            quote,
        })
    }

    /// The selected 1-based column indices, in ascending order.
    pub fn columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns.iter().copied()
    }

    /// The decoded delimiter string.
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Length of the decoded delimiter in bytes.
    pub fn delimiter_len(&self) -> usize {
        self.delimiter.len()
    }

    /// The quote character, if any.
    pub fn quote(&self) -> Option<char> {
        self.quote
    }
}

fn column_range(
    delimiters: &[usize],
    line_start: usize,
    line_len: usize,
    column: usize,
    delimiter_len: usize,
) -> Option<Range<usize>> {
    let field_count = delimiters.len() + 1;
    if column == 0 || column > field_count {
        return None;
    }
    let rel_start = if column == 1 {
        0
    } else {
        delimiters[column - 2] + delimiter_len
    };
    let rel_end = if column <= delimiters.len() {
        delimiters[column - 1]
    } else {
        line_len
    };
    if rel_start > rel_end {
        // Delimiter ran past end of line (e.g. a multi-byte delimiter
        // truncated by the line terminator).
        return None;
    }
    Some(line_start + rel_start..line_start + rel_end)
}

/// Range and position queries over a scanned [`DelimiterModel`].
pub struct ColumnIndex<'a> {
    model: &'a DelimiterModel,
}

impl<'a> ColumnIndex<'a> {
    /// Create an index over a scanned model.
    pub fn new(model: &'a DelimiterModel) -> Self {
        Self { model }
    }

    /// Byte ranges of the selected columns on `line`, in ascending order.
    ///
    /// Columns beyond the line's delimiter count are simply absent. Ranges
    /// exclude the delimiter bytes on either side; an empty field yields an
    /// empty range.
    pub fn column_ranges_for_line(&self, line: usize, sel: &ColumnSelection) -> Vec<Range<usize>> {
        let Some(info) = self.model.line(line) else {
            return Vec::new();
        };
        let dlen = sel.delimiter_len();
        let line_len = info.end - info.start;

        let mut ranges = Vec::new();
        for column in sel.columns() {
            if let Some(range) =
                column_range(info.delimiters.as_slice(), info.start, line_len, column, dlen)
            {
                ranges.push(range);
            }
        }
        ranges
    }

    /// Byte range of a single 1-based column on `line`, or `None` when the
    /// line has fewer columns.
    pub fn column_range_for_line(
        &self,
        line: usize,
        column: usize,
        delimiter_len: usize,
    ) -> Option<Range<usize>> {
        let info = self.model.line(line)?;
        column_range(
            info.delimiters.as_slice(),
            info.start,
            info.end - info.start,
            column,
            delimiter_len,
        )
    }

    /// Locate a document byte offset: `(0-based line, 1-based column)`.
    ///
    /// Offsets within delimiter bytes are attributed to the following
    /// column; offsets past the end of the document are attributed to the
    /// last scanned line. Returns `None` when the model holds no lines.
    pub fn locate(&self, offset: usize, sel: &ColumnSelection) -> Option<(usize, usize)> {
        let lines = self.model.lines();
        if lines.is_empty() {
            return None;
        }
        let line = lines.partition_point(|info| info.start <= offset);
        let line = line.checked_sub(1)?;
        let info = &lines[line];
        let rel = offset.saturating_sub(info.start);
        let dlen = sel.delimiter_len();
        let column = info.delimiters.partition_point(|&d| d + dlen <= rel) + 1;
        Some((line, column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::PassControl;
    use crate::document::{Document, RopeDocument};

    fn scanned(text: &str, sel: &ColumnSelection) -> (RopeDocument, DelimiterModel) {
        let mut doc = RopeDocument::from_text(text);
        let mut model = DelimiterModel::new();
        model
            .sync(&mut doc, sel, &mut PassControl::default())
            .unwrap();
        (doc, model)
    }

    #[test]
    fn test_selection_validation() {
        assert!(ColumnSelection::new([1], ",", None).is_ok());
        assert!(ColumnSelection::new([1], "", None).is_err());
        assert!(ColumnSelection::new([], ",", None).is_err());
        assert!(ColumnSelection::new([0], ",", None).is_err());
        assert!(ColumnSelection::new([1], ",", Some('x')).is_err());
        assert!(ColumnSelection::new([1], ",", Some('\'')).is_ok());
    }

    #[test]
    fn test_extended_delimiter_decoded() {
        let sel = ColumnSelection::new([1], r"\t", None).unwrap();
        assert_eq!(sel.delimiter(), "\t");
        assert_eq!(sel.delimiter_len(), 1);
    }

    #[test]
    fn test_column_ranges_basic() {
        let sel = ColumnSelection::new([1, 3], ",", None).unwrap();
        let (doc, model) = scanned("aa,bb,cc\nx,y", &sel);
        let index = ColumnIndex::new(&model);

        let ranges = index.column_ranges_for_line(0, &sel);
        assert_eq!(ranges, vec![0..2, 6..8]);
        assert_eq!(doc.read(6..8), "cc");

        // Line 1 has only two columns; column 3 is absent.
        let ranges = index.column_ranges_for_line(1, &sel);
        assert_eq!(ranges, vec![9..10]);
    }

    #[test]
    fn test_empty_field_yields_empty_range() {
        let sel = ColumnSelection::new([2], ",", None).unwrap();
        let (_, model) = scanned("a,,b", &sel);
        let index = ColumnIndex::new(&model);
        assert_eq!(index.column_ranges_for_line(0, &sel), vec![2..2]);
    }

    #[test]
    fn test_locate() {
        let sel = ColumnSelection::new([1], ",", None).unwrap();
        let (_, model) = scanned("aa,bb\ncc,dd", &sel);
        let index = ColumnIndex::new(&model);

        assert_eq!(index.locate(0, &sel), Some((0, 1)));
        assert_eq!(index.locate(3, &sel), Some((0, 2)));
        assert_eq!(index.locate(6, &sel), Some((1, 1)));
        assert_eq!(index.locate(9, &sel), Some((1, 2)));
    }
}
