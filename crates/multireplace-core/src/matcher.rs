//! Rules and match enumeration.
//!
//! A [`Rule`] pairs find/replace text with a matching mode and flags. The
//! [`MatchEngine`] compiles one rule and enumerates its matches over a text
//! snapshot, restricted to a set of scope regions (the whole document, a
//! selection, or per-line column ranges). All offsets are byte offsets.
//!
//! All three modes compile down to a [`regex::Regex`]:
//!
//! - **Literal**: the find text is escaped and matched verbatim.
//! - **Extended**: the find text is escape-decoded first (see
//!   [`crate::decode_extended`]), then matched as literal.
//! - **Regex**: the find text is the pattern; whole-word wraps it in
//!   `\b(?:…)\b`, which keeps capture-group numbering intact.
//!
//! Literal and Extended whole-word matching uses a two-sided word-character
//! test against the region's text instead of pattern wrapping, so the find
//! text itself may begin or end with non-word characters.

use std::ops::Range;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ReplaceError;
use crate::escape::decode_extended;

/// How a rule's find text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Exact substring match.
    Literal,
    /// Escape-decoded, then matched as literal.
    Extended,
    /// Regular-expression match.
    Regex,
}

/// One find/replace rule: a row of the user's rule list.
///
/// Rules live in an ordered list owned by a [`crate::ReplaceSession`]; list
/// order determines application order. Duplicate rules are legal and are
/// counted independently. Serializes as a flat record for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Whether list passes apply this rule.
    pub enabled: bool,
    /// The find text, interpreted per `mode`.
    pub find: String,
    /// The replacement text (or, with `use_variables`, the expression
    /// source handed to the evaluator).
    pub replace: String,
    /// Matching mode.
    pub mode: MatchMode,
    /// Match whole words only.
    pub whole_word: bool,
    /// Case-sensitive matching.
    pub match_case: bool,
    /// Compute the replacement dynamically via the session's evaluator.
    pub use_variables: bool,
}

impl Rule {
    /// A case-sensitive literal rule with all flags off.
    pub fn new(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            enabled: true,
            find: find.into(),
            replace: replace.into(),
            mode: MatchMode::Literal,
            whole_word: false,
            match_case: true,
            use_variables: false,
        }
    }

    /// Same as [`Rule::new`] with the mode set to [`MatchMode::Regex`].
    pub fn regex(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            mode: MatchMode::Regex,
            ..Self::new(find, replace)
        }
    }
}

/// One match, produced against a snapshot of the document.
///
/// A match goes stale the instant an earlier edit shifts offsets under it;
/// the edit sequencer's delta tracking exists precisely to keep applying
/// stale matches safely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Absolute byte offset of the match start.
    pub start: usize,
    /// Match length in bytes (zero-length regex matches are legal).
    pub len: usize,
    /// The matched text.
    pub text: String,
    /// Captured group text, groups `1..`, for Regex rules.
    pub captures: Vec<Option<String>>,
    /// Start offset of the scope region this match was found in.
    pub region_start: usize,
}

impl Match {
    /// Exclusive end offset.
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    /// The match as a byte range.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

/// A compiled rule that enumerates matches over scope regions.
#[derive(Debug)]
pub struct MatchEngine {
    regex: Regex,
    boundary_filter: bool,
    empty_query: bool,
}

impl MatchEngine {
    /// Compile a rule's find text.
    ///
    /// Fails with [`ReplaceError::RegexCompile`] on a malformed pattern
    /// (possible in any mode in principle, in practice only for
    /// [`MatchMode::Regex`]).
    pub fn compile(rule: &Rule) -> Result<Self, ReplaceError> {
        let (pattern, boundary_filter) = match rule.mode {
            MatchMode::Literal => (regex::escape(&rule.find), rule.whole_word),
            MatchMode::Extended => (regex::escape(&decode_extended(&rule.find)), rule.whole_word),
            MatchMode::Regex => {
                let pattern = if rule.whole_word {
                    format!(r"\b(?:{})\b", rule.find)
                } else {
                    rule.find.clone()
                };
                (pattern, false)
            }
        };
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(!rule.match_case)
            .multi_line(true)
            .build()
            .map_err(|err| ReplaceError::RegexCompile {
                pattern: rule.find.clone(),
                message: err.to_string(),
            })?;
        Ok(Self {
            regex,
            boundary_filter,
            empty_query: rule.find.is_empty(),
        })
    }

    /// Lazily enumerate matches over `regions` of `text`, in ascending
    /// offset order, non-overlapping.
    ///
    /// Each region is matched independently: matches never span a region
    /// boundary, and anchors/word boundaries see the region as their text.
    /// The sequence is finite even for patterns that can match empty (the
    /// cursor always advances at least one character past a zero-length
    /// match). Calling this again restarts the enumeration.
    pub fn matches<'e, 't>(&'e self, text: &'t str, regions: &[Range<usize>]) -> MatchIter<'e, 't> {
        MatchIter {
            engine: self,
            text,
            regions: regions.to_vec(),
            region_idx: 0,
            pos: 0,
        }
    }

    /// Collect all matches (forward, single pass).
    pub fn find_all(&self, text: &str, regions: &[Range<usize>]) -> Vec<Match> {
        self.matches(text, regions).collect()
    }

    /// First match starting at or after `from`; wraps to the first match
    /// overall when `wrap` is set and nothing follows `from`.
    pub fn find_next(
        &self,
        text: &str,
        regions: &[Range<usize>],
        from: usize,
        wrap: bool,
    ) -> Option<Match> {
        let mut first = None;
        for m in self.matches(text, regions) {
            if m.start >= from {
                return Some(m);
            }
            if wrap && first.is_none() {
                first = Some(m);
            }
        }
        first
    }

    /// Last match ending at or before `from`; wraps to the last match
    /// overall when `wrap` is set and nothing precedes `from`.
    pub fn find_prev(
        &self,
        text: &str,
        regions: &[Range<usize>],
        from: usize,
        wrap: bool,
    ) -> Option<Match> {
        let mut before = None;
        let mut last = None;
        for m in self.matches(text, regions) {
            if m.end() <= from {
                before = Some(m.clone());
            }
            if wrap {
                last = Some(m);
            }
        }
        before.or(last)
    }
}

/// Lazy match enumeration returned by [`MatchEngine::matches`].
pub struct MatchIter<'e, 't> {
    engine: &'e MatchEngine,
    text: &'t str,
    regions: Vec<Range<usize>>,
    region_idx: usize,
    pos: usize,
}

impl Iterator for MatchIter<'_, '_> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        if self.engine.empty_query {
            return None;
        }
        while self.region_idx < self.regions.len() {
            let region = self.regions[self.region_idx].clone();
            let slice = &self.text[region.clone()];

            while self.pos <= slice.len() {
                let Some(caps) = self.engine.regex.captures_at(slice, self.pos) else {
                    break;
                };
                let m = caps.get(0)?;
                let empty = m.start() == m.end();

                if empty {
                    self.pos = next_char_boundary(slice, m.end());
                } else if self.engine.boundary_filter
                    && !is_whole_word(slice, m.start(), m.end())
                {
                    self.pos = m.end();
                    continue;
                } else {
                    self.pos = m.end();
                }

                let captures = (1..caps.len())
                    .map(|i| caps.get(i).map(|g| g.as_str().to_string()))
                    .collect();
                return Some(Match {
                    start: region.start + m.start(),
                    len: m.end() - m.start(),
                    text: m.as_str().to_string(),
                    captures,
                    region_start: region.start,
                });
            }

            self.region_idx += 1;
            self.pos = 0;
        }
        None
    }
}

/// The host word-character classification: alphanumerics and `_`.
pub(crate) fn is_word_char(ch: char) -> bool {
    ch == '_' || ch.is_alphanumeric()
}

fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

/// One past `offset`'s char, clamped so iteration terminates at end of text.
fn next_char_boundary(text: &str, offset: usize) -> usize {
    match text[offset..].chars().next() {
        Some(ch) => offset + ch.len_utf8(),
        None => text.len() + 1,
    }
}

/// Byte offsets of line starts in a snapshot; answers "which line is this
/// offset on" by binary search.
#[derive(Debug)]
pub(crate) struct LineStarts {
    starts: Vec<usize>,
}

impl LineStarts {
    pub(crate) fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    /// 0-based line containing `offset`.
    pub(crate) fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset) - 1
    }

    /// Byte offset of the start of `line`.
    pub(crate) fn start_of(&self, line: usize) -> usize {
        self.starts[line.min(self.starts.len() - 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whole(text: &str) -> Vec<Range<usize>> {
        vec![0..text.len()]
    }

    fn starts(matches: &[Match]) -> Vec<usize> {
        matches.iter().map(|m| m.start).collect()
    }

    #[test]
    fn test_literal_find_all() {
        let rule = Rule::new("ab", "-");
        let engine = MatchEngine::compile(&rule).unwrap();
        let text = "ab xab aby";
        assert_eq!(starts(&engine.find_all(text, &whole(text))), vec![0, 4, 7]);
    }

    #[test]
    fn test_case_insensitive() {
        let mut rule = Rule::new("foo", "-");
        rule.match_case = false;
        let engine = MatchEngine::compile(&rule).unwrap();
        let text = "Foo FOO foo";
        assert_eq!(engine.find_all(text, &whole(text)).len(), 3);
    }

    #[test]
    fn test_whole_word_literal() {
        let mut rule = Rule::new("foo", "-");
        rule.whole_word = true;
        let engine = MatchEngine::compile(&rule).unwrap();
        let text = "foobar foo barfoo foo";
        assert_eq!(starts(&engine.find_all(text, &whole(text))), vec![7, 18]);
    }

    #[test]
    fn test_whole_word_nonword_edges() {
        // A find text ending in punctuation still whole-word-matches: only
        // the neighbouring characters are classified.
        let mut rule = Rule::new("foo!", "-");
        rule.whole_word = true;
        let engine = MatchEngine::compile(&rule).unwrap();
        let text = "say foo! now";
        assert_eq!(starts(&engine.find_all(text, &whole(text))), vec![4]);
    }

    #[test]
    fn test_extended_mode_decodes() {
        let mut rule = Rule::new(r"a\tb", "-");
        rule.mode = MatchMode::Extended;
        let engine = MatchEngine::compile(&rule).unwrap();
        let text = "xa\tbx a\\tb";
        assert_eq!(starts(&engine.find_all(text, &whole(text))), vec![1]);
    }

    #[test]
    fn test_regex_captures() {
        let rule = Rule::regex(r"(\w+)@(\w+)", "-");
        let engine = MatchEngine::compile(&rule).unwrap();
        let text = "mail me@here now";
        let matches = engine.find_all(text, &whole(text));
        assert_eq!(matches.len(), 1);
        assert_eq!(
            matches[0].captures,
            vec![Some("me".to_string()), Some("here".to_string())]
        );
    }

    #[test]
    fn test_regex_whole_word_keeps_group_numbers() {
        let mut rule = Rule::regex(r"(f)(oo)", "-");
        rule.whole_word = true;
        let engine = MatchEngine::compile(&rule).unwrap();
        let text = "foo food";
        let matches = engine.find_all(text, &whole(text));
        assert_eq!(starts(&matches), vec![0]);
        assert_eq!(
            matches[0].captures,
            vec![Some("f".to_string()), Some("oo".to_string())]
        );
    }

    #[test]
    fn test_zero_length_matches_terminate() {
        // `x*` against "aaa" must not loop.
        let rule = Rule::regex("x*", "-");
        let engine = MatchEngine::compile(&rule).unwrap();
        let text = "aaa";
        let matches = engine.find_all(text, &whole(text));
        // Empty matches at offsets 0..=3.
        assert_eq!(starts(&matches), vec![0, 1, 2, 3]);
        assert!(matches.iter().all(|m| m.len == 0));
    }

    #[test]
    fn test_zero_length_advance_is_char_aware() {
        let rule = Rule::regex("q*", "-");
        let engine = MatchEngine::compile(&rule).unwrap();
        let text = "é日";
        let matches = engine.find_all(text, &whole(text));
        assert_eq!(starts(&matches), vec![0, 2, 5]);
    }

    #[test]
    fn test_malformed_pattern() {
        let rule = Rule::regex("(unclosed", "-");
        let err = MatchEngine::compile(&rule).unwrap_err();
        assert!(matches!(err, ReplaceError::RegexCompile { .. }));
    }

    #[test]
    fn test_empty_query_yields_nothing() {
        let rule = Rule::new("", "-");
        let engine = MatchEngine::compile(&rule).unwrap();
        assert!(engine.find_all("abc", &whole("abc")).is_empty());
    }

    #[test]
    fn test_matches_confined_to_regions() {
        let rule = Rule::new("bc", "-");
        let engine = MatchEngine::compile(&rule).unwrap();
        // "bc" straddles the region boundary at offset 2; no match.
        let matches = engine.find_all("abcd", &[0..2, 2..4]);
        assert!(matches.is_empty());

        let matches = engine.find_all("abcd", &[1..3]);
        assert_eq!(starts(&matches), vec![1]);
        assert_eq!(matches[0].region_start, 1);
    }

    #[test]
    fn test_find_next_wraparound() {
        let rule = Rule::new("a", "-");
        let engine = MatchEngine::compile(&rule).unwrap();
        let text = "a..a..";
        assert_eq!(engine.find_next(text, &whole(text), 1, false).unwrap().start, 3);
        assert!(engine.find_next(text, &whole(text), 4, false).is_none());
        assert_eq!(engine.find_next(text, &whole(text), 4, true).unwrap().start, 0);
    }

    #[test]
    fn test_find_prev_wraparound() {
        let rule = Rule::new("a", "-");
        let engine = MatchEngine::compile(&rule).unwrap();
        let text = "a..a..";
        assert_eq!(engine.find_prev(text, &whole(text), 3, false).unwrap().start, 0);
        assert!(engine.find_prev(text, &whole(text), 0, false).is_none());
        assert_eq!(engine.find_prev(text, &whole(text), 0, true).unwrap().start, 3);
    }

    #[test]
    fn test_line_starts() {
        let ls = LineStarts::new("ab\ncd\n\nef");
        assert_eq!(ls.line_of(0), 0);
        assert_eq!(ls.line_of(4), 1);
        assert_eq!(ls.line_of(6), 2);
        assert_eq!(ls.line_of(8), 3);
        assert_eq!(ls.start_of(3), 7);
    }
}
