#![warn(missing_docs)]
//! MultiReplace Core - Headless Multi-Pattern Find/Replace Engine
//!
//! # Overview
//!
//! `multireplace-core` runs ordered lists of find/replace rules over a host
//! text buffer. It is headless: it owns no UI and no file, seeing the text
//! only through the [`Document`] trait. It supports literal, escape-extended,
//! and regex matching, whole-word and case options, CSV-aware column scoping,
//! dynamic replacements computed per match, column sorting with exact
//! restore, and cooperative cancellation of long passes.
//!
//! # Core Features
//!
//! - **Rule Lists**: ordered rules applied in one pass, each seeing the
//!   previous rule's edits
//! - **Three Match Modes**: literal, extended (escape-decoded), and regex
//!   with capture groups and backreferences
//! - **Column Scope**: delimiter/quote-aware CSV model restricting matches
//!   to selected columns, kept current incrementally across edits
//! - **Dynamic Replacements**: per-match scripts over `CNT`, `LINE`,
//!   `LPOS`, `APOS`, `COL`, `MATCH`, and `CAPn`, pluggable via [`Evaluator`]
//! - **Column Sort**: numeric-aware stable sort by column, reversible to
//!   the exact original row order
//! - **Cooperative Cancellation**: chunked progress checks; a cancelled
//!   pass keeps its completed edits and reports what it did
//!
//! # Quick Start
//!
//! ```rust
//! use multireplace_core::{PassOutcome, ReplaceSession, RopeDocument, Rule, ScopeSpec};
//!
//! let mut doc = RopeDocument::from_text("a cat and a dog");
//! let mut session = ReplaceSession::with_rules(vec![
//!     Rule::new("cat", "dog"),
//!     Rule::new("dog", "wolf"),
//! ]);
//!
//! let summary = session
//!     .replace_all(&mut doc, ScopeSpec::WholeDocument, None, None)
//!     .unwrap();
//! assert_eq!(summary.outcome, PassOutcome::Completed);
//! assert_eq!(doc.text(), "a wolf and a wolf");
//! ```
//!
//! # Module Description
//!
//! - [`document`] - the host buffer trait and a rope-backed implementation
//! - [`matcher`] - rules, match modes, and lazy match enumeration
//! - [`escape`] - extended escape decoding (`\n`, `\xHH`, `\uHHHH`, ...)
//! - [`delimiter`] - incremental delimiter/quote scanning for column scope
//! - [`columns`] - column selections and range/position queries
//! - [`resolver`] - static and script-driven replacement text resolution
//! - [`evaluator`] - the dynamic-replacement capability seam
//! - [`sequencer`] - offset translation across cascading edits
//! - [`session`] - list passes: replace, mark, count, find next/previous
//! - [`sorter`] - column sort and original-order restore
//! - [`rule_list`] - CSV rule-list serialization and shell-script export
//! - [`control`] - cancellation flags and progress reporting
//! - [`error`] - the engine's error taxonomy

pub mod columns;
pub mod control;
pub mod delimiter;
pub mod document;
pub mod error;
pub mod escape;
pub mod evaluator;
pub mod matcher;
pub mod resolver;
pub mod rule_list;
pub mod sequencer;
pub mod session;
pub mod sorter;

pub use columns::{ColumnIndex, ColumnSelection};
pub use control::{CancelFlag, PassControl, Progress, Stage};
pub use delimiter::{DelimiterModel, LineInfo};
pub use document::{ChangeEvent, ChangeKind, Document, RopeDocument};
pub use error::{ReplaceError, ScriptError};
pub use escape::decode_extended;
pub use evaluator::{EvalOutcome, Evaluator, Value, VarEnv, format_number};
pub use matcher::{Match, MatchEngine, MatchMode, Rule};
pub use resolver::{ReplacementResolver, Resolution};
pub use rule_list::{RuleListError, export_bash_script, parse_rules, serialize_rules};
pub use sequencer::EditSequencer;
pub use session::{
    MarkSpan, PassOutcome, PassSummary, ReplaceSession, RuleReport, RulePolicy, ScopeSpec,
};
pub use sorter::{ColumnSorter, SortDirection, SortPermutation};
