//! The replace session: rule list, counters, and coordinated passes.
//!
//! A [`ReplaceSession`] owns the ordered rule list, the per-pass counters,
//! the cancel flag, and the column-scoping state, and threads them through
//! the pipeline explicitly, with no ambient global state. Rules are
//! applied one at a time in list order, each against the document state the
//! previous rule left behind, so rule order is semantically meaningful.
//!
//! Every pass produces a [`PassSummary`] whose counts (found, replaced,
//! skipped by the evaluator, skipped due to script errors, failed rules) are
//! independently queryable, and which distinguishes completion from
//! cancellation. A cancelled pass keeps all edits applied so far.

use std::ops::Range;

use crate::columns::{ColumnIndex, ColumnSelection};
use crate::control::{CHUNK_SIZE, CancelFlag, PassControl, Progress, Stage};
use crate::delimiter::DelimiterModel;
use crate::document::Document;
use crate::error::ReplaceError;
use crate::evaluator::{Evaluator, VarEnv};
use crate::matcher::{LineStarts, Match, MatchEngine, Rule};
use crate::resolver::{ReplacementResolver, Resolution};
use crate::sequencer::EditSequencer;

/// The document region(s) a pass operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeSpec {
    /// The whole document.
    WholeDocument,
    /// The given byte range (the host's current selection).
    Selection(Range<usize>),
    /// The session's configured column selection. Falls back to the whole
    /// document when no column scope is configured.
    Columns,
}

/// What to do when a rule fails to compile during a multi-rule pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RulePolicy {
    /// Record the failure and keep going with the remaining rules.
    #[default]
    SkipAndContinue,
    /// Abort the whole pass with the error.
    Abort,
}

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// All rules ran to completion.
    Completed,
    /// The cancel flag stopped the pass early; partial results are final.
    Cancelled,
}

/// Per-rule counters for one pass. Reset at the start of every pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleReport {
    /// Matches found.
    pub found: usize,
    /// Matches replaced.
    pub replaced: usize,
    /// Matches the evaluator asked to skip (found, not replaced).
    pub skipped: usize,
    /// Matches skipped because the evaluator errored.
    pub script_errors: usize,
    /// Rule-level failure (e.g. a malformed pattern), when the policy is
    /// skip-and-continue.
    pub error: Option<String>,
}

/// Aggregate result of one pass, indexed like the rule list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSummary {
    /// One report per rule, in list order (disabled and unreached rules
    /// report zeros).
    pub rules: Vec<RuleReport>,
    /// Completed or cancelled.
    pub outcome: PassOutcome,
}

impl PassSummary {
    /// Grand total of matches found.
    pub fn total_found(&self) -> usize {
        self.rules.iter().map(|r| r.found).sum()
    }

    /// Grand total of matches replaced.
    pub fn total_replaced(&self) -> usize {
        self.rules.iter().map(|r| r.replaced).sum()
    }

    /// Grand total of evaluator-requested skips.
    pub fn total_skipped(&self) -> usize {
        self.rules.iter().map(|r| r.skipped).sum()
    }

    /// Grand total of matches skipped due to script errors.
    pub fn total_script_errors(&self) -> usize {
        self.rules.iter().map(|r| r.script_errors).sum()
    }

    /// Number of rules that failed to run.
    pub fn failed_rules(&self) -> usize {
        self.rules.iter().filter(|r| r.error.is_some()).count()
    }
}

/// A highlight span collected by a mark pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkSpan {
    /// Index of the rule that matched, into the session's rule list.
    pub rule_index: usize,
    /// Byte range of the match.
    pub range: Range<usize>,
}

enum PassAction<'m> {
    Replace,
    Mark(&'m mut Vec<MarkSpan>),
    Count,
}

/// Owns the rule list and runs coordinated multi-rule passes.
#[derive(Default)]
pub struct ReplaceSession {
    rules: Vec<Rule>,
    policy: RulePolicy,
    cancel: CancelFlag,
    selection: Option<ColumnSelection>,
    model: DelimiterModel,
}

impl ReplaceSession {
    /// An empty session with default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// A session seeded with rules.
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    /// The ordered rule list.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Mutable access to the rule list.
    pub fn rules_mut(&mut self) -> &mut Vec<Rule> {
        &mut self.rules
    }

    /// Append a rule.
    pub fn push_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Replace the rule list, preserving the given order.
    pub fn set_rules(&mut self, rules: Vec<Rule>) {
        self.rules = rules;
    }

    /// The rule-failure policy.
    pub fn policy(&self) -> RulePolicy {
        self.policy
    }

    /// Set the rule-failure policy.
    pub fn set_policy(&mut self, policy: RulePolicy) {
        self.policy = policy;
    }

    /// A handle the host can use to cancel an in-progress pass.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Configure (or clear) column scoping. Changing the selection
    /// invalidates the delimiter model lazily; the next column-scoped pass
    /// rescans as needed.
    pub fn set_column_scope(&mut self, selection: Option<ColumnSelection>) {
        self.selection = selection;
    }

    /// The configured column selection, if any.
    pub fn column_scope(&self) -> Option<&ColumnSelection> {
        self.selection.as_ref()
    }

    /// The delimiter model backing column scope (for hosts that render
    /// column highlighting). Only meaningful after a column-scoped
    /// operation or [`ReplaceSession::sync_columns`].
    pub fn delimiter_model(&self) -> &DelimiterModel {
        &self.model
    }

    /// Bring the delimiter model up to date with the document.
    ///
    /// Fails with [`ReplaceError::InvalidDelimiter`] when no column scope is
    /// configured.
    pub fn sync_columns(&mut self, doc: &mut dyn Document) -> Result<(), ReplaceError> {
        let Some(selection) = self.selection.clone() else {
            return Err(ReplaceError::InvalidDelimiter("no column scope configured"));
        };
        let mut ctl = PassControl::with_cancel(self.cancel.clone());
        self.model.sync(doc, &selection, &mut ctl)
    }

    /// Apply every enabled rule as replacements, in list order.
    pub fn replace_all(
        &mut self,
        doc: &mut dyn Document,
        scope: ScopeSpec,
        evaluator: Option<&mut dyn Evaluator>,
        progress: Option<&mut dyn FnMut(Progress)>,
    ) -> Result<PassSummary, ReplaceError> {
        self.run_pass(doc, scope, PassAction::Replace, evaluator, progress)
    }

    /// Collect every enabled rule's match spans without editing.
    pub fn mark_all(
        &mut self,
        doc: &mut dyn Document,
        scope: ScopeSpec,
        progress: Option<&mut dyn FnMut(Progress)>,
    ) -> Result<(PassSummary, Vec<MarkSpan>), ReplaceError> {
        let mut marks = Vec::new();
        let summary = self.run_pass(doc, scope, PassAction::Mark(&mut marks), None, progress)?;
        Ok((summary, marks))
    }

    /// Count every enabled rule's matches without editing.
    pub fn count_all(
        &mut self,
        doc: &mut dyn Document,
        scope: ScopeSpec,
        progress: Option<&mut dyn FnMut(Progress)>,
    ) -> Result<PassSummary, ReplaceError> {
        self.run_pass(doc, scope, PassAction::Count, None, progress)
    }

    /// Find the nearest match of any enabled rule at or after `from`.
    ///
    /// Ties go to the earlier rule in the list. With `wrap`, an exhausted
    /// search restarts from the top of the scope.
    pub fn find_next(
        &mut self,
        doc: &mut dyn Document,
        scope: ScopeSpec,
        from: usize,
        wrap: bool,
    ) -> Result<Option<(usize, Match)>, ReplaceError> {
        let (snapshot, regions) = self.snapshot_regions(doc, &scope)?;
        let mut best = self.list_search(&snapshot, &regions, |engine, text, regions| {
            engine.find_next(text, regions, from, false)
        })?;
        if best.is_none() && wrap {
            best = self.list_search(&snapshot, &regions, |engine, text, regions| {
                engine.find_next(text, regions, 0, false)
            })?;
        }
        Ok(best)
    }

    /// Find the nearest match of any enabled rule ending at or before
    /// `from`, searching backward.
    pub fn find_prev(
        &mut self,
        doc: &mut dyn Document,
        scope: ScopeSpec,
        from: usize,
        wrap: bool,
    ) -> Result<Option<(usize, Match)>, ReplaceError> {
        let (snapshot, regions) = self.snapshot_regions(doc, &scope)?;
        let mut best = self.list_search_backward(&snapshot, &regions, from)?;
        if best.is_none() && wrap {
            best = self.list_search_backward(&snapshot, &regions, snapshot.len())?;
        }
        Ok(best)
    }

    fn snapshot_regions(
        &mut self,
        doc: &mut dyn Document,
        scope: &ScopeSpec,
    ) -> Result<(String, Vec<Range<usize>>), ReplaceError> {
        let mut ctl = PassControl::with_cancel(self.cancel.clone());
        let regions = self.resolve_regions(doc, scope, &mut ctl)?;
        Ok((doc.read_all().into_owned(), regions))
    }

    fn list_search(
        &self,
        snapshot: &str,
        regions: &[Range<usize>],
        search: impl Fn(&MatchEngine, &str, &[Range<usize>]) -> Option<Match>,
    ) -> Result<Option<(usize, Match)>, ReplaceError> {
        let mut best: Option<(usize, Match)> = None;
        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.enabled || rule.find.is_empty() {
                continue;
            }
            let engine = match MatchEngine::compile(rule) {
                Ok(engine) => engine,
                Err(err) => match self.policy {
                    RulePolicy::Abort => return Err(err),
                    RulePolicy::SkipAndContinue => continue,
                },
            };
            if let Some(m) = search(&engine, snapshot, regions)
                && best.as_ref().is_none_or(|(_, b)| m.start < b.start)
            {
                best = Some((index, m));
            }
        }
        Ok(best)
    }

    fn list_search_backward(
        &self,
        snapshot: &str,
        regions: &[Range<usize>],
        from: usize,
    ) -> Result<Option<(usize, Match)>, ReplaceError> {
        let mut best: Option<(usize, Match)> = None;
        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.enabled || rule.find.is_empty() {
                continue;
            }
            let engine = match MatchEngine::compile(rule) {
                Ok(engine) => engine,
                Err(err) => match self.policy {
                    RulePolicy::Abort => return Err(err),
                    RulePolicy::SkipAndContinue => continue,
                },
            };
            if let Some(m) = engine.find_prev(snapshot, regions, from, false)
                && best.as_ref().is_none_or(|(_, b)| m.start > b.start)
            {
                best = Some((index, m));
            }
        }
        Ok(best)
    }

    fn resolve_regions(
        &mut self,
        doc: &mut dyn Document,
        scope: &ScopeSpec,
        ctl: &mut PassControl<'_>,
    ) -> Result<Vec<Range<usize>>, ReplaceError> {
        match scope {
            ScopeSpec::WholeDocument => Ok(vec![0..doc.len_bytes()]),
            ScopeSpec::Selection(range) => {
                let len = doc.len_bytes();
                Ok(vec![range.start.min(len)..range.end.min(len)])
            }
            ScopeSpec::Columns => {
                // No configured selection means scoping is inactive.
                let Some(selection) = self.selection.clone() else {
                    return Ok(vec![0..doc.len_bytes()]);
                };
                self.model.sync(doc, &selection, ctl)?;
                if !self.model.is_scanned() {
                    // Cancelled mid-scan.
                    return Ok(Vec::new());
                }
                let index = ColumnIndex::new(&self.model);
                let mut regions = Vec::new();
                for line in 0..self.model.lines().len() {
                    regions.extend(index.column_ranges_for_line(line, &selection));
                }
                Ok(regions)
            }
        }
    }

    fn run_pass(
        &mut self,
        doc: &mut dyn Document,
        scope: ScopeSpec,
        mut action: PassAction<'_>,
        mut evaluator: Option<&mut dyn Evaluator>,
        progress: Option<&mut dyn FnMut(Progress)>,
    ) -> Result<PassSummary, ReplaceError> {
        self.cancel.reset();
        let mut ctl = PassControl {
            cancel: self.cancel.clone(),
            progress,
        };
        let stage = match &action {
            PassAction::Replace => Stage::Replace,
            _ => Stage::Match,
        };
        let selection = self.selection.clone();
        let column_scoped = matches!(scope, ScopeSpec::Columns) && selection.is_some();
        let rule_count = self.rules.len();
        let mut summary = PassSummary {
            rules: Vec::with_capacity(rule_count),
            outcome: PassOutcome::Completed,
        };

        for index in 0..rule_count {
            let rule = self.rules[index].clone();
            let mut report = RuleReport::default();
            if !rule.enabled || rule.find.is_empty() {
                summary.rules.push(report);
                continue;
            }

            let engine = match MatchEngine::compile(&rule) {
                Ok(engine) => engine,
                Err(err) => match self.policy {
                    RulePolicy::Abort => return Err(err),
                    RulePolicy::SkipAndContinue => {
                        report.error = Some(err.to_string());
                        summary.rules.push(report);
                        continue;
                    }
                },
            };

            // Each rule sees the document state the previous rule left, so
            // regions and snapshot are rebuilt per rule.
            let regions = self.resolve_regions(doc, &scope, &mut ctl)?;
            if ctl.is_cancelled() {
                summary.rules.push(report);
                summary.outcome = PassOutcome::Cancelled;
                break;
            }
            let snapshot = doc.read_all().into_owned();
            let line_starts = LineStarts::new(&snapshot);
            // Reborrow the evaluator for this iteration only; a plain
            // `as_deref_mut` would pin it for the whole loop.
            let mut resolver = ReplacementResolver::new(match evaluator {
                Some(ref mut e) => Some(&mut **e),
                None => None,
            });
            let mut sequencer = EditSequencer::new();
            let mut line_count_state = (usize::MAX, 0usize);
            let mut cancelled = false;

            for (i, m) in engine.matches(&snapshot, &regions).enumerate() {
                if i > 0 && i % CHUNK_SIZE == 0 {
                    ctl.report(stage, i, 0);
                    if ctl.is_cancelled() {
                        cancelled = true;
                        break;
                    }
                }
                report.found += 1;
                match &mut action {
                    PassAction::Count => {}
                    PassAction::Mark(marks) => marks.push(MarkSpan {
                        rule_index: index,
                        range: m.range(),
                    }),
                    PassAction::Replace => {
                        let env = if rule.use_variables {
                            Some(build_env(
                                &m,
                                &line_starts,
                                &mut line_count_state,
                                report.found,
                                if column_scoped {
                                    selection.as_ref().map(|sel| (sel, &self.model))
                                } else {
                                    None
                                },
                            ))
                        } else {
                            None
                        };
                        match resolver.resolve(&rule, &m, &env.unwrap_or_default()) {
                            Ok(Resolution::Replace(text)) => {
                                sequencer.apply(doc, &m, &text);
                                report.replaced += 1;
                            }
                            Ok(Resolution::Skip) => report.skipped += 1,
                            Err(ReplaceError::Script(_)) => report.script_errors += 1,
                            Err(other) => return Err(other),
                        }
                    }
                }
            }

            summary.rules.push(report);
            if cancelled {
                summary.outcome = PassOutcome::Cancelled;
                break;
            }
        }

        // Keep summary indices aligned with the rule list even after an
        // early stop.
        while summary.rules.len() < rule_count {
            summary.rules.push(RuleReport::default());
        }
        Ok(summary)
    }
}

fn build_env(
    m: &Match,
    line_starts: &LineStarts,
    line_count_state: &mut (usize, usize),
    cnt: usize,
    columns: Option<(&ColumnSelection, &DelimiterModel)>,
) -> VarEnv {
    let line = line_starts.line_of(m.start);
    if line_count_state.0 != line {
        *line_count_state = (line, 0);
    }
    line_count_state.1 += 1;

    let col = columns
        .and_then(|(sel, model)| ColumnIndex::new(model).locate(m.start, sel))
        .map(|(_, column)| column)
        .unwrap_or(0);

    VarEnv {
        cnt,
        line: line + 1,
        lpos: m.start - line_starts.start_of(line) + 1,
        lcnt: line_count_state.1,
        apos: m.start,
        col,
        matched: m.text.clone(),
        captures: m.captures.clone(),
    }
}
