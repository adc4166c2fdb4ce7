//! Replacement resolution.
//!
//! Given a rule and one concrete match, produce the literal text to
//! substitute. Static replacements are escape-decoded in Extended and Regex
//! modes; Regex mode additionally expands `$0`–`$9` back-references (and
//! `$$` for a literal dollar). Dynamic replacements delegate to the
//! session's [`Evaluator`] with the per-match [`VarEnv`].

use crate::error::{ReplaceError, ScriptError};
use crate::evaluator::{EvalOutcome, Evaluator, VarEnv};
use crate::escape::decode_extended;
use crate::matcher::{Match, MatchMode, Rule};

/// What to do with one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Substitute this text.
    Replace(String),
    /// Leave the match as-is (evaluator requested a skip).
    Skip,
}

/// Resolves replacement text per match.
pub struct ReplacementResolver<'e> {
    evaluator: Option<&'e mut dyn Evaluator>,
}

impl<'e> ReplacementResolver<'e> {
    /// A resolver with an optional dynamic-replacement evaluator.
    pub fn new(evaluator: Option<&'e mut dyn Evaluator>) -> Self {
        Self { evaluator }
    }

    /// Resolve the replacement for `m`.
    ///
    /// Fails with [`ReplaceError::Script`] when the rule is dynamic and the
    /// evaluator errors (or none is configured); the caller decides whether
    /// to abort the rule or skip the match.
    pub fn resolve(
        &mut self,
        rule: &Rule,
        m: &Match,
        env: &VarEnv,
    ) -> Result<Resolution, ReplaceError> {
        if rule.use_variables {
            let Some(evaluator) = self.evaluator.as_deref_mut() else {
                return Err(ScriptError::new("no evaluator configured").into());
            };
            return Ok(match evaluator.evaluate(&rule.replace, env)? {
                EvalOutcome::Value(value) => Resolution::Replace(value.coerce_to_text()),
                EvalOutcome::Skip => Resolution::Skip,
            });
        }

        let text = match rule.mode {
            MatchMode::Literal => rule.replace.clone(),
            MatchMode::Extended => decode_extended(&rule.replace),
            MatchMode::Regex => expand_backrefs(&decode_extended(&rule.replace), m),
        };
        Ok(Resolution::Replace(text))
    }
}

/// Expand `$0`–`$9` against the match's captured groups; `$$` is a literal
/// `$`; an out-of-range or unmatched group expands to nothing.
fn expand_backrefs(template: &str, m: &Match) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some(d @ '0'..='9') => {
                chars.next();
                let group = d as usize - '0' as usize;
                if group == 0 {
                    out.push_str(&m.text);
                } else if let Some(Some(text)) = m.captures.get(group - 1) {
                    out.push_str(text);
                }
            }
            _ => out.push('$'),
        }
    }
    out
}
