//! The pluggable expression-evaluator capability.
//!
//! Dynamic replacements hand an expression source plus a per-match variable
//! environment to an [`Evaluator`] and splice the coerced result back in as
//! replacement text. The concrete interpreter is swappable; the
//! `multireplace-expr` crate ships one, and tests mock the trait directly.

use crate::error::ScriptError;

/// A value returned by an evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A text value.
    Str(String),
    /// A numeric value.
    Num(f64),
    /// A boolean value.
    Bool(bool),
    /// Absent / nothing.
    None,
}

impl Value {
    /// Coerce to replacement text: numbers canonically formatted (no
    /// trailing `.0` for integral values), booleans as `"true"`/`"false"`,
    /// none as the empty string.
    pub fn coerce_to_text(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Num(n) => format_number(*n),
            Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            Value::None => String::new(),
        }
    }

    /// Truthiness: `false`, `0`, the empty string, and none are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => *n != 0.0,
            Value::Bool(b) => *b,
            Value::None => false,
        }
    }
}

/// Canonical number formatting shared by coercion and the bundled evaluator.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// What an evaluation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalOutcome {
    /// A value to coerce into replacement text.
    Value(Value),
    /// Leave this match unreplaced; it still counts as found.
    Skip,
}

/// The per-match variable environment visible to an evaluator.
///
/// All `*_1` style counters are 1-based; `apos` is a 0-based absolute byte
/// offset; `col` is 0 when no column scoping is active.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarEnv {
    /// This rule's running match count (1-based).
    pub cnt: usize,
    /// 1-based line number of the match.
    pub line: usize,
    /// 1-based offset of the match within its line.
    pub lpos: usize,
    /// Count of matches on this line so far (1-based, including this one).
    pub lcnt: usize,
    /// Absolute byte offset of the match.
    pub apos: usize,
    /// 1-based selected-column index, or 0 when unscoped.
    pub col: usize,
    /// The matched text.
    pub matched: String,
    /// Capture-group text for Regex rules (`CAP1`, `CAP2`, …).
    pub captures: Vec<Option<String>>,
}

impl VarEnv {
    /// Look up a variable by its environment name.
    ///
    /// Known names: `CNT`, `LINE`, `LPOS`, `LCNT`, `APOS`, `COL`, `MATCH`,
    /// and `CAP1`.. for capture groups (an unmatched group is
    /// [`Value::None`]). Returns `None` for anything else.
    pub fn get(&self, name: &str) -> Option<Value> {
        match name {
            "CNT" => Some(Value::Num(self.cnt as f64)),
            "LINE" => Some(Value::Num(self.line as f64)),
            "LPOS" => Some(Value::Num(self.lpos as f64)),
            "LCNT" => Some(Value::Num(self.lcnt as f64)),
            "APOS" => Some(Value::Num(self.apos as f64)),
            "COL" => Some(Value::Num(self.col as f64)),
            "MATCH" => Some(Value::Str(self.matched.clone())),
            _ => {
                let index: usize = name.strip_prefix("CAP")?.parse().ok()?;
                let slot = self.captures.get(index.checked_sub(1)?)?;
                Some(match slot {
                    Some(text) => Value::Str(text.clone()),
                    None => Value::None,
                })
            }
        }
    }
}

/// A pluggable expression evaluator.
pub trait Evaluator {
    /// Evaluate `source` against `env`.
    ///
    /// Errors propagate as [`ScriptError`]; the session counts the match as
    /// found-but-not-replaced and continues.
    fn evaluate(&mut self, source: &str, env: &VarEnv) -> Result<EvalOutcome, ScriptError>;
}
