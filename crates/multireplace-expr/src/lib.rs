#![warn(missing_docs)]
//! `multireplace-expr` - the bundled expression evaluator for
//! `multireplace-core` dynamic replacements.
//!
//! Implements [`multireplace_core::Evaluator`] with a small expression
//! language over the per-match variable environment:
//!
//! - literals: numbers, `'single'`/`"double"` quoted strings, `true`/`false`
//! - variables: `CNT`, `LINE`, `LPOS`, `LCNT`, `APOS`, `COL`, `MATCH`,
//!   `CAP1`..
//! - operators: `+ - * / %`, `== != < <= > >=`, `&& || !` (short-circuit);
//!   `+` concatenates when either side is a string
//! - functions: `upper(s)`, `lower(s)`, `len(s)`, `sub(s, start, len)`,
//!   `str(v)`, `num(s)`, `if(cond, then, else)` (lazy), `skip()`
//!
//! `skip()` leaves the current match unreplaced. Parsed expressions are
//! cached per source string, so running a rule over many matches parses
//! once.
//!
//! ```rust
//! use multireplace_core::{EvalOutcome, Evaluator, Value, VarEnv};
//! use multireplace_expr::ExprEvaluator;
//!
//! let mut eval = ExprEvaluator::new();
//! let env = VarEnv { cnt: 4, ..VarEnv::default() };
//! let out = eval.evaluate("if(CNT % 2 == 0, 'even', 'odd')", &env).unwrap();
//! assert_eq!(out, EvalOutcome::Value(Value::Str("even".into())));
//! ```

mod interp;
mod parser;
mod token;

pub use interp::ExprEvaluator;
