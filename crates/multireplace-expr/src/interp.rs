//! The tree-walking interpreter behind [`ExprEvaluator`].

use std::collections::HashMap;
use std::rc::Rc;

use multireplace_core::{EvalOutcome, Evaluator, ScriptError, Value, VarEnv, format_number};

use crate::parser::{BinOp, Expr, UnaryOp, parse};

/// Why evaluation stopped early.
enum Flow {
    Skip,
    Error(ScriptError),
}

impl From<ScriptError> for Flow {
    fn from(err: ScriptError) -> Self {
        Flow::Error(err)
    }
}

type EvalResult = Result<Value, Flow>;

/// The bundled [`Evaluator`]: parses expressions on first use and caches
/// them per source string.
#[derive(Debug, Default)]
pub struct ExprEvaluator {
    cache: HashMap<String, Rc<Expr>>,
}

impl ExprEvaluator {
    /// An evaluator with an empty expression cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Evaluator for ExprEvaluator {
    fn evaluate(&mut self, source: &str, env: &VarEnv) -> Result<EvalOutcome, ScriptError> {
        let expr = match self.cache.get(source) {
            Some(expr) => Rc::clone(expr),
            None => {
                let expr = Rc::new(parse(source)?);
                self.cache.insert(source.to_string(), Rc::clone(&expr));
                expr
            }
        };
        match eval(&expr, env) {
            Ok(value) => Ok(EvalOutcome::Value(value)),
            Err(Flow::Skip) => Ok(EvalOutcome::Skip),
            Err(Flow::Error(err)) => Err(err),
        }
    }
}

fn eval(expr: &Expr, env: &VarEnv) -> EvalResult {
    match expr {
        Expr::Number(n) => Ok(Value::Num(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Var(name) => env
            .get(name)
            .ok_or_else(|| error(format!("unknown variable {name:?}"))),
        Expr::Unary(op, inner) => {
            let value = eval(inner, env)?;
            match op {
                UnaryOp::Neg => Ok(Value::Num(-as_number(&value)?)),
                UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
            }
        }
        Expr::Binary(op, left, right) => eval_binary(*op, left, right, env),
        Expr::Call(name, args) => eval_call(name, args, env),
    }
}

fn eval_binary(op: BinOp, left: &Expr, right: &Expr, env: &VarEnv) -> EvalResult {
    // Logical operators short-circuit; everything else is strict.
    match op {
        BinOp::And => {
            let l = eval(left, env)?;
            return if l.is_truthy() {
                Ok(Value::Bool(eval(right, env)?.is_truthy()))
            } else {
                Ok(Value::Bool(false))
            };
        }
        BinOp::Or => {
            let l = eval(left, env)?;
            return if l.is_truthy() {
                Ok(Value::Bool(true))
            } else {
                Ok(Value::Bool(eval(right, env)?.is_truthy()))
            };
        }
        _ => {}
    }

    let l = eval(left, env)?;
    let r = eval(right, env)?;
    match op {
        BinOp::Add => match (&l, &r) {
            (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a + b)),
            // A string on either side makes `+` concatenation.
            _ => Ok(Value::Str(l.coerce_to_text() + &r.coerce_to_text())),
        },
        BinOp::Sub => Ok(Value::Num(as_number(&l)? - as_number(&r)?)),
        BinOp::Mul => Ok(Value::Num(as_number(&l)? * as_number(&r)?)),
        BinOp::Div => {
            let divisor = as_number(&r)?;
            if divisor == 0.0 {
                return Err(error("division by zero"));
            }
            Ok(Value::Num(as_number(&l)? / divisor))
        }
        BinOp::Rem => {
            let divisor = as_number(&r)?;
            if divisor == 0.0 {
                return Err(error("remainder by zero"));
            }
            Ok(Value::Num(as_number(&l)? % divisor))
        }
        BinOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = match (&l, &r) {
                (Value::Num(a), Value::Num(b)) => a
                    .partial_cmp(b)
                    .ok_or_else(|| error("cannot order NaN"))?,
                (Value::Str(a), Value::Str(b)) => a.cmp(b),
                _ => return Err(error("cannot order values of different types")),
            };
            Ok(Value::Bool(match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn eval_call(name: &str, args: &[Expr], env: &VarEnv) -> EvalResult {
    // `if` is lazy: only the selected branch evaluates, so a skip() or
    // error in the other branch never fires.
    if name == "if" {
        let [cond, then_branch, else_branch] = args else {
            return Err(error("if() takes exactly 3 arguments"));
        };
        let branch = if eval(cond, env)?.is_truthy() {
            then_branch
        } else {
            else_branch
        };
        return eval(branch, env);
    }
    if name == "skip" {
        if !args.is_empty() {
            return Err(error("skip() takes no arguments"));
        }
        return Err(Flow::Skip);
    }

    let values: Vec<Value> = args
        .iter()
        .map(|arg| eval(arg, env))
        .collect::<Result<_, _>>()?;
    match (name, values.as_slice()) {
        ("upper", [v]) => Ok(Value::Str(v.coerce_to_text().to_uppercase())),
        ("lower", [v]) => Ok(Value::Str(v.coerce_to_text().to_lowercase())),
        ("len", [v]) => Ok(Value::Num(v.coerce_to_text().chars().count() as f64)),
        ("sub", [v, start, len]) => {
            let text = v.coerce_to_text();
            let start = as_index(start)?;
            let len = as_index(len)?;
            // 1-based, in characters.
            let taken: String = text
                .chars()
                .skip(start.saturating_sub(1))
                .take(len)
                .collect();
            Ok(Value::Str(taken))
        }
        ("str", [v]) => Ok(Value::Str(v.coerce_to_text())),
        ("num", [v]) => match v {
            Value::Num(n) => Ok(Value::Num(*n)),
            other => {
                let text = other.coerce_to_text();
                text.trim()
                    .parse::<f64>()
                    .map(Value::Num)
                    .map_err(|_| error(format!("num(): cannot parse {text:?}")))
            }
        },
        ("upper" | "lower" | "len" | "str" | "num", _) => {
            Err(error(format!("{name}() takes exactly 1 argument")))
        }
        ("sub", _) => Err(error("sub() takes exactly 3 arguments")),
        _ => Err(error(format!("unknown function {name:?}"))),
    }
}

fn as_number(value: &Value) -> Result<f64, Flow> {
    match value {
        Value::Num(n) => Ok(*n),
        other => Err(error(format!(
            "expected a number, found {:?}",
            other.coerce_to_text()
        ))),
    }
}

fn as_index(value: &Value) -> Result<usize, Flow> {
    let n = as_number(value)?;
    if n < 0.0 || n.fract() != 0.0 {
        return Err(error(format!(
            "expected a non-negative integer, found {}",
            format_number(n)
        )));
    }
    Ok(n as usize)
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Num(a), Value::Num(b)) => a == b,
        (l, r) => l.coerce_to_text() == r.coerce_to_text(),
    }
}

fn error(message: impl Into<String>) -> Flow {
    Flow::Error(ScriptError::new(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str, env: &VarEnv) -> EvalOutcome {
        ExprEvaluator::new().evaluate(source, env).unwrap()
    }

    fn value(source: &str, env: &VarEnv) -> Value {
        match run(source, env) {
            EvalOutcome::Value(v) => v,
            EvalOutcome::Skip => panic!("unexpected skip"),
        }
    }

    fn fails(source: &str) -> ScriptError {
        ExprEvaluator::new()
            .evaluate(source, &VarEnv::default())
            .unwrap_err()
    }

    #[test]
    fn test_arithmetic() {
        let env = VarEnv::default();
        assert_eq!(value("1 + 2 * 3", &env), Value::Num(7.0));
        assert_eq!(value("(1 + 2) * 3", &env), Value::Num(9.0));
        assert_eq!(value("10 % 3", &env), Value::Num(1.0));
        assert_eq!(value("-4 / 2", &env), Value::Num(-2.0));
    }

    #[test]
    fn test_variables() {
        let env = VarEnv {
            cnt: 5,
            line: 2,
            matched: "word".into(),
            captures: vec![Some("grp".into()), None],
            ..VarEnv::default()
        };
        assert_eq!(value("CNT * 10 + LINE", &env), Value::Num(52.0));
        assert_eq!(value("MATCH", &env), Value::Str("word".into()));
        assert_eq!(value("CAP1", &env), Value::Str("grp".into()));
        assert_eq!(value("CAP2", &env), Value::None);
    }

    #[test]
    fn test_string_concat() {
        let env = VarEnv {
            cnt: 3,
            matched: "x".into(),
            ..VarEnv::default()
        };
        assert_eq!(value("MATCH + '-' + CNT", &env), Value::Str("x-3".into()));
    }

    #[test]
    fn test_comparisons_and_logic() {
        let env = VarEnv { cnt: 4, ..VarEnv::default() };
        assert_eq!(value("CNT >= 4 && CNT < 10", &env), Value::Bool(true));
        assert_eq!(value("'abc' < 'abd'", &env), Value::Bool(true));
        assert_eq!(value("CNT == 4 || skip()", &env), Value::Bool(true));
        assert_eq!(value("!false", &env), Value::Bool(true));
    }

    #[test]
    fn test_equality_coerces_text() {
        let env = VarEnv { matched: "7".into(), ..VarEnv::default() };
        assert_eq!(value("MATCH == 7", &env), Value::Bool(true));
        assert_eq!(value("MATCH != 8", &env), Value::Bool(true));
    }

    #[test]
    fn test_builtins() {
        let env = VarEnv { matched: "Hello".into(), ..VarEnv::default() };
        assert_eq!(value("upper(MATCH)", &env), Value::Str("HELLO".into()));
        assert_eq!(value("lower(MATCH)", &env), Value::Str("hello".into()));
        assert_eq!(value("len(MATCH)", &env), Value::Num(5.0));
        assert_eq!(value("sub(MATCH, 2, 3)", &env), Value::Str("ell".into()));
        assert_eq!(value("str(12)", &env), Value::Str("12".into()));
        assert_eq!(value("num(' 3.5 ')", &env), Value::Num(3.5));
    }

    #[test]
    fn test_len_and_sub_are_character_based() {
        let env = VarEnv { matched: "héllo".into(), ..VarEnv::default() };
        assert_eq!(value("len(MATCH)", &env), Value::Num(5.0));
        assert_eq!(value("sub(MATCH, 1, 2)", &env), Value::Str("hé".into()));
    }

    #[test]
    fn test_if_is_lazy() {
        let env = VarEnv { cnt: 1, ..VarEnv::default() };
        // The untaken branch would divide by zero.
        assert_eq!(value("if(CNT == 1, 'one', 1 / 0)", &env), Value::Str("one".into()));
        assert_eq!(
            run("if(CNT == 2, 'two', skip())", &env),
            EvalOutcome::Skip
        );
    }

    #[test]
    fn test_skip() {
        assert_eq!(run("skip()", &VarEnv::default()), EvalOutcome::Skip);
    }

    #[test]
    fn test_errors() {
        assert!(fails("NOPE").message.contains("unknown variable"));
        assert!(fails("1 / 0").message.contains("division by zero"));
        assert!(fails("mystery(1)").message.contains("unknown function"));
        assert!(fails("if(true, 1)").message.contains("3 arguments"));
        assert!(fails("'a' - 1").message.contains("expected a number"));
        assert!(fails("1 < 'a'").message.contains("different types"));
        assert!(fails("sub(MATCH, -1, 2)").message.contains("non-negative"));
    }

    #[test]
    fn test_cache_reuse_across_matches() {
        let mut eval = ExprEvaluator::new();
        for cnt in 1..=3 {
            let env = VarEnv { cnt, ..VarEnv::default() };
            assert_eq!(
                eval.evaluate("CNT * 2", &env).unwrap(),
                EvalOutcome::Value(Value::Num(cnt as f64 * 2.0))
            );
        }
        assert_eq!(eval.cache.len(), 1);
    }
}
