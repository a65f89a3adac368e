//! Expression evaluator for minitla.
//!
//! Evaluation is pure: an [`EvalContext`] is an immutable view of the
//! current state, the (possibly partial) next state, the bound constants
//! and the chain of local binders. Binders extend the context for the
//! duration of a closure instead of mutating it.

use crate::value::{Value, ValueError};
use minitla_ir::{BinOp, Expr, ExprKind, Span, UnaryOp};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Largest integer range `lo..hi` the evaluator will materialize.
pub const MAX_RANGE_LEN: i64 = 1 << 20;

/// Evaluation error. Every variant carries the span of the failing
/// expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("{span}: type mismatch in {op}: expected {expected}, got {actual}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        actual: &'static str,
        span: Span,
    },

    #[error("{span}: unbound variable `{name}`")]
    UnboundVariable { name: String, span: Span },

    #[error("{span}: unbounded domain: {reason}")]
    UnboundedDomain { reason: String, span: Span },

    #[error("{span}: division by zero")]
    DivisionByZero { span: Span },

    #[error("{span}: integer overflow in {op}")]
    Overflow { op: &'static str, span: Span },

    #[error("{span}: key not found: {key}")]
    KeyNotFound { key: String, span: Span },

    #[error("{span}: index out of bounds: index {index}, length {len}")]
    IndexOutOfBounds { index: i64, len: usize, span: Span },

    #[error("{span}: no value satisfies CHOOSE")]
    ChooseFailed { span: Span },
}

/// Error kind without location, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TypeMismatch,
    UnboundVariable,
    UnboundedDomain,
    DivisionByZero,
    Overflow,
    KeyNotFound,
    IndexOutOfBounds,
    ChooseFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::UnboundVariable => "UnboundVariable",
            ErrorKind::UnboundedDomain => "UnboundedDomain",
            ErrorKind::DivisionByZero => "DivisionByZero",
            ErrorKind::Overflow => "Overflow",
            ErrorKind::KeyNotFound => "KeyNotFound",
            ErrorKind::IndexOutOfBounds => "IndexOutOfBounds",
            ErrorKind::ChooseFailed => "ChooseFailed",
        };
        f.write_str(s)
    }
}

impl EvalError {
    pub fn span(&self) -> Span {
        match self {
            EvalError::TypeMismatch { span, .. }
            | EvalError::UnboundVariable { span, .. }
            | EvalError::UnboundedDomain { span, .. }
            | EvalError::DivisionByZero { span }
            | EvalError::Overflow { span, .. }
            | EvalError::KeyNotFound { span, .. }
            | EvalError::IndexOutOfBounds { span, .. }
            | EvalError::ChooseFailed { span } => *span,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            EvalError::UnboundVariable { .. } => ErrorKind::UnboundVariable,
            EvalError::UnboundedDomain { .. } => ErrorKind::UnboundedDomain,
            EvalError::DivisionByZero { .. } => ErrorKind::DivisionByZero,
            EvalError::Overflow { .. } => ErrorKind::Overflow,
            EvalError::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            EvalError::IndexOutOfBounds { .. } => ErrorKind::IndexOutOfBounds,
            EvalError::ChooseFailed { .. } => ErrorKind::ChooseFailed,
        }
    }

    pub fn from_value(err: ValueError, span: Span) -> Self {
        match err {
            ValueError::TypeMismatch {
                op,
                expected,
                actual,
            } => EvalError::TypeMismatch {
                op,
                expected,
                actual,
                span,
            },
            ValueError::Overflow { op } => EvalError::Overflow { op, span },
            ValueError::DivisionByZero => EvalError::DivisionByZero { span },
            ValueError::KeyNotFound { key } => EvalError::KeyNotFound { key, span },
            ValueError::IndexOutOfBounds { index, len } => {
                EvalError::IndexOutOfBounds { index, len, span }
            }
            err @ ValueError::TooLarge { .. } => EvalError::UnboundedDomain {
                reason: err.to_string(),
                span,
            },
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Attach a span to a value-level result.
pub trait At<T> {
    fn at(self, span: Span) -> EvalResult<T>;
}

impl<T> At<T> for Result<T, ValueError> {
    fn at(self, span: Span) -> EvalResult<T> {
        self.map_err(|e| EvalError::from_value(e, span))
    }
}

/// Names visible to every expression of one specification.
#[derive(Debug, Clone, Default)]
pub struct Env {
    /// Declared state variables, in declaration order.
    pub var_names: Vec<String>,
    /// Declared constants, in declaration order.
    pub const_names: Vec<String>,
    /// Constant values, parallel to `const_names`.
    pub consts: Vec<Value>,
}

impl Env {
    pub fn new(var_names: Vec<String>, const_names: Vec<String>, consts: Vec<Value>) -> Self {
        Self {
            var_names,
            const_names,
            consts,
        }
    }

    pub fn var_index(&self, name: &str) -> Option<usize> {
        self.var_names.iter().position(|n| n == name)
    }

    pub fn const_value(&self, name: &str) -> Option<&Value> {
        self.const_names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.consts.get(i))
    }
}

/// Values of the state variables as seen by one evaluation.
#[derive(Debug, Clone, Copy)]
pub enum VarSlots<'a> {
    /// No state of this kind is in scope (e.g. next state in an invariant).
    Absent,
    /// Every variable has a value.
    Total(&'a [Value]),
    /// Some variables are still being solved for.
    Partial(&'a [Option<Value>]),
}

impl<'a> VarSlots<'a> {
    pub fn get(&self, index: usize) -> Option<&'a Value> {
        match *self {
            VarSlots::Absent => None,
            VarSlots::Total(vals) => vals.get(index),
            VarSlots::Partial(vals) => vals.get(index).and_then(Option::as_ref),
        }
    }

    /// True if `index` is a variable still being solved for.
    pub fn is_pending(&self, index: usize) -> bool {
        match self {
            VarSlots::Partial(vals) => matches!(vals.get(index), Some(None)),
            _ => false,
        }
    }
}

/// One local binder, linked to the enclosing ones.
#[derive(Debug)]
pub struct Local<'a> {
    name: &'a str,
    value: Value,
    parent: Option<&'a Local<'a>>,
}

/// Evaluation context providing access to state, constants and locals.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub env: &'a Env,
    /// Current state.
    pub vars: VarSlots<'a>,
    /// Next state.
    pub next_vars: VarSlots<'a>,
    locals: Option<&'a Local<'a>>,
}

impl<'a> EvalContext<'a> {
    pub fn new(env: &'a Env, vars: VarSlots<'a>, next_vars: VarSlots<'a>) -> Self {
        Self {
            env,
            vars,
            next_vars,
            locals: None,
        }
    }

    /// Context over a single complete state, without a next state.
    pub fn state(env: &'a Env, vars: &'a [Value]) -> Self {
        Self::new(env, VarSlots::Total(vars), VarSlots::Absent)
    }

    /// Context over a pair of complete states.
    pub fn transition(env: &'a Env, vars: &'a [Value], next_vars: &'a [Value]) -> Self {
        Self::new(env, VarSlots::Total(vars), VarSlots::Total(next_vars))
    }

    /// Run `f` with `name` bound to `value`.
    pub fn with_local<R>(
        &self,
        name: &str,
        value: Value,
        f: impl FnOnce(&EvalContext<'_>) -> R,
    ) -> R {
        let local = Local {
            name,
            value,
            parent: self.locals,
        };
        let ctx = EvalContext {
            env: self.env,
            vars: self.vars,
            next_vars: self.next_vars,
            locals: Some(&local),
        };
        f(&ctx)
    }

    pub fn local(&self, name: &str) -> Option<&Value> {
        let mut cur = self.locals;
        while let Some(local) = cur {
            if local.name == name {
                return Some(&local.value);
            }
            cur = local.parent;
        }
        None
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.local(name).is_some()
    }

    /// Resolve `name`: local binder, then state variable, then constant.
    pub fn lookup(&self, name: &str, span: Span) -> EvalResult<Value> {
        if let Some(v) = self.local(name) {
            return Ok(v.clone());
        }
        if let Some(i) = self.env.var_index(name) {
            return self.vars.get(i).cloned().ok_or_else(|| unbound(name, span));
        }
        self.env
            .const_value(name)
            .cloned()
            .ok_or_else(|| unbound(name, span))
    }

    /// Resolve `name'`.
    pub fn lookup_next(&self, name: &str, span: Span) -> EvalResult<Value> {
        self.env
            .var_index(name)
            .and_then(|i| self.next_vars.get(i))
            .cloned()
            .ok_or_else(|| unbound(&format!("{}'", name), span))
    }
}

fn unbound(name: &str, span: Span) -> EvalError {
    EvalError::UnboundVariable {
        name: name.to_string(),
        span,
    }
}

fn type_mismatch(op: &'static str, expected: &'static str, actual: &Value, span: Span) -> EvalError {
    EvalError::TypeMismatch {
        op,
        expected,
        actual: actual.type_name(),
        span,
    }
}

/// Evaluate an expression to a value.
pub fn eval(expr: &Expr, ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let span = expr.span;
    match &expr.kind {
        ExprKind::Bool(b) => Ok(Value::bool(*b)),
        ExprKind::Int(n) => Ok(Value::int(*n)),
        ExprKind::Str(s) => Ok(Value::string(s.as_str())),

        ExprKind::Name(name) => ctx.lookup(name, span),
        ExprKind::Prime(name) => ctx.lookup_next(name, span),

        ExprKind::Unary { op, operand } => {
            let val = eval(operand, ctx)?;
            match op {
                UnaryOp::Not => Ok(Value::bool(!val.expect_bool("~").at(span)?)),
                UnaryOp::Neg => val.neg().at(span),
            }
        }
        ExprKind::Binary { op, left, right } => eval_binary(*op, left, right, span, ctx),

        ExprKind::SetLit(elements) => {
            let elems = elements
                .iter()
                .map(|e| eval(e, ctx))
                .collect::<EvalResult<Vec<_>>>()?;
            Ok(Value::set_from_iter(elems))
        }
        ExprKind::SeqLit(elements) => {
            let seq = elements
                .iter()
                .map(|e| eval(e, ctx))
                .collect::<EvalResult<Vec<_>>>()?;
            Ok(Value::seq(seq))
        }
        ExprKind::Range { lo, hi } => {
            let lo = eval(lo, ctx)?.expect_int("..").at(span)?;
            let hi = eval(hi, ctx)?.expect_int("..").at(span)?;
            if hi.saturating_sub(lo) >= MAX_RANGE_LEN {
                return Err(EvalError::UnboundedDomain {
                    reason: format!("range {}..{} is too large to enumerate", lo, hi),
                    span,
                });
            }
            Ok(Value::range(lo, hi))
        }
        ExprKind::RecordLit(fields) => {
            let mut entries = Vec::with_capacity(fields.len());
            for (name, e) in fields {
                entries.push((name.as_str(), eval(e, ctx)?));
            }
            Ok(Value::record(entries))
        }
        ExprKind::FnLit { var, domain, body } => {
            let keys = domain_of(domain, ctx)?;
            let mut map = Vec::with_capacity(keys.len());
            for key in keys {
                let value = ctx.with_local(var, key.clone(), |ctx| eval(body, ctx))?;
                map.push((key, value));
            }
            Ok(Value::fn_from_iter(map))
        }

        ExprKind::Apply { func, arg } => {
            let f = eval(func, ctx)?;
            let a = eval(arg, ctx)?;
            f.apply(&a).at(span)
        }
        ExprKind::Field { base, field } => eval(base, ctx)?.field(field).at(span),
        ExprKind::Except { base, key, value } => {
            let b = eval(base, ctx)?;
            let k = eval(key, ctx)?;
            let v = eval(value, ctx)?;
            b.except(&k, v).at(span)
        }
        ExprKind::Domain(e) => eval(e, ctx)?.domain().at(span),
        ExprKind::Cardinality(e) => eval(e, ctx)?.cardinality().at(span),
        ExprKind::Len(e) => eval(e, ctx)?.len().at(span),
        ExprKind::Head(e) => eval(e, ctx)?.head().at(span),
        ExprKind::Tail(e) => eval(e, ctx)?.tail().at(span),
        ExprKind::Append { seq, elem } => {
            let s = eval(seq, ctx)?;
            let e = eval(elem, ctx)?;
            s.append(e).at(span)
        }
        ExprKind::Powerset(e) => eval(e, ctx)?.powerset().at(span),
        ExprKind::BigUnion(e) => eval(e, ctx)?.big_union().at(span),

        ExprKind::Forall { var, domain, body } => {
            for item in domain_of(domain, ctx)? {
                if !ctx.with_local(var, item, |ctx| eval_bool(body, ctx))? {
                    return Ok(Value::bool(false));
                }
            }
            Ok(Value::bool(true))
        }
        ExprKind::Exists { var, domain, body } => {
            for item in domain_of(domain, ctx)? {
                if ctx.with_local(var, item, |ctx| eval_bool(body, ctx))? {
                    return Ok(Value::bool(true));
                }
            }
            Ok(Value::bool(false))
        }
        ExprKind::Choose {
            var,
            domain,
            predicate,
        } => {
            // first match in value order, so the choice is deterministic
            for item in domain_of(domain, ctx)? {
                if ctx.with_local(var, item.clone(), |ctx| eval_bool(predicate, ctx))? {
                    return Ok(item);
                }
            }
            Err(EvalError::ChooseFailed { span })
        }
        ExprKind::SetFilter {
            var,
            domain,
            predicate,
        } => {
            let mut kept = Vec::new();
            for item in domain_of(domain, ctx)? {
                if ctx.with_local(var, item.clone(), |ctx| eval_bool(predicate, ctx))? {
                    kept.push(item);
                }
            }
            Ok(Value::set_from_iter(kept))
        }
        ExprKind::SetMap {
            element,
            var,
            domain,
        } => {
            let mut mapped = Vec::new();
            for item in domain_of(domain, ctx)? {
                mapped.push(ctx.with_local(var, item, |ctx| eval(element, ctx))?);
            }
            Ok(Value::set_from_iter(mapped))
        }
        ExprKind::Let { name, value, body } => {
            let val = eval(value, ctx)?;
            ctx.with_local(name, val, |ctx| eval(body, ctx))
        }

        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            if eval(cond, ctx)?.expect_bool("IF").at(cond.span)? {
                eval(then_branch, ctx)
            } else {
                eval(else_branch, ctx)
            }
        }

        ExprKind::Unchanged(names) => {
            for name in names {
                if ctx.lookup(name, span)? != ctx.lookup_next(name, span)? {
                    return Ok(Value::bool(false));
                }
            }
            Ok(Value::bool(true))
        }
    }
}

/// Evaluate an expression that must produce a boolean.
pub fn eval_bool(expr: &Expr, ctx: &EvalContext<'_>) -> EvalResult<bool> {
    let val = eval(expr, ctx)?;
    val.as_bool()
        .ok_or_else(|| type_mismatch("predicate", "Bool", &val, expr.span))
}

/// Evaluate a quantifier or comprehension domain to its elements, in
/// value order.
pub fn domain_of(expr: &Expr, ctx: &EvalContext<'_>) -> EvalResult<Vec<Value>> {
    let val = eval(expr, ctx)?;
    val.domain_elements()
        .ok_or_else(|| EvalError::UnboundedDomain {
            reason: format!("expected a Set, Seq or Fn as domain, got {}", val.type_name()),
            span: expr.span,
        })
}

fn eval_binary(
    op: BinOp,
    left: &Expr,
    right: &Expr,
    span: Span,
    ctx: &EvalContext<'_>,
) -> EvalResult<Value> {
    let sym = op.symbol();
    // Short-circuit evaluation for logical operators
    match op {
        BinOp::And => {
            if !eval(left, ctx)?.expect_bool(sym).at(left.span)? {
                return Ok(Value::bool(false));
            }
            return Ok(Value::bool(eval(right, ctx)?.expect_bool(sym).at(right.span)?));
        }
        BinOp::Or => {
            if eval(left, ctx)?.expect_bool(sym).at(left.span)? {
                return Ok(Value::bool(true));
            }
            return Ok(Value::bool(eval(right, ctx)?.expect_bool(sym).at(right.span)?));
        }
        BinOp::Implies => {
            if !eval(left, ctx)?.expect_bool(sym).at(left.span)? {
                return Ok(Value::bool(true));
            }
            return Ok(Value::bool(eval(right, ctx)?.expect_bool(sym).at(right.span)?));
        }
        _ => {}
    }

    let l = eval(left, ctx)?;
    let r = eval(right, ctx)?;

    let v = match op {
        BinOp::And | BinOp::Or | BinOp::Implies => unreachable!("handled above"),
        BinOp::Iff => Value::bool(l.expect_bool(sym).at(span)? == r.expect_bool(sym).at(span)?),

        BinOp::Eq => Value::bool(l == r),
        BinOp::Ne => Value::bool(l != r),
        BinOp::Lt => Value::bool(l.compare_int(&r, sym).at(span)? == Ordering::Less),
        BinOp::Le => Value::bool(l.compare_int(&r, sym).at(span)? != Ordering::Greater),
        BinOp::Gt => Value::bool(l.compare_int(&r, sym).at(span)? == Ordering::Greater),
        BinOp::Ge => Value::bool(l.compare_int(&r, sym).at(span)? != Ordering::Less),

        BinOp::Add => l.add(&r).at(span)?,
        BinOp::Sub => l.sub(&r).at(span)?,
        BinOp::Mul => l.mul(&r).at(span)?,
        BinOp::Div => l.div(&r).at(span)?,
        BinOp::Mod => l.modulo(&r).at(span)?,

        BinOp::In => Value::bool(r.contains(&l).at(span)?),
        BinOp::NotIn => Value::bool(!r.contains(&l).at(span)?),
        BinOp::Union => l.union(&r).at(span)?,
        BinOp::Intersect => l.intersect(&r).at(span)?,
        BinOp::Diff => l.diff(&r).at(span)?,
        BinOp::SubsetEq => Value::bool(l.subset_eq(&r).at(span)?),

        BinOp::Concat => l.concat(&r).at(span)?,
    };
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use minitla_ir::build::*;

    fn eval_simple(expr: &Expr) -> EvalResult<Value> {
        let env = Env::default();
        eval(expr, &EvalContext::state(&env, &[]))
    }

    fn ints(ns: &[i64]) -> Value {
        Value::set_from_iter(ns.iter().copied().map(Value::int))
    }

    #[test]
    fn test_literals_and_arithmetic() {
        assert_eq!(eval_simple(&boolean(true)), Ok(Value::bool(true)));
        assert_eq!(eval_simple(&string("hi")), Ok(Value::string("hi")));
        assert_eq!(eval_simple(&add(int(2), int(3))), Ok(Value::int(5)));
        assert_eq!(eval_simple(&mul(int(4), neg(int(5)))), Ok(Value::int(-20)));
        assert_eq!(eval_simple(&modulo(int(-1), int(3))), Ok(Value::int(2)));
    }

    #[test]
    fn test_short_circuit() {
        // the right operand would fail with division by zero
        let boom = eq(div(int(1), int(0)), int(0));
        assert_eq!(
            eval_simple(&and(boolean(false), boom.clone())),
            Ok(Value::bool(false))
        );
        assert_eq!(
            eval_simple(&or(boolean(true), boom.clone())),
            Ok(Value::bool(true))
        );
        assert_eq!(
            eval_simple(&implies(boolean(false), boom.clone())),
            Ok(Value::bool(true))
        );
        assert!(matches!(
            eval_simple(&and(boolean(true), boom)),
            Err(EvalError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_type_mismatch_carries_span() {
        let span = Span::new(10, 15, 2, 4);
        let e = add(int(1), set([int(1)])).at(span);
        let err = eval_simple(&e).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.span(), span);
        assert!(err.to_string().starts_with("2:4: type mismatch in +"));
    }

    #[test]
    fn test_name_resolution_order() {
        let env = Env::new(
            vec!["x".into()],
            vec!["x".into(), "N".into()],
            vec![Value::int(100), Value::int(3)],
        );
        let vars = [Value::int(1)];
        let ctx = EvalContext::state(&env, &vars);
        // variable shadows constant, local shadows variable
        assert_eq!(eval(&name("x"), &ctx), Ok(Value::int(1)));
        assert_eq!(eval(&name("N"), &ctx), Ok(Value::int(3)));
        assert_eq!(
            eval(&let_in("x", int(7), name("x")), &ctx),
            Ok(Value::int(7))
        );
        let err = eval(&name("y"), &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnboundVariable);
        assert!(matches!(
            eval(&prime("x"), &ctx),
            Err(EvalError::UnboundVariable { name, .. }) if name == "x'"
        ));
    }

    #[test]
    fn test_primed_and_unchanged() {
        let env = Env::new(vec!["x".into(), "y".into()], vec![], vec![]);
        let vars = [Value::int(10), Value::int(20)];
        let next = [Value::int(10), Value::int(25)];
        let ctx = EvalContext::transition(&env, &vars, &next);
        assert_eq!(eval(&prime("y"), &ctx), Ok(Value::int(25)));
        assert_eq!(eval(&unchanged(["x"]), &ctx), Ok(Value::bool(true)));
        assert_eq!(eval(&unchanged(["x", "y"]), &ctx), Ok(Value::bool(false)));
    }

    #[test]
    fn test_quantifiers() {
        let all_pos = forall("i", range(int(1), int(3)), gt(name("i"), int(0)));
        assert_eq!(eval_simple(&all_pos), Ok(Value::bool(true)));
        let some_big = exists("i", range(int(1), int(3)), gt(name("i"), int(2)));
        assert_eq!(eval_simple(&some_big), Ok(Value::bool(true)));
        let over_seq = exists("i", seq([int(5), int(6)]), eq(name("i"), int(6)));
        assert_eq!(eval_simple(&over_seq), Ok(Value::bool(true)));
        let empty = forall("i", set([]), boolean(false));
        assert_eq!(eval_simple(&empty), Ok(Value::bool(true)));
    }

    #[test]
    fn test_scalar_domain_is_unbounded() {
        let e = exists("i", int(3), boolean(true));
        let err = eval_simple(&e).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnboundedDomain);
        let huge = cardinality(range(int(0), int(i64::MAX)));
        assert_eq!(eval_simple(&huge).unwrap_err().kind(), ErrorKind::UnboundedDomain);
    }

    #[test]
    fn test_comprehensions_and_choose() {
        let evens = set_filter("i", range(int(1), int(6)), eq(modulo(name("i"), int(2)), int(0)));
        assert_eq!(eval_simple(&evens), Ok(ints(&[2, 4, 6])));
        let doubled = set_map(mul(name("i"), int(2)), "i", range(int(1), int(3)));
        assert_eq!(eval_simple(&doubled), Ok(ints(&[2, 4, 6])));
        let pick = choose("i", range(int(1), int(9)), gt(name("i"), int(4)));
        assert_eq!(eval_simple(&pick), Ok(Value::int(5)));
        let none = choose("i", range(int(1), int(3)), gt(name("i"), int(4)));
        assert_eq!(eval_simple(&none).unwrap_err().kind(), ErrorKind::ChooseFailed);
    }

    #[test]
    fn test_functions_and_records() {
        let f = fn_lit("i", range(int(0), int(2)), mul(name("i"), name("i")));
        assert_eq!(eval_simple(&apply(f.clone(), int(2))), Ok(Value::int(4)));
        assert_eq!(eval_simple(&domain(f.clone())), Ok(ints(&[0, 1, 2])));
        let g = except(f, int(1), int(-1));
        assert_eq!(eval_simple(&apply(g, int(1))), Ok(Value::int(-1)));

        let r = record([("a", int(1)), ("b", boolean(true))]);
        assert_eq!(eval_simple(&field(r.clone(), "b")), Ok(Value::bool(true)));
        assert_eq!(
            eval_simple(&field(r, "c")).unwrap_err().kind(),
            ErrorKind::KeyNotFound
        );
    }

    #[test]
    fn test_sequences() {
        let s = seq([int(1), int(2)]);
        assert_eq!(eval_simple(&len(append(s.clone(), int(3)))), Ok(Value::int(3)));
        assert_eq!(eval_simple(&head(s.clone())), Ok(Value::int(1)));
        assert_eq!(
            eval_simple(&concat(s.clone(), seq([int(3)]))),
            Ok(Value::seq(vec![Value::int(1), Value::int(2), Value::int(3)]))
        );
        assert_eq!(
            eval_simple(&apply(s, int(0))).unwrap_err().kind(),
            ErrorKind::IndexOutOfBounds
        );
    }

    #[test]
    fn test_if_requires_bool() {
        let e = if_then_else(int(1), int(2), int(3));
        assert_eq!(eval_simple(&e).unwrap_err().kind(), ErrorKind::TypeMismatch);
        let e = if_then_else(lt(int(1), int(2)), int(2), int(3));
        assert_eq!(eval_simple(&e), Ok(Value::int(2)));
    }

    #[test]
    fn test_set_operators() {
        let a = set([int(1), int(2)]);
        let b = set([int(2), int(3)]);
        assert_eq!(eval_simple(&union(a.clone(), b.clone())), Ok(ints(&[1, 2, 3])));
        assert_eq!(eval_simple(&in_set(int(3), a.clone())), Ok(Value::bool(false)));
        assert_eq!(eval_simple(&not_in(int(3), a.clone())), Ok(Value::bool(true)));
        assert_eq!(eval_simple(&subset_eq(a.clone(), b)), Ok(Value::bool(false)));
        assert_eq!(
            eval_simple(&cardinality(powerset(a))),
            Ok(Value::int(4))
        );
    }
}
