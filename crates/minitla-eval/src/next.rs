//! Candidate inference for variables constrained by a relation.
//!
//! Given a relation (an action over primed variables, or the initial
//! predicate over unprimed ones) and a partial assignment, computes a finite
//! over-approximation of the values one variable can take in a satisfying
//! assignment. Callers enumerate candidates and filter complete assignments
//! by evaluating the whole relation, so precision here only affects how much
//! is filtered, never which states are accepted.

use crate::eval::{domain_of, eval, eval_bool, EvalContext, EvalError, EvalResult, VarSlots};
use crate::value::Value;
use minitla_ir::analyze::RefMode;
use minitla_ir::{BinOp, Expr, ExprKind};

/// What a relation says about one variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidates {
    /// The relation is false under the current partial assignment.
    Disabled,
    /// The relation does not mention the variable.
    Unmentioned,
    /// The variable is mentioned only in constraints with no enumerable
    /// source, such as `x' > 0`.
    Constrained,
    /// Every satisfying value is among these (sorted, deduplicated).
    Values(Vec<Value>),
}

/// Candidate values of `var'` under `expr`, as a set.
///
/// A variable the relation does not mention keeps its current value; a
/// disabled relation yields the empty set.
pub fn eval_next(expr: &Expr, ctx: &EvalContext<'_>, var: &str) -> EvalResult<Value> {
    let index = ctx
        .env
        .var_index(var)
        .ok_or_else(|| EvalError::UnboundVariable {
            name: format!("{}'", var),
            span: expr.span,
        })?;
    let mut slots: Vec<Option<Value>> = (0..ctx.env.var_names.len())
        .map(|i| match ctx.next_vars {
            VarSlots::Absent => None,
            slots => slots.get(i).cloned(),
        })
        .collect();
    slots[index] = None;
    let ctx = EvalContext::new(ctx.env, ctx.vars, VarSlots::Partial(&slots));
    match candidates(expr, &ctx, index, RefMode::Primed)? {
        Candidates::Disabled => Ok(Value::empty_set()),
        Candidates::Unmentioned => ctx
            .lookup(var, expr.span)
            .map(|v| Value::set_from_iter([v])),
        Candidates::Constrained => Err(unenumerable(var, RefMode::Primed, expr)),
        Candidates::Values(vals) => Ok(Value::set_from_iter(vals)),
    }
}

/// Error for a variable whose candidates cannot be enumerated.
pub fn unenumerable(var: &str, mode: RefMode, expr: &Expr) -> EvalError {
    let shown = match mode {
        RefMode::Primed => format!("{}'", var),
        RefMode::Unprimed => var.to_string(),
    };
    EvalError::UnboundedDomain {
        reason: format!(
            "`{}` is not given a value by `=` or `\\in`, so its candidates cannot be enumerated",
            shown
        ),
        span: expr.span,
    }
}

/// Infer the candidates of variable `target` (by declaration index) in
/// `expr`. `mode` says whether `target` is solved for in primed form
/// (actions) or unprimed form (the initial predicate); the matching slots
/// in `ctx` must be [`VarSlots::Partial`] with `target` pending.
pub fn candidates(
    expr: &Expr,
    ctx: &EvalContext<'_>,
    target: usize,
    mode: RefMode,
) -> EvalResult<Candidates> {
    let Some(var) = ctx.env.var_names.get(target) else {
        return Err(EvalError::UnboundVariable {
            name: format!("#{}", target),
            span: expr.span,
        });
    };
    Inference { ctx, var, mode }.infer(expr, ctx)
}

struct Inference<'c, 'a> {
    ctx: &'c EvalContext<'a>,
    var: &'c str,
    mode: RefMode,
}

impl Inference<'_, '_> {
    fn infer(&self, expr: &Expr, ctx: &EvalContext<'_>) -> EvalResult<Candidates> {
        if is_resolved(expr, ctx, &mut Vec::new()) {
            return Ok(if eval_bool(expr, ctx)? {
                Candidates::Unmentioned
            } else {
                Candidates::Disabled
            });
        }
        if !self.mentions(expr, ctx, &mut Vec::new()) {
            return Ok(Candidates::Unmentioned);
        }

        match &expr.kind {
            ExprKind::Binary {
                op: BinOp::Eq,
                left,
                right,
            } => {
                for (side, other) in [(left, right), (right, left)] {
                    if self.is_target(side, ctx) && is_resolved(other, ctx, &mut Vec::new()) {
                        return Ok(Candidates::Values(vec![eval(other, ctx)?]));
                    }
                }
                Ok(Candidates::Constrained)
            }
            ExprKind::Binary {
                op: BinOp::In,
                left,
                right,
            } if self.is_target(left, ctx) && is_resolved(right, ctx, &mut Vec::new()) => {
                let set = eval(right, ctx)?;
                let elems = set.as_set().ok_or_else(|| EvalError::TypeMismatch {
                    op: "\\in",
                    expected: "Set",
                    actual: set.type_name(),
                    span: right.span,
                })?;
                Ok(Candidates::Values(elems.to_vec()))
            }
            ExprKind::Binary {
                op: BinOp::And,
                left,
                right,
            } => {
                let l = self.infer(left, ctx)?;
                if l == Candidates::Disabled {
                    return Ok(l);
                }
                let r = self.infer(right, ctx)?;
                Ok(conjoin(l, r))
            }
            ExprKind::Binary {
                op: BinOp::Or,
                left,
                right,
            } => {
                let l = self.infer(left, ctx)?;
                let r = self.infer(right, ctx)?;
                self.disjoin(vec![l, r])
            }
            ExprKind::Binary {
                op: BinOp::Implies,
                left,
                right,
            } => {
                if is_resolved(left, ctx, &mut Vec::new()) {
                    if eval_bool(left, ctx)? {
                        self.infer(right, ctx)
                    } else {
                        Ok(Candidates::Unmentioned)
                    }
                } else {
                    Ok(Candidates::Constrained)
                }
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if is_resolved(cond, ctx, &mut Vec::new()) {
                    if eval_bool(cond, ctx)? {
                        self.infer(then_branch, ctx)
                    } else {
                        self.infer(else_branch, ctx)
                    }
                } else {
                    let t = self.infer(then_branch, ctx)?;
                    let e = self.infer(else_branch, ctx)?;
                    self.disjoin(vec![t, e])
                }
            }
            ExprKind::Exists { var, domain, body } => {
                let Some(items) = self.bounded_domain(domain, ctx)? else {
                    return Ok(Candidates::Constrained);
                };
                let mut branches = Vec::with_capacity(items.len());
                for item in items {
                    branches.push(ctx.with_local(var, item, |ctx| self.infer(body, ctx))?);
                }
                self.disjoin(branches)
            }
            ExprKind::Forall { var, domain, body } => {
                let Some(items) = self.bounded_domain(domain, ctx)? else {
                    return Ok(Candidates::Constrained);
                };
                let mut acc = Candidates::Unmentioned;
                for item in items {
                    let r = ctx.with_local(var, item, |ctx| self.infer(body, ctx))?;
                    if r == Candidates::Disabled {
                        return Ok(r);
                    }
                    acc = conjoin(acc, r);
                }
                Ok(acc)
            }
            ExprKind::Let { name, value, body } if is_resolved(value, ctx, &mut Vec::new()) => {
                let val = eval(value, ctx)?;
                ctx.with_local(name, val, |ctx| self.infer(body, ctx))
            }
            ExprKind::Unchanged(names)
                if self.mode == RefMode::Primed && names.iter().any(|n| n == self.var) =>
            {
                Ok(Candidates::Values(vec![self.ctx.lookup(self.var, expr.span)?]))
            }
            _ => Ok(Candidates::Constrained),
        }
    }

    /// Elements of a quantifier domain, or `None` while the domain still
    /// depends on a pending variable. Such a quantifier is no source of
    /// candidates; a sibling conjunct has to supply them.
    fn bounded_domain(
        &self,
        domain: &Expr,
        ctx: &EvalContext<'_>,
    ) -> EvalResult<Option<Vec<Value>>> {
        if !is_resolved(domain, ctx, &mut Vec::new()) {
            return Ok(None);
        }
        domain_of(domain, ctx).map(Some)
    }

    /// Combine alternatives. An alternative that leaves the variable alone
    /// contributes its current value (actions) or leaves it unconstrained
    /// (initial predicate).
    fn disjoin(&self, branches: Vec<Candidates>) -> EvalResult<Candidates> {
        let mut values: Vec<Value> = Vec::new();
        let mut live = false;
        let mut stutter = false;
        for branch in branches {
            match branch {
                Candidates::Disabled => {}
                Candidates::Constrained => return Ok(Candidates::Constrained),
                Candidates::Unmentioned => {
                    live = true;
                    stutter = true;
                }
                Candidates::Values(v) => {
                    live = true;
                    values = crate::value::sorted_vec_union(&values, &v);
                }
            }
        }
        if !live {
            return Ok(Candidates::Disabled);
        }
        if stutter {
            if values.is_empty() {
                return Ok(Candidates::Unmentioned);
            }
            match self.mode {
                RefMode::Primed => {
                    let current = self.ctx.lookup(self.var, minitla_ir::Span::dummy())?;
                    Value::set_insert(&mut values, current);
                }
                RefMode::Unprimed => return Ok(Candidates::Constrained),
            }
        }
        Ok(Candidates::Values(values))
    }

    fn is_target(&self, expr: &Expr, ctx: &EvalContext<'_>) -> bool {
        match (&expr.kind, self.mode) {
            (ExprKind::Prime(n), RefMode::Primed) => n == self.var,
            (ExprKind::Name(n), RefMode::Unprimed) => n == self.var && !ctx.is_local(n),
            _ => false,
        }
    }

    fn mentions<'e>(&self, expr: &'e Expr, ctx: &EvalContext<'_>, bound: &mut Vec<&'e str>) -> bool {
        match (&expr.kind, self.mode) {
            (ExprKind::Prime(n), RefMode::Primed) => n == self.var,
            (ExprKind::Name(n), RefMode::Unprimed) => {
                n == self.var && !bound.contains(&n.as_str()) && !ctx.is_local(n)
            }
            (ExprKind::Unchanged(names), _) => names.iter().any(|n| n == self.var),
            _ => walk(expr, bound, |child, bound| self.mentions(child, ctx, bound)),
        }
    }
}

/// Conjunction: a disabled side short-circuits; candidate sets are merged.
fn conjoin(l: Candidates, r: Candidates) -> Candidates {
    match (l, r) {
        (Candidates::Disabled, _) | (_, Candidates::Disabled) => Candidates::Disabled,
        (Candidates::Unmentioned, x) | (x, Candidates::Unmentioned) => x,
        (Candidates::Values(a), Candidates::Values(b)) => {
            Candidates::Values(crate::value::sorted_vec_union(&a, &b))
        }
        (Candidates::Values(a), Candidates::Constrained)
        | (Candidates::Constrained, Candidates::Values(a)) => Candidates::Values(a),
        (Candidates::Constrained, Candidates::Constrained) => Candidates::Constrained,
    }
}

/// True if `expr` can be evaluated: it references no variable that is
/// still pending in `ctx`.
pub fn is_resolved<'e>(expr: &'e Expr, ctx: &EvalContext<'_>, bound: &mut Vec<&'e str>) -> bool {
    let pending_var = |name: &str, slots: &VarSlots<'_>| {
        ctx.env
            .var_index(name)
            .map_or(false, |i| slots.is_pending(i))
    };
    match &expr.kind {
        ExprKind::Name(n) => {
            bound.contains(&n.as_str()) || ctx.is_local(n) || !pending_var(n, &ctx.vars)
        }
        ExprKind::Prime(n) => !pending_var(n, &ctx.next_vars),
        ExprKind::Unchanged(names) => names
            .iter()
            .all(|n| !pending_var(n, &ctx.vars) && !pending_var(n, &ctx.next_vars)),
        _ => !walk(expr, bound, |child, bound| !is_resolved(child, ctx, bound)),
    }
}

/// True if `f` holds for some child of `expr`, with binder names pushed
/// onto `bound` for the children they scope over.
fn walk<'e, F>(expr: &'e Expr, bound: &mut Vec<&'e str>, mut f: F) -> bool
where
    F: FnMut(&'e Expr, &mut Vec<&'e str>) -> bool,
{
    let scoped = |var: &'e str, child: &'e Expr, bound: &mut Vec<&'e str>, f: &mut F| {
        bound.push(var);
        let hit = f(child, bound);
        bound.pop();
        hit
    };
    match &expr.kind {
        ExprKind::FnLit { var, domain, body }
        | ExprKind::Forall { var, domain, body }
        | ExprKind::Exists { var, domain, body } => {
            f(domain, bound) || scoped(var.as_str(), body, bound, &mut f)
        }
        ExprKind::Choose {
            var,
            domain,
            predicate,
        }
        | ExprKind::SetFilter {
            var,
            domain,
            predicate,
        } => f(domain, bound) || scoped(var.as_str(), predicate, bound, &mut f),
        ExprKind::SetMap {
            element,
            var,
            domain,
        } => f(domain, bound) || scoped(var.as_str(), element, bound, &mut f),
        ExprKind::Let { name, value, body } => {
            f(value, bound) || scoped(name.as_str(), body, bound, &mut f)
        }
        _ => minitla_ir::analyze::children(expr)
            .into_iter()
            .any(|child| f(child, bound)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Env;
    use minitla_ir::build::*;

    fn env() -> Env {
        Env::new(vec!["x".into(), "y".into()], vec![], vec![])
    }

    fn ints(ns: &[i64]) -> Vec<Value> {
        ns.iter().copied().map(Value::int).collect()
    }

    fn infer_x(expr: &Expr, cur: &[Value], next: &[Option<Value>]) -> EvalResult<Candidates> {
        let env = env();
        let ctx = EvalContext::new(&env, VarSlots::Total(cur), VarSlots::Partial(next));
        candidates(expr, &ctx, 0, RefMode::Primed)
    }

    #[test]
    fn test_assignment_and_membership() {
        let cur = ints(&[1, 5]);
        let pending = [None, None];
        let e = eq(prime("x"), add(name("x"), int(1)));
        assert_eq!(infer_x(&e, &cur, &pending), Ok(Candidates::Values(ints(&[2]))));
        let e = in_set(prime("x"), range(int(3), int(4)));
        assert_eq!(infer_x(&e, &cur, &pending), Ok(Candidates::Values(ints(&[3, 4]))));
        let e = eq(name("y"), prime("x"));
        assert_eq!(infer_x(&e, &cur, &pending), Ok(Candidates::Values(ints(&[5]))));
    }

    #[test]
    fn test_guard_disables() {
        let cur = ints(&[3, 0]);
        let e = and(lt(name("x"), int(3)), eq(prime("x"), add(name("x"), int(1))));
        assert_eq!(infer_x(&e, &cur, &[None, None]), Ok(Candidates::Disabled));
    }

    #[test]
    fn test_unmentioned_and_constrained() {
        let cur = ints(&[0, 0]);
        let e = eq(prime("y"), int(1));
        assert_eq!(infer_x(&e, &cur, &[None, None]), Ok(Candidates::Unmentioned));
        let e = gt(prime("x"), int(0));
        assert_eq!(infer_x(&e, &cur, &[None, None]), Ok(Candidates::Constrained));
        let e = and(gt(prime("x"), int(0)), in_set(prime("x"), range(int(0), int(2))));
        assert_eq!(
            infer_x(&e, &cur, &[None, None]),
            Ok(Candidates::Values(ints(&[0, 1, 2])))
        );
    }

    #[test]
    fn test_disjunction_adds_stutter() {
        let cur = ints(&[7, 0]);
        let e = or(eq(prime("x"), int(1)), eq(prime("y"), int(1)));
        assert_eq!(infer_x(&e, &cur, &[None, None]), Ok(Candidates::Values(ints(&[1, 7]))));
        let e = or(and(boolean(false), eq(prime("x"), int(1))), eq(prime("x"), int(2)));
        assert_eq!(infer_x(&e, &cur, &[None, None]), Ok(Candidates::Values(ints(&[2]))));
    }

    #[test]
    fn test_exists_and_unchanged() {
        let cur = ints(&[0, 9]);
        let e = exists("v", set([int(4), int(2)]), eq(prime("x"), name("v")));
        assert_eq!(infer_x(&e, &cur, &[None, None]), Ok(Candidates::Values(ints(&[2, 4]))));
        let e = unchanged(["x", "y"]);
        assert_eq!(infer_x(&e, &cur, &[None, None]), Ok(Candidates::Values(ints(&[0]))));
    }

    #[test]
    fn test_dependent_on_assigned_prime() {
        let cur = ints(&[0, 0]);
        // y' already fixed to 4
        let e = and(eq(prime("y"), int(4)), eq(prime("x"), add(prime("y"), int(1))));
        assert_eq!(
            infer_x(&e, &cur, &[None, Some(Value::int(4))]),
            Ok(Candidates::Values(ints(&[5])))
        );
        // y' not yet fixed
        assert_eq!(infer_x(&e, &cur, &[None, None]), Ok(Candidates::Constrained));
    }

    #[test]
    fn test_if_with_unresolved_condition() {
        let cur = ints(&[0, 0]);
        let e = if_then_else(gt(prime("y"), int(0)), eq(prime("x"), int(1)), eq(prime("x"), int(2)));
        assert_eq!(infer_x(&e, &cur, &[None, None]), Ok(Candidates::Values(ints(&[1, 2]))));
    }

    #[test]
    fn test_unresolved_domain_is_constrained() {
        let cur = ints(&[0, 0]);
        let e = exists("v", set([prime("y")]), eq(prime("x"), name("v")));
        assert_eq!(infer_x(&e, &cur, &[None, None]), Ok(Candidates::Constrained));
        let e = forall("e", prime("x"), gt(name("e"), int(1)));
        assert_eq!(infer_x(&e, &cur, &[None, None]), Ok(Candidates::Constrained));
        // a sibling membership still supplies the candidates
        let e = and(
            in_set(prime("x"), set([int(1), int(2)])),
            forall("e", set([prime("x")]), gt(name("e"), int(1))),
        );
        assert_eq!(
            infer_x(&e, &cur, &[None, None]),
            Ok(Candidates::Values(ints(&[1, 2])))
        );
    }

    #[test]
    fn test_quantifier_as_only_source_is_unbounded() {
        let env = env();
        let cur = ints(&[0, 0]);
        let ctx = EvalContext::new(&env, VarSlots::Total(&cur), VarSlots::Absent);
        let e = exists("v", set([prime("x")]), eq(prime("x"), name("v")));
        let err = eval_next(&e, &ctx, "x").unwrap_err();
        assert_eq!(err.kind(), crate::eval::ErrorKind::UnboundedDomain);
    }

    #[test]
    fn test_init_mode() {
        let env = env();
        let cur = [None, None];
        let ctx = EvalContext::new(&env, VarSlots::Partial(&cur), VarSlots::Absent);
        let init = and(in_set(name("x"), range(int(0), int(1))), eq(name("y"), name("x")));
        assert_eq!(
            candidates(&init, &ctx, 0, RefMode::Unprimed),
            Ok(Candidates::Values(ints(&[0, 1])))
        );
        let loose = or(eq(name("x"), int(0)), eq(name("y"), int(0)));
        assert_eq!(
            candidates(&loose, &ctx, 0, RefMode::Unprimed),
            Ok(Candidates::Constrained)
        );
        // a bound `x` is not the variable
        let shadowed = and(exists("x", set([int(1)]), eq(name("x"), int(1))), eq(name("x"), int(3)));
        assert_eq!(
            candidates(&shadowed, &ctx, 0, RefMode::Unprimed),
            Ok(Candidates::Values(ints(&[3])))
        );
    }

    #[test]
    fn test_eval_next() {
        let env = env();
        let cur = ints(&[1, 2]);
        let ctx = EvalContext::new(&env, VarSlots::Total(&cur), VarSlots::Absent);
        let e = in_set(prime("x"), set([int(3), name("y")]));
        assert_eq!(
            eval_next(&e, &ctx, "x"),
            Ok(Value::set_from_iter(ints(&[2, 3])))
        );
        assert_eq!(
            eval_next(&eq(prime("y"), int(0)), &ctx, "x"),
            Ok(Value::set_from_iter(ints(&[1])))
        );
        assert_eq!(
            eval_next(&and(boolean(false), eq(prime("x"), int(0))), &ctx, "x"),
            Ok(Value::empty_set())
        );
    }
}
