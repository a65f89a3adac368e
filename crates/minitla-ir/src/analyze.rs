//! Static queries over expressions.
//!
//! The action engine asks these once per action before exploration starts:
//! which variables an action reads and writes, and in which order its
//! next-state variables must be enumerated so that `y' = x' + 1` sees a
//! value for `x'` first.

use crate::ir::{BinOp, Expr, ExprKind};
use std::collections::BTreeSet;

/// Which form of a variable reference a query is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefMode {
    /// `x'` (and `UNCHANGED x`).
    Primed,
    /// Free `x`, not shadowed by a binder (and `UNCHANGED x`).
    Unprimed,
}

/// Variables read and written by an action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionFootprint {
    /// Unprimed references, sorted.
    pub reads: Vec<String>,
    /// Primed references, sorted.
    pub writes: Vec<String>,
}

/// Immediate sub-expressions, in evaluation order.
pub fn children(expr: &Expr) -> Vec<&Expr> {
    match &expr.kind {
        ExprKind::Bool(_)
        | ExprKind::Int(_)
        | ExprKind::Str(_)
        | ExprKind::Name(_)
        | ExprKind::Prime(_)
        | ExprKind::Unchanged(_) => Vec::new(),
        ExprKind::Unary { operand, .. } => vec![operand],
        ExprKind::Binary { left, right, .. } => vec![left, right],
        ExprKind::SetLit(elems) | ExprKind::SeqLit(elems) => elems.iter().collect(),
        ExprKind::Range { lo, hi } => vec![lo, hi],
        ExprKind::RecordLit(fields) => fields.iter().map(|(_, e)| e).collect(),
        ExprKind::FnLit { domain, body, .. } => vec![domain, body],
        ExprKind::Apply { func, arg } => vec![func, arg],
        ExprKind::Field { base, .. } => vec![base],
        ExprKind::Except { base, key, value } => vec![base, key, value],
        ExprKind::Domain(e)
        | ExprKind::Cardinality(e)
        | ExprKind::Len(e)
        | ExprKind::Head(e)
        | ExprKind::Tail(e)
        | ExprKind::Powerset(e)
        | ExprKind::BigUnion(e) => vec![e],
        ExprKind::Append { seq, elem } => vec![seq, elem],
        ExprKind::Forall { domain, body, .. } | ExprKind::Exists { domain, body, .. } => {
            vec![domain, body]
        }
        ExprKind::Choose {
            domain, predicate, ..
        }
        | ExprKind::SetFilter {
            domain, predicate, ..
        } => vec![domain, predicate],
        ExprKind::SetMap {
            element, domain, ..
        } => vec![domain, element],
        ExprKind::Let { value, body, .. } => vec![value, body],
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => vec![cond, then_branch, else_branch],
    }
}

/// The binder introduced by `expr` and the children it scopes over.
fn binder(expr: &Expr) -> Option<(&str, Vec<&Expr>)> {
    match &expr.kind {
        ExprKind::FnLit { var, body, .. }
        | ExprKind::Forall { var, body, .. }
        | ExprKind::Exists { var, body, .. } => Some((var, vec![body])),
        ExprKind::Choose { var, predicate, .. } | ExprKind::SetFilter { var, predicate, .. } => {
            Some((var, vec![predicate]))
        }
        ExprKind::SetMap { var, element, .. } => Some((var, vec![element])),
        ExprKind::Let { name, body, .. } => Some((name, vec![body])),
        _ => None,
    }
}

/// True if `expr` contains a primed reference or an `UNCHANGED`.
pub fn mentions_primed(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Prime(_) | ExprKind::Unchanged(_) => true,
        _ => children(expr).into_iter().any(mentions_primed),
    }
}

/// Names of all variables referenced in primed form.
pub fn primed_vars(expr: &Expr) -> BTreeSet<String> {
    var_refs(expr, RefMode::Primed)
}

/// Names referenced in the given form. Unprimed references respect binder
/// shadowing, so `\E x \in S : x > 0` does not reference `x`.
pub fn var_refs(expr: &Expr, mode: RefMode) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let mut bound = Vec::new();
    collect_refs(expr, mode, &mut bound, &mut out);
    out
}

fn collect_refs<'e>(
    expr: &'e Expr,
    mode: RefMode,
    bound: &mut Vec<&'e str>,
    out: &mut BTreeSet<String>,
) {
    match &expr.kind {
        ExprKind::Name(n) if mode == RefMode::Unprimed => {
            if !bound.contains(&n.as_str()) {
                out.insert(n.clone());
            }
        }
        ExprKind::Prime(n) if mode == RefMode::Primed => {
            out.insert(n.clone());
        }
        ExprKind::Unchanged(names) => {
            for n in names {
                if mode == RefMode::Primed || !bound.contains(&n.as_str()) {
                    out.insert(n.clone());
                }
            }
        }
        _ => {
            if let Some((var, scoped)) = binder(expr) {
                for child in children(expr) {
                    if scoped.iter().any(|s| std::ptr::eq(*s, child)) {
                        bound.push(var);
                        collect_refs(child, mode, bound, out);
                        bound.pop();
                    } else {
                        collect_refs(child, mode, bound, out);
                    }
                }
            } else {
                for child in children(expr) {
                    collect_refs(child, mode, bound, out);
                }
            }
        }
    }
}

/// Reads and writes of an action body.
pub fn footprint(expr: &Expr) -> ActionFootprint {
    ActionFootprint {
        reads: var_refs(expr, RefMode::Unprimed).into_iter().collect(),
        writes: var_refs(expr, RefMode::Primed).into_iter().collect(),
    }
}

/// Order in which the variables `vars` must be enumerated when solving
/// `expr` for them in form `mode`.
///
/// A variable whose defining expression (the other side of `v = e`, the set
/// in `v \in S`, or an enclosing condition, domain or `LET` value) mentions
/// another target is placed after it. Ties and cycles fall back to
/// declaration order.
pub fn assignment_order(expr: &Expr, vars: &[String], mode: RefMode) -> Vec<usize> {
    let mut deps: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); vars.len()];
    let mut bound = Vec::new();
    let mut context = BTreeSet::new();
    collect_deps(expr, vars, mode, &mut bound, &mut context, &mut deps);
    for (i, d) in deps.iter_mut().enumerate() {
        d.remove(&i);
    }
    stable_topo_order(&deps)
}

fn target_of(expr: &Expr, vars: &[String], mode: RefMode, bound: &[&str]) -> Option<usize> {
    let n = match (&expr.kind, mode) {
        (ExprKind::Prime(n), RefMode::Primed) => n,
        (ExprKind::Name(n), RefMode::Unprimed) if !bound.contains(&n.as_str()) => n,
        _ => return None,
    };
    vars.iter().position(|v| v == n)
}

fn target_refs(expr: &Expr, vars: &[String], mode: RefMode, bound: &[&str]) -> BTreeSet<usize> {
    let names = match mode {
        RefMode::Primed => var_refs(expr, mode),
        RefMode::Unprimed => {
            let mut out = BTreeSet::new();
            let mut b = bound.to_vec();
            collect_refs(expr, mode, &mut b, &mut out);
            out
        }
    };
    names
        .iter()
        .filter_map(|n| vars.iter().position(|v| v == n))
        .collect()
}

fn collect_deps<'e>(
    expr: &'e Expr,
    vars: &[String],
    mode: RefMode,
    bound: &mut Vec<&'e str>,
    context: &mut BTreeSet<usize>,
    deps: &mut [BTreeSet<usize>],
) {
    match &expr.kind {
        ExprKind::Binary { op, left, right } if matches!(op, BinOp::Eq | BinOp::In) => {
            let lhs = target_of(left, vars, mode, bound);
            let rhs = if *op == BinOp::Eq {
                target_of(right, vars, mode, bound)
            } else {
                None
            };
            if let Some(v) = lhs {
                deps[v].extend(target_refs(right, vars, mode, bound));
                deps[v].extend(context.iter().copied());
            }
            if let Some(v) = rhs {
                deps[v].extend(target_refs(left, vars, mode, bound));
                deps[v].extend(context.iter().copied());
            }
        }
        ExprKind::If { cond, then_branch, else_branch } => {
            let added = target_refs(cond, vars, mode, bound);
            with_context(context, added, |ctx| {
                collect_deps(then_branch, vars, mode, bound, ctx, deps);
                collect_deps(else_branch, vars, mode, bound, ctx, deps);
            });
        }
        ExprKind::Forall { var, domain, body } | ExprKind::Exists { var, domain, body } => {
            let added = target_refs(domain, vars, mode, bound);
            with_context(context, added, |ctx| {
                bound.push(var);
                collect_deps(body, vars, mode, bound, ctx, deps);
                bound.pop();
            });
        }
        ExprKind::Let { name, value, body } => {
            let added = target_refs(value, vars, mode, bound);
            with_context(context, added, |ctx| {
                bound.push(name);
                collect_deps(body, vars, mode, bound, ctx, deps);
                bound.pop();
            });
        }
        ExprKind::Binary { op, left, right } if op.is_logical() => {
            collect_deps(left, vars, mode, bound, context, deps);
            collect_deps(right, vars, mode, bound, context, deps);
        }
        ExprKind::Unary { operand, .. } => {
            collect_deps(operand, vars, mode, bound, context, deps);
        }
        _ => {}
    }
}

fn with_context<F>(context: &mut BTreeSet<usize>, added: BTreeSet<usize>, f: F)
where
    F: FnOnce(&mut BTreeSet<usize>),
{
    let fresh: Vec<usize> = added.difference(context).copied().collect();
    context.extend(fresh.iter().copied());
    f(context);
    for v in fresh {
        context.remove(&v);
    }
}

/// Kahn's algorithm, always taking the lowest ready index.
fn stable_topo_order(deps: &[BTreeSet<usize>]) -> Vec<usize> {
    let n = deps.len();
    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);
    while order.len() < n {
        let next = (0..n).find(|&i| !placed[i] && deps[i].iter().all(|&d| placed[d]));
        match next {
            Some(i) => {
                placed[i] = true;
                order.push(i);
            }
            None => {
                // cycle: the rest in declaration order
                order.extend((0..n).filter(|&i| !placed[i]));
                break;
            }
        }
    }
    order
}
