//! Constructors for expression trees.
//!
//! Front-ends that already track source positions can build [`Expr`] values
//! directly; everything here attaches [`Span::dummy`] and is meant for
//! generated specifications and tests. Use [`Expr::at`] to attach a span.

use crate::ir::{BinOp, Expr, ExprKind, UnaryOp};
use crate::span::Span;

fn mk(kind: ExprKind) -> Expr {
    Expr::new(kind, Span::dummy())
}

fn boxed(e: Expr) -> Box<Expr> {
    Box::new(e)
}

pub fn boolean(b: bool) -> Expr {
    mk(ExprKind::Bool(b))
}

pub fn int(n: i64) -> Expr {
    mk(ExprKind::Int(n))
}

pub fn string(s: impl Into<String>) -> Expr {
    mk(ExprKind::Str(s.into()))
}

pub fn name(n: impl Into<String>) -> Expr {
    mk(ExprKind::Name(n.into()))
}

/// `n'`
pub fn prime(n: impl Into<String>) -> Expr {
    mk(ExprKind::Prime(n.into()))
}

pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
    mk(ExprKind::Unary {
        op,
        operand: boxed(operand),
    })
}

pub fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    mk(ExprKind::Binary {
        op,
        left: boxed(left),
        right: boxed(right),
    })
}

pub fn not(e: Expr) -> Expr {
    unary(UnaryOp::Not, e)
}

pub fn neg(e: Expr) -> Expr {
    unary(UnaryOp::Neg, e)
}

pub fn and(l: Expr, r: Expr) -> Expr {
    binary(BinOp::And, l, r)
}

pub fn or(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Or, l, r)
}

/// Right-nested conjunction; `TRUE` when empty.
pub fn and_all(exprs: impl IntoIterator<Item = Expr>) -> Expr {
    let mut exprs: Vec<Expr> = exprs.into_iter().collect();
    let Some(mut acc) = exprs.pop() else {
        return boolean(true);
    };
    while let Some(e) = exprs.pop() {
        acc = and(e, acc);
    }
    acc
}

/// Right-nested disjunction; `FALSE` when empty.
pub fn or_all(exprs: impl IntoIterator<Item = Expr>) -> Expr {
    let mut exprs: Vec<Expr> = exprs.into_iter().collect();
    let Some(mut acc) = exprs.pop() else {
        return boolean(false);
    };
    while let Some(e) = exprs.pop() {
        acc = or(e, acc);
    }
    acc
}

pub fn implies(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Implies, l, r)
}

pub fn iff(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Iff, l, r)
}

pub fn eq(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Eq, l, r)
}

pub fn ne(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Ne, l, r)
}

pub fn lt(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Lt, l, r)
}

pub fn le(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Le, l, r)
}

pub fn gt(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Gt, l, r)
}

pub fn ge(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Ge, l, r)
}

pub fn add(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Add, l, r)
}

pub fn sub(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Sub, l, r)
}

pub fn mul(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Mul, l, r)
}

pub fn div(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Div, l, r)
}

pub fn modulo(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Mod, l, r)
}

pub fn in_set(elem: Expr, set: Expr) -> Expr {
    binary(BinOp::In, elem, set)
}

pub fn not_in(elem: Expr, set: Expr) -> Expr {
    binary(BinOp::NotIn, elem, set)
}

pub fn union(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Union, l, r)
}

pub fn intersect(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Intersect, l, r)
}

pub fn diff(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Diff, l, r)
}

pub fn subset_eq(l: Expr, r: Expr) -> Expr {
    binary(BinOp::SubsetEq, l, r)
}

pub fn concat(l: Expr, r: Expr) -> Expr {
    binary(BinOp::Concat, l, r)
}

pub fn set(elems: impl IntoIterator<Item = Expr>) -> Expr {
    mk(ExprKind::SetLit(elems.into_iter().collect()))
}

pub fn seq(elems: impl IntoIterator<Item = Expr>) -> Expr {
    mk(ExprKind::SeqLit(elems.into_iter().collect()))
}

pub fn range(lo: Expr, hi: Expr) -> Expr {
    mk(ExprKind::Range {
        lo: boxed(lo),
        hi: boxed(hi),
    })
}

pub fn record<S: Into<String>>(fields: impl IntoIterator<Item = (S, Expr)>) -> Expr {
    mk(ExprKind::RecordLit(
        fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
    ))
}

pub fn fn_lit(var: impl Into<String>, domain: Expr, body: Expr) -> Expr {
    mk(ExprKind::FnLit {
        var: var.into(),
        domain: boxed(domain),
        body: boxed(body),
    })
}

pub fn apply(func: Expr, arg: Expr) -> Expr {
    mk(ExprKind::Apply {
        func: boxed(func),
        arg: boxed(arg),
    })
}

pub fn field(base: Expr, field: impl Into<String>) -> Expr {
    mk(ExprKind::Field {
        base: boxed(base),
        field: field.into(),
    })
}

pub fn except(base: Expr, key: Expr, value: Expr) -> Expr {
    mk(ExprKind::Except {
        base: boxed(base),
        key: boxed(key),
        value: boxed(value),
    })
}

pub fn domain(e: Expr) -> Expr {
    mk(ExprKind::Domain(boxed(e)))
}

pub fn cardinality(e: Expr) -> Expr {
    mk(ExprKind::Cardinality(boxed(e)))
}

pub fn len(e: Expr) -> Expr {
    mk(ExprKind::Len(boxed(e)))
}

pub fn head(e: Expr) -> Expr {
    mk(ExprKind::Head(boxed(e)))
}

pub fn tail(e: Expr) -> Expr {
    mk(ExprKind::Tail(boxed(e)))
}

pub fn append(seq: Expr, elem: Expr) -> Expr {
    mk(ExprKind::Append {
        seq: boxed(seq),
        elem: boxed(elem),
    })
}

pub fn powerset(e: Expr) -> Expr {
    mk(ExprKind::Powerset(boxed(e)))
}

pub fn big_union(e: Expr) -> Expr {
    mk(ExprKind::BigUnion(boxed(e)))
}

pub fn forall(var: impl Into<String>, domain: Expr, body: Expr) -> Expr {
    mk(ExprKind::Forall {
        var: var.into(),
        domain: boxed(domain),
        body: boxed(body),
    })
}

pub fn exists(var: impl Into<String>, domain: Expr, body: Expr) -> Expr {
    mk(ExprKind::Exists {
        var: var.into(),
        domain: boxed(domain),
        body: boxed(body),
    })
}

pub fn choose(var: impl Into<String>, domain: Expr, predicate: Expr) -> Expr {
    mk(ExprKind::Choose {
        var: var.into(),
        domain: boxed(domain),
        predicate: boxed(predicate),
    })
}

pub fn set_filter(var: impl Into<String>, domain: Expr, predicate: Expr) -> Expr {
    mk(ExprKind::SetFilter {
        var: var.into(),
        domain: boxed(domain),
        predicate: boxed(predicate),
    })
}

pub fn set_map(element: Expr, var: impl Into<String>, domain: Expr) -> Expr {
    mk(ExprKind::SetMap {
        element: boxed(element),
        var: var.into(),
        domain: boxed(domain),
    })
}

pub fn let_in(n: impl Into<String>, value: Expr, body: Expr) -> Expr {
    mk(ExprKind::Let {
        name: n.into(),
        value: boxed(value),
        body: boxed(body),
    })
}

pub fn if_then_else(cond: Expr, then_branch: Expr, else_branch: Expr) -> Expr {
    mk(ExprKind::If {
        cond: boxed(cond),
        then_branch: boxed(then_branch),
        else_branch: boxed(else_branch),
    })
}

pub fn unchanged<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Expr {
    mk(ExprKind::Unchanged(names.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_all_nests_right() {
        let e = and_all([boolean(true), boolean(false), int(1)]);
        match e.kind {
            ExprKind::Binary {
                op: BinOp::And,
                left,
                right,
            } => {
                assert!(matches!(left.kind, ExprKind::Bool(true)));
                assert!(matches!(
                    right.kind,
                    ExprKind::Binary { op: BinOp::And, .. }
                ));
            }
            other => panic!("expected conjunction, got {:?}", other),
        }
        assert!(matches!(and_all([]).kind, ExprKind::Bool(true)));
        assert!(matches!(or_all([]).kind, ExprKind::Bool(false)));
    }
}
