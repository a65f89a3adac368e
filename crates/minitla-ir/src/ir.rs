//! Specification tree for minitla.
//!
//! The front-end hands the checker a [`Spec`]: declared variables and
//! constants, one initial predicate, a list of named actions and a list of
//! invariants. Expressions reference current-state variables by name and
//! next-state variables through [`ExprKind::Prime`].

use crate::span::Span;
use std::fmt;

/// A parsed minitla specification.
#[derive(Debug, Clone)]
pub struct Spec {
    /// Module name.
    pub name: String,
    /// State variable declarations, in declaration order.
    pub vars: Vec<VarDecl>,
    /// Constant declarations, in declaration order.
    pub consts: Vec<ConstDecl>,
    /// Initial state predicate.
    pub init: Expr,
    /// Actions, in declaration order.
    pub actions: Vec<ActionDef>,
    /// Invariants, in declaration order.
    pub invariants: Vec<Invariant>,
}

/// A state variable declaration.
#[derive(Debug, Clone)]
pub struct VarDecl {
    /// Variable name.
    pub name: String,
    /// Position in the declaration list.
    pub index: usize,
    pub span: Span,
}

/// A constant declaration. Values are bound by the caller before checking.
#[derive(Debug, Clone)]
pub struct ConstDecl {
    /// Constant name.
    pub name: String,
    /// Position in the declaration list.
    pub index: usize,
    pub span: Span,
}

/// A named action: a relation over unprimed (current) and primed (next)
/// variables.
#[derive(Debug, Clone)]
pub struct ActionDef {
    pub name: String,
    pub body: Expr,
    pub span: Span,
}

/// A named state predicate that must hold in every reachable state.
#[derive(Debug, Clone)]
pub struct Invariant {
    pub name: String,
    pub body: Expr,
    pub span: Span,
}

impl Spec {
    /// Create an empty specification whose initial predicate is `TRUE`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: Vec::new(),
            consts: Vec::new(),
            init: Expr::new(ExprKind::Bool(true), Span::dummy()),
            actions: Vec::new(),
            invariants: Vec::new(),
        }
    }

    /// Declare a state variable.
    pub fn var(mut self, name: impl Into<String>) -> Self {
        let index = self.vars.len();
        self.vars.push(VarDecl {
            name: name.into(),
            index,
            span: Span::dummy(),
        });
        self
    }

    /// Declare a constant.
    pub fn constant(mut self, name: impl Into<String>) -> Self {
        let index = self.consts.len();
        self.consts.push(ConstDecl {
            name: name.into(),
            index,
            span: Span::dummy(),
        });
        self
    }

    /// Set the initial predicate.
    pub fn init(mut self, init: Expr) -> Self {
        self.init = init;
        self
    }

    /// Append an action.
    pub fn action(mut self, name: impl Into<String>, body: Expr) -> Self {
        let span = body.span;
        self.actions.push(ActionDef {
            name: name.into(),
            body,
            span,
        });
        self
    }

    /// Append an invariant.
    pub fn invariant(mut self, name: impl Into<String>, body: Expr) -> Self {
        let span = body.span;
        self.invariants.push(Invariant {
            name: name.into(),
            body,
            span,
        });
        self
    }

    /// Names of the declared variables, in declaration order.
    pub fn var_names(&self) -> Vec<String> {
        self.vars.iter().map(|v| v.name.clone()).collect()
    }

    /// Index of a declared variable.
    pub fn var_index(&self, name: &str) -> Option<usize> {
        self.vars.iter().position(|v| v.name == name)
    }
}

/// An expression with its source span.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Replace the span, keeping the expression.
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// Expression kinds.
#[derive(Debug, Clone)]
pub enum ExprKind {
    // === Literals ===
    Bool(bool),
    Int(i64),
    Str(String),

    // === References ===
    /// Bound name: local binder, state variable or constant.
    Name(String),
    /// Next-state value of a state variable (`x'`).
    Prime(String),

    // === Operators ===
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    // === Constructors ===
    /// `{a, b, c}`
    SetLit(Vec<Expr>),
    /// `<<a, b, c>>`
    SeqLit(Vec<Expr>),
    /// `lo..hi`, inclusive.
    Range {
        lo: Box<Expr>,
        hi: Box<Expr>,
    },
    /// `[a |-> 1, b |-> 2]`, a function with string keys.
    RecordLit(Vec<(String, Expr)>),
    /// `[var \in domain |-> body]`
    FnLit {
        var: String,
        domain: Box<Expr>,
        body: Box<Expr>,
    },

    // === Access and update ===
    /// `func[arg]`; sequences are indexed from 1.
    Apply {
        func: Box<Expr>,
        arg: Box<Expr>,
    },
    /// `base.field`
    Field {
        base: Box<Expr>,
        field: String,
    },
    /// `[base EXCEPT ![key] = value]`
    Except {
        base: Box<Expr>,
        key: Box<Expr>,
        value: Box<Expr>,
    },
    /// `DOMAIN f`
    Domain(Box<Expr>),
    /// `Cardinality(S)`
    Cardinality(Box<Expr>),
    /// `Len(s)`
    Len(Box<Expr>),
    /// `Head(s)`
    Head(Box<Expr>),
    /// `Tail(s)`
    Tail(Box<Expr>),
    /// `Append(s, e)`
    Append {
        seq: Box<Expr>,
        elem: Box<Expr>,
    },
    /// `SUBSET S`
    Powerset(Box<Expr>),
    /// `UNION S`
    BigUnion(Box<Expr>),

    // === Binders ===
    Forall {
        var: String,
        domain: Box<Expr>,
        body: Box<Expr>,
    },
    Exists {
        var: String,
        domain: Box<Expr>,
        body: Box<Expr>,
    },
    /// `CHOOSE var \in domain : predicate`
    Choose {
        var: String,
        domain: Box<Expr>,
        predicate: Box<Expr>,
    },
    /// `{var \in domain : predicate}`
    SetFilter {
        var: String,
        domain: Box<Expr>,
        predicate: Box<Expr>,
    },
    /// `{element : var \in domain}`
    SetMap {
        element: Box<Expr>,
        var: String,
        domain: Box<Expr>,
    },
    /// `LET name == value IN body`
    Let {
        name: String,
        value: Box<Expr>,
        body: Box<Expr>,
    },

    // === Control ===
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    // === Frame ===
    /// `UNCHANGED <<x, y>>`
    Unchanged(Vec<String>),
}

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    // Logical
    And,
    Or,
    Implies,
    Iff,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Set
    In,
    NotIn,
    Union,
    Intersect,
    Diff,
    SubsetEq,
    // Sequence
    Concat,
}

impl BinOp {
    /// Operator symbol in TLA+ notation.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::And => "/\\",
            BinOp::Or => "\\/",
            BinOp::Implies => "=>",
            BinOp::Iff => "<=>",
            BinOp::Eq => "=",
            BinOp::Ne => "/=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "\\div",
            BinOp::Mod => "%",
            BinOp::In => "\\in",
            BinOp::NotIn => "\\notin",
            BinOp::Union => "\\union",
            BinOp::Intersect => "\\intersect",
            BinOp::Diff => "\\",
            BinOp::SubsetEq => "\\subseteq",
            BinOp::Concat => "\\o",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or | BinOp::Implies | BinOp::Iff)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "~",
            UnaryOp::Neg => "-",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
