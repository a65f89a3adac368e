//! Runtime values for minitla.
//!
//! Composite values are kept in canonical form so that derived equality,
//! ordering and hashing agree with structural equality:
//! - sets are sorted, deduplicated vectors;
//! - functions are vectors of `(key, value)` pairs sorted by key;
//! - a function whose domain is exactly `1..n` is stored as a sequence, so
//!   `[i \in 1..2 |-> i]` and `<<1, 2>>` are the same value.
//!
//! All composites live behind an `Arc`, making `clone` O(1). No operation
//! mutates a value in place.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Largest set `SUBSET` will expand.
pub const MAX_POWERSET_BASE: usize = 20;

/// Runtime value.
///
/// Variant order defines the cross-kind total order:
/// Bool < Int < Str < Set < Seq < Fn.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(Arc<str>),
    Set(Arc<Vec<Value>>),
    Seq(Arc<Vec<Value>>),
    Fn(Arc<Vec<(Value, Value)>>),
}

/// Error raised by a value operation. The evaluator attaches a source span.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("type mismatch in {op}: expected {expected}, got {actual}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("integer overflow in {op}")]
    Overflow { op: &'static str },

    #[error("division by zero")]
    DivisionByZero,

    #[error("key not found: {key}")]
    KeyNotFound { key: String },

    #[error("index out of bounds: index {index}, length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("{op} over a set of {size} elements is too large to enumerate")]
    TooLarge { op: &'static str, size: usize },
}

pub type ValueResult<T> = Result<T, ValueError>;

fn mismatch(op: &'static str, expected: &'static str, actual: &Value) -> ValueError {
    ValueError::TypeMismatch {
        op,
        expected,
        actual: actual.type_name(),
    }
}

// === Constructors ===

impl Value {
    #[inline]
    pub fn int(n: i64) -> Self {
        Value::Int(n)
    }

    #[inline]
    pub fn bool(b: bool) -> Self {
        Value::Bool(b)
    }

    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn empty_set() -> Self {
        Value::Set(Arc::new(Vec::new()))
    }

    pub fn empty_seq() -> Self {
        Value::Seq(Arc::new(Vec::new()))
    }

    /// `lo..hi`, inclusive. Empty when `lo > hi`.
    pub fn range(lo: i64, hi: i64) -> Self {
        Value::Set(Arc::new((lo..=hi).map(Value::Int).collect()))
    }

    pub fn seq(v: Vec<Value>) -> Self {
        Value::Seq(Arc::new(v))
    }

    pub fn set_from_iter(iter: impl IntoIterator<Item = Value>) -> Self {
        let mut v: Vec<Value> = iter.into_iter().collect();
        v.sort();
        v.dedup();
        Value::Set(Arc::new(v))
    }

    /// Build a function. For duplicate keys the last value wins.
    pub fn fn_from_iter(iter: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut v: Vec<(Value, Value)> = iter.into_iter().collect();
        v.sort_by(|a, b| a.0.cmp(&b.0));
        v.dedup_by(|a, b| {
            if a.0 == b.0 {
                std::mem::swap(&mut a.1, &mut b.1);
                true
            } else {
                false
            }
        });
        Self::from_sorted_fn(v)
    }

    /// A record: a function from field names to values.
    pub fn record<K: Into<Arc<str>>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::fn_from_iter(
            fields
                .into_iter()
                .map(|(k, v)| (Value::Str(k.into()), v)),
        )
    }

    /// Canonicalize a key-sorted, deduplicated function.
    fn from_sorted_fn(v: Vec<(Value, Value)>) -> Self {
        let is_seq = v
            .iter()
            .enumerate()
            .all(|(i, (k, _))| *k == Value::Int(i as i64 + 1));
        if is_seq {
            Value::Seq(Arc::new(v.into_iter().map(|(_, x)| x).collect()))
        } else {
            Value::Fn(Arc::new(v))
        }
    }

    /// Insert into a sorted set vector. Returns false if already present.
    pub fn set_insert(set: &mut Vec<Value>, val: Value) -> bool {
        match set.binary_search(&val) {
            Ok(_) => false,
            Err(pos) => {
                set.insert(pos, val);
                true
            }
        }
    }

    pub fn set_contains(set: &[Value], val: &Value) -> bool {
        set.binary_search(val).is_ok()
    }

    pub fn fn_get<'a>(func: &'a [(Value, Value)], key: &Value) -> Option<&'a Value> {
        func.binary_search_by(|(k, _)| k.cmp(key))
            .ok()
            .map(|idx| &func[idx].1)
    }

    pub fn fn_insert(func: &mut Vec<(Value, Value)>, key: Value, value: Value) {
        match func.binary_search_by(|(k, _)| k.cmp(&key)) {
            Ok(idx) => func[idx].1 = value,
            Err(pos) => func.insert(pos, (key, value)),
        }
    }
}

// === Accessors ===

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Str(_) => "String",
            Value::Set(_) => "Set",
            Value::Seq(_) => "Seq",
            Value::Fn(_) => "Fn",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&[Value]> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_fn(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Fn(f) => Some(f),
            _ => None,
        }
    }

    pub fn expect_bool(&self, op: &'static str) -> ValueResult<bool> {
        self.as_bool().ok_or_else(|| mismatch(op, "Bool", self))
    }

    pub fn expect_int(&self, op: &'static str) -> ValueResult<i64> {
        self.as_int().ok_or_else(|| mismatch(op, "Int", self))
    }

    pub fn expect_set(&self, op: &'static str) -> ValueResult<&[Value]> {
        self.as_set().ok_or_else(|| mismatch(op, "Set", self))
    }

    pub fn expect_seq(&self, op: &'static str) -> ValueResult<&[Value]> {
        self.as_seq().ok_or_else(|| mismatch(op, "Seq", self))
    }

    /// Elements a quantifier ranges over: set elements, sequence elements
    /// or function domain. `None` for scalars.
    pub fn domain_elements(&self) -> Option<Vec<Value>> {
        match self {
            Value::Set(s) => Some(s.to_vec()),
            Value::Seq(s) => {
                let mut v = s.to_vec();
                v.sort();
                v.dedup();
                Some(v)
            }
            Value::Fn(f) => Some(f.iter().map(|(k, _)| k.clone()).collect()),
            _ => None,
        }
    }
}

// === Arithmetic ===

impl Value {
    fn int_pair(&self, other: &Value, op: &'static str) -> ValueResult<(i64, i64)> {
        Ok((self.expect_int(op)?, other.expect_int(op)?))
    }

    pub fn add(&self, other: &Value) -> ValueResult<Value> {
        let (a, b) = self.int_pair(other, "+")?;
        a.checked_add(b)
            .map(Value::Int)
            .ok_or(ValueError::Overflow { op: "+" })
    }

    pub fn sub(&self, other: &Value) -> ValueResult<Value> {
        let (a, b) = self.int_pair(other, "-")?;
        a.checked_sub(b)
            .map(Value::Int)
            .ok_or(ValueError::Overflow { op: "-" })
    }

    pub fn mul(&self, other: &Value) -> ValueResult<Value> {
        let (a, b) = self.int_pair(other, "*")?;
        a.checked_mul(b)
            .map(Value::Int)
            .ok_or(ValueError::Overflow { op: "*" })
    }

    /// Floor division (`\div`).
    pub fn div(&self, other: &Value) -> ValueResult<Value> {
        let (a, b) = self.int_pair(other, "\\div")?;
        if b == 0 {
            return Err(ValueError::DivisionByZero);
        }
        let q = a
            .checked_div(b)
            .ok_or(ValueError::Overflow { op: "\\div" })?;
        if a % b != 0 && ((a < 0) != (b < 0)) {
            Ok(Value::Int(q - 1))
        } else {
            Ok(Value::Int(q))
        }
    }

    /// Floor modulo (`%`): the result has the sign of the divisor.
    pub fn modulo(&self, other: &Value) -> ValueResult<Value> {
        let (a, b) = self.int_pair(other, "%")?;
        if b == 0 {
            return Err(ValueError::DivisionByZero);
        }
        let r = a.checked_rem(b).ok_or(ValueError::Overflow { op: "%" })?;
        if r != 0 && ((r < 0) != (b < 0)) {
            Ok(Value::Int(r + b))
        } else {
            Ok(Value::Int(r))
        }
    }

    pub fn neg(&self) -> ValueResult<Value> {
        let a = self.expect_int("-")?;
        a.checked_neg()
            .map(Value::Int)
            .ok_or(ValueError::Overflow { op: "-" })
    }

    /// `<`, `<=`, `>`, `>=` on integers.
    pub fn compare_int(&self, other: &Value, op: &'static str) -> ValueResult<Ordering> {
        let (a, b) = self.int_pair(other, op)?;
        Ok(a.cmp(&b))
    }
}

// === Sets ===

impl Value {
    /// `elem \in self`.
    pub fn contains(&self, elem: &Value) -> ValueResult<bool> {
        Ok(Value::set_contains(self.expect_set("\\in")?, elem))
    }

    pub fn union(&self, other: &Value) -> ValueResult<Value> {
        let a = self.expect_set("\\union")?;
        let b = other.expect_set("\\union")?;
        Ok(Value::Set(Arc::new(sorted_vec_union(a, b))))
    }

    pub fn intersect(&self, other: &Value) -> ValueResult<Value> {
        let a = self.expect_set("\\intersect")?;
        let b = other.expect_set("\\intersect")?;
        Ok(Value::Set(Arc::new(sorted_vec_intersect(a, b))))
    }

    pub fn diff(&self, other: &Value) -> ValueResult<Value> {
        let a = self.expect_set("\\")?;
        let b = other.expect_set("\\")?;
        Ok(Value::Set(Arc::new(sorted_vec_diff(a, b))))
    }

    pub fn subset_eq(&self, other: &Value) -> ValueResult<bool> {
        let a = self.expect_set("\\subseteq")?;
        let b = other.expect_set("\\subseteq")?;
        Ok(sorted_vec_is_subset(a, b))
    }

    pub fn cardinality(&self) -> ValueResult<Value> {
        let s = self.expect_set("Cardinality")?;
        Ok(Value::Int(s.len() as i64))
    }

    /// `SUBSET self`.
    pub fn powerset(&self) -> ValueResult<Value> {
        let s = self.expect_set("SUBSET")?;
        if s.len() > MAX_POWERSET_BASE {
            return Err(ValueError::TooLarge {
                op: "SUBSET",
                size: s.len(),
            });
        }
        let subsets = (0u32..(1u32 << s.len())).map(|mask| {
            // elements taken in order keep each subset sorted
            let elems: Vec<Value> = s
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, v)| v.clone())
                .collect();
            Value::Set(Arc::new(elems))
        });
        Ok(Value::set_from_iter(subsets))
    }

    /// `UNION self`.
    pub fn big_union(&self) -> ValueResult<Value> {
        let outer = self.expect_set("UNION")?;
        let mut acc: Vec<Value> = Vec::new();
        for inner in outer {
            acc = sorted_vec_union(&acc, inner.expect_set("UNION")?);
        }
        Ok(Value::Set(Arc::new(acc)))
    }
}

// === Functions and sequences ===

impl Value {
    /// `self[arg]`. Sequences are indexed from 1.
    pub fn apply(&self, arg: &Value) -> ValueResult<Value> {
        match self {
            Value::Fn(f) => Value::fn_get(f, arg)
                .cloned()
                .ok_or_else(|| ValueError::KeyNotFound {
                    key: arg.to_string(),
                }),
            Value::Seq(s) => {
                let index = arg.expect_int("function application")?;
                seq_index(s, index).map(|i| s[i].clone())
            }
            _ => Err(mismatch("function application", "Fn or Seq", self)),
        }
    }

    /// `self.field`.
    pub fn field(&self, name: &str) -> ValueResult<Value> {
        match self {
            Value::Fn(f) => Value::fn_get(f, &Value::string(name))
                .cloned()
                .ok_or_else(|| ValueError::KeyNotFound {
                    key: name.to_string(),
                }),
            _ => Err(mismatch("field access", "Fn", self)),
        }
    }

    /// `[self EXCEPT ![key] = value]`. The key must be in the domain.
    pub fn except(&self, key: &Value, value: Value) -> ValueResult<Value> {
        match self {
            Value::Fn(f) => {
                if Value::fn_get(f, key).is_none() {
                    return Err(ValueError::KeyNotFound {
                        key: key.to_string(),
                    });
                }
                let mut f = Arc::clone(f);
                Value::fn_insert(Arc::make_mut(&mut f), key.clone(), value);
                Ok(Value::Fn(f))
            }
            Value::Seq(s) => {
                let index = key.expect_int("EXCEPT")?;
                let i = seq_index(s, index)?;
                let mut s = Arc::clone(s);
                Arc::make_mut(&mut s)[i] = value;
                Ok(Value::Seq(s))
            }
            _ => Err(mismatch("EXCEPT", "Fn or Seq", self)),
        }
    }

    /// `DOMAIN self`.
    pub fn domain(&self) -> ValueResult<Value> {
        match self {
            Value::Fn(f) => Ok(Value::Set(Arc::new(
                f.iter().map(|(k, _)| k.clone()).collect(),
            ))),
            Value::Seq(s) => Ok(Value::range(1, s.len() as i64)),
            _ => Err(mismatch("DOMAIN", "Fn or Seq", self)),
        }
    }

    pub fn len(&self) -> ValueResult<Value> {
        Ok(Value::Int(self.expect_seq("Len")?.len() as i64))
    }

    pub fn head(&self) -> ValueResult<Value> {
        let s = self.expect_seq("Head")?;
        s.first()
            .cloned()
            .ok_or(ValueError::IndexOutOfBounds { index: 1, len: 0 })
    }

    pub fn tail(&self) -> ValueResult<Value> {
        let s = self.expect_seq("Tail")?;
        if s.is_empty() {
            return Err(ValueError::IndexOutOfBounds { index: 1, len: 0 });
        }
        Ok(Value::seq(s[1..].to_vec()))
    }

    pub fn append(&self, elem: Value) -> ValueResult<Value> {
        let s = self.expect_seq("Append")?;
        let mut v = Vec::with_capacity(s.len() + 1);
        v.extend_from_slice(s);
        v.push(elem);
        Ok(Value::seq(v))
    }

    /// `\o` on sequences or strings.
    pub fn concat(&self, other: &Value) -> ValueResult<Value> {
        match (self, other) {
            (Value::Seq(a), Value::Seq(b)) => {
                let mut v = Vec::with_capacity(a.len() + b.len());
                v.extend_from_slice(a);
                v.extend_from_slice(b);
                Ok(Value::seq(v))
            }
            (Value::Str(a), Value::Str(b)) => Ok(Value::string(format!("{}{}", a, b))),
            (Value::Seq(_) | Value::Str(_), _) => Err(mismatch("\\o", self.type_name(), other)),
            _ => Err(mismatch("\\o", "Seq or String", self)),
        }
    }
}

fn seq_index(s: &[Value], index: i64) -> ValueResult<usize> {
    if index >= 1 && (index as u64) <= s.len() as u64 {
        Ok((index - 1) as usize)
    } else {
        Err(ValueError::IndexOutOfBounds {
            index,
            len: s.len(),
        })
    }
}

/// Merge-based union of two sorted, deduplicated slices.
pub fn sorted_vec_union(a: &[Value], b: &[Value]) -> Vec<Value> {
    let mut result = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                result.push(a[i].clone());
                i += 1;
            }
            Ordering::Greater => {
                result.push(b[j].clone());
                j += 1;
            }
            Ordering::Equal => {
                result.push(a[i].clone());
                i += 1;
                j += 1;
            }
        }
    }
    result.extend_from_slice(&a[i..]);
    result.extend_from_slice(&b[j..]);
    result
}

/// Merge-based intersection of two sorted, deduplicated slices.
pub fn sorted_vec_intersect(a: &[Value], b: &[Value]) -> Vec<Value> {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                result.push(a[i].clone());
                i += 1;
                j += 1;
            }
        }
    }
    result
}

/// Merge-based difference of two sorted, deduplicated slices.
pub fn sorted_vec_diff(a: &[Value], b: &[Value]) -> Vec<Value> {
    let mut result = Vec::with_capacity(a.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                result.push(a[i].clone());
                i += 1;
            }
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }
    result.extend_from_slice(&a[i..]);
    result
}

fn sorted_vec_is_subset(a: &[Value], b: &[Value]) -> bool {
    let mut j = 0;
    for item in a {
        while j < b.len() && b[j] < *item {
            j += 1;
        }
        if j >= b.len() || b[j] != *item {
            return false;
        }
        j += 1;
    }
    true
}

// === Display ===

fn write_joined<T, F>(f: &mut fmt::Formatter<'_>, items: &[T], mut each: F) -> fmt::Result
where
    F: FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
{
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        each(f, item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => write!(f, "TRUE"),
            Value::Bool(false) => write!(f, "FALSE"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Set(s) => {
                write!(f, "{{")?;
                write_joined(f, s, |f, v| write!(f, "{}", v))?;
                write!(f, "}}")
            }
            Value::Seq(s) => {
                write!(f, "<<")?;
                write_joined(f, s, |f, v| write!(f, "{}", v))?;
                write!(f, ">>")
            }
            Value::Fn(m) if m.iter().all(|(k, _)| matches!(k, Value::Str(_))) => {
                write!(f, "[")?;
                write_joined(f, m, |f, (k, v)| match k {
                    Value::Str(name) => write!(f, "{} |-> {}", name, v),
                    _ => write!(f, "{} |-> {}", k, v),
                })?;
                write!(f, "]")
            }
            Value::Fn(m) => {
                write!(f, "(")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, " @@ ")?;
                    }
                    write!(f, "{} :> {}", k, v)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
