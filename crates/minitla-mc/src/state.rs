//! State representation and fingerprinting for model checking.

use minitla_eval::Value;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

/// A fingerprint is a 64-bit hash identifying a state.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    #[cfg(test)]
    pub(crate) fn from_u64(v: u64) -> Self {
        Fingerprint(v)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:016x})", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Error building a state from named bindings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("variable '{name}' is not bound")]
    MissingVariable { name: String },

    #[error("'{name}' is not a declared variable")]
    UnknownVariable { name: String },

    #[error("variable '{name}' is bound twice")]
    DuplicateBinding { name: String },
}

/// Hash a single variable at a given position.
/// Specialized fast path for Int/Bool using splitmix64-style mixing. Falls
/// back to AHash for composite values.
#[inline]
pub(crate) fn hash_var(idx: usize, val: &Value) -> u64 {
    match val {
        Value::Int(n) => {
            let h = ((idx as u64) ^ 0x2d358dccaa6c78a5).wrapping_mul(0x9e3779b97f4a7c15);
            let h = (h ^ (*n as u64)).wrapping_mul(0x517cc1b727220a95);
            h ^ (h >> 32)
        }
        Value::Bool(b) => {
            let h = ((idx as u64) ^ 0x7f4a7c159e3779b9).wrapping_mul(0x9e3779b97f4a7c15);
            let h = (h ^ (*b as u64)).wrapping_mul(0x517cc1b727220a95);
            h ^ (h >> 32)
        }
        _ => {
            let mut hasher = ahash::AHasher::default();
            idx.hash(&mut hasher);
            val.hash(&mut hasher);
            hasher.finish()
        }
    }
}

/// fp = XOR of hash_var(i, var[i]) for all i.
fn compute_fingerprint(vars: &[Value]) -> Fingerprint {
    let mut h: u64 = 0;
    for (i, var) in vars.iter().enumerate() {
        h ^= hash_var(i, var);
    }
    Fingerprint(h)
}

/// A state: one value per declared variable, in declaration order.
///
/// `clone` is an atomic increment, not a deep copy. The fingerprint is
/// cached at construction time.
#[derive(Debug, Clone)]
pub struct State {
    /// Variable values indexed by variable index.
    pub vars: Arc<Vec<Value>>,
    fp: Fingerprint,
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.fp == other.fp && self.vars == other.vars
    }
}

impl Eq for State {}

impl Hash for State {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fp.hash(state);
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lexicographic by variable values, in declaration order.
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        self.vars.cmp(&other.vars)
    }
}

impl State {
    /// Create a new state from variable values in declaration order.
    pub fn new(vars: Vec<Value>) -> Self {
        let fp = compute_fingerprint(&vars);
        Self {
            vars: Arc::new(vars),
            fp,
        }
    }

    /// Build a state from `(name, value)` bindings given in any order.
    /// Every declared variable must be bound exactly once.
    pub fn from_bindings<S: AsRef<str>>(
        var_names: &[String],
        bindings: impl IntoIterator<Item = (S, Value)>,
    ) -> Result<Self, StateError> {
        let mut slots: Vec<Option<Value>> = vec![None; var_names.len()];
        for (name, value) in bindings {
            let name = name.as_ref();
            let idx = var_names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| StateError::UnknownVariable {
                    name: name.to_string(),
                })?;
            if slots[idx].replace(value).is_some() {
                return Err(StateError::DuplicateBinding {
                    name: name.to_string(),
                });
            }
        }
        let vars = slots
            .into_iter()
            .zip(var_names)
            .map(|(slot, name)| {
                slot.ok_or_else(|| StateError::MissingVariable { name: name.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(vars))
    }

    #[cfg(test)]
    pub(crate) fn with_fingerprint(vars: Vec<Value>, fp: Fingerprint) -> Self {
        Self {
            vars: Arc::new(vars),
            fp,
        }
    }

    #[inline]
    pub fn fingerprint(&self) -> Fingerprint {
        self.fp
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Value of the variable at `idx`.
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.vars.get(idx)
    }

    /// Display with variable names, TLA+ style.
    pub fn named<'a>(&'a self, var_names: &'a [String]) -> NamedState<'a> {
        NamedState {
            state: self,
            var_names,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.vars.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "]")
    }
}

/// A state paired with its variable names for display.
pub struct NamedState<'a> {
    state: &'a State,
    var_names: &'a [String],
}

impl fmt::Display for NamedState<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, v)) in self.var_names.iter().zip(self.state.vars.iter()).enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "/\\ {} = {}", name, v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(ns: &[&str]) -> Vec<String> {
        ns.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_state_fingerprint() {
        let s1 = State::new(vec![Value::int(1), Value::int(2)]);
        let s2 = State::new(vec![Value::int(1), Value::int(2)]);
        let s3 = State::new(vec![Value::int(1), Value::int(3)]);

        assert_eq!(s1.fingerprint(), s2.fingerprint());
        assert_ne!(s1.fingerprint(), s3.fingerprint());
        assert_eq!(s1, s2);
        assert_ne!(s1, s3);
    }

    #[test]
    fn test_position_matters() {
        let a = State::new(vec![Value::int(1), Value::int(2)]);
        let b = State::new(vec![Value::int(2), Value::int(1)]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_state_display() {
        let s = State::new(vec![Value::int(42), Value::bool(true)]);
        assert_eq!(s.to_string(), "[42, TRUE]");
        let vars = names(&["x", "ok"]);
        assert_eq!(s.named(&vars).to_string(), "/\\ x = 42 /\\ ok = TRUE");
    }

    #[test]
    fn test_from_bindings_rejects_partial() {
        let vars = names(&["x", "y"]);
        assert_eq!(
            State::from_bindings(&vars, [("x", Value::int(0))]),
            Err(StateError::MissingVariable { name: "y".into() })
        );
        assert_eq!(
            State::from_bindings(&vars, [("x", Value::int(0)), ("z", Value::int(0))]),
            Err(StateError::UnknownVariable { name: "z".into() })
        );
        assert_eq!(
            State::from_bindings(&vars, [("x", Value::int(0)), ("x", Value::int(1))]),
            Err(StateError::DuplicateBinding { name: "x".into() })
        );
    }

    #[test]
    fn test_ordering_follows_values() {
        let a = State::new(vec![Value::int(0), Value::int(9)]);
        let b = State::new(vec![Value::int(1), Value::int(0)]);
        assert!(a < b);
    }

    proptest! {
        #[test]
        fn prop_binding_order_irrelevant(vals in prop::collection::vec(-100i64..100, 1..6)) {
            let vars: Vec<String> = (0..vals.len()).map(|i| format!("v{}", i)).collect();
            let forward: Vec<(String, Value)> = vars
                .iter()
                .cloned()
                .zip(vals.iter().copied().map(Value::int))
                .collect();
            let mut backward = forward.clone();
            backward.reverse();
            let a = State::from_bindings(&vars, forward).unwrap();
            let b = State::from_bindings(&vars, backward).unwrap();
            prop_assert_eq!(a.fingerprint(), b.fingerprint());
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(&a, &a.clone());
        }
    }
}
