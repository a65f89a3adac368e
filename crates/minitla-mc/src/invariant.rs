//! Invariant checking.

use crate::explorer::{CheckError, CheckResult, Phase};
use crate::state::State;
use minitla_eval::{eval_bool, Env, EvalContext};
use minitla_ir::Invariant;

/// An invariant that evaluated to FALSE, and the state it failed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Position of the invariant in declaration order.
    pub index: usize,
    pub name: String,
    pub state: State,
}

/// The invariants of one specification, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct InvariantChecker {
    invariants: Vec<Invariant>,
}

impl InvariantChecker {
    pub fn new(invariants: Vec<Invariant>) -> Self {
        Self { invariants }
    }

    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }

    /// Evaluate every invariant against `state`.
    ///
    /// All invariants are evaluated, so an ill-typed invariant is reported
    /// even when an earlier one is already false. Otherwise the first false
    /// invariant is the violation.
    pub fn check(&self, env: &Env, state: &State) -> CheckResult<Option<Violation>> {
        let ctx = EvalContext::state(env, &state.vars);
        let mut violation = None;
        for (index, inv) in self.invariants.iter().enumerate() {
            let holds = eval_bool(&inv.body, &ctx).map_err(|error| CheckError::Eval {
                error,
                phase: Phase::Invariant(inv.name.clone()),
            })?;
            if !holds && violation.is_none() {
                violation = Some(Violation {
                    index,
                    name: inv.name.clone(),
                    state: state.clone(),
                });
            }
        }
        Ok(violation)
    }
}
