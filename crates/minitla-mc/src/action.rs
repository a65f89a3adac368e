//! Successor and initial-state generation.
//!
//! A relation (an action, or the initial predicate) is solved one variable
//! at a time: candidates for the next variable in dependency order are
//! inferred under the partial assignment built so far, and every complete
//! assignment is checked against the whole relation before it becomes a
//! state. The product of candidate sets is walked depth-first and never
//! materialized.

use crate::state::State;
use minitla_eval::{candidates, eval_bool, unenumerable, Candidates, Env, EvalContext, EvalResult};
use minitla_eval::{Value, VarSlots};
use minitla_ir::analyze::{assignment_order, footprint, RefMode};
use minitla_ir::{Expr, Spec};
use std::collections::BTreeSet;
use tracing::debug;

/// A relation prepared for enumeration.
#[derive(Debug, Clone)]
pub struct Relation {
    name: String,
    body: Expr,
    mode: RefMode,
    /// Variable indices in the order they are solved.
    order: Vec<usize>,
}

impl Relation {
    /// A next-state relation over primed variables.
    pub fn action(name: impl Into<String>, body: Expr, var_names: &[String]) -> Self {
        Self::new(name, body, var_names, RefMode::Primed)
    }

    /// An initial predicate over unprimed variables.
    pub fn init(body: Expr, var_names: &[String]) -> Self {
        Self::new("Init", body, var_names, RefMode::Unprimed)
    }

    fn new(name: impl Into<String>, body: Expr, var_names: &[String], mode: RefMode) -> Self {
        let order = assignment_order(&body, var_names, mode);
        Self {
            name: name.into(),
            body,
            mode,
            order,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    /// Variable indices in solving order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Lazily enumerate the assignments satisfying this relation.
    ///
    /// For an action, `current` is the state the action is taken from and
    /// the yielded vectors are next states. For an initial predicate,
    /// `current` is ignored.
    pub fn assignments<'r>(&'r self, env: &'r Env, current: &'r [Value]) -> Assignments<'r> {
        Assignments {
            relation: self,
            env,
            current,
            slots: vec![None; env.var_names.len()],
            stack: Vec::with_capacity(self.order.len()),
            descend: true,
            done: false,
        }
    }

    /// All states satisfying the relation, in value order.
    pub fn states(&self, env: &Env, current: &[Value]) -> EvalResult<BTreeSet<State>> {
        let mut out = BTreeSet::new();
        for vars in self.assignments(env, current) {
            out.insert(State::new(vars?));
        }
        Ok(out)
    }
}

struct Frame {
    var: usize,
    values: Vec<Value>,
    next: usize,
}

/// Lazy depth-first product over per-variable candidates.
///
/// Yields complete assignments that satisfy the relation. After the first
/// error the iterator is exhausted.
pub struct Assignments<'r> {
    relation: &'r Relation,
    env: &'r Env,
    current: &'r [Value],
    slots: Vec<Option<Value>>,
    stack: Vec<Frame>,
    /// The top frame's value was just chosen; solve the next variable.
    descend: bool,
    done: bool,
}

impl Assignments<'_> {
    fn partial_context(&self) -> EvalContext<'_> {
        match self.relation.mode {
            RefMode::Primed => EvalContext::new(
                self.env,
                VarSlots::Total(self.current),
                VarSlots::Partial(&self.slots),
            ),
            RefMode::Unprimed => {
                EvalContext::new(self.env, VarSlots::Partial(&self.slots), VarSlots::Absent)
            }
        }
    }

    fn candidates_for(&self, var: usize) -> EvalResult<Vec<Value>> {
        let relation = self.relation;
        let ctx = self.partial_context();
        match candidates(&relation.body, &ctx, var, relation.mode)? {
            Candidates::Disabled => Ok(Vec::new()),
            Candidates::Values(values) => Ok(values),
            Candidates::Unmentioned if relation.mode == RefMode::Primed => {
                Ok(self.current.get(var).cloned().into_iter().collect())
            }
            Candidates::Unmentioned | Candidates::Constrained => Err(unenumerable(
                &self.env.var_names[var],
                relation.mode,
                &relation.body,
            )),
        }
    }

    /// Check a complete assignment against the whole relation.
    fn accept(&self) -> EvalResult<Option<Vec<Value>>> {
        let Some(vars) = self.slots.iter().cloned().collect::<Option<Vec<Value>>>() else {
            return Ok(None);
        };
        let ctx = match self.relation.mode {
            RefMode::Primed => EvalContext::transition(self.env, self.current, &vars),
            RefMode::Unprimed => EvalContext::state(self.env, &vars),
        };
        if eval_bool(&self.relation.body, &ctx)? {
            Ok(Some(vars))
        } else {
            Ok(None)
        }
    }

    fn advance(&mut self) -> EvalResult<Option<Vec<Value>>> {
        let depth = self.relation.order.len();
        loop {
            if self.descend {
                self.descend = false;
                if self.stack.len() == depth {
                    if let Some(vars) = self.accept()? {
                        return Ok(Some(vars));
                    }
                } else {
                    let var = self.relation.order[self.stack.len()];
                    let values = self.candidates_for(var)?;
                    self.stack.push(Frame {
                        var,
                        values,
                        next: 0,
                    });
                }
            }

            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };
            if let Some(value) = frame.values.get(frame.next) {
                self.slots[frame.var] = Some(value.clone());
                frame.next += 1;
                self.descend = true;
            } else {
                self.slots[frame.var] = None;
                self.stack.pop();
            }
        }
    }
}

impl Iterator for Assignments<'_> {
    type Item = EvalResult<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(vars)) => Some(Ok(vars)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// The initial predicate and actions of one specification, bound to its
/// constants.
#[derive(Debug, Clone)]
pub struct ActionEngine {
    env: Env,
    init: Relation,
    actions: Vec<Relation>,
}

impl ActionEngine {
    /// Prepare `spec` for enumeration. `consts` are in declaration order.
    pub fn new(spec: &Spec, consts: Vec<Value>) -> Self {
        let var_names = spec.var_names();
        let const_names = spec.consts.iter().map(|c| c.name.clone()).collect();
        let init = Relation::init(spec.init.clone(), &var_names);
        let actions = spec
            .actions
            .iter()
            .map(|a| Relation::action(a.name.clone(), a.body.clone(), &var_names))
            .collect::<Vec<_>>();
        for action in &actions {
            let fp = footprint(action.body());
            debug!(
                action = action.name(),
                order = ?action.order(),
                reads = ?fp.reads,
                writes = ?fp.writes,
                "prepared action"
            );
        }
        Self {
            env: Env::new(var_names, const_names, consts),
            init,
            actions,
        }
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn actions(&self) -> &[Relation] {
        &self.actions
    }

    pub fn action_names(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.name.clone()).collect()
    }

    /// Every state satisfying the initial predicate.
    pub fn initial_states(&self) -> EvalResult<BTreeSet<State>> {
        self.init.states(&self.env, &[])
    }

    /// Successors of `current` under the action at `action_idx`, in value
    /// order. Empty when the action is disabled.
    pub fn successors(&self, action_idx: usize, current: &State) -> EvalResult<BTreeSet<State>> {
        match self.actions.get(action_idx) {
            Some(action) => action.states(&self.env, &current.vars),
            None => Ok(BTreeSet::new()),
        }
    }

    /// True if some action has a successor from `state`. Stops at the
    /// first one found.
    pub fn any_enabled(&self, state: &State) -> EvalResult<bool> {
        for action in &self.actions {
            if let Some(first) = action.assignments(&self.env, &state.vars).next() {
                first?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minitla_eval::ErrorKind;
    use minitla_ir::build::*;

    fn vars(ns: &[&str]) -> Vec<String> {
        ns.iter().map(|s| s.to_string()).collect()
    }

    fn env(ns: &[&str]) -> Env {
        Env::new(vars(ns), Vec::new(), Vec::new())
    }

    fn ints(state: &State) -> Vec<i64> {
        state.vars.iter().filter_map(Value::as_int).collect()
    }

    #[test]
    fn test_deterministic_update() {
        let env = env(&["x"]);
        let incr = Relation::action(
            "Incr",
            and(lt(name("x"), int(3)), eq(prime("x"), add(name("x"), int(1)))),
            &env.var_names,
        );
        let next = incr.states(&env, &[Value::int(1)]).unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(ints(next.iter().next().unwrap()), vec![2]);

        // disabled
        assert!(incr.states(&env, &[Value::int(3)]).unwrap().is_empty());
    }

    #[test]
    fn test_unmentioned_variable_stutters() {
        let env = env(&["x", "y"]);
        let act = Relation::action("SetX", eq(prime("x"), int(5)), &env.var_names);
        let next = act.states(&env, &[Value::int(0), Value::int(7)]).unwrap();
        let only = next.iter().next().unwrap();
        assert_eq!(ints(only), vec![5, 7]);
    }

    #[test]
    fn test_nondeterministic_choice_in_value_order() {
        let env = env(&["x"]);
        let pick = Relation::action(
            "Pick",
            in_set(prime("x"), set(vec![int(3), int(1), int(2)])),
            &env.var_names,
        );
        let next: Vec<Vec<i64>> = pick
            .states(&env, &[Value::int(0)])
            .unwrap()
            .iter()
            .map(ints)
            .collect();
        assert_eq!(next, vec![vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_coupled_variables_filtered() {
        // x' \in 0..2 /\ y' \in 0..2 /\ x' + y' = 2
        let env = env(&["x", "y"]);
        let act = Relation::action(
            "Split",
            and_all(vec![
                in_set(prime("x"), range(int(0), int(2))),
                in_set(prime("y"), range(int(0), int(2))),
                eq(add(prime("x"), prime("y")), int(2)),
            ]),
            &env.var_names,
        );
        let next: Vec<Vec<i64>> = act
            .states(&env, &[Value::int(0), Value::int(0)])
            .unwrap()
            .iter()
            .map(ints)
            .collect();
        assert_eq!(next, vec![vec![0, 2], vec![1, 1], vec![2, 0]]);
    }

    #[test]
    fn test_dependent_primed_variable() {
        // y' = x' * 10 /\ x' \in {1, 2}, y declared first
        let env = env(&["y", "x"]);
        let act = Relation::action(
            "Dep",
            and(
                eq(prime("y"), mul(prime("x"), int(10))),
                in_set(prime("x"), set(vec![int(1), int(2)])),
            ),
            &env.var_names,
        );
        assert_eq!(act.order(), &[1, 0]);
        let next: Vec<Vec<i64>> = act
            .states(&env, &[Value::int(0), Value::int(0)])
            .unwrap()
            .iter()
            .map(ints)
            .collect();
        assert_eq!(next, vec![vec![10, 1], vec![20, 2]]);
    }

    #[test]
    fn test_disjunctive_action() {
        // (x' = x + 1 /\ UNCHANGED y) \/ (y' = y + 1 /\ UNCHANGED x)
        let env = env(&["x", "y"]);
        let act = Relation::action(
            "Step",
            or(
                and(eq(prime("x"), add(name("x"), int(1))), unchanged(vec!["y"])),
                and(eq(prime("y"), add(name("y"), int(1))), unchanged(vec!["x"])),
            ),
            &env.var_names,
        );
        let next: Vec<Vec<i64>> = act
            .states(&env, &[Value::int(0), Value::int(0)])
            .unwrap()
            .iter()
            .map(ints)
            .collect();
        assert_eq!(next, vec![vec![0, 1], vec![1, 0]]);
    }

    #[test]
    fn test_unenumerable_constraint_is_error() {
        let env = env(&["x"]);
        let act = Relation::action("Bad", gt(prime("x"), int(0)), &env.var_names);
        let err = act.states(&env, &[Value::int(0)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnboundedDomain);
    }

    #[test]
    fn test_product_is_lazy() {
        // 2^20 combinations, the first one is accepted
        let names: Vec<String> = (0..20).map(|i| format!("b{}", i)).collect();
        let env = Env::new(names.clone(), Vec::new(), Vec::new());
        let body = and_all(
            names
                .iter()
                .map(|n| in_set(prime(n), set(vec![boolean(false), boolean(true)])))
                .collect::<Vec<_>>(),
        );
        let act = Relation::action("Flip", body, &names);
        let current = vec![Value::bool(false); 20];
        let first = act.assignments(&env, &current).next().unwrap().unwrap();
        assert!(first.iter().all(|v| *v == Value::bool(false)));
    }

    #[test]
    fn test_initial_states() {
        let env = env(&["x", "y"]);
        let init = Relation::init(
            and(eq(name("x"), int(0)), in_set(name("y"), range(name("x"), int(2)))),
            &env.var_names,
        );
        let states: Vec<Vec<i64>> = init.states(&env, &[]).unwrap().iter().map(ints).collect();
        assert_eq!(states, vec![vec![0, 0], vec![0, 1], vec![0, 2]]);
    }

    #[test]
    fn test_init_without_source_is_error() {
        let env = env(&["x", "y"]);
        let init = Relation::init(eq(name("x"), int(0)), &env.var_names);
        let err = init.states(&env, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnboundedDomain);
    }

    #[test]
    fn test_engine_any_enabled() {
        let spec = Spec::new("Counter")
            .var("x")
            .init(eq(name("x"), int(0)))
            .action(
                "Incr",
                and(lt(name("x"), int(1)), eq(prime("x"), add(name("x"), int(1)))),
            );
        let engine = ActionEngine::new(&spec, Vec::new());
        assert!(engine.any_enabled(&State::new(vec![Value::int(0)])).unwrap());
        assert!(!engine.any_enabled(&State::new(vec![Value::int(1)])).unwrap());
        assert_eq!(engine.action_names(), vec!["Incr".to_string()]);
    }
}
