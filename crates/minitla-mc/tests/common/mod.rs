//! Shared helpers for the model checker integration tests.

#![allow(dead_code)]

use minitla_eval::Value;
use minitla_ir::build::*;
use minitla_ir::Spec;
use minitla_mc::{ActionEngine, CheckConfig, CheckOutcome, CheckResult, Explorer, State};
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn check(spec: &Spec, consts: Vec<Value>, config: CheckConfig) -> CheckResult<CheckOutcome> {
    init_tracing();
    Explorer::new(spec, consts, config)?.check()
}

pub fn no_deadlock() -> CheckConfig {
    CheckConfig {
        check_deadlock: false,
        ..Default::default()
    }
}

pub fn ints(state: &State) -> Vec<i64> {
    state
        .vars
        .iter()
        .map(|v| v.as_int().expect("integer variable"))
        .collect()
}

/// `x = 0`, `Incr: x < bound /\ x' = x + 1`.
pub fn counter(bound: i64) -> Spec {
    Spec::new("Counter")
        .var("x")
        .init(eq(name("x"), int(0)))
        .action(
            "Incr",
            and(lt(name("x"), int(bound)), eq(prime("x"), add(name("x"), int(1)))),
        )
}

/// One bounded counter per entry of `bounds`, each with its own increment
/// action that leaves the others unchanged.
pub fn counters(bounds: &[i64]) -> Spec {
    let names: Vec<String> = (0..bounds.len()).map(|i| format!("c{}", i)).collect();
    let mut spec = Spec::new("Counters");
    for n in &names {
        spec = spec.var(n.clone());
    }
    spec = spec.init(and_all(names.iter().map(|n| eq(name(n.clone()), int(0)))));
    for (i, (n, bound)) in names.iter().zip(bounds).enumerate() {
        let others: Vec<String> = names.iter().filter(|m| *m != n).cloned().collect();
        spec = spec.action(
            format!("Inc{}", i),
            and_all([
                lt(name(n.clone()), int(*bound)),
                eq(prime(n.clone()), add(name(n.clone()), int(1))),
                unchanged(others),
            ]),
        );
    }
    spec
}

/// Reachable states and their BFS distance, computed with a plain
/// hash-map search over the action engine.
pub fn reference_bfs(spec: &Spec, consts: Vec<Value>) -> HashMap<State, usize> {
    let engine = ActionEngine::new(spec, consts);
    let mut dist: HashMap<State, usize> = HashMap::new();
    let mut queue = VecDeque::new();
    for s in engine.initial_states().expect("init evaluates") {
        if dist.insert(s.clone(), 0).is_none() {
            queue.push_back(s);
        }
    }
    while let Some(s) = queue.pop_front() {
        let d = dist[&s];
        for idx in 0..engine.actions().len() {
            for next in engine.successors(idx, &s).expect("action evaluates") {
                if !dist.contains_key(&next) {
                    dist.insert(next.clone(), d + 1);
                    queue.push_back(next);
                }
            }
        }
    }
    dist
}

/// Replay `trace` against the spec: the first state is initial, each step
/// is a successor under the named action.
pub fn assert_trace_replays(spec: &Spec, consts: Vec<Value>, trace: &[(State, Option<String>)]) {
    let engine = ActionEngine::new(spec, consts);
    let initial: BTreeSet<State> = engine.initial_states().expect("init evaluates");
    let (first, first_action) = &trace[0];
    assert!(first_action.is_none(), "first step must have no action");
    assert!(initial.contains(first), "{} is not an initial state", first);

    for pair in trace.windows(2) {
        let (prev, _) = &pair[0];
        let (next, action) = &pair[1];
        let action = action.as_deref().expect("step has an action");
        let idx = engine
            .action_names()
            .iter()
            .position(|n| n == action)
            .expect("known action");
        let successors = engine.successors(idx, prev).expect("action evaluates");
        assert!(
            successors.contains(next),
            "{} is not a successor of {} under {}",
            next,
            prev,
            action
        );
    }
}
