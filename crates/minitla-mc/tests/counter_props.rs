//! Property tests over generated counter specifications.

mod common;

use common::*;
use minitla_eval::Value;
use minitla_ir::build::*;
use minitla_mc::{CheckOutcome, State};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn explores_product_of_counter_ranges(bounds in prop::collection::vec(0i64..4, 1..4)) {
        let spec = counters(&bounds);
        let expected: usize = bounds.iter().map(|b| (*b + 1) as usize).product();
        match check(&spec, Vec::new(), no_deadlock()).unwrap() {
            CheckOutcome::Exhausted { stats } => {
                prop_assert_eq!(stats.states, expected);
                prop_assert_eq!(stats.max_depth as i64, bounds.iter().sum::<i64>());
                prop_assert_eq!(stats.states, reference_bfs(&spec, Vec::new()).len());
            }
            other => prop_assert!(false, "expected Exhausted, got {:?}", other),
        }
    }

    #[test]
    fn violation_depth_matches_target(bounds in prop::collection::vec(1i64..4, 1..4), pick in 0usize..4) {
        // Violate as soon as counter `i` reaches its bound: the shortest
        // trace is exactly `bound` increments of that counter.
        let i = pick % bounds.len();
        let target = format!("c{}", i);
        let spec = counters(&bounds).invariant("BelowBound", lt(name(target), int(bounds[i])));
        match check(&spec, Vec::new(), no_deadlock()).unwrap() {
            CheckOutcome::InvariantViolated { trace, .. } => {
                prop_assert_eq!((trace.len() - 1) as i64, bounds[i]);
                let last: &State = &trace.last().unwrap().0;
                prop_assert_eq!(&last.vars[i], &Value::int(bounds[i]));
                assert_trace_replays(&spec, Vec::new(), &trace);
            }
            other => prop_assert!(false, "expected InvariantViolated, got {:?}", other),
        }
    }

    #[test]
    fn nondeterministic_init_seeds_every_value(n in 0i64..20) {
        let spec = minitla_ir::Spec::new("Pick")
            .var("x")
            .init(in_set(name("x"), range(int(0), int(n))));
        match check(&spec, Vec::new(), no_deadlock()).unwrap() {
            CheckOutcome::Exhausted { stats } => prop_assert_eq!(stats.states as i64, n + 1),
            other => prop_assert!(false, "expected Exhausted, got {:?}", other),
        }
    }
}
