//! Explicit-state model checker for minitla specifications.

pub mod action;
pub mod explorer;
pub mod invariant;
pub mod state;
pub mod store;

pub use action::{ActionEngine, Assignments, Relation};
pub use explorer::{
    CheckConfig, CheckError, CheckOutcome, CheckResult, CheckStats, Explorer, Limit, Phase,
    ProgressCounters, SimulateOutcome, Verdict,
};
pub use invariant::{InvariantChecker, Violation};
pub use state::{Fingerprint, NamedState, State, StateError};
pub use store::{StateId, StateInfo, StateStore, TraceStep};
