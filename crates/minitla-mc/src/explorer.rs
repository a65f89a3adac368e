//! BFS state space explorer for model checking.

use crate::action::ActionEngine;
use crate::invariant::{InvariantChecker, Violation};
use crate::state::State;
use crate::store::{StateId, StateStore, TraceStep};
use memory_stats::memory_stats;
use minitla_eval::{ErrorKind, EvalError, Value};
use minitla_ir::{Span, Spec};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, trace};

/// Returns current process memory usage in MB, or None if unavailable.
fn current_memory_mb() -> Option<usize> {
    memory_stats().map(|stats| stats.physical_mem / (1024 * 1024))
}

/// Where an evaluation error happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Init,
    Action(String),
    Invariant(String),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Init => write!(f, "init"),
            Phase::Action(name) => write!(f, "action {}", name),
            Phase::Invariant(name) => write!(f, "invariant {}", name),
        }
    }
}

/// Model checking error.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("evaluation error in {phase}: {error}")]
    Eval { error: EvalError, phase: Phase },

    #[error("no initial states satisfy init predicate")]
    NoInitialStates,

    #[error("constant '{name}' not provided")]
    MissingConstant { name: String },

    #[error("{given} constant values given, but only {declared} constants are declared")]
    SurplusConstants { declared: usize, given: usize },
}

impl CheckError {
    /// Location of the failing expression, for evaluation errors.
    pub fn span(&self) -> Option<Span> {
        match self {
            CheckError::Eval { error, .. } => Some(error.span()),
            _ => None,
        }
    }

    pub fn eval_kind(&self) -> Option<ErrorKind> {
        match self {
            CheckError::Eval { error, .. } => Some(error.kind()),
            _ => None,
        }
    }
}

pub type CheckResult<T> = Result<T, CheckError>;

/// Which bound stopped an incomplete run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    States,
    Depth,
    Time,
    Memory,
    Cancelled,
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Limit::States => "state limit",
            Limit::Depth => "depth limit",
            Limit::Time => "time limit",
            Limit::Memory => "memory limit",
            Limit::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Counters describing one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckStats {
    /// Distinct states discovered.
    pub states: usize,
    /// States whose successors were computed.
    pub expanded: usize,
    /// Largest depth of a discovered state.
    pub max_depth: usize,
    /// Distinct states that shared a fingerprint with another.
    pub collisions: usize,
    /// Successors produced per action, in declaration order.
    pub action_fire_counts: Vec<usize>,
}

/// Result of model checking.
#[derive(Debug)]
pub enum CheckOutcome {
    /// All reachable states explored, no invariant failed.
    Exhausted { stats: CheckStats },
    /// Invariant violation found.
    InvariantViolated {
        invariant: String,
        /// Position of the invariant in declaration order.
        index: usize,
        trace: Vec<TraceStep>,
        stats: CheckStats,
    },
    /// A reachable state has no successor.
    Deadlocked {
        trace: Vec<TraceStep>,
        stats: CheckStats,
    },
    /// Exploration stopped before the state space was exhausted.
    ResourceLimitExceeded { limit: Limit, stats: CheckStats },
}

impl CheckOutcome {
    pub fn stats(&self) -> &CheckStats {
        match self {
            CheckOutcome::Exhausted { stats }
            | CheckOutcome::InvariantViolated { stats, .. }
            | CheckOutcome::Deadlocked { stats, .. }
            | CheckOutcome::ResourceLimitExceeded { stats, .. } => stats,
        }
    }

    pub fn trace(&self) -> Option<&[TraceStep]> {
        match self {
            CheckOutcome::InvariantViolated { trace, .. } | CheckOutcome::Deadlocked { trace, .. } => {
                Some(trace.as_slice())
            }
            _ => None,
        }
    }
}

/// The verdict reported for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Exhausted,
    InvariantViolated,
    Deadlocked,
    ResourceLimitExceeded,
    EvaluationError,
}

impl Verdict {
    pub fn of(result: &CheckResult<CheckOutcome>) -> Self {
        match result {
            Ok(CheckOutcome::Exhausted { .. }) => Verdict::Exhausted,
            Ok(CheckOutcome::InvariantViolated { .. }) => Verdict::InvariantViolated,
            Ok(CheckOutcome::Deadlocked { .. }) => Verdict::Deadlocked,
            Ok(CheckOutcome::ResourceLimitExceeded { .. }) => Verdict::ResourceLimitExceeded,
            Err(_) => Verdict::EvaluationError,
        }
    }
}

/// Result of simulation.
#[derive(Debug)]
pub enum SimulateOutcome {
    /// Simulation ran for the requested number of steps.
    Completed { steps: usize, trace: Vec<TraceStep> },
    /// Invariant violation found during simulation.
    InvariantViolated {
        invariant: String,
        trace: Vec<TraceStep>,
    },
    /// No action was enabled.
    Deadlocked { trace: Vec<TraceStep> },
}

impl SimulateOutcome {
    pub fn trace(&self) -> &[TraceStep] {
        match self {
            SimulateOutcome::Completed { trace, .. }
            | SimulateOutcome::InvariantViolated { trace, .. }
            | SimulateOutcome::Deadlocked { trace } => trace.as_slice(),
        }
    }
}

/// Lock-free progress counters, readable from another thread while the
/// explorer runs.
pub struct ProgressCounters {
    pub states: AtomicUsize,
    pub depth: AtomicUsize,
    pub queue_len: AtomicUsize,
    /// States popped from the queue and expanded.
    pub checked: AtomicUsize,
}

impl Default for ProgressCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self {
            states: AtomicUsize::new(0),
            depth: AtomicUsize::new(0),
            queue_len: AtomicUsize::new(0),
            checked: AtomicUsize::new(0),
        }
    }
}

/// Configuration for the model checker.
#[derive(Clone)]
pub struct CheckConfig {
    /// Report states without successors as deadlocks.
    pub check_deadlock: bool,
    /// Stop after discovering this many states.
    pub max_states: Option<usize>,
    /// Do not explore past this many actions from an initial state.
    pub max_depth: Option<usize>,
    /// Wall-clock budget for one run.
    pub max_time: Option<Duration>,
    /// Resident memory budget in MB, sampled every 1000 states.
    pub memory_limit_mb: Option<usize>,
    /// Shared progress counters.
    pub progress: Option<Arc<ProgressCounters>>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            check_deadlock: true,
            max_states: None,
            max_depth: None,
            max_time: None,
            memory_limit_mb: None,
            progress: None,
        }
    }
}

impl fmt::Debug for CheckConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckConfig")
            .field("check_deadlock", &self.check_deadlock)
            .field("max_states", &self.max_states)
            .field("max_depth", &self.max_depth)
            .field("max_time", &self.max_time)
            .field("memory_limit_mb", &self.memory_limit_mb)
            .field("progress", &self.progress.as_ref().map(|_| "..."))
            .finish()
    }
}

/// How a BFS pass ended.
enum Stop {
    Violation(StateId, Violation),
    Deadlock(StateId),
    Limit(Limit),
}

/// BFS explorer over one specification.
pub struct Explorer {
    spec_name: String,
    engine: ActionEngine,
    invariants: InvariantChecker,
    config: CheckConfig,
    store: StateStore,
    action_names: Vec<String>,
    action_fire_counts: Vec<usize>,
    expanded: usize,
    max_depth: usize,
    stop_flag: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl Explorer {
    /// Bind `consts` (in declaration order) to `spec`'s constants.
    pub fn new(spec: &Spec, consts: Vec<Value>, config: CheckConfig) -> CheckResult<Self> {
        if let Some(missing) = spec.consts.get(consts.len()) {
            return Err(CheckError::MissingConstant {
                name: missing.name.clone(),
            });
        }
        if consts.len() > spec.consts.len() {
            return Err(CheckError::SurplusConstants {
                declared: spec.consts.len(),
                given: consts.len(),
            });
        }
        let engine = ActionEngine::new(spec, consts);
        let action_names = engine.action_names();
        Ok(Self {
            spec_name: spec.name.clone(),
            invariants: InvariantChecker::new(spec.invariants.clone()),
            action_fire_counts: vec![0; action_names.len()],
            action_names,
            engine,
            config,
            store: StateStore::new(),
            expanded: 0,
            max_depth: 0,
            stop_flag: None,
            deadline: None,
        })
    }

    /// Run breadth-first exploration from the initial states.
    ///
    /// Every call starts from an empty visited set.
    pub fn check(&mut self) -> CheckResult<CheckOutcome> {
        self.reset();
        info!(
            spec = %self.spec_name,
            vars = self.engine.env().var_names.len(),
            actions = self.action_names.len(),
            invariants = self.invariants.len(),
            "starting model check"
        );

        let stop = self.explore()?;

        info!(
            states = self.store.len(),
            max_depth = self.max_depth,
            collisions = self.store.collisions(),
            "model checking complete"
        );

        let outcome = match stop {
            None => CheckOutcome::Exhausted {
                stats: self.stats(),
            },
            Some(Stop::Violation(id, violation)) => {
                info!(
                    invariant = %violation.name,
                    state = %violation.state,
                    "invariant violated"
                );
                CheckOutcome::InvariantViolated {
                    invariant: violation.name,
                    index: violation.index,
                    trace: self.store.trace_to(id, &self.action_names),
                    stats: self.stats(),
                }
            }
            Some(Stop::Deadlock(id)) => {
                info!("deadlock found");
                CheckOutcome::Deadlocked {
                    trace: self.store.trace_to(id, &self.action_names),
                    stats: self.stats(),
                }
            }
            Some(Stop::Limit(limit)) => {
                info!(%limit, states = self.store.len(), "exploration incomplete");
                CheckOutcome::ResourceLimitExceeded {
                    limit,
                    stats: self.stats(),
                }
            }
        };
        Ok(outcome)
    }

    fn reset(&mut self) {
        self.store.clear();
        self.action_fire_counts.iter_mut().for_each(|c| *c = 0);
        self.expanded = 0;
        self.max_depth = 0;
        self.deadline = self.config.max_time.map(|t| Instant::now() + t);
    }

    fn explore(&mut self) -> CheckResult<Option<Stop>> {
        let initial = self.engine.initial_states().map_err(|error| CheckError::Eval {
            error,
            phase: Phase::Init,
        })?;
        if initial.is_empty() {
            return Err(CheckError::NoInitialStates);
        }
        info!(count = initial.len(), "generated initial states");

        let mut queue: VecDeque<StateId> = VecDeque::new();
        for state in initial {
            if self.at_state_limit() {
                return Ok(Some(Stop::Limit(Limit::States)));
            }
            let Some(id) = self.store.insert(state.clone(), None, None, 0) else {
                continue;
            };
            if let Some(violation) = self.invariants.check(self.engine.env(), &state)? {
                return Ok(Some(Stop::Violation(id, violation)));
            }
            queue.push_back(id);
        }

        let mut truncated = false;
        while let Some(id) = queue.pop_front() {
            if let Some(limit) = self.run_limit() {
                return Ok(Some(Stop::Limit(limit)));
            }
            let Some(info) = self.store.get(id) else {
                continue;
            };
            let state = info.state.clone();
            let depth = info.depth;
            trace!(depth, fp = %state.fingerprint(), "exploring state");

            let mut has_successor = false;
            for action_idx in 0..self.action_names.len() {
                let successors = self.engine.successors(action_idx, &state).map_err(|error| {
                    CheckError::Eval {
                        error,
                        phase: Phase::Action(self.action_names[action_idx].clone()),
                    }
                })?;
                if successors.is_empty() {
                    continue;
                }
                has_successor = true;
                self.action_fire_counts[action_idx] += successors.len();
                debug!(
                    action = %self.action_names[action_idx],
                    count = successors.len(),
                    "action fired"
                );

                for next in successors {
                    if self.store.contains(&next) {
                        continue;
                    }
                    if self.config.max_depth.is_some_and(|max| depth >= max) {
                        truncated = true;
                        continue;
                    }
                    if self.at_state_limit() {
                        return Ok(Some(Stop::Limit(Limit::States)));
                    }
                    let Some(next_id) =
                        self.store
                            .insert(next.clone(), Some(id), Some(action_idx), depth + 1)
                    else {
                        continue;
                    };
                    self.max_depth = self.max_depth.max(depth + 1);
                    if let Some(violation) = self.invariants.check(self.engine.env(), &next)? {
                        return Ok(Some(Stop::Violation(next_id, violation)));
                    }
                    queue.push_back(next_id);
                }
            }
            self.expanded += 1;

            if !has_successor {
                if self.config.check_deadlock {
                    return Ok(Some(Stop::Deadlock(id)));
                }
                debug!(depth, state = %state, "state has no successors");
            }

            if let Some(ref p) = self.config.progress {
                p.checked.fetch_add(1, Ordering::Relaxed);
                p.states.store(self.store.len(), Ordering::Relaxed);
                p.depth.store(self.max_depth, Ordering::Relaxed);
                p.queue_len.store(queue.len(), Ordering::Relaxed);
            }
        }

        if truncated {
            return Ok(Some(Stop::Limit(Limit::Depth)));
        }
        Ok(None)
    }

    fn at_state_limit(&self) -> bool {
        let reached = self
            .config
            .max_states
            .is_some_and(|max| self.store.len() >= max);
        if reached {
            info!(states = self.store.len(), "reached state limit");
        }
        reached
    }

    /// Limits checked once per expanded state.
    fn run_limit(&self) -> Option<Limit> {
        if let Some(ref flag) = self.stop_flag {
            if flag.load(Ordering::Relaxed) {
                info!("stop requested");
                return Some(Limit::Cancelled);
            }
        }
        if self.past_deadline() {
            info!("reached time limit");
            return Some(Limit::Time);
        }
        if let Some(limit_mb) = self.config.memory_limit_mb {
            if self.expanded % 1000 == 0 {
                if let Some(mem_mb) = current_memory_mb() {
                    if mem_mb >= limit_mb {
                        info!(memory_mb = mem_mb, limit_mb, "reached memory limit");
                        return Some(Limit::Memory);
                    }
                }
            }
        }
        None
    }

    /// Counters for the current run.
    pub fn stats(&self) -> CheckStats {
        CheckStats {
            states: self.store.len(),
            expanded: self.expanded,
            max_depth: self.max_depth,
            collisions: self.store.collisions(),
            action_fire_counts: self.action_fire_counts.clone(),
        }
    }

    /// Random walk of at most `max_steps` actions, checking invariants at
    /// every step. The walk is fully determined by `seed`.
    pub fn simulate(&mut self, max_steps: usize, seed: u64) -> CheckResult<SimulateOutcome> {
        let mut rng = StdRng::seed_from_u64(seed);
        let env = self.engine.env();

        let initial: Vec<State> = self
            .engine
            .initial_states()
            .map_err(|error| CheckError::Eval {
                error,
                phase: Phase::Init,
            })?
            .into_iter()
            .collect();
        let Some(state) = initial.choose(&mut rng).cloned() else {
            return Err(CheckError::NoInitialStates);
        };

        let mut trace: Vec<TraceStep> = vec![(state.clone(), None)];
        if let Some(violation) = self.invariants.check(env, &state)? {
            return Ok(SimulateOutcome::InvariantViolated {
                invariant: violation.name,
                trace,
            });
        }

        let mut current = state;
        for step in 0..max_steps {
            let mut successors: Vec<(usize, State)> = Vec::new();
            for (action_idx, name) in self.action_names.iter().enumerate() {
                let next = self
                    .engine
                    .successors(action_idx, &current)
                    .map_err(|error| CheckError::Eval {
                        error,
                        phase: Phase::Action(name.clone()),
                    })?;
                successors.extend(next.into_iter().map(|s| (action_idx, s)));
            }

            let Some((action_idx, next_state)) = successors.choose(&mut rng).cloned() else {
                debug!(step, "simulation deadlocked");
                return Ok(SimulateOutcome::Deadlocked { trace });
            };
            trace!(step, action = %self.action_names[action_idx], "simulation step");
            trace.push((next_state.clone(), Some(self.action_names[action_idx].clone())));

            if let Some(violation) = self.invariants.check(env, &next_state)? {
                return Ok(SimulateOutcome::InvariantViolated {
                    invariant: violation.name,
                    trace,
                });
            }
            current = next_state;
        }

        Ok(SimulateOutcome::Completed {
            steps: trace.len() - 1,
            trace,
        })
    }

    /// Check if the time limit has been exceeded.
    #[inline]
    fn past_deadline(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Set an external stop flag, checked before each state is expanded.
    pub fn set_stop_flag(&mut self, flag: Arc<AtomicBool>) {
        self.stop_flag = Some(flag);
    }

    /// Get the state store for inspection.
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn engine(&self) -> &ActionEngine {
        &self.engine
    }

    pub fn action_names(&self) -> &[String] {
        &self.action_names
    }

    pub fn var_names(&self) -> &[String] {
        &self.engine.env().var_names
    }
}
