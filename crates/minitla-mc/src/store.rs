//! Visited-state storage for model checking.
//!
//! States live in an append-only arena indexed by [`StateId`]; a hash map
//! from fingerprint to the ids sharing it gives exact deduplication. Two
//! distinct states with the same fingerprint are both kept and counted as a
//! collision, so a collision costs a comparison, never soundness.

use crate::state::{Fingerprint, State};
use ahash::AHashMap;
use smallvec::SmallVec;
use tracing::debug;

/// Position of a state in the store, in discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u32);

impl StateId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Information about how a state was reached.
#[derive(Debug, Clone)]
pub struct StateInfo {
    pub state: State,
    /// Predecessor (None for initial states).
    pub predecessor: Option<StateId>,
    /// Index of the action that led to this state (None for initial states).
    pub action_idx: Option<usize>,
    /// Depth from an initial state.
    pub depth: usize,
}

/// One step of a trace: the state and the action that produced it.
pub type TraceStep = (State, Option<String>);

/// Exact visited-state set with parent pointers.
#[derive(Debug, Default)]
pub struct StateStore {
    infos: Vec<StateInfo>,
    index: AHashMap<Fingerprint, SmallVec<[StateId; 1]>>,
    collisions: usize,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            infos: Vec::with_capacity(capacity),
            index: AHashMap::with_capacity(capacity),
            collisions: 0,
        }
    }

    /// Id of `state` if it has been seen.
    pub fn lookup(&self, state: &State) -> Option<StateId> {
        self.index
            .get(&state.fingerprint())?
            .iter()
            .copied()
            .find(|id| self.infos[id.index()].state == *state)
    }

    #[inline]
    pub fn contains(&self, state: &State) -> bool {
        self.lookup(state).is_some()
    }

    /// Insert a state unless already present. Check and insert are one
    /// operation. Returns the new id, or `None` for a duplicate.
    pub fn insert(
        &mut self,
        state: State,
        predecessor: Option<StateId>,
        action_idx: Option<usize>,
        depth: usize,
    ) -> Option<StateId> {
        let fp = state.fingerprint();
        let id = StateId(self.infos.len() as u32);
        let bucket = self.index.entry(fp).or_default();
        if bucket
            .iter()
            .any(|other| self.infos[other.index()].state == state)
        {
            return None;
        }
        if !bucket.is_empty() {
            self.collisions += 1;
            debug!(fingerprint = %fp, bucket = bucket.len() + 1, "fingerprint collision");
        }
        bucket.push(id);
        self.infos.push(StateInfo {
            state,
            predecessor,
            action_idx,
            depth,
        });
        Some(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Number of distinct states that shared a fingerprint with an earlier one.
    #[inline]
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    pub fn get(&self, id: StateId) -> Option<&StateInfo> {
        self.infos.get(id.index())
    }

    /// States in discovery order.
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.infos.iter().map(|info| &info.state)
    }

    /// Reconstruct the path from an initial state to `id`, following parent
    /// pointers. Action names are resolved by index.
    pub fn trace_to(&self, id: StateId, action_names: &[String]) -> Vec<TraceStep> {
        let mut trace = Vec::new();
        let mut current = Some(id);
        while let Some(cid) = current {
            let Some(info) = self.get(cid) else {
                break;
            };
            let name = info.action_idx.map(|idx| {
                action_names
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| format!("action_{}", idx))
            });
            trace.push((info.state.clone(), name));
            current = info.predecessor;
        }
        trace.reverse();
        trace
    }

    pub fn clear(&mut self) {
        self.infos.clear();
        self.index.clear();
        self.collisions = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minitla_eval::Value;

    #[test]
    fn test_store_insert() {
        let mut store = StateStore::new();
        let s1 = State::new(vec![Value::int(1)]);
        let s2 = State::new(vec![Value::int(2)]);

        assert!(store.insert(s1.clone(), None, None, 0).is_some());
        assert!(store.insert(s1.clone(), None, None, 0).is_none());
        assert!(store.insert(s2, None, None, 0).is_some());

        assert_eq!(store.len(), 2);
        assert!(store.contains(&s1));
    }

    #[test]
    fn test_trace_reconstruction() {
        let mut store = StateStore::new();

        let s0 = State::new(vec![Value::int(0)]);
        let s1 = State::new(vec![Value::int(1)]);
        let s2 = State::new(vec![Value::int(2)]);

        let id0 = store.insert(s0, None, None, 0).unwrap();
        let id1 = store.insert(s1, Some(id0), Some(0), 1).unwrap();
        let id2 = store.insert(s2, Some(id1), Some(1), 2).unwrap();

        let action_names = vec!["step1".to_string(), "step2".to_string()];
        let trace = store.trace_to(id2, &action_names);
        assert_eq!(trace.len(), 3);
        assert_eq!(*trace[0].0.vars, vec![Value::int(0)]);
        assert_eq!(trace[0].1, None);
        assert_eq!(trace[1].1.as_deref(), Some("step1"));
        assert_eq!(*trace[2].0.vars, vec![Value::int(2)]);
        assert_eq!(trace[2].1.as_deref(), Some("step2"));
    }

    #[test]
    fn test_collisions_are_kept_apart() {
        let fp = Fingerprint::from_u64(7);
        let a = State::with_fingerprint(vec![Value::int(1)], fp);
        let b = State::with_fingerprint(vec![Value::int(2)], fp);

        let mut store = StateStore::new();
        let id_a = store.insert(a.clone(), None, None, 0).unwrap();
        let id_b = store.insert(b.clone(), None, None, 0).unwrap();
        assert_ne!(id_a, id_b);
        assert!(store.insert(b.clone(), None, None, 0).is_none());

        assert_eq!(store.len(), 2);
        assert_eq!(store.collisions(), 1);
        assert_eq!(store.lookup(&a), Some(id_a));
        assert_eq!(store.lookup(&b), Some(id_b));
    }
}
