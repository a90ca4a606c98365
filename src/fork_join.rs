//! Tracks which incoming transitions have fired into each fork-join
//! pseudostate and gates its outgoing fan-out (spec section 4.5).

use std::collections::{HashMap, HashSet};

use crate::ids::{StateId, TransitionId};
use crate::model::{Model, StateKind};

#[derive(Default)]
pub struct ForkJoinCoordinator {
    completed: HashMap<StateId, HashSet<TransitionId>>,
}

impl ForkJoinCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `transition` (which targets the fork-join `state`) has
    /// fired. Returns `true` iff every incoming transition has now arrived,
    /// i.e. the join is ready to fire its outgoing edges.
    pub fn arrive(&mut self, model: &Model, state: StateId, transition: TransitionId) -> bool {
        let incoming = match &model.state(state).kind {
            StateKind::ForkJoin { incoming, .. } => incoming,
            _ => return false,
        };
        let set = self.completed.entry(state).or_default();
        set.insert(transition);
        incoming.iter().all(|t| set.contains(t))
    }

    pub fn completed_transitions(&self, state: StateId) -> HashSet<TransitionId> {
        self.completed.get(&state).cloned().unwrap_or_default()
    }

    /// Clears a join's accumulator without firing outgoing edges. Used when
    /// the join's outgoing edges have just fired (normal path) and by
    /// `stop()`/`reset()` for a join parked mid-rendezvous (section 9's Open
    /// Question: unconditionally clear, don't leave it ambiguous).
    pub fn force_clear(&mut self, state: StateId) {
        self.completed.remove(&state);
    }

    pub fn clear_all(&mut self) {
        self.completed.clear();
    }

    pub fn is_parked(&self, state: StateId) -> bool {
        self.completed
            .get(&state)
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }
}
