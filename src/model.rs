//! The model graph: immutable-after-construction topology of states,
//! regions and transitions.
//!
//! States and regions are owned by flat arenas (`Vec`) inside [`Model`] and
//! referenced everywhere else by [`StateId`] / [`RegionId`] / [`TransitionId`]
//! rather than by pointer, so containment (owning, parent -> child) and the
//! transition graph (non-owning, referencing nodes by index) can't form the
//! pointer cycles a direct state/region/state translation would produce.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::ids::{RegionId, StateId, TransitionId};

pub type GuardError = Box<dyn std::error::Error + Send + Sync>;
pub type GuardFn = Arc<dyn Fn(&Context) -> Result<bool, GuardError> + Send + Sync>;
pub type ActionFn = Arc<dyn Fn(&mut Context) -> Result<(), GuardError> + Send + Sync>;

/// Distinguishes the three transition semantics from spec section 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Action runs; no exit/entry. Source and target are the same containing state.
    Internal,
    /// Target is a substate of source (or vice versa); source is not exited/re-entered.
    Local,
    /// Exits up to and re-enters from the LCA of source and target.
    External,
}

/// A directed edge in the transition multigraph.
///
/// `fork_join_region` is the `ForkJoinTransition` subtype's extra field: it
/// carries a region identity for transitions whose source is itself a
/// fork-join pseudostate, which otherwise has no parent region of its own.
pub struct Transition {
    pub source: StateId,
    pub target: StateId,
    /// `None` means a completion transition (no triggering event).
    pub trigger: Option<Arc<str>>,
    pub guard: Option<GuardFn>,
    pub action: Option<ActionFn>,
    pub kind: TransitionKind,
    pub fork_join_region: Option<RegionId>,
}

impl Transition {
    /// The region whose active substate becomes the fork-join when this
    /// transition arrives: the source's own parent region, or — for a
    /// fork-join-to-fork-join edge, whose source has none — the region
    /// explicitly attributed to this `ForkJoinTransition`.
    pub fn arrival_region(&self, model: &Model) -> RegionId {
        model
            .parent_region(self.source)
            .or(self.fork_join_region)
            .expect("fork-join arrival transition must resolve to a region")
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("trigger", &self.trigger)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Tagged-variant replacement for a State / CompositeState / Pseudostate /
/// ForkJoin inheritance hierarchy (see Design Notes, "Deep inheritance").
#[derive(Debug, Clone)]
pub enum StateKind {
    Simple,
    Composite { regions: Vec<RegionId> },
    Initial,
    ShallowHistory,
    DeepHistory,
    Choice,
    Junction,
    /// `incoming`/`outgoing` are the static edge lists; which incoming edges
    /// have actually fired is runtime state tracked by the fork-join
    /// coordinator, not here (the model is immutable after construction).
    /// `owner` is the composite state whose orthogonal regions this bar
    /// joins/forks across — the fork-join itself has no single parent
    /// region (mirrored from the original implementation's `parentState`).
    ForkJoin {
        incoming: Vec<TransitionId>,
        outgoing: Vec<TransitionId>,
        owner: StateId,
    },
    Terminate,
}

impl StateKind {
    pub fn is_pseudostate(&self) -> bool {
        !matches!(self, StateKind::Simple | StateKind::Composite { .. })
    }
}

#[derive(Debug, Clone)]
pub struct State {
    pub name: Arc<str>,
    /// `None` only for the machine's root composite.
    pub parent_region: Option<RegionId>,
    pub kind: StateKind,
    pub entry: Option<ActionFn>,
    pub exit: Option<ActionFn>,
    /// `Some` iff the "do" activity completes immediately, enabling
    /// completion transitions in the same RTC step (section 4.3 step 6).
    pub do_activity_completes_immediately: bool,
}

impl State {
    pub fn is_composite(&self) -> bool {
        matches!(self.kind, StateKind::Composite { .. })
    }

    pub fn regions(&self) -> &[RegionId] {
        match &self.kind {
            StateKind::Composite { regions } => regions,
            _ => &[],
        }
    }
}

/// An orthogonal region owned by a composite state.
#[derive(Debug, Clone)]
pub struct Region {
    pub parent: StateId,
    pub states: Vec<StateId>,
}

impl Region {
    /// The region's initial pseudostate and its single outgoing transition,
    /// i.e. the region's default entry point.
    pub fn initial_transition(&self, model: &Model) -> Option<TransitionId> {
        self.states
            .iter()
            .find(|&&s| matches!(model.state(s).kind, StateKind::Initial))
            .and_then(|&initial_state| model.outgoing(initial_state).first().copied())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("containment tree has a cycle through state {0:?}")]
    Cycle(StateId),
    #[error("transition {0:?} references a state unreachable from the root")]
    UnreachableTransitionEndpoint(TransitionId),
    #[error("fork-join {state:?} must have at least one incoming and one outgoing transition, got {incoming} incoming / {outgoing} outgoing")]
    ForkJoinArity {
        state: StateId,
        incoming: usize,
        outgoing: usize,
    },
    #[error("state name {0:?} is not unique within its parent region")]
    DuplicateStateName(Arc<str>),
    #[error("region {0:?} has no initial transition and no history pseudostate")]
    MissingRegionEntryPoint(RegionId),
}

/// The validated, immutable topology. Build one via [`crate::builder::ModelBuilder`].
pub struct Model {
    pub(crate) states: Vec<State>,
    pub(crate) regions: Vec<Region>,
    pub(crate) transitions: Vec<Transition>,
    pub(crate) root: StateId,
}

impl Model {
    pub fn root(&self) -> StateId {
        self.root
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.index()]
    }

    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.index()]
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn transition(&self, id: TransitionId) -> &Transition {
        &self.transitions[id.index()]
    }

    pub fn state_name(&self, id: StateId) -> &str {
        &self.state(id).name
    }

    pub fn find_state(&self, name: &str) -> Option<StateId> {
        self.states
            .iter()
            .position(|s| &*s.name == name)
            .map(|i| StateId(i as u32))
    }

    /// The region a state lives in, or `None` for the root.
    pub fn parent_region(&self, id: StateId) -> Option<RegionId> {
        self.state(id).parent_region
    }

    /// The composite state that owns a state's parent region, or `None` for the root.
    pub fn parent_state(&self, id: StateId) -> Option<StateId> {
        self.parent_region(id).map(|r| self.region(r).parent)
    }

    /// All transitions whose source is `id`, in declaration order (priority order).
    pub fn outgoing(&self, id: StateId) -> Vec<TransitionId> {
        self.transitions
            .iter()
            .enumerate()
            .filter(|(_, t)| t.source == id)
            .map(|(i, _)| TransitionId(i as u32))
            .collect()
    }

    /// The chain of ancestor states from `id` up to and including the root.
    pub fn ancestors(&self, id: StateId) -> Vec<StateId> {
        let mut path = vec![id];
        let mut cur = id;
        while let Some(parent) = self.parent_state(cur) {
            path.push(parent);
            cur = parent;
        }
        path
    }

    /// Least common ancestor of two states: the deepest state that contains both.
    pub fn lca(&self, a: StateId, b: StateId) -> StateId {
        let ancestors_a = self.ancestors(a);
        let ancestors_b: HashSet<StateId> = self.ancestors(b).into_iter().collect();
        ancestors_a
            .into_iter()
            .find(|s| ancestors_b.contains(s))
            .unwrap_or(self.root)
    }

    /// Depth of a state in the containment tree (root is depth 0).
    pub fn depth(&self, id: StateId) -> usize {
        self.ancestors(id).len() - 1
    }

    pub fn is_descendant_of(&self, descendant: StateId, ancestor: StateId) -> bool {
        self.ancestors(descendant).contains(&ancestor)
    }

    /// The composite a fork-join pseudostate's regions hang off, per its
    /// `owner` field.
    pub fn fork_join_owner(&self, fork_join: StateId) -> StateId {
        match self.state(fork_join).kind {
            StateKind::ForkJoin { owner, .. } => owner,
            _ => panic!("fork_join_owner called on a non-fork-join state"),
        }
    }

    /// Topology validation run once at `build()` / `start()` time.
    pub fn validate(&self) -> Result<(), ModelError> {
        // Cycle check: walking parent_state from any state must reach the root
        // in at most `states.len()` hops.
        for (i, _) in self.states.iter().enumerate() {
            let start = StateId(i as u32);
            let mut cur = start;
            let mut hops = 0;
            while let Some(parent) = self.parent_state(cur) {
                cur = parent;
                hops += 1;
                if hops > self.states.len() {
                    return Err(ModelError::Cycle(start));
                }
            }
        }

        // Every transition endpoint must be reachable from the root.
        let reachable: HashSet<StateId> = self
            .states
            .iter()
            .enumerate()
            .map(|(i, _)| StateId(i as u32))
            .filter(|&s| self.ancestors(s).contains(&self.root))
            .collect();
        for (i, t) in self.transitions.iter().enumerate() {
            if !reachable.contains(&t.source) || !reachable.contains(&t.target) {
                return Err(ModelError::UnreachableTransitionEndpoint(TransitionId(
                    i as u32,
                )));
            }
        }

        // Fork-join arity >= 1 incoming and >= 1 outgoing.
        for (i, s) in self.states.iter().enumerate() {
            if let StateKind::ForkJoin { incoming, outgoing, .. } = &s.kind {
                if incoming.is_empty() || outgoing.is_empty() {
                    return Err(ModelError::ForkJoinArity {
                        state: StateId(i as u32),
                        incoming: incoming.len(),
                        outgoing: outgoing.len(),
                    });
                }
            }
        }

        // Unique state names within a parent region.
        let mut seen: HashSet<(Option<RegionId>, &str)> = HashSet::new();
        for s in &self.states {
            if !seen.insert((s.parent_region, &s.name)) {
                return Err(ModelError::DuplicateStateName(s.name.clone()));
            }
        }

        // Every region needs either an initial transition or a history pseudostate
        // to have somewhere to go on first entry.
        for (i, r) in self.regions.iter().enumerate() {
            let has_history = r
                .states
                .iter()
                .any(|&s| matches!(self.state(s).kind, StateKind::ShallowHistory | StateKind::DeepHistory));
            if r.initial_transition(self).is_none() && !has_history {
                return Err(ModelError::MissingRegionEntryPoint(RegionId(i as u32)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::ModelBuilder;
    use crate::model::{ModelError, TransitionKind};

    #[test]
    fn lca_of_siblings_is_their_parent_region_owner() {
        let mut b = ModelBuilder::new();
        let root = b.add_root("root");
        let region = b.add_region(root);
        let initial = b.add_initial(region, "initial");
        let a = b.add_simple_state(region, "a");
        let inner = b.add_composite_state(region, "inner");
        b.add_transition(initial, a, TransitionKind::External, None::<&str>, None, None);
        let inner_region = b.add_region(inner);
        let inner_initial = b.add_initial(inner_region, "inner_initial");
        let c = b.add_simple_state(inner_region, "c");
        b.add_transition(inner_initial, c, TransitionKind::External, None::<&str>, None, None);
        let model = b.build().unwrap();

        assert_eq!(model.lca(a, c), root);
        assert_eq!(model.lca(c, inner), inner);
        assert!(model.is_descendant_of(c, inner));
        assert!(!model.is_descendant_of(a, inner));
        assert_eq!(model.depth(root), 0);
        assert_eq!(model.depth(c), 2);
    }

    #[test]
    fn validate_rejects_region_without_entry_point() {
        let mut b = ModelBuilder::new();
        let root = b.add_root("root");
        let region = b.add_region(root);
        b.add_simple_state(region, "orphan");
        assert!(matches!(b.build(), Err(ModelError::MissingRegionEntryPoint(_))));
    }
}
