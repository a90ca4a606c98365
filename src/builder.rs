//! Data-driven construction API for [`Model`] (spec section 4.8). A
//! `ModelBuilder` accumulates states, regions and transitions into the same
//! flat arenas `Model` itself uses, then validates the whole topology once
//! at `build()` — states and transitions are otherwise immutable for the
//! machine's lifetime, so there is no incremental mutation API once built.

use std::sync::Arc;

use crate::ids::{RegionId, StateId, TransitionId};
use crate::model::{ActionFn, GuardFn, Model, ModelError, Region, State, StateKind, Transition, TransitionKind};

pub struct ModelBuilder {
    states: Vec<State>,
    regions: Vec<Region>,
    transitions: Vec<Transition>,
    root: Option<StateId>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            regions: Vec::new(),
            transitions: Vec::new(),
            root: None,
        }
    }

    fn push_state(&mut self, name: Arc<str>, parent_region: Option<RegionId>, kind: StateKind) -> StateId {
        let id = StateId(self.states.len() as u32);
        self.states.push(State {
            name,
            parent_region,
            kind,
            entry: None,
            exit: None,
            do_activity_completes_immediately: false,
        });
        if let Some(region) = parent_region {
            self.regions[region.index()].states.push(id);
        }
        id
    }

    /// Declares the machine's single top-level composite state. Must be
    /// called exactly once, before anything else.
    pub fn add_root(&mut self, name: impl Into<Arc<str>>) -> StateId {
        let id = self.push_state(name.into(), None, StateKind::Composite { regions: Vec::new() });
        self.root = Some(id);
        id
    }

    /// Adds an orthogonal region owned by `owner`, which must be composite.
    pub fn add_region(&mut self, owner: StateId) -> RegionId {
        let region_id = RegionId(self.regions.len() as u32);
        self.regions.push(Region {
            parent: owner,
            states: Vec::new(),
        });
        match &mut self.states[owner.index()].kind {
            StateKind::Composite { regions } => regions.push(region_id),
            _ => panic!("add_region: owner {owner:?} is not a composite state"),
        }
        region_id
    }

    pub fn add_simple_state(&mut self, region: RegionId, name: impl Into<Arc<str>>) -> StateId {
        self.push_state(name.into(), Some(region), StateKind::Simple)
    }

    pub fn add_composite_state(&mut self, region: RegionId, name: impl Into<Arc<str>>) -> StateId {
        self.push_state(name.into(), Some(region), StateKind::Composite { regions: Vec::new() })
    }

    pub fn add_initial(&mut self, region: RegionId, name: impl Into<Arc<str>>) -> StateId {
        self.push_state(name.into(), Some(region), StateKind::Initial)
    }

    pub fn add_shallow_history(&mut self, region: RegionId, name: impl Into<Arc<str>>) -> StateId {
        self.push_state(name.into(), Some(region), StateKind::ShallowHistory)
    }

    pub fn add_deep_history(&mut self, region: RegionId, name: impl Into<Arc<str>>) -> StateId {
        self.push_state(name.into(), Some(region), StateKind::DeepHistory)
    }

    pub fn add_choice(&mut self, region: RegionId, name: impl Into<Arc<str>>) -> StateId {
        self.push_state(name.into(), Some(region), StateKind::Choice)
    }

    pub fn add_junction(&mut self, region: RegionId, name: impl Into<Arc<str>>) -> StateId {
        self.push_state(name.into(), Some(region), StateKind::Junction)
    }

    pub fn add_terminate(&mut self, region: RegionId, name: impl Into<Arc<str>>) -> StateId {
        self.push_state(name.into(), Some(region), StateKind::Terminate)
    }

    /// Adds a fork-join bar spanning `owner`'s orthogonal regions. Unlike
    /// every other pseudostate it has no parent region of its own (see
    /// [`StateKind::ForkJoin`]); `incoming`/`outgoing` fill in as
    /// transitions referencing it are added.
    pub fn add_fork_join(&mut self, owner: StateId, name: impl Into<Arc<str>>) -> StateId {
        let id = StateId(self.states.len() as u32);
        self.states.push(State {
            name: name.into(),
            parent_region: None,
            kind: StateKind::ForkJoin {
                incoming: Vec::new(),
                outgoing: Vec::new(),
                owner,
            },
            entry: None,
            exit: None,
            do_activity_completes_immediately: false,
        });
        id
    }

    pub fn set_entry(&mut self, state: StateId, action: ActionFn) -> &mut Self {
        self.states[state.index()].entry = Some(action);
        self
    }

    pub fn set_exit(&mut self, state: StateId, action: ActionFn) -> &mut Self {
        self.states[state.index()].exit = Some(action);
        self
    }

    /// Marks a state's "do" activity as completing the instant it's
    /// entered, enabling a same-step completion transition (section 4.3
    /// step 6) instead of waiting on an external event.
    pub fn set_completes_immediately(&mut self, state: StateId, value: bool) -> &mut Self {
        self.states[state.index()].do_activity_completes_immediately = value;
        self
    }

    fn link_fork_join_endpoints(&mut self, id: TransitionId, source: StateId, target: StateId) {
        if let StateKind::ForkJoin { outgoing, .. } = &mut self.states[source.index()].kind {
            outgoing.push(id);
        }
        if let StateKind::ForkJoin { incoming, .. } = &mut self.states[target.index()].kind {
            incoming.push(id);
        }
    }

    /// Adds a transition. `trigger: None` marks a completion transition.
    pub fn add_transition(
        &mut self,
        source: StateId,
        target: StateId,
        kind: TransitionKind,
        trigger: Option<impl Into<Arc<str>>>,
        guard: Option<GuardFn>,
        action: Option<ActionFn>,
    ) -> TransitionId {
        let id = TransitionId(self.transitions.len() as u32);
        self.transitions.push(Transition {
            source,
            target,
            trigger: trigger.map(Into::into),
            guard,
            action,
            kind,
            fork_join_region: None,
        });
        self.link_fork_join_endpoints(id, source, target);
        id
    }

    /// Adds a transition whose source is itself a fork-join with no parent
    /// region (a fork-join-to-fork-join edge): `arrival_region` stands in
    /// for the region a plain transition would otherwise infer from its
    /// source's `parent_region`.
    pub fn add_fork_join_transition(
        &mut self,
        source: StateId,
        target: StateId,
        kind: TransitionKind,
        arrival_region: RegionId,
        trigger: Option<impl Into<Arc<str>>>,
        guard: Option<GuardFn>,
        action: Option<ActionFn>,
    ) -> TransitionId {
        let id = TransitionId(self.transitions.len() as u32);
        self.transitions.push(Transition {
            source,
            target,
            trigger: trigger.map(Into::into),
            guard,
            action,
            kind,
            fork_join_region: Some(arrival_region),
        });
        self.link_fork_join_endpoints(id, source, target);
        id
    }

    /// Validates the accumulated topology and produces the immutable [`Model`].
    pub fn build(self) -> Result<Model, ModelError> {
        let model = Model {
            states: self.states,
            regions: self.regions,
            transitions: self.transitions,
            root: self.root.expect("ModelBuilder::add_root must be called before build()"),
        };
        model.validate()?;
        Ok(model)
    }
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}
