//! The machine's live state: one active-substate pointer per region.
//!
//! `None` is the null sentinel ("region inactive") — spec.md's "Null
//! sentinel: per-region marker indicating region inactive" is represented
//! directly as `Option::None` rather than a synthetic per-region state,
//! since `Option` already is Rust's null sentinel.

use crate::error::EngineError;
use crate::ids::{RegionId, StateId};
use crate::model::Model;

pub struct Configuration {
    /// Active substate per region, indexed by `RegionId`.
    active: Vec<Option<StateId>>,
    /// Enforces invariant: `set_active_substate` may only be called from
    /// inside an RTC step (section 4.2, `ConcurrencyViolation`).
    in_rtc_step: bool,
}

impl Configuration {
    pub fn new(region_count: usize) -> Self {
        Self {
            active: vec![None; region_count],
            in_rtc_step: false,
        }
    }

    pub(crate) fn begin_step(&mut self) {
        self.in_rtc_step = true;
    }

    pub(crate) fn end_step(&mut self) {
        self.in_rtc_step = false;
    }

    pub fn active_substate(&self, region: RegionId) -> Option<StateId> {
        self.active[region.index()]
    }

    pub fn set_active_substate(&mut self, region: RegionId, state: Option<StateId>) -> Result<(), EngineError> {
        if !self.in_rtc_step {
            tracing::error!(?region, "setActiveSubstate called outside an RTC step");
            return Err(EngineError::ConcurrencyViolation);
        }
        self.active[region.index()] = state;
        Ok(())
    }

    /// True iff `state` is the root, or is its region's active substate and
    /// that region's owning composite is itself active.
    pub fn is_active(&self, model: &Model, state: StateId) -> bool {
        if state == model.root() {
            return true;
        }
        let Some(region) = model.parent_region(state) else {
            return false;
        };
        if self.active_substate(region) != Some(state) {
            return false;
        }
        self.is_active(model, model.region(region).parent)
    }

    /// All currently active leaf states (states with no active substate of
    /// their own), used by the engine to find candidate transitions and by
    /// tests to assert the configuration's shape.
    pub fn active_leaves(&self, model: &Model) -> Vec<StateId> {
        let mut leaves = Vec::new();
        self.collect_leaves(model, model.root(), &mut leaves);
        leaves
    }

    fn collect_leaves(&self, model: &Model, state: StateId, out: &mut Vec<StateId>) {
        let regions = model.state(state).regions();
        if regions.is_empty() {
            out.push(state);
            return;
        }
        for &region in regions {
            if let Some(substate) = self.active_substate(region) {
                self.collect_leaves(model, substate, out);
            }
        }
    }

    /// Clears every region's active substate back to the null sentinel.
    /// Used by `reset()`.
    pub fn clear(&mut self) {
        for slot in &mut self.active {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::ModelBuilder;
    use crate::model::TransitionKind;

    use super::Configuration;

    #[test]
    fn set_active_substate_requires_an_in_progress_step() {
        let mut b = ModelBuilder::new();
        let root = b.add_root("root");
        let region = b.add_region(root);
        let initial = b.add_initial(region, "initial");
        let a = b.add_simple_state(region, "a");
        b.add_transition(initial, a, TransitionKind::External, None::<&str>, None, None);
        let model = b.build().unwrap();

        let mut config = Configuration::new(model.region_count());
        assert!(config.set_active_substate(region, Some(a)).is_err());

        config.begin_step();
        assert!(config.set_active_substate(region, Some(a)).is_ok());
        config.end_step();

        assert!(config.is_active(&model, a));
        assert_eq!(config.active_leaves(&model), vec![a]);
    }
}
