//! Records the last active substate per region so history-pseudostate entry
//! can restore it. Shallow history remembers one level; deep history
//! remembers the entire active subtree beneath that level.

use std::collections::HashMap;

use crate::configuration::Configuration;
use crate::ids::{RegionId, StateId};
use crate::model::Model;

/// A deep-history snapshot: every region beneath the saved substate, paired
/// with the substate that was active in it at the moment of capture.
pub type DeepSnapshot = Vec<(RegionId, StateId)>;

#[derive(Default)]
pub struct HistoryManager {
    shallow: HashMap<RegionId, StateId>,
    deep: HashMap<RegionId, DeepSnapshot>,
}

impl HistoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called on region deactivation, before the region's active substate is
    /// nulled out. Always records the shallow slot (cheap and harmless if
    /// the region has no history pseudostate); additionally records a deep
    /// snapshot when `needs_deep` is set.
    pub fn record(&mut self, model: &Model, config: &Configuration, region: RegionId, needs_deep: bool) {
        let Some(substate) = config.active_substate(region) else {
            return;
        };
        self.shallow.insert(region, substate);

        if needs_deep {
            let mut snapshot = Vec::new();
            Self::snapshot_subtree(model, config, substate, &mut snapshot);
            self.deep.insert(region, snapshot);
        }
    }

    fn snapshot_subtree(model: &Model, config: &Configuration, state: StateId, out: &mut DeepSnapshot) {
        for &region in model.state(state).regions() {
            if let Some(substate) = config.active_substate(region) {
                out.push((region, substate));
                Self::snapshot_subtree(model, config, substate, out);
            }
        }
    }

    /// Shallow-history entry: the remembered immediate child, or `None` if
    /// the slot is empty (caller falls back to the region's initial transition).
    pub fn shallow_restore(&self, region: RegionId) -> Option<StateId> {
        self.shallow.get(&region).copied()
    }

    /// Deep-history entry: the remembered immediate child plus the full
    /// subtree snapshot to restore beneath it, or `None` if the slot is empty.
    pub fn deep_restore(&self, region: RegionId) -> Option<(StateId, &DeepSnapshot)> {
        let child = *self.shallow.get(&region)?;
        let snapshot = self.deep.get(&region)?;
        Some((child, snapshot))
    }

    /// Clears every history slot. Used by `reset()`.
    pub fn clear(&mut self) {
        self.shallow.clear();
        self.deep.clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::ModelBuilder;
    use crate::model::TransitionKind;

    use super::*;

    #[test]
    fn shallow_record_and_restore_round_trips() {
        let mut b = ModelBuilder::new();
        let root = b.add_root("root");
        let region = b.add_region(root);
        let initial = b.add_initial(region, "initial");
        let a = b.add_simple_state(region, "a");
        let bstate = b.add_simple_state(region, "b");
        b.add_transition(initial, a, TransitionKind::External, None::<&str>, None, None);
        let model = b.build().unwrap();

        let mut config = Configuration::new(model.region_count());
        config.begin_step();
        config.set_active_substate(region, Some(bstate)).unwrap();
        config.end_step();

        let mut history = HistoryManager::new();
        assert_eq!(history.shallow_restore(region), None);
        history.record(&model, &config, region, false);
        assert_eq!(history.shallow_restore(region), Some(bstate));

        history.clear();
        assert_eq!(history.shallow_restore(region), None);
    }
}
