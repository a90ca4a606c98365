//! The Transition Engine: selection, LCA computation, exit/action/entry
//! sequencing, and the fork-join and completion-microstep special cases.
//! This is the core algorithm from spec section 4.3, adapted from the
//! teacher's ECS `transition_observer` (exit/entry path computation via
//! ancestor-chain zipping) onto the flat [`crate::model::Model`] arena.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

use crate::configuration::Configuration;
use crate::context::{Context, Hooks};
use crate::error::ErrorKind;
use crate::event::Event;
use crate::fork_join::ForkJoinCoordinator;
use crate::history::HistoryManager;
use crate::ids::{RegionId, StateId, TransitionId};
use crate::model::{ActionFn, GuardError, GuardFn, Model, StateKind, TransitionKind};

/// Outcome of one `run_step` call. `ActionFailed` carries the point of
/// failure so callers (and tests) can assert the configuration froze there.
#[derive(Debug)]
pub enum StepOutcome {
    Handled,
    Unhandled,
    ActionFailed { at: Option<TransitionId>, at_state: Option<StateId> },
}

struct Candidate {
    source: StateId,
    transition: TransitionId,
    /// The selected transition plus any choice/junction hops it resolved through.
    chain: Vec<TransitionId>,
    final_target: StateId,
}

fn call_guard(guard: &GuardFn, ctx: &Context) -> Result<bool, GuardError> {
    match panic::catch_unwind(AssertUnwindSafe(|| guard(ctx))) {
        Ok(result) => result,
        Err(_) => Err("guard panicked".into()),
    }
}

fn call_action(action: &ActionFn, ctx: &mut Context) -> Result<(), GuardError> {
    match panic::catch_unwind(AssertUnwindSafe(|| action(ctx))) {
        Ok(result) => result,
        Err(_) => Err("action panicked".into()),
    }
}

fn guard_passes(guard: &Option<GuardFn>, ctx: &Context, hooks: &Hooks, transition: TransitionId) -> bool {
    match guard {
        None => true,
        Some(g) => match call_guard(g, ctx) {
            Ok(pass) => pass,
            Err(_source) => {
                hooks.exception(ErrorKind::GuardFailed, None, Some(transition));
                false
            }
        },
    }
}

/// Follows a chain of Choice/Junction pseudostate targets to the first
/// non-pseudostate (or fork-join/terminate) target, evaluating guards along
/// the way. Returns `None` if every branch at some hop is guarded off.
fn resolve_target(
    model: &Model,
    ctx: &Context,
    hooks: &Hooks,
    start: TransitionId,
) -> Option<(Vec<TransitionId>, StateId)> {
    let mut chain = vec![start];
    let mut cur_target = model.transition(start).target;
    let mut hops = 0;
    loop {
        match model.state(cur_target).kind {
            StateKind::Choice | StateKind::Junction => {
                hops += 1;
                if hops > model.transitions_len_guard() {
                    return None;
                }
                let mut found = None;
                for t in model.outgoing(cur_target) {
                    if guard_passes(&model.transition(t).guard, ctx, hooks, t) {
                        found = Some(t);
                        break;
                    }
                }
                match found {
                    Some(t) => {
                        chain.push(t);
                        cur_target = model.transition(t).target;
                    }
                    None => return None,
                }
            }
            _ => break,
        }
    }
    Some((chain, cur_target))
}

/// All states exited by a transition leaving `source` and bound for `lca`:
/// every active leaf at or beneath `source`, walked up to (excluding) `lca`,
/// innermost-first, deduplicated across leaves that share ancestors
/// (orthogonal regions under `source`).
fn exit_path_from_active_descendants(
    model: &Model,
    config: &Configuration,
    source: StateId,
    lca: StateId,
) -> Vec<StateId> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for leaf in config.active_leaves(model) {
        if leaf != source && !model.is_descendant_of(leaf, source) {
            continue;
        }
        for s in model.ancestors(leaf) {
            if s == lca {
                break;
            }
            if seen.insert(s) {
                out.push(s);
            }
        }
    }
    out
}

/// States entered descending from `lca` (exclusive) down to `target`
/// (inclusive), outermost-first.
fn entry_path(model: &Model, lca: StateId, target: StateId) -> Vec<StateId> {
    let mut chain = Vec::new();
    let mut cur = target;
    loop {
        if cur == lca {
            break;
        }
        chain.push(cur);
        match model.parent_state(cur) {
            Some(p) => cur = p,
            None => break,
        }
    }
    chain.reverse();
    chain
}

fn compute_exit_entry(
    model: &Model,
    config: &Configuration,
    source: StateId,
    final_target: StateId,
    kind: TransitionKind,
) -> (Vec<StateId>, Vec<StateId>) {
    match kind {
        TransitionKind::Internal => (Vec::new(), Vec::new()),
        TransitionKind::Local => {
            let lca = if model.is_descendant_of(final_target, source) {
                source
            } else if model.is_descendant_of(source, final_target) {
                final_target
            } else {
                model.lca(source, final_target)
            };
            (
                exit_path_from_active_descendants(model, config, source, lca),
                entry_path(model, lca, final_target),
            )
        }
        TransitionKind::External => {
            // A self-loop, or a target nested inside source, must still exit
            // and re-enter source — bump the LCA one level up so source is
            // included in the exit/entry set instead of being skipped.
            let mut lca = model.lca(source, final_target);
            if lca == source {
                lca = model.parent_state(source).unwrap_or_else(|| model.root());
            }
            (
                exit_path_from_active_descendants(model, config, source, lca),
                entry_path(model, lca, final_target),
            )
        }
    }
}

fn region_needs_deep_history(model: &Model, region: RegionId) -> bool {
    model
        .region(region)
        .states
        .iter()
        .any(|&s| matches!(model.state(s).kind, StateKind::DeepHistory))
}

fn region_has_history(model: &Model, region: RegionId) -> bool {
    model.region(region).states.iter().any(|&s| {
        matches!(
            model.state(s).kind,
            StateKind::ShallowHistory | StateKind::DeepHistory
        )
    })
}

struct StepCtx<'a> {
    model: &'a Model,
    config: &'a mut Configuration,
    history: &'a mut HistoryManager,
    fork_join: &'a mut ForkJoinCoordinator,
    hooks: &'a Hooks,
    event: Option<&'a Event>,
}

impl<'a> StepCtx<'a> {
    fn ctx(&self) -> Context<'_> {
        Context::new(self.model, self.event)
    }

    fn exit_state(&mut self, state: StateId) -> Result<(), StepOutcome> {
        if self.model.state(state).is_composite() {
            for &region in self.model.state(state).regions() {
                let needs_deep = region_needs_deep_history(self.model, region);
                if region_has_history(self.model, region) {
                    self.history.record(self.model, self.config, region, needs_deep);
                }
                let _ = self.config.set_active_substate(region, None);
            }
        }
        let mut ctx = self.ctx();
        if let Some(action) = self.model.state(state).exit.clone() {
            if let Err(_source) = call_action(&action, &mut ctx) {
                self.hooks.exception(ErrorKind::ActionFailed, Some(state), None);
                return Err(StepOutcome::ActionFailed {
                    at: None,
                    at_state: Some(state),
                });
            }
        }
        self.hooks.state_exited(state, self.model.state_name(state));
        // Clear this state's own slot in its parent region immediately, not
        // lazily once the whole transition completes — a mid-transition
        // action failure must still leave the configuration showing `state`
        // exited, not pointing at a state that no longer has an active path
        // from the root.
        if let Some(region) = self.model.parent_region(state) {
            let _ = self.config.set_active_substate(region, None);
        }
        Ok(())
    }

    fn enter_state(&mut self, state: StateId) -> Result<(), StepOutcome> {
        self.hooks.state_entered(state, self.model.state_name(state));
        let mut ctx = self.ctx();
        if let Some(action) = self.model.state(state).entry.clone() {
            if let Err(_source) = call_action(&action, &mut ctx) {
                self.hooks.exception(ErrorKind::ActionFailed, Some(state), None);
                return Err(StepOutcome::ActionFailed {
                    at: None,
                    at_state: Some(state),
                });
            }
        }
        Ok(())
    }

    fn run_transition_actions(&mut self, chain: &[TransitionId]) -> Result<(), StepOutcome> {
        for &t in chain {
            let action = self.model.transition(t).action.clone();
            if let Some(action) = action {
                let mut ctx = self.ctx();
                if let Err(_source) = call_action(&action, &mut ctx) {
                    self.hooks.exception(ErrorKind::ActionFailed, None, Some(t));
                    return Err(StepOutcome::ActionFailed {
                        at: Some(t),
                        at_state: None,
                    });
                }
            }
            self.hooks.transition_fired(t);
        }
        Ok(())
    }

    /// Drills from `state` down to real leaves: composites activate every
    /// region (history slot if the region has one and it's populated,
    /// otherwise the region's initial transition), recursively.
    fn drill_to_leaves(&mut self, state: StateId) -> Result<(), StepOutcome> {
        if !self.model.state(state).is_composite() {
            return Ok(());
        }
        for &region in self.model.state(state).regions() {
            self.enter_region_default(region)?;
        }
        Ok(())
    }

    fn enter_region_default(&mut self, region: RegionId) -> Result<(), StepOutcome> {
        let deep = region_needs_deep_history(self.model, region);
        if region_has_history(self.model, region) {
            if deep {
                if let Some((child, snapshot)) = self.history.deep_restore(region) {
                    let snapshot = snapshot.clone();
                    self.enter_state(child)?;
                    let _ = self.config.set_active_substate(region, Some(child));
                    for (r, s) in &snapshot {
                        self.enter_state(*s)?;
                        let _ = self.config.set_active_substate(*r, Some(*s));
                    }
                    return Ok(());
                }
            } else if let Some(child) = self.history.shallow_restore(region) {
                self.enter_state(child)?;
                let _ = self.config.set_active_substate(region, Some(child));
                self.drill_to_leaves(child)?;
                return Ok(());
            }
        }
        // No (or empty) history slot: take the region's initial transition.
        let Some(init_t) = self.model.region(region).initial_transition(self.model) else {
            return Ok(());
        };
        let ctx = self.ctx();
        let Some((chain, target)) = resolve_target(self.model, &ctx, self.hooks, init_t) else {
            return Ok(());
        };
        self.run_transition_actions(&chain)?;
        for &s in &entry_path(self.model, region_owner(self.model, region), target) {
            self.enter_state(s)?;
        }
        let _ = self.config.set_active_substate(region, Some(target));
        self.drill_to_leaves(target)
    }

    fn execute(&mut self, cand: &Candidate) -> Result<(), StepOutcome> {
        if matches!(self.model.state(cand.final_target).kind, StateKind::ForkJoin { .. }) {
            return self.handle_fork_join_arrival(cand);
        }

        let kind = self.model.transition(cand.transition).kind;
        let (exit_states, entry_states) =
            compute_exit_entry(self.model, self.config, cand.source, cand.final_target, kind);

        for &s in &exit_states {
            self.exit_state(s)?;
        }
        self.run_transition_actions(&cand.chain)?;
        for &s in &entry_states {
            self.enter_state(s)?;
        }
        if !matches!(kind, TransitionKind::Internal) {
            let last_region = self.model.parent_region(cand.final_target);
            if let Some(region) = last_region {
                let _ = self.config.set_active_substate(region, Some(cand.final_target));
            }
            self.drill_to_leaves(cand.final_target)?;
        }
        Ok(())
    }

    fn handle_fork_join_arrival(&mut self, cand: &Candidate) -> Result<(), StepOutcome> {
        let fj = cand.final_target;
        let owner = self.model.fork_join_owner(fj);

        let mut lca = self.model.lca(cand.source, owner);
        if lca == cand.source {
            lca = self.model.parent_state(cand.source).unwrap_or_else(|| self.model.root());
        }
        let exit_states = exit_path_from_active_descendants(self.model, self.config, cand.source, lca);
        for &s in &exit_states {
            self.exit_state(s)?;
        }
        self.run_transition_actions(&cand.chain)?;
        for &s in &entry_path(self.model, lca, owner) {
            self.enter_state(s)?;
        }

        let region = self.model.transition(cand.transition).arrival_region(self.model);
        let _ = self.config.set_active_substate(region, Some(fj));
        self.enter_state(fj)?;

        if self.fork_join.arrive(self.model, fj, cand.transition) {
            self.fire_fork_join_outgoing(fj, owner)?;
        }
        Ok(())
    }

    fn fire_fork_join_outgoing(&mut self, fj: StateId, owner: StateId) -> Result<(), StepOutcome> {
        let (incoming, outgoing) = match &self.model.state(fj).kind {
            StateKind::ForkJoin { incoming, outgoing, .. } => (incoming.clone(), outgoing.clone()),
            _ => return Ok(()),
        };

        let ctx = self.ctx();
        let mut resolved = Vec::new();
        for t in &outgoing {
            if let Some((chain, target)) = resolve_target(self.model, &ctx, self.hooks, *t) {
                resolved.push((*t, chain, target));
            }
        }

        // The highest ancestor we need to re-enter from: owner widened to
        // cover every resolved outgoing target that lands on an ordinary
        // state, so a fan-out that leaves `owner` entirely (a pure join)
        // and one that stays inside it (a fork within the same composite)
        // both fall out of the same walk. Targets that are themselves a
        // fork-join (chained bars) don't widen this — they're handled
        // through the arrival path instead, below.
        let mut combined_lca = owner;
        for (_, _, target) in &resolved {
            if !matches!(self.model.state(*target).kind, StateKind::ForkJoin { .. }) {
                combined_lca = self.model.lca(combined_lca, *target);
            }
        }

        self.hooks.state_exited(fj, self.model.state_name(fj));
        for t in &incoming {
            let region = self.model.transition(*t).arrival_region(self.model);
            let _ = self.config.set_active_substate(region, None);
        }
        self.fork_join.force_clear(fj);

        self.exit_owner_subtree(owner, combined_lca)?;

        for (original, chain, target) in resolved {
            if matches!(self.model.state(target).kind, StateKind::ForkJoin { .. }) {
                // Fork-join-to-fork-join edge: treat it as an ordinary
                // arrival at the downstream bar instead of a normal entry.
                self.run_transition_actions(&chain)?;
                let region = self.model.transition(original).arrival_region(self.model);
                let _ = self.config.set_active_substate(region, Some(target));
                self.enter_state(target)?;
                if self.fork_join.arrive(self.model, target, original) {
                    let next_owner = self.model.fork_join_owner(target);
                    self.fire_fork_join_outgoing(target, next_owner)?;
                }
                continue;
            }
            self.run_transition_actions(&chain)?;
            for &s in &entry_path(self.model, combined_lca, target) {
                self.enter_state(s)?;
            }
            if let Some(region) = self.model.parent_region(target) {
                let _ = self.config.set_active_substate(region, Some(target));
            }
            self.drill_to_leaves(target)?;
        }
        Ok(())
    }

    /// Exits everything under `owner` down to (excluding) `lca`, including
    /// `owner` itself. Unlike [`exit_path_from_active_descendants`], this
    /// tolerates regions whose active substate is a parked fork-join (which
    /// has no resolvable ancestor chain of its own) by skipping them and
    /// still accounting for `owner`'s own exit explicitly.
    fn exit_owner_subtree(&mut self, owner: StateId, lca: StateId) -> Result<(), StepOutcome> {
        if lca == owner {
            return Ok(());
        }
        let mut seen = HashSet::new();
        let mut chain = Vec::new();
        for leaf in self.config.active_leaves(self.model) {
            if matches!(self.model.state(leaf).kind, StateKind::ForkJoin { .. }) {
                continue;
            }
            if leaf != owner && !self.model.is_descendant_of(leaf, owner) {
                continue;
            }
            for s in self.model.ancestors(leaf) {
                if s == lca {
                    break;
                }
                if seen.insert(s) {
                    chain.push(s);
                }
            }
        }
        if seen.insert(owner) {
            chain.push(owner);
        }
        for s in chain {
            self.exit_state(s)?;
        }
        Ok(())
    }
}

fn region_owner(model: &Model, region: RegionId) -> StateId {
    model.region(region).parent
}

fn select_candidates(ctx: &StepCtx, leaves: &[StateId]) -> Vec<Candidate> {
    let c = ctx.ctx();
    let mut visited: HashSet<StateId> = HashSet::new();
    let mut raw: Vec<(usize, Candidate)> = Vec::new();

    for &leaf in leaves {
        for s in ctx.model.ancestors(leaf) {
            if !visited.insert(s) {
                continue;
            }
            if matches!(ctx.model.state(s).kind, StateKind::ForkJoin { .. }) {
                // Fork-joins never "select" outgoing transitions by priority
                // scan; they only fire once the rendezvous is satisfied,
                // handled in `fire_fork_join_outgoing`.
                continue;
            }
            for t in ctx.model.outgoing(s) {
                let tr = ctx.model.transition(t);
                let trigger_matches = match ctx.event {
                    Some(e) => tr.trigger.as_deref() == Some(&*e.name),
                    None => tr.trigger.is_none() && ctx.model.state(s).do_activity_completes_immediately,
                };
                if !trigger_matches {
                    continue;
                }
                if !guard_passes(&tr.guard, &c, ctx.hooks, t) {
                    continue;
                }
                if let Some((chain, final_target)) = resolve_target(ctx.model, &c, ctx.hooks, t) {
                    raw.push((
                        ctx.model.depth(s),
                        Candidate {
                            source: s,
                            transition: t,
                            chain,
                            final_target,
                        },
                    ));
                    break;
                }
            }
        }
    }

    raw.sort_by(|a, b| b.0.cmp(&a.0));
    let mut exited_accum: HashSet<StateId> = HashSet::new();
    let mut selected = Vec::new();
    for (_, cand) in raw {
        let kind = ctx.model.transition(cand.transition).kind;
        let (exit_states, _) = compute_exit_entry(ctx.model, ctx.config, cand.source, cand.final_target, kind);
        let exit_set: HashSet<StateId> = exit_states.into_iter().collect();
        if exit_set.is_disjoint(&exited_accum) {
            exited_accum.extend(exit_set);
            selected.push(cand);
        }
    }
    selected
}

/// Performs the machine's initial entry: enters the root and drills down
/// through every region's default (history or initial) entry point. Called
/// once by [`crate::machine::StateMachine::start`], before the worker
/// thread starts consuming events.
pub fn start_machine(
    model: &Model,
    config: &mut Configuration,
    history: &mut HistoryManager,
    fork_join: &mut ForkJoinCoordinator,
    hooks: &Hooks,
) -> StepOutcome {
    config.begin_step();
    let mut step = StepCtx {
        model,
        config,
        history,
        fork_join,
        hooks,
        event: None,
    };
    let outcome = (|| -> Result<(), StepOutcome> {
        step.enter_state(model.root())?;
        step.drill_to_leaves(model.root())?;
        Ok(())
    })();
    step.config.end_step();
    match outcome {
        Ok(()) => StepOutcome::Handled,
        Err(o) => o,
    }
}

const MAX_COMPLETION_MICROSTEPS: usize = 10_000;

/// Runs one RTC step for `event` (or a completion pass if `event` is
/// `None`), to quiescence — including any cascading completion microsteps —
/// per spec section 4.3.
pub fn run_step(
    model: &Model,
    config: &mut Configuration,
    history: &mut HistoryManager,
    fork_join: &mut ForkJoinCoordinator,
    hooks: &Hooks,
    event: Option<&Event>,
) -> StepOutcome {
    config.begin_step();
    let outcome = run_step_inner(model, config, history, fork_join, hooks, event);
    config.end_step();
    outcome
}

fn run_step_inner(
    model: &Model,
    config: &mut Configuration,
    history: &mut HistoryManager,
    fork_join: &mut ForkJoinCoordinator,
    hooks: &Hooks,
    event: Option<&Event>,
) -> StepOutcome {
    let mut step = StepCtx {
        model,
        config,
        history,
        fork_join,
        hooks,
        event,
    };
    let leaves = step.config.active_leaves(step.model);
    let candidates = select_candidates(&step, &leaves);
    if candidates.is_empty() {
        return StepOutcome::Unhandled;
    }
    for cand in &candidates {
        if let Err(outcome) = step.execute(cand) {
            return outcome;
        }
    }

    // Completion microsteps (section 4.3 step 6) are gated on the null
    // trigger, never on the event that started this RTC step — otherwise an
    // event-triggered transition reachable from the new configuration would
    // just keep re-firing on the same event instead of quiescing.
    step.event = None;
    for _ in 0..MAX_COMPLETION_MICROSTEPS {
        let leaves = step.config.active_leaves(step.model);
        let completion = select_candidates(&step, &leaves);
        if completion.is_empty() {
            break;
        }
        for cand in &completion {
            if let Err(outcome) = step.execute(cand) {
                return outcome;
            }
        }
    }

    StepOutcome::Handled
}

impl Model {
    fn transitions_len_guard(&self) -> usize {
        self.transitions.len().max(64)
    }
}
