//! Engine facade: top-level API for the telos planning system.
//!
//! The `Engine` owns all subsystems — store, trait registry, template
//! registry, planning-state tracker, objective tree — and provides the
//! interface the turn loop and narrative code call.
//!
//! Mutations to one agent's state are serialized through a per-agent lock;
//! different agents proceed independently, and the whole-world turn sweep
//! fans out across agents with rayon, never parallelizing within one agent.
//! Delegation pairs are the one place state crosses agents: pair operations
//! take both agents' locks in ID order, while terminal propagation from the
//! decay sweep relies on the store's own concurrency control.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use rayon::prelude::*;

use crate::error::{EngineError, TelosResult};
use crate::ident::{AgentId, IdAllocator, ObjectiveId, TemplateId, TraitId};
use crate::plan::capacity::{compute_limits, Multipliers};
use crate::plan::decay::{self, DecaySummary};
use crate::plan::delegation::{self, DelegationPair, DelegationSpec};
use crate::plan::error::{PlanError, PlanResult};
use crate::plan::objective::{MoodSink, Objective, ObjectiveStatus, ProgressLogEntry};
use crate::plan::recurring::{TemplatePack, TemplateRegistry, TemplateSpec};
use crate::plan::state::{PlanningState, PlanningStateTracker};
use crate::plan::traits::{TraitRegistry, TraitScore, TraitSpec};
use crate::plan::tree::{
    NewObjective, ObjectiveFilter, ObjectiveTree, ObjectiveUpdate, SubtreeNode,
};
use crate::store::PlanStore;

/// Configuration for the telos engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Data directory for persistence. `None` for memory-only mode.
    pub data_dir: Option<PathBuf>,
    /// Game/session identity stamped on objectives created through this
    /// engine.
    pub session: String,
    /// How many turns make an in-game day (drives once-per-day recurrence).
    pub turns_per_day: u64,
    /// Whether `on_turn_advance` spawns due recurring templates
    /// automatically after the decay sweep.
    pub auto_spawn_recurring: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            session: "default".into(),
            turns_per_day: 24,
            auto_spawn_recurring: true,
        }
    }
}

/// The telos hierarchical objective engine.
pub struct Engine {
    config: EngineConfig,
    store: Arc<PlanStore>,
    tracker: Arc<PlanningStateTracker>,
    traits: TraitRegistry,
    templates: TemplateRegistry,
    tree: ObjectiveTree,
    alloc: Arc<IdAllocator>,
    agent_locks: DashMap<AgentId, Arc<Mutex<()>>>,
}

impl Engine {
    /// Create a new engine, restoring prior state when a data directory is
    /// configured.
    pub fn new(config: EngineConfig) -> TelosResult<Self> {
        if config.turns_per_day == 0 {
            return Err(EngineError::InvalidConfig {
                message: "turns_per_day must be > 0".into(),
            }
            .into());
        }

        let (store, restored) = match &config.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|_| EngineError::DataDir {
                    path: dir.display().to_string(),
                })?;
                PlanStore::with_persistence(dir)?
            }
            None => (PlanStore::memory_only(), Default::default()),
        };
        let store = Arc::new(store);

        let tracker = Arc::new(PlanningStateTracker::new());
        let traits = TraitRegistry::new();
        let templates = TemplateRegistry::new();
        for def in restored.traits {
            traits.restore(def);
        }
        for score in restored.scores {
            traits.restore_score(score);
        }
        for template in restored.templates {
            templates.restore(template);
        }
        for state in restored.planning_states {
            tracker.restore(state);
        }

        let alloc = Arc::new(IdAllocator::starting_from(restored.max_raw_id + 1));
        let tree = ObjectiveTree::new(Arc::clone(&store), Arc::clone(&tracker), Arc::clone(&alloc));

        tracing::info!(
            session = %config.session,
            persistent = store.is_persistent(),
            turns_per_day = config.turns_per_day,
            "initializing telos engine"
        );

        Ok(Self {
            config,
            store,
            tracker,
            traits,
            templates,
            tree,
            alloc,
            agent_locks: DashMap::new(),
        })
    }

    /// Register the mood subsystem's event receiver.
    pub fn set_mood_sink(&self, sink: Arc<dyn MoodSink>) {
        self.tree.set_mood_sink(sink);
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn lock_for(&self, agent: AgentId) -> Arc<Mutex<()>> {
        self.agent_locks
            .entry(agent)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `f` with the agent's mutation lock held.
    fn with_agent<T>(&self, agent: AgentId, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(agent);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f()
    }

    /// Run `f` with both agents' locks held, acquired in ID order.
    fn with_agent_pair<T>(&self, a: AgentId, b: AgentId, f: impl FnOnce() -> T) -> T {
        if a == b {
            return self.with_agent(a, f);
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let lock_a = self.lock_for(first);
        let lock_b = self.lock_for(second);
        let _ga = lock_a.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let _gb = lock_b.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f()
    }

    // -- traits & capacity --------------------------------------------------

    /// Register a cognitive trait definition.
    pub fn register_trait(&self, spec: TraitSpec) -> TelosResult<TraitId> {
        let id = self.traits.register(spec, &self.alloc)?;
        if let Some(def) = self.traits.get(id) {
            self.store.put_trait(&def)?;
        }
        Ok(id)
    }

    /// Deactivate a trait. Existing scores stay; capacity recomputation is
    /// triggered by the next score/multiplier change.
    pub fn deactivate_trait(&self, id: TraitId) -> TelosResult<()> {
        self.traits.deactivate(id)?;
        if let Some(def) = self.traits.get(id) {
            self.store.put_trait(&def)?;
        }
        Ok(())
    }

    /// Assign an agent's score on a trait and recompute its planning limits.
    pub fn assign_trait_score(
        &self,
        agent: AgentId,
        trait_id: TraitId,
        score: u8,
        turn: u64,
    ) -> TelosResult<PlanningState> {
        self.with_agent(agent, || {
            self.traits.assign_score(agent, trait_id, score)?;
            self.store.put_score(&TraitScore {
                agent,
                trait_id,
                score,
            })?;
            let multipliers = self
                .tracker
                .get(agent)
                .map(|s| s.multipliers)
                .unwrap_or_default();
            self.recompute_limits(agent, multipliers, turn)
        })
    }

    /// Recompute an agent's planning limits, e.g. after a mood or fatigue
    /// change supplied new multipliers.
    pub fn on_trait_or_mood_change(
        &self,
        agent: AgentId,
        multipliers: Multipliers,
        turn: u64,
    ) -> TelosResult<PlanningState> {
        self.with_agent(agent, || self.recompute_limits(agent, multipliers, turn))
    }

    fn recompute_limits(
        &self,
        agent: AgentId,
        multipliers: Multipliers,
        turn: u64,
    ) -> TelosResult<PlanningState> {
        let scored = self.traits.scored_traits(agent);
        let limits = compute_limits(&scored, multipliers.capacity, multipliers.focus);
        self.tracker.update_limits(agent, limits, multipliers, turn);
        self.tracker
            .refresh_counts(agent, self.store.objectives_for(agent).iter());
        let state = self.tracker.get(agent).ok_or(PlanError::StateNotFound {
            agent_id: agent.get(),
        })?;
        self.store.put_planning_state(&state)?;
        tracing::debug!(
            agent = %agent,
            capacity = limits.max_active_high_priority,
            depth = limits.max_objective_depth,
            frequency = limits.planning_frequency_turns,
            focus = limits.focus_score,
            "recomputed planning limits"
        );
        Ok(state)
    }

    /// An agent's current planning state.
    pub fn planning_state(&self, agent: AgentId) -> PlanResult<PlanningState> {
        self.tracker.get(agent).ok_or(PlanError::StateNotFound {
            agent_id: agent.get(),
        })
    }

    // -- objectives ---------------------------------------------------------

    /// Start a creation spec stamped with this engine's session.
    pub fn objective(&self, agent: AgentId, description: impl Into<String>) -> NewObjective {
        NewObjective::new(agent, description).with_session(self.config.session.clone())
    }

    /// Create an objective. Fails with `DepthExceeded` when the computed
    /// depth passes the owning agent's limit.
    pub fn create_objective(&self, spec: NewObjective) -> TelosResult<Objective> {
        self.with_agent(spec.agent, || self.tree.create(spec))
    }

    /// Update an objective's mutable fields.
    pub fn update_objective(
        &self,
        id: ObjectiveId,
        update: ObjectiveUpdate,
    ) -> TelosResult<Objective> {
        let agent = self.tree.get(id)?.agent;
        self.with_agent(agent, || self.tree.update(id, update))
    }

    /// Change an objective's status (see [`ObjectiveTree::update_status`]).
    pub fn update_status(
        &self,
        id: ObjectiveId,
        status: ObjectiveStatus,
        completed_turn: Option<u64>,
    ) -> TelosResult<Objective> {
        let agent = self.tree.get(id)?.agent;
        self.with_agent(agent, || self.tree.update_status(id, status, completed_turn))
    }

    /// Apply a progress delta (see [`ObjectiveTree::update_progress`]).
    pub fn update_progress(
        &self,
        id: ObjectiveId,
        delta: f32,
        turn: u64,
        action: Option<String>,
        notes: Option<String>,
    ) -> TelosResult<Objective> {
        let agent = self.tree.get(id)?.agent;
        self.with_agent(agent, || {
            self.tree.update_progress(id, delta, turn, action, notes)
        })
    }

    /// Look up an objective.
    pub fn get_objective(&self, id: ObjectiveId) -> PlanResult<Objective> {
        self.tree.get(id)
    }

    /// List an agent's objectives, filtered and priority-ordered.
    pub fn list_objectives(&self, agent: AgentId, filter: &ObjectiveFilter) -> Vec<Objective> {
        self.tree.list(agent, filter)
    }

    /// Full subtree query with path traces.
    pub fn subtree(&self, root: ObjectiveId) -> PlanResult<Vec<SubtreeNode>> {
        self.tree.subtree(root)
    }

    /// The append-only progress history of an objective.
    pub fn progress_log(&self, id: ObjectiveId) -> Vec<ProgressLogEntry> {
        self.tree.progress_log(id)
    }

    /// Delete an objective and its whole subtree.
    pub fn delete_objective(&self, id: ObjectiveId) -> TelosResult<Vec<ObjectiveId>> {
        let agent = self.tree.get(id)?.agent;
        self.with_agent(agent, || self.tree.delete(id))
    }

    // -- delegation ---------------------------------------------------------

    /// Hand a task to another agent, creating both sides of the pair.
    pub fn delegate(&self, spec: DelegationSpec) -> TelosResult<DelegationPair> {
        let spec = DelegationSpec {
            session: self.config.session.clone(),
            ..spec
        };
        self.with_agent_pair(spec.from_agent, spec.to_agent, || {
            delegation::delegate(&self.tree, spec)
        })
    }

    /// The delegate reports its side done.
    pub fn mark_delegate_complete(&self, id: ObjectiveId, turn: u64) -> TelosResult<Objective> {
        let (a, b) = self.pair_agents(id)?;
        self.with_agent_pair(a, b, || {
            delegation::mark_delegate_complete(&self.tree, id, turn)
        })
    }

    /// The delegator confirms a completed hand-off.
    pub fn confirm(&self, id: ObjectiveId, turn: u64) -> TelosResult<Objective> {
        let (a, b) = self.pair_agents(id)?;
        self.with_agent_pair(a, b, || delegation::confirm(&self.tree, id, turn))
    }

    /// Either party withdraws; both sides are abandoned.
    pub fn withdraw_delegation(&self, id: ObjectiveId, turn: u64) -> TelosResult<Objective> {
        let (a, b) = self.pair_agents(id)?;
        self.with_agent_pair(a, b, || delegation::withdraw(&self.tree, id, turn))
    }

    /// A delegator's tracking objectives awaiting confirmation.
    pub fn list_awaiting_confirmation(&self, delegator: AgentId) -> Vec<Objective> {
        delegation::list_awaiting_confirmation(&self.tree, delegator)
    }

    fn pair_agents(&self, id: ObjectiveId) -> TelosResult<(AgentId, AgentId)> {
        let obj = self.tree.get(id)?;
        let delegation = obj.delegation.as_ref().ok_or(PlanError::InvalidDelegation {
            objective_id: id.get(),
        })?;
        Ok((delegation.from_agent, delegation.to_agent))
    }

    // -- recurring ----------------------------------------------------------

    /// Register a recurring template.
    pub fn register_template(&self, spec: TemplateSpec) -> TelosResult<TemplateId> {
        let id = self.templates.register(spec, &self.alloc)?;
        self.store.put_template(&self.templates.get(id)?)?;
        Ok(id)
    }

    /// Register every template in a pack. Returns the allocated IDs.
    pub fn register_template_pack(&self, pack: TemplatePack) -> TelosResult<Vec<TemplateId>> {
        let ids = self.templates.register_pack(pack, &self.alloc)?;
        for id in &ids {
            self.store.put_template(&self.templates.get(*id)?)?;
        }
        Ok(ids)
    }

    /// Deactivate a template; it can no longer spawn.
    pub fn deactivate_template(&self, id: TemplateId) -> TelosResult<()> {
        self.templates.deactivate(id)?;
        self.store.put_template(&self.templates.get(id)?)?;
        Ok(())
    }

    /// Spawn a recurring objective from a template.
    pub fn spawn_recurring(
        &self,
        template: TemplateId,
        agent: AgentId,
        turn: u64,
    ) -> TelosResult<Objective> {
        self.with_agent(agent, || {
            self.templates
                .spawn(&self.tree, template, agent, &self.config.session, turn)
        })
    }

    // -- turn loop ----------------------------------------------------------

    /// Advance one agent's turn: decay sweep, then recurring-template checks.
    pub fn on_turn_advance(&self, agent: AgentId, turn: u64) -> TelosResult<DecaySummary> {
        self.with_agent(agent, || {
            let summary = decay::advance_turn(&self.tree, &self.templates, agent, turn)?;
            if self.config.auto_spawn_recurring {
                self.spawn_due_templates(agent, turn)?;
            }
            Ok(summary)
        })
    }

    /// Spawn every active template that is due for this agent and has no
    /// live objective already spawned from it.
    fn spawn_due_templates(&self, agent: AgentId, turn: u64) -> TelosResult<()> {
        let live: Vec<Objective> = self
            .store
            .objectives_for(agent)
            .into_iter()
            .filter(|o| o.status.is_live())
            .collect();
        for template in self.templates.all_templates() {
            if !template.active {
                continue;
            }
            if !self
                .templates
                .due(template.id, agent, turn, self.config.turns_per_day)
            {
                continue;
            }
            if live.iter().any(|o| o.template == Some(template.id)) {
                continue;
            }
            self.templates
                .spawn(&self.tree, template.id, agent, &self.config.session, turn)?;
        }
        Ok(())
    }

    /// Advance the whole world one turn, sweeping agents in parallel.
    ///
    /// Parallelism is across agents only; each agent's sweep runs under its
    /// own lock, sequentially with respect to that agent's other mutations.
    pub fn advance_turn_all(&self, turn: u64) -> TelosResult<Vec<(AgentId, DecaySummary)>> {
        self.known_agents()
            .into_par_iter()
            .map(|agent| self.on_turn_advance(agent, turn).map(|s| (agent, s)))
            .collect()
    }

    /// All agents known to the engine (objective owners plus agents with
    /// planning state).
    pub fn known_agents(&self) -> Vec<AgentId> {
        let mut agents = self.store.agents();
        for agent in self.tracker.known_agents() {
            if !agents.contains(&agent) {
                agents.push(agent);
            }
        }
        agents.sort();
        agents
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("session", &self.config.session)
            .field("persistent", &self.store.is_persistent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::traits::TraitModifiers;

    fn agent(raw: u64) -> AgentId {
        AgentId::new(raw).unwrap()
    }

    #[test]
    fn engine_rejects_zero_day_length() {
        let err = Engine::new(EngineConfig {
            turns_per_day: 0,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            crate::error::TelosError::Engine(EngineError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn trait_score_drives_planning_state() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let impulsive = engine
            .register_trait(TraitSpec::new(
                "Impulsive",
                TraitModifiers {
                    focus: -1.0,
                    ..Default::default()
                },
            ))
            .unwrap();

        let state = engine
            .assign_trait_score(agent(1), impulsive, 5, 0)
            .unwrap();
        assert!((state.limits.focus_score - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn planning_state_missing_before_any_computation() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let err = engine.planning_state(agent(9)).unwrap_err();
        assert!(matches!(err, PlanError::StateNotFound { agent_id: 9 }));
    }

    #[test]
    fn session_stamped_on_objectives() {
        let engine = Engine::new(EngineConfig {
            session: "chapter-3".into(),
            ..Default::default()
        })
        .unwrap();
        let obj = engine
            .create_objective(engine.objective(agent(1), "find shelter"))
            .unwrap();
        assert_eq!(obj.session, "chapter-3");
    }

    #[test]
    fn auto_spawn_respects_live_guard() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        engine
            .register_template_pack(crate::plan::recurring::bundled_basic_needs())
            .unwrap();

        engine.on_turn_advance(agent(1), 1).unwrap();
        let first: Vec<Objective> = engine
            .list_objectives(agent(1), &ObjectiveFilter::default())
            .into_iter()
            .filter(|o| o.template.is_some())
            .collect();
        assert_eq!(first.len(), 3, "all bundled needs spawn once");

        // Next turn: everything still live, nothing new spawns.
        engine.on_turn_advance(agent(1), 2).unwrap();
        let second: Vec<Objective> = engine
            .list_objectives(agent(1), &ObjectiveFilter::default())
            .into_iter()
            .filter(|o| o.template.is_some())
            .collect();
        assert_eq!(second.len(), 3);
    }

    #[test]
    fn advance_turn_all_covers_every_agent() {
        let engine = Engine::new(EngineConfig {
            auto_spawn_recurring: false,
            ..Default::default()
        })
        .unwrap();
        for raw in 1..=4 {
            engine
                .create_objective(engine.objective(agent(raw), "wander").with_decay_after(2))
                .unwrap();
        }

        let summaries = engine.advance_turn_all(1).unwrap();
        assert_eq!(summaries.len(), 4);
        assert!(summaries.iter().all(|(_, s)| s.incremented == 1));
    }

    #[test]
    fn delegation_round_trip_through_engine() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let pair = engine
            .delegate(DelegationSpec::new(agent(1), agent(2), "scout ahead", true).at_turn(1))
            .unwrap();

        engine.mark_delegate_complete(pair.working, 2).unwrap();
        assert_eq!(engine.list_awaiting_confirmation(agent(1)).len(), 1);
        engine.confirm(pair.tracking, 3).unwrap();
        assert_eq!(
            engine.get_objective(pair.working).unwrap().status,
            ObjectiveStatus::Completed
        );
    }
}
