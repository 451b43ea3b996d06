//! Objective tree management: creation, reads, mutation, cascade deletion.
//!
//! The tree manager owns every objective record and enforces the structural
//! invariants: depth is `parent.depth + 1` (0 for roots), computed once at
//! creation and checked against the owning agent's depth limit; hierarchy
//! fields are immutable afterwards; delegated objectives always name their
//! delegator. Depth is the only hard capacity constraint — load counters are
//! refreshed after every mutation but never gate admission.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use crate::error::TelosResult;
use crate::ident::{AgentId, IdAllocator, ObjectiveId, TemplateId};
use crate::store::PlanStore;

use super::error::{PlanError, PlanResult};
use super::objective::{
    Delegation, MoodEvent, MoodImpact, MoodSink, Objective, ObjectiveKind, ObjectiveMetadata,
    ObjectiveSource, ObjectiveStatus, Priority, ProgressLogEntry,
};
use super::state::PlanningStateTracker;

// ---------------------------------------------------------------------------
// Creation spec
// ---------------------------------------------------------------------------

/// Everything needed to create an objective. Built with `with_*` methods;
/// unspecified fields take narrative-neutral defaults.
#[derive(Debug, Clone)]
pub struct NewObjective {
    pub agent: AgentId,
    pub session: String,
    pub parent: Option<ObjectiveId>,
    pub kind: ObjectiveKind,
    pub description: String,
    pub success_criteria: String,
    pub priority: Priority,
    pub source: ObjectiveSource,
    pub delegation: Option<Delegation>,
    pub deadline_soft: Option<u64>,
    pub deadline_hard: Option<u64>,
    pub decay_after_turns: Option<u32>,
    pub is_atomic: bool,
    pub metadata: ObjectiveMetadata,
    pub template: Option<TemplateId>,
    pub mood_impact: MoodImpact,
    pub turn: u64,
}

impl NewObjective {
    /// A root main objective with default settings.
    pub fn new(agent: AgentId, description: impl Into<String>) -> Self {
        Self {
            agent,
            session: "default".into(),
            parent: None,
            kind: ObjectiveKind::Main,
            description: description.into(),
            success_criteria: String::new(),
            priority: Priority::Medium,
            source: ObjectiveSource::Initial,
            delegation: None,
            deadline_soft: None,
            deadline_hard: None,
            decay_after_turns: None,
            is_atomic: false,
            metadata: ObjectiveMetadata::None,
            template: None,
            mood_impact: MoodImpact::default(),
            turn: 0,
        }
    }

    /// Attach to a parent: the objective becomes a breakdown child.
    pub fn with_parent(mut self, parent: ObjectiveId) -> Self {
        self.parent = Some(parent);
        self.kind = ObjectiveKind::Child;
        self.source = ObjectiveSource::Internal;
        self
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = session.into();
        self
    }

    pub fn with_kind(mut self, kind: ObjectiveKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_source(mut self, source: ObjectiveSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.success_criteria = criteria.into();
        self
    }

    pub fn with_delegation(mut self, delegation: Delegation) -> Self {
        self.delegation = Some(delegation);
        self
    }

    pub fn with_deadlines(mut self, soft: Option<u64>, hard: Option<u64>) -> Self {
        self.deadline_soft = soft;
        self.deadline_hard = hard;
        self
    }

    pub fn with_decay_after(mut self, turns: u32) -> Self {
        self.decay_after_turns = Some(turns);
        self
    }

    pub fn atomic(mut self) -> Self {
        self.is_atomic = true;
        self
    }

    pub fn with_metadata(mut self, metadata: ObjectiveMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_template(mut self, template: TemplateId) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_mood_impact(mut self, mood_impact: MoodImpact) -> Self {
        self.mood_impact = mood_impact;
        self
    }

    pub fn at_turn(mut self, turn: u64) -> Self {
        self.turn = turn;
        self
    }
}

/// Post-creation update. Only narrative, priority, status-adjacent, deadline
/// and metadata fields are mutable; hierarchy is not represented here at all.
#[derive(Debug, Clone, Default)]
pub struct ObjectiveUpdate {
    pub description: Option<String>,
    pub success_criteria: Option<String>,
    pub priority: Option<Priority>,
    pub deadline_soft: Option<Option<u64>>,
    pub deadline_hard: Option<Option<u64>>,
    pub decay_after_turns: Option<Option<u32>>,
    pub metadata: Option<ObjectiveMetadata>,
}

/// Filters for [`ObjectiveTree::list`].
#[derive(Debug, Clone, Default)]
pub struct ObjectiveFilter {
    pub status: Option<ObjectiveStatus>,
    pub priority: Option<Priority>,
    /// Restrict to this node's children (or, with `include_descendants`, its
    /// whole subtree).
    pub parent: Option<ObjectiveId>,
    pub include_descendants: bool,
}

/// One node of a subtree query, with a human-readable path from the root.
#[derive(Debug, Clone)]
pub struct SubtreeNode {
    pub objective: Objective,
    /// Descriptions from the root to this node, joined with " > ".
    pub path: String,
}

// ---------------------------------------------------------------------------
// Tree manager
// ---------------------------------------------------------------------------

/// Owns objective records and their parent/child structure.
pub struct ObjectiveTree {
    store: Arc<PlanStore>,
    tracker: Arc<PlanningStateTracker>,
    alloc: Arc<IdAllocator>,
    sink: RwLock<Option<Arc<dyn MoodSink>>>,
}

impl ObjectiveTree {
    pub fn new(
        store: Arc<PlanStore>,
        tracker: Arc<PlanningStateTracker>,
        alloc: Arc<IdAllocator>,
    ) -> Self {
        Self {
            store,
            tracker,
            alloc,
            sink: RwLock::new(None),
        }
    }

    /// Register the mood subsystem's event receiver.
    pub fn set_mood_sink(&self, sink: Arc<dyn MoodSink>) {
        if let Ok(mut slot) = self.sink.write() {
            *slot = Some(sink);
        }
    }

    fn emit_mood(&self, objective: &Objective, turn: u64) {
        let (positive, negative) = match objective.status {
            ObjectiveStatus::Completed => (objective.mood_impact.on_success, 0.0),
            ObjectiveStatus::Abandoned => (0.0, objective.mood_impact.on_failure),
            _ => return,
        };
        let event = MoodEvent {
            agent: objective.agent,
            objective: objective.id,
            turn,
            positive,
            negative,
        };
        if let Ok(slot) = self.sink.read() {
            if let Some(sink) = slot.as_ref() {
                sink.on_mood_event(event);
            }
        }
    }

    /// Refresh the owning agent's load counters and persist the state.
    fn refresh(&self, agent: AgentId) -> TelosResult<()> {
        let objectives = self.store.objectives_for(agent);
        self.tracker.refresh_counts(agent, objectives.iter());
        if let Some(state) = self.tracker.get(agent) {
            self.store.put_planning_state(&state)?;
        }
        Ok(())
    }

    // -- create -------------------------------------------------------------

    /// Create an objective, enforcing the depth invariant.
    ///
    /// Depth is `parent.depth + 1` when a parent is given, else 0, and must
    /// not exceed the owning agent's current depth limit. Delegated
    /// objectives must carry a delegation block.
    pub fn create(&self, spec: NewObjective) -> TelosResult<Objective> {
        let depth = match spec.parent {
            Some(parent_id) => {
                let parent = self
                    .store
                    .get_objective(parent_id)
                    .filter(|p| p.agent == spec.agent)
                    .ok_or(PlanError::ObjectiveNotFound {
                        objective_id: parent_id.get(),
                    })?;
                parent.depth + 1
            }
            None => 0,
        };

        let max_depth = self.tracker.depth_limit(spec.agent);
        if depth > max_depth {
            return Err(PlanError::DepthExceeded {
                depth,
                max: max_depth,
            }
            .into());
        }

        let id = ObjectiveId::from_nonzero(self.alloc.next_raw()?);

        if spec.kind == ObjectiveKind::Delegated && spec.delegation.is_none() {
            return Err(PlanError::InvalidDelegation {
                objective_id: id.get(),
            }
            .into());
        }

        let objective = Objective {
            id,
            agent: spec.agent,
            session: spec.session,
            parent: spec.parent,
            depth,
            kind: spec.kind,
            description: spec.description,
            success_criteria: spec.success_criteria,
            priority: spec.priority,
            status: ObjectiveStatus::Active,
            source: spec.source,
            delegation: spec.delegation,
            deadline_soft: spec.deadline_soft,
            deadline_hard: spec.deadline_hard,
            created_turn: spec.turn,
            completed_turn: None,
            last_evaluated_turn: spec.turn,
            decay_after_turns: spec.decay_after_turns,
            turns_inactive: 0,
            partial_completion: 0.0,
            is_atomic: spec.is_atomic,
            metadata: spec.metadata,
            template: spec.template,
            mood_impact: spec.mood_impact,
        };

        self.store.put_objective(&objective)?;
        self.refresh(objective.agent)?;
        tracing::debug!(
            objective = %objective.id,
            agent = %objective.agent,
            depth,
            priority = %objective.priority,
            "created objective"
        );
        Ok(objective)
    }

    // -- read ---------------------------------------------------------------

    /// Look up an objective by identity.
    pub fn get(&self, id: ObjectiveId) -> PlanResult<Objective> {
        self.store
            .get_objective(id)
            .ok_or(PlanError::ObjectiveNotFound {
                objective_id: id.get(),
            })
    }

    /// The append-only progress history of an objective.
    pub fn progress_log(&self, id: ObjectiveId) -> Vec<ProgressLogEntry> {
        self.store.progress_log(id)
    }

    /// List an agent's objectives, filtered, ordered by priority descending
    /// then creation order ascending (FIFO within a priority band).
    pub fn list(&self, agent: AgentId, filter: &ObjectiveFilter) -> Vec<Objective> {
        let mut out: Vec<Objective> = match filter.parent {
            Some(parent) if filter.include_descendants => {
                let members = self.descendant_ids(parent);
                self.store
                    .objectives_for(agent)
                    .into_iter()
                    .filter(|o| members.contains(&o.id) && o.id != parent)
                    .collect()
            }
            Some(parent) => self
                .store
                .children_of(parent)
                .into_iter()
                .filter(|o| o.agent == agent)
                .collect(),
            None => self.store.objectives_for(agent),
        };

        if let Some(status) = filter.status {
            out.retain(|o| o.status == status);
        }
        if let Some(priority) = filter.priority {
            out.retain(|o| o.priority == priority);
        }

        out.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
        out
    }

    /// The IDs reachable from `root` by child edges, `root` included.
    ///
    /// Bounded by a visited set: malformed parent links (a cycle introduced
    /// by corrupted storage) are logged and skipped rather than trusted.
    fn descendant_ids(&self, root: ObjectiveId) -> HashSet<ObjectiveId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                tracing::warn!(objective = %id, "cycle detected in objective tree; skipping revisit");
                continue;
            }
            for child in self.store.children_of(id) {
                if !visited.contains(&child.id) {
                    queue.push_back(child.id);
                }
            }
        }
        visited
    }

    /// Full subtree query: the root plus every transitive descendant, each
    /// exactly once, with a human-readable path trace, ordered by depth then
    /// identity.
    pub fn subtree(&self, root: ObjectiveId) -> PlanResult<Vec<SubtreeNode>> {
        let root_obj = self.get(root)?;
        let mut paths: HashMap<ObjectiveId, String> = HashMap::new();
        paths.insert(root, root_obj.description.clone());

        let mut nodes = vec![root_obj];
        let mut visited = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);

        while let Some(id) = queue.pop_front() {
            let parent_path = paths.get(&id).cloned().unwrap_or_default();
            for child in self.store.children_of(id) {
                if !visited.insert(child.id) {
                    tracing::warn!(
                        objective = %child.id,
                        "cycle detected in objective tree; skipping revisit"
                    );
                    continue;
                }
                paths.insert(child.id, format!("{parent_path} > {}", child.description));
                queue.push_back(child.id);
                nodes.push(child);
            }
        }

        nodes.sort_by_key(|o| (o.depth, o.id));
        Ok(nodes
            .into_iter()
            .map(|objective| {
                let path = paths.get(&objective.id).cloned().unwrap_or_default();
                SubtreeNode { objective, path }
            })
            .collect())
    }

    // -- update -------------------------------------------------------------

    /// Apply a field update. Hierarchy fields are not updatable by design.
    pub fn update(&self, id: ObjectiveId, update: ObjectiveUpdate) -> TelosResult<Objective> {
        let mut obj = self.get(id)?;
        if let Some(description) = update.description {
            obj.description = description;
        }
        if let Some(criteria) = update.success_criteria {
            obj.success_criteria = criteria;
        }
        if let Some(priority) = update.priority {
            obj.priority = priority;
        }
        if let Some(soft) = update.deadline_soft {
            obj.deadline_soft = soft;
        }
        if let Some(hard) = update.deadline_hard {
            obj.deadline_hard = hard;
        }
        if let Some(decay) = update.decay_after_turns {
            obj.decay_after_turns = decay;
        }
        if let Some(metadata) = update.metadata {
            obj.metadata = metadata;
        }
        self.store.put_objective(&obj)?;
        self.refresh(obj.agent)?;
        Ok(obj)
    }

    /// Change an objective's status.
    ///
    /// `completed_turn` is required when completing (the completed status and
    /// the completion turn are set together, never separately); for other
    /// transitions it serves as the effective turn when provided. Terminal
    /// statuses admit no further transitions.
    pub fn update_status(
        &self,
        id: ObjectiveId,
        status: ObjectiveStatus,
        completed_turn: Option<u64>,
    ) -> TelosResult<Objective> {
        if status == ObjectiveStatus::Completed && completed_turn.is_none() {
            let obj = self.get(id)?;
            return Err(PlanError::InvalidTransition {
                objective_id: id.get(),
                from: obj.status.label().into(),
                to: "completed without a completion turn".into(),
            }
            .into());
        }
        let turn = completed_turn.unwrap_or_else(|| {
            self.store
                .get_objective(id)
                .map(|o| o.last_evaluated_turn)
                .unwrap_or(0)
        });
        self.transition(id, status, turn)
    }

    /// Internal status transition with an explicit effective turn, shared by
    /// the public API, the decay sweep, and the delegation protocol.
    pub(crate) fn transition(
        &self,
        id: ObjectiveId,
        status: ObjectiveStatus,
        turn: u64,
    ) -> TelosResult<Objective> {
        let mut obj = self.get(id)?;
        if obj.status == status {
            return Ok(obj);
        }
        if !transition_allowed(obj.status, status) {
            return Err(PlanError::InvalidTransition {
                objective_id: id.get(),
                from: obj.status.label().into(),
                to: status.label().into(),
            }
            .into());
        }

        obj.status = status;
        obj.completed_turn = (status == ObjectiveStatus::Completed).then_some(turn);
        obj.last_evaluated_turn = turn;

        self.store.put_objective(&obj)?;
        self.refresh(obj.agent)?;
        tracing::debug!(objective = %obj.id, agent = %obj.agent, status = %status, "status transition");
        self.emit_mood(&obj, turn);
        Ok(obj)
    }

    /// Apply a progress delta.
    ///
    /// Valid only while active. Clamps `partial_completion` to [0, 1],
    /// resets the inactivity counter, appends a [`ProgressLogEntry`], and
    /// completes the objective exactly once when 1.0 is reached.
    pub fn update_progress(
        &self,
        id: ObjectiveId,
        delta: f32,
        turn: u64,
        action: Option<String>,
        notes: Option<String>,
    ) -> TelosResult<Objective> {
        let mut obj = self.get(id)?;
        if obj.status != ObjectiveStatus::Active {
            return Err(PlanError::InvalidTransition {
                objective_id: id.get(),
                from: obj.status.label().into(),
                to: "active".into(),
            }
            .into());
        }

        obj.partial_completion = (obj.partial_completion + delta).clamp(0.0, 1.0);
        obj.turns_inactive = 0;
        obj.last_evaluated_turn = turn;

        let completes = obj.partial_completion >= 1.0;
        if completes {
            obj.status = ObjectiveStatus::Completed;
            obj.completed_turn = Some(turn);
        }

        self.store.put_objective(&obj)?;
        self.store.append_progress(ProgressLogEntry {
            objective: id,
            turn,
            action,
            delta,
            resulting_status: obj.status,
            notes,
        })?;
        self.refresh(obj.agent)?;
        if completes {
            tracing::debug!(objective = %obj.id, agent = %obj.agent, "objective completed via progress");
            self.emit_mood(&obj, turn);
        }
        Ok(obj)
    }

    /// Persist sweep-side bookkeeping (inactivity counter, escalated
    /// priority) without running the status machine.
    pub(crate) fn put_swept(&self, objective: &Objective) -> TelosResult<()> {
        self.store.put_objective(objective)?;
        Ok(())
    }

    /// Mutate an objective's delegation block in place (protocol bookkeeping).
    pub(crate) fn update_delegation(
        &self,
        id: ObjectiveId,
        f: impl FnOnce(&mut Delegation),
    ) -> TelosResult<Objective> {
        let mut obj = self.get(id)?;
        match obj.delegation.as_mut() {
            Some(delegation) => f(delegation),
            None => {
                return Err(PlanError::InvalidDelegation {
                    objective_id: id.get(),
                }
                .into())
            }
        }
        self.store.put_objective(&obj)?;
        Ok(obj)
    }

    // -- delete -------------------------------------------------------------

    /// Delete an objective and its entire subtree. Returns the removed IDs.
    pub fn delete(&self, id: ObjectiveId) -> TelosResult<Vec<ObjectiveId>> {
        // Existence check first so deleting a ghost is an error, not a no-op.
        self.get(id)?;
        let members = self.descendant_ids(id);
        let mut agents: Vec<AgentId> = Vec::new();
        let mut removed: Vec<ObjectiveId> = members.into_iter().collect();
        removed.sort();
        for member in &removed {
            if let Some(obj) = self.store.remove_objective(*member)? {
                if !agents.contains(&obj.agent) {
                    agents.push(obj.agent);
                }
            }
        }
        for agent in agents {
            self.refresh(agent)?;
        }
        tracing::debug!(root = %id, removed = removed.len(), "deleted objective subtree");
        Ok(removed)
    }

    /// All agents that currently own objectives.
    pub fn agents(&self) -> Vec<AgentId> {
        self.store.agents()
    }
}

/// The status machine. Same-status transitions are handled upstream as
/// idempotent no-ops.
fn transition_allowed(from: ObjectiveStatus, to: ObjectiveStatus) -> bool {
    use ObjectiveStatus::*;
    matches!(
        (from, to),
        (Active, Completed | Blocked | Abandoned | WaitingConfirmation)
            | (Blocked, Active | Abandoned)
            | (WaitingConfirmation, Completed | Abandoned)
    )
}
