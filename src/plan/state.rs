//! Per-agent planning state: trait-derived limits plus live load counters.
//!
//! The limits half is produced by the capacity calculator; the counters half
//! is refreshed by rescanning the agent's live objectives after every
//! mutation. Counters are advisory telemetry for planning-frequency
//! decisions — they never gate objective creation (only depth is hard).

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::ident::AgentId;

use super::capacity::{Multipliers, PlanningLimits};
use super::objective::Objective;

/// Live objective-load counters for one agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveCounts {
    /// Live objectives at high or critical priority.
    pub high_priority: u32,
    /// Live objectives at critical priority.
    pub critical_priority: u32,
    /// All live objectives.
    pub total: u32,
}

/// Count an agent's live objectives by priority band.
pub fn count_live<'a>(objectives: impl Iterator<Item = &'a Objective>) -> ObjectiveCounts {
    let mut counts = ObjectiveCounts::default();
    for obj in objectives.filter(|o| o.status.is_live()) {
        counts.total += 1;
        if obj.priority.counts_as_high() {
            counts.high_priority += 1;
        }
        if obj.priority == super::objective::Priority::Critical {
            counts.critical_priority += 1;
        }
    }
    counts
}

/// One agent's planning state: limits, transient multipliers, and cached
/// load counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanningState {
    pub agent: AgentId,
    /// Trait-derived limits, already multiplied and clamped.
    pub limits: PlanningLimits,
    /// The multipliers the limits were computed with.
    pub multipliers: Multipliers,
    /// Cached live counts, refreshed after every mutation.
    pub counts: ObjectiveCounts,
    /// Turn the limits were last recomputed.
    pub recomputed_turn: u64,
}

impl PlanningState {
    /// A fresh state from computed limits.
    pub fn new(agent: AgentId, limits: PlanningLimits, multipliers: Multipliers, turn: u64) -> Self {
        Self {
            agent,
            limits,
            multipliers,
            counts: ObjectiveCounts::default(),
            recomputed_turn: turn,
        }
    }

    /// Whether the agent is over its advisory high-priority capacity.
    pub fn over_capacity(&self) -> bool {
        self.counts.high_priority > self.limits.max_active_high_priority
    }
}

/// Tracker holding the per-agent planning states.
#[derive(Debug, Default)]
pub struct PlanningStateTracker {
    states: DashMap<AgentId, PlanningState>,
}

impl PlanningStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist freshly computed limits, preserving existing counters.
    pub fn update_limits(
        &self,
        agent: AgentId,
        limits: PlanningLimits,
        multipliers: Multipliers,
        turn: u64,
    ) {
        self.states
            .entry(agent)
            .and_modify(|state| {
                state.limits = limits;
                state.multipliers = multipliers;
                state.recomputed_turn = turn;
            })
            .or_insert_with(|| PlanningState::new(agent, limits, multipliers, turn));
    }

    /// Recompute the agent's load counters from its live objectives.
    pub fn refresh_counts<'a>(
        &self,
        agent: AgentId,
        objectives: impl Iterator<Item = &'a Objective>,
    ) {
        let counts = count_live(objectives);
        self.states
            .entry(agent)
            .and_modify(|state| state.counts = counts)
            .or_insert_with(|| {
                let mut state =
                    PlanningState::new(agent, PlanningLimits::default(), Multipliers::default(), 0);
                state.counts = counts;
                state
            });
    }

    /// Current state for an agent, if any has been computed or counted.
    pub fn get(&self, agent: AgentId) -> Option<PlanningState> {
        self.states.get(&agent).map(|s| *s)
    }

    /// The agent's depth limit, falling back to the base default when the
    /// agent has never had limits computed.
    pub fn depth_limit(&self, agent: AgentId) -> u32 {
        self.states
            .get(&agent)
            .map(|s| s.limits.max_objective_depth)
            .unwrap_or_else(|| PlanningLimits::default().max_objective_depth)
    }

    /// Insert a restored state under its original agent.
    pub fn restore(&self, state: PlanningState) {
        self.states.insert(state.agent, state);
    }

    /// All agents with planning state, in stable order.
    pub fn known_agents(&self) -> Vec<AgentId> {
        let mut out: Vec<AgentId> = self.states.iter().map(|e| *e.key()).collect();
        out.sort();
        out
    }

    /// All states, for persistence snapshots.
    pub fn all_states(&self) -> Vec<PlanningState> {
        let mut out: Vec<PlanningState> = self.states.iter().map(|e| *e).collect();
        out.sort_by_key(|s| s.agent);
        out
    }
}
