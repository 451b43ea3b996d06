//! Export types for serializing an agent's plan.
//!
//! These types provide a stable, label-resolved representation of an agent's
//! objective tree and planning state, suitable for JSON hand-off to the
//! narrative layer without exposing internal types.

use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::{StoreError, TelosResult};
use crate::ident::AgentId;
use crate::plan::objective::Objective;
use crate::plan::tree::ObjectiveFilter;

/// Exported objective with flattened identities and labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveExport {
    pub id: u64,
    pub agent: u64,
    pub parent: Option<u64>,
    pub depth: u32,
    pub kind: String,
    pub description: String,
    pub success_criteria: String,
    pub priority: String,
    pub status: String,
    pub source: String,
    pub partial_completion: f32,
    pub turns_inactive: u32,
    pub created_turn: u64,
    pub completed_turn: Option<u64>,
    pub deadline_soft: Option<u64>,
    pub deadline_hard: Option<u64>,
    /// Set when this objective is one side of a delegation pair.
    pub delegated_by: Option<u64>,
    pub delegated_to: Option<u64>,
    pub awaiting_confirmation: bool,
}

impl From<&Objective> for ObjectiveExport {
    fn from(obj: &Objective) -> Self {
        Self {
            id: obj.id.get(),
            agent: obj.agent.get(),
            parent: obj.parent.map(|p| p.get()),
            depth: obj.depth,
            kind: obj.kind.label().into(),
            description: obj.description.clone(),
            success_criteria: obj.success_criteria.clone(),
            priority: obj.priority.label().into(),
            status: obj.status.label().into(),
            source: obj.source.label().into(),
            partial_completion: obj.partial_completion,
            turns_inactive: obj.turns_inactive,
            created_turn: obj.created_turn,
            completed_turn: obj.completed_turn,
            deadline_soft: obj.deadline_soft,
            deadline_hard: obj.deadline_hard,
            delegated_by: obj.delegation.as_ref().map(|d| d.from_agent.get()),
            delegated_to: obj.delegation.as_ref().map(|d| d.to_agent.get()),
            awaiting_confirmation: obj
                .delegation
                .as_ref()
                .is_some_and(|d| d.confirmation_required && !d.confirmation_received),
        }
    }
}

/// Exported planning-state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningStateExport {
    pub max_active_high_priority: u32,
    pub max_objective_depth: u32,
    pub planning_frequency_turns: u32,
    pub focus_score: f32,
    pub current_high_priority: u32,
    pub current_critical_priority: u32,
    pub current_total: u32,
    pub over_capacity: bool,
}

/// One agent's full plan snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPlanExport {
    pub agent: u64,
    pub session: String,
    pub planning_state: Option<PlanningStateExport>,
    /// Priority-ordered, FIFO within a band.
    pub objectives: Vec<ObjectiveExport>,
}

impl Engine {
    /// Snapshot an agent's plan for the narrative layer.
    pub fn export_agent(&self, agent: AgentId) -> AgentPlanExport {
        let planning_state = self.planning_state(agent).ok().map(|state| {
            PlanningStateExport {
                max_active_high_priority: state.limits.max_active_high_priority,
                max_objective_depth: state.limits.max_objective_depth,
                planning_frequency_turns: state.limits.planning_frequency_turns,
                focus_score: state.limits.focus_score,
                current_high_priority: state.counts.high_priority,
                current_critical_priority: state.counts.critical_priority,
                current_total: state.counts.total,
                over_capacity: state.over_capacity(),
            }
        });
        let objectives = self
            .list_objectives(agent, &ObjectiveFilter::default())
            .iter()
            .map(ObjectiveExport::from)
            .collect();
        AgentPlanExport {
            agent: agent.get(),
            session: self.config().session.clone(),
            planning_state,
            objectives,
        }
    }

    /// Snapshot an agent's plan as a JSON string.
    pub fn export_agent_json(&self, agent: AgentId) -> TelosResult<String> {
        let export = self.export_agent(agent);
        serde_json::to_string_pretty(&export).map_err(|e| {
            StoreError::Serialization {
                message: format!("failed to serialize plan export: {e}"),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::plan::objective::Priority;

    #[test]
    fn export_reflects_tree_and_state() {
        let engine = Engine::new(EngineConfig {
            session: "demo".into(),
            auto_spawn_recurring: false,
            ..Default::default()
        })
        .unwrap();
        let agent = AgentId::new(1).unwrap();
        engine
            .on_trait_or_mood_change(agent, Default::default(), 0)
            .unwrap();
        let root = engine
            .create_objective(
                engine
                    .objective(agent, "earn the guild's trust")
                    .with_priority(Priority::High),
            )
            .unwrap();
        engine
            .create_objective(engine.objective(agent, "run an errand").with_parent(root.id))
            .unwrap();

        let export = engine.export_agent(agent);
        assert_eq!(export.session, "demo");
        assert_eq!(export.objectives.len(), 2);
        assert_eq!(export.objectives[0].priority, "high");
        let state = export.planning_state.unwrap();
        assert_eq!(state.current_high_priority, 1);
        assert_eq!(state.current_total, 2);

        let json = engine.export_agent_json(agent).unwrap();
        assert!(json.contains("earn the guild's trust"));
    }
}
