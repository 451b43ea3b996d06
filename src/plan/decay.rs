//! Turn-driven decay: inactivity tracking, deadline pressure, abandonment.
//!
//! `advance_turn` is invoked by the external turn loop exactly once per
//! agent per advancing turn. It increments the inactivity counter on every
//! active objective that saw no progress this turn, applies recurring
//! escalation rules and deadline pressure, and abandons objectives whose
//! decay window has run out. Decay never deletes — removal is only ever an
//! explicit `ObjectiveTree::delete`.

use serde::{Deserialize, Serialize};

use crate::error::TelosResult;
use crate::ident::AgentId;

use super::objective::{ObjectiveStatus, Priority};
use super::recurring::TemplateRegistry;
use super::tree::{ObjectiveFilter, ObjectiveTree};

/// What one sweep did, for caller telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecaySummary {
    /// Active objectives examined.
    pub scanned: u32,
    /// Objectives whose inactivity counter advanced.
    pub incremented: u32,
    /// Objectives whose priority was raised (escalation rules or soft
    /// deadlines).
    pub escalated: u32,
    /// Objectives abandoned (decay window or hard deadline).
    pub abandoned: u32,
}

/// Sweep one agent's active objectives for the given turn.
///
/// The calling contract is exactly-once per (agent, turn); a duplicate call
/// for the same turn is detected via `last_evaluated_turn` and does not
/// double-increment. Objectives that progressed this turn (progress resets
/// their counter and stamps the turn) are left untouched.
pub fn advance_turn(
    tree: &ObjectiveTree,
    templates: &TemplateRegistry,
    agent: AgentId,
    current_turn: u64,
) -> TelosResult<DecaySummary> {
    let mut summary = DecaySummary::default();

    let active = tree.list(
        agent,
        &ObjectiveFilter {
            status: Some(ObjectiveStatus::Active),
            ..Default::default()
        },
    );

    for mut obj in active {
        summary.scanned += 1;

        // Progressed, created, or already swept this turn.
        if obj.last_evaluated_turn >= current_turn {
            continue;
        }

        obj.turns_inactive += 1;
        obj.last_evaluated_turn = current_turn;
        summary.incremented += 1;

        let mut raised = false;

        // Recurring escalation rules, highest met threshold wins.
        if let Some(template_id) = obj.template {
            if let Ok(template) = templates.get(template_id) {
                if let Some(target) = template.escalation_for(obj.turns_inactive) {
                    if target > obj.priority {
                        tracing::debug!(
                            objective = %obj.id,
                            from = %obj.priority,
                            to = %target,
                            turns_inactive = obj.turns_inactive,
                            "escalating recurring objective"
                        );
                        obj.priority = target;
                        raised = true;
                    }
                }
            }
        }

        // A passed soft deadline ratchets priority one band per sweep.
        if let Some(soft) = obj.deadline_soft {
            if current_turn > soft && obj.priority < Priority::Critical {
                obj.priority = obj.priority.escalated();
                raised = true;
            }
        }
        if raised {
            summary.escalated += 1;
        }

        tree.put_swept(&obj)?;

        // A passed hard deadline forces abandonment.
        let hard_passed = obj.deadline_hard.is_some_and(|hard| current_turn > hard);
        // Decay window exhausted.
        let decayed = obj
            .decay_after_turns
            .is_some_and(|window| obj.turns_inactive >= window);

        if hard_passed || decayed {
            abandon_with_counterpart(tree, &obj, current_turn)?;
            summary.abandoned += 1;
        }
    }

    if summary.abandoned > 0 || summary.escalated > 0 {
        tracing::debug!(
            agent = %agent,
            turn = current_turn,
            scanned = summary.scanned,
            escalated = summary.escalated,
            abandoned = summary.abandoned,
            "decay sweep"
        );
    }
    Ok(summary)
}

/// Abandon an objective, taking the other side of a delegation pair with it.
fn abandon_with_counterpart(
    tree: &ObjectiveTree,
    obj: &super::objective::Objective,
    turn: u64,
) -> TelosResult<()> {
    tree.transition(obj.id, ObjectiveStatus::Abandoned, turn)?;
    if let Some(counterpart) = obj.delegation.as_ref().and_then(|d| d.counterpart) {
        if let Ok(other) = tree.get(counterpart) {
            if other.status.is_live() {
                tree.transition(counterpart, ObjectiveStatus::Abandoned, turn)?;
            }
        }
    }
    Ok(())
}
