//! Cross-agent delegation with an optional confirmation handshake.
//!
//! A delegation is a pair of objectives: the delegate's *working* objective
//! (owned by the agent doing the task) and the delegator's *tracking*
//! objective (owned by the agent that handed it off). Both carry the same
//! delegation block and reference each other via `counterpart`. The state
//! machine per pair:
//!
//! ```text
//! active ── mark_delegate_complete ──▶ waiting_confirmation ── confirm ──▶ completed
//!   │                                        │
//!   ├── withdraw / decay ──▶ abandoned ◀─────┘
//!   └── blocked ──▶ active | abandoned
//! ```
//!
//! Without a confirmation requirement, `mark_delegate_complete` completes
//! both sides immediately.

use crate::error::TelosResult;
use crate::ident::{AgentId, ObjectiveId};

use super::error::PlanError;
use super::objective::{
    Delegation, MoodImpact, Objective, ObjectiveKind, ObjectiveSource, ObjectiveStatus, Priority,
};
use super::tree::{NewObjective, ObjectiveFilter, ObjectiveTree};

/// Everything needed to hand a task to another agent.
#[derive(Debug, Clone)]
pub struct DelegationSpec {
    pub from_agent: AgentId,
    pub to_agent: AgentId,
    pub session: String,
    pub description: String,
    pub success_criteria: String,
    pub priority: Priority,
    pub confirmation_required: bool,
    pub decay_after_turns: Option<u32>,
    pub mood_impact: MoodImpact,
    pub turn: u64,
}

impl DelegationSpec {
    pub fn new(
        from_agent: AgentId,
        to_agent: AgentId,
        description: impl Into<String>,
        confirmation_required: bool,
    ) -> Self {
        Self {
            from_agent,
            to_agent,
            session: "default".into(),
            description: description.into(),
            success_criteria: String::new(),
            priority: Priority::Medium,
            confirmation_required,
            decay_after_turns: None,
            mood_impact: MoodImpact::default(),
            turn: 0,
        }
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = session.into();
        self
    }

    pub fn with_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.success_criteria = criteria.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_decay_after(mut self, turns: u32) -> Self {
        self.decay_after_turns = Some(turns);
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

/// The two objectives created by a delegation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelegationPair {
    /// The delegator's side.
    pub tracking: ObjectiveId,
    /// The delegate's side.
    pub working: ObjectiveId,
}

/// Create both sides of a delegation.
///
/// The working objective goes to `to_agent` with source `delegated`; the
/// tracking objective stays with `from_agent` with source `internal`. Both
/// are roots in their owners' trees.
pub fn delegate(tree: &ObjectiveTree, spec: DelegationSpec) -> TelosResult<DelegationPair> {
    let block = Delegation::new(spec.from_agent, spec.to_agent, spec.confirmation_required);

    let mut working_spec = NewObjective::new(spec.to_agent, spec.description.clone())
        .with_session(spec.session.clone())
        .with_kind(ObjectiveKind::Delegated)
        .with_source(ObjectiveSource::Delegated)
        .with_priority(spec.priority)
        .with_criteria(spec.success_criteria.clone())
        .with_delegation(block.clone())
        .with_mood_impact(spec.mood_impact)
        .at_turn(spec.turn);
    if let Some(window) = spec.decay_after_turns {
        working_spec = working_spec.with_decay_after(window);
    }
    let working = tree.create(working_spec)?;

    let mut tracking_spec = NewObjective::new(
        spec.from_agent,
        format!("Await: {}", spec.description),
    )
    .with_session(spec.session)
    .with_kind(ObjectiveKind::Delegated)
    .with_source(ObjectiveSource::Internal)
    .with_priority(spec.priority)
    .with_criteria(spec.success_criteria)
    .with_delegation(block)
    .with_mood_impact(spec.mood_impact)
    .at_turn(spec.turn);
    if let Some(window) = spec.decay_after_turns {
        tracking_spec = tracking_spec.with_decay_after(window);
    }
    let tracking = tree.create(tracking_spec)?;

    // Cross-link the pair.
    tree.update_delegation(working.id, |d| d.counterpart = Some(tracking.id))?;
    tree.update_delegation(tracking.id, |d| d.counterpart = Some(working.id))?;

    tracing::debug!(
        from = %spec.from_agent,
        to = %spec.to_agent,
        working = %working.id,
        tracking = %tracking.id,
        confirmation = spec.confirmation_required,
        "delegated objective"
    );
    Ok(DelegationPair {
        tracking: tracking.id,
        working: working.id,
    })
}

/// Resolve an objective and its counterpart, erroring when the objective is
/// not part of a delegation pair.
fn resolve_pair(tree: &ObjectiveTree, id: ObjectiveId) -> TelosResult<(Objective, Option<Objective>)> {
    let obj = tree.get(id)?;
    let delegation = obj
        .delegation
        .clone()
        .ok_or(PlanError::InvalidDelegation {
            objective_id: id.get(),
        })?;
    let counterpart = delegation
        .counterpart
        .and_then(|other| tree.get(other).ok());
    Ok((obj, counterpart))
}

/// The delegate reports its side done.
///
/// Requires the objective to be `active`; either side of the pair may be
/// passed, and both transition together. Moves the pair to
/// `waiting_confirmation` when confirmation is required, otherwise completes
/// both immediately.
pub fn mark_delegate_complete(
    tree: &ObjectiveTree,
    id: ObjectiveId,
    turn: u64,
) -> TelosResult<Objective> {
    let (obj, counterpart) = resolve_pair(tree, id)?;
    if obj.status != ObjectiveStatus::Active {
        return Err(PlanError::InvalidTransition {
            objective_id: id.get(),
            from: obj.status.label().into(),
            to: ObjectiveStatus::WaitingConfirmation.label().into(),
        }
        .into());
    }

    let confirmation_required = obj
        .delegation
        .as_ref()
        .is_some_and(|d| d.confirmation_required);

    let target = if confirmation_required {
        ObjectiveStatus::WaitingConfirmation
    } else {
        ObjectiveStatus::Completed
    };

    let updated = tree.transition(obj.id, target, turn)?;
    if let Some(other) = counterpart {
        if other.status.is_live() {
            tree.transition(other.id, target, turn)?;
        }
    }
    tracing::debug!(objective = %obj.id, status = %target, "delegate reported done");
    Ok(updated)
}

/// The delegator confirms a completed hand-off.
///
/// Valid only while the pair is `waiting_confirmation`; any other status
/// returns `InvalidTransition` and leaves state unchanged. Stamps the
/// confirmation on both delegation blocks and completes both sides.
pub fn confirm(tree: &ObjectiveTree, id: ObjectiveId, turn: u64) -> TelosResult<Objective> {
    let (obj, counterpart) = resolve_pair(tree, id)?;
    if obj.status != ObjectiveStatus::WaitingConfirmation {
        return Err(PlanError::InvalidTransition {
            objective_id: id.get(),
            from: obj.status.label().into(),
            to: ObjectiveStatus::Completed.label().into(),
        }
        .into());
    }

    tree.update_delegation(obj.id, |d| {
        d.confirmation_received = true;
        d.confirmation_turn = Some(turn);
    })?;
    if let Some(other) = &counterpart {
        tree.update_delegation(other.id, |d| {
            d.confirmation_received = true;
            d.confirmation_turn = Some(turn);
        })?;
    }

    let updated = tree.transition(obj.id, ObjectiveStatus::Completed, turn)?;
    if let Some(other) = counterpart {
        if other.status.is_live() {
            tree.transition(other.id, ObjectiveStatus::Completed, turn)?;
        }
    }
    tracing::debug!(objective = %obj.id, turn, "delegation confirmed");
    Ok(updated)
}

/// Either party withdraws: both sides of the pair are abandoned.
pub fn withdraw(tree: &ObjectiveTree, id: ObjectiveId, turn: u64) -> TelosResult<Objective> {
    let (obj, counterpart) = resolve_pair(tree, id)?;
    if obj.status.is_terminal() {
        return Err(PlanError::InvalidTransition {
            objective_id: id.get(),
            from: obj.status.label().into(),
            to: ObjectiveStatus::Abandoned.label().into(),
        }
        .into());
    }

    let updated = tree.transition(obj.id, ObjectiveStatus::Abandoned, turn)?;
    if let Some(other) = counterpart {
        if other.status.is_live() {
            tree.transition(other.id, ObjectiveStatus::Abandoned, turn)?;
        }
    }
    tracing::debug!(objective = %obj.id, "delegation withdrawn");
    Ok(updated)
}

/// All of a delegator's tracking objectives awaiting their confirmation.
pub fn list_awaiting_confirmation(tree: &ObjectiveTree, delegator: AgentId) -> Vec<Objective> {
    tree.list(
        delegator,
        &ObjectiveFilter {
            status: Some(ObjectiveStatus::WaitingConfirmation),
            ..Default::default()
        },
    )
    .into_iter()
    .filter(|obj| {
        obj.delegation.as_ref().is_some_and(|d| {
            d.from_agent == delegator && d.confirmation_required && !d.confirmation_received
        })
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::IdAllocator;
    use crate::plan::state::PlanningStateTracker;
    use crate::store::PlanStore;
    use std::sync::Arc;

    fn tree() -> ObjectiveTree {
        ObjectiveTree::new(
            Arc::new(PlanStore::memory_only()),
            Arc::new(PlanningStateTracker::new()),
            Arc::new(IdAllocator::new()),
        )
    }

    fn agent(raw: u64) -> AgentId {
        AgentId::new(raw).unwrap()
    }

    #[test]
    fn delegate_creates_cross_linked_pair() {
        let tree = tree();
        let pair = delegate(
            &tree,
            DelegationSpec::new(agent(1), agent(2), "fetch herbs", true).at_turn(5),
        )
        .unwrap();

        let working = tree.get(pair.working).unwrap();
        let tracking = tree.get(pair.tracking).unwrap();

        assert_eq!(working.agent, agent(2));
        assert_eq!(working.kind, ObjectiveKind::Delegated);
        assert_eq!(working.source, ObjectiveSource::Delegated);
        assert_eq!(tracking.agent, agent(1));
        assert_eq!(tracking.source, ObjectiveSource::Internal);

        assert_eq!(
            working.delegation.as_ref().unwrap().counterpart,
            Some(tracking.id)
        );
        assert_eq!(
            tracking.delegation.as_ref().unwrap().counterpart,
            Some(working.id)
        );
        assert_eq!(working.delegator(), Some(agent(1)));
    }

    #[test]
    fn full_handshake_with_confirmation() {
        let tree = tree();
        let pair = delegate(
            &tree,
            DelegationSpec::new(agent(1), agent(2), "fetch herbs", true).at_turn(10),
        )
        .unwrap();

        mark_delegate_complete(&tree, pair.working, 15).unwrap();
        assert_eq!(
            tree.get(pair.working).unwrap().status,
            ObjectiveStatus::WaitingConfirmation
        );
        assert_eq!(
            tree.get(pair.tracking).unwrap().status,
            ObjectiveStatus::WaitingConfirmation
        );

        let awaiting = list_awaiting_confirmation(&tree, agent(1));
        assert_eq!(awaiting.len(), 1);
        assert_eq!(awaiting[0].id, pair.tracking);

        confirm(&tree, pair.tracking, 20).unwrap();
        let working = tree.get(pair.working).unwrap();
        let tracking = tree.get(pair.tracking).unwrap();
        assert_eq!(working.status, ObjectiveStatus::Completed);
        assert_eq!(tracking.status, ObjectiveStatus::Completed);
        assert_eq!(working.delegation.as_ref().unwrap().confirmation_turn, Some(20));
        assert_eq!(tracking.delegation.as_ref().unwrap().confirmation_turn, Some(20));
        assert!(working.delegation.as_ref().unwrap().confirmation_received);
        assert_eq!(working.completed_turn, Some(20));

        assert!(list_awaiting_confirmation(&tree, agent(1)).is_empty());
    }

    #[test]
    fn no_confirmation_completes_immediately() {
        let tree = tree();
        let pair = delegate(
            &tree,
            DelegationSpec::new(agent(1), agent(2), "sweep the stables", false).at_turn(3),
        )
        .unwrap();

        mark_delegate_complete(&tree, pair.working, 7).unwrap();
        assert_eq!(
            tree.get(pair.working).unwrap().status,
            ObjectiveStatus::Completed
        );
        assert_eq!(
            tree.get(pair.tracking).unwrap().status,
            ObjectiveStatus::Completed
        );
        assert!(list_awaiting_confirmation(&tree, agent(1)).is_empty());
    }

    #[test]
    fn confirm_outside_waiting_confirmation_is_invalid() {
        let tree = tree();
        let pair = delegate(
            &tree,
            DelegationSpec::new(agent(1), agent(2), "fetch herbs", true),
        )
        .unwrap();

        // Still active: confirm must fail and change nothing.
        let err = confirm(&tree, pair.working, 9).unwrap_err();
        assert!(matches!(
            err,
            crate::error::TelosError::Plan(PlanError::InvalidTransition { .. })
        ));
        let working = tree.get(pair.working).unwrap();
        assert_eq!(working.status, ObjectiveStatus::Active);
        assert!(!working.delegation.as_ref().unwrap().confirmation_received);

        // Completed: confirm must also fail.
        mark_delegate_complete(&tree, pair.working, 10).unwrap();
        confirm(&tree, pair.working, 11).unwrap();
        let err = confirm(&tree, pair.working, 12).unwrap_err();
        assert!(matches!(
            err,
            crate::error::TelosError::Plan(PlanError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn mark_complete_twice_is_invalid() {
        let tree = tree();
        let pair = delegate(
            &tree,
            DelegationSpec::new(agent(1), agent(2), "fetch herbs", true),
        )
        .unwrap();

        mark_delegate_complete(&tree, pair.working, 5).unwrap();
        let err = mark_delegate_complete(&tree, pair.working, 6).unwrap_err();
        assert!(matches!(
            err,
            crate::error::TelosError::Plan(PlanError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn withdraw_abandons_both_sides() {
        let tree = tree();
        let pair = delegate(
            &tree,
            DelegationSpec::new(agent(1), agent(2), "fetch herbs", true),
        )
        .unwrap();

        withdraw(&tree, pair.tracking, 4).unwrap();
        assert_eq!(
            tree.get(pair.working).unwrap().status,
            ObjectiveStatus::Abandoned
        );
        assert_eq!(
            tree.get(pair.tracking).unwrap().status,
            ObjectiveStatus::Abandoned
        );

        // Terminal now — withdrawing again is invalid.
        let err = withdraw(&tree, pair.tracking, 5).unwrap_err();
        assert!(matches!(
            err,
            crate::error::TelosError::Plan(PlanError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn blocked_working_side_can_resume_or_abandon() {
        let tree = tree();
        let pair = delegate(
            &tree,
            DelegationSpec::new(agent(1), agent(2), "fetch herbs", true),
        )
        .unwrap();

        tree.update_status(pair.working, ObjectiveStatus::Blocked, None)
            .unwrap();
        tree.update_status(pair.working, ObjectiveStatus::Active, None)
            .unwrap();
        assert_eq!(
            tree.get(pair.working).unwrap().status,
            ObjectiveStatus::Active
        );
    }

    #[test]
    fn operations_on_non_delegated_objective_fail() {
        let tree = tree();
        let plain = tree
            .create(NewObjective::new(agent(1), "solo work"))
            .unwrap();

        let err = mark_delegate_complete(&tree, plain.id, 1).unwrap_err();
        assert!(matches!(
            err,
            crate::error::TelosError::Plan(PlanError::InvalidDelegation { .. })
        ));
    }

    #[test]
    fn decay_takes_the_counterpart_down() {
        use crate::plan::decay::advance_turn;
        use crate::plan::recurring::TemplateRegistry;

        let tree = tree();
        let templates = TemplateRegistry::new();
        let pair = delegate(
            &tree,
            DelegationSpec::new(agent(1), agent(2), "fetch herbs", true)
                .with_decay_after(2)
                .at_turn(0),
        )
        .unwrap();

        advance_turn(&tree, &templates, agent(2), 1).unwrap();
        let summary = advance_turn(&tree, &templates, agent(2), 2).unwrap();
        assert_eq!(summary.abandoned, 1);

        assert_eq!(
            tree.get(pair.working).unwrap().status,
            ObjectiveStatus::Abandoned
        );
        assert_eq!(
            tree.get(pair.tracking).unwrap().status,
            ObjectiveStatus::Abandoned
        );
    }
}
