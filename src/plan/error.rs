//! Planning-layer error types with rich miette diagnostics.
//!
//! Everything here indicates caller misuse, not transient failure: none of
//! these are retried internally, and every variant is synchronously returned
//! to the caller for local recovery.

use miette::Diagnostic;
use thiserror::Error;

/// Errors from the planning layer (objective trees, capacity, delegation,
/// recurring templates).
#[derive(Debug, Error, Diagnostic)]
pub enum PlanError {
    #[error("objective depth {depth} exceeds the agent's limit of {max}")]
    #[diagnostic(
        code(telos::plan::depth_exceeded),
        help(
            "The owning agent cannot plan this deep. Flatten the breakdown or \
             attach the new objective to a shallower parent."
        )
    )]
    DepthExceeded { depth: u32, max: u32 },

    #[error("objective not found: {objective_id}")]
    #[diagnostic(
        code(telos::plan::objective_not_found),
        help("The objective does not exist. It may have been deleted with its subtree.")
    )]
    ObjectiveNotFound { objective_id: u64 },

    #[error("cognitive trait not found: {trait_id}")]
    #[diagnostic(
        code(telos::plan::trait_not_found),
        help("Register the trait before assigning scores against it.")
    )]
    TraitNotFound { trait_id: u64 },

    #[error("recurring template not found: {template_id}")]
    #[diagnostic(
        code(telos::plan::template_not_found),
        help("Register the template (or load a template pack) before spawning from it.")
    )]
    TemplateNotFound { template_id: u64 },

    #[error("no planning state for agent {agent_id}")]
    #[diagnostic(
        code(telos::plan::state_not_found),
        help(
            "The agent has never had its planning limits computed. \
             Call `on_trait_or_mood_change` (or assign a trait score) first."
        )
    )]
    StateNotFound { agent_id: u64 },

    #[error("delegated objective {objective_id} has no delegating agent")]
    #[diagnostic(
        code(telos::plan::invalid_delegation),
        help("An objective of kind `Delegated` must carry a delegation block naming the delegator.")
    )]
    InvalidDelegation { objective_id: u64 },

    #[error("invalid transition for objective {objective_id}: {from} → {to}")]
    #[diagnostic(
        code(telos::plan::invalid_transition),
        help(
            "The objective is not in a status that permits this operation. \
             Confirmation requires `waiting_confirmation`; progress requires `active`."
        )
    )]
    InvalidTransition {
        objective_id: u64,
        from: String,
        to: String,
    },

    #[error("template pack failed to parse: {message}")]
    #[diagnostic(
        code(telos::plan::template_pack),
        help("Check the pack TOML against the documented template schema.")
    )]
    TemplatePack { message: String },

    #[error("template \"{name}\" is deactivated")]
    #[diagnostic(
        code(telos::plan::template_inactive),
        help("Deactivated templates cannot spawn objectives. Register a replacement template.")
    )]
    TemplateInactive { name: String },

    #[error("score {score} outside the valid range [{min}, {max}] for trait \"{name}\"")]
    #[diagnostic(
        code(telos::plan::score_out_of_range),
        help("Clamp the score to the trait's declared range before assigning it.")
    )]
    ScoreOutOfRange {
        name: String,
        score: i64,
        min: u8,
        max: u8,
    },
}

/// Convenience alias for planning operations.
pub type PlanResult<T> = std::result::Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_exceeded_message_names_both_sides() {
        let err = PlanError::DepthExceeded { depth: 3, max: 2 };
        let msg = err.to_string();
        assert!(msg.contains('3') && msg.contains('2'));
    }

    #[test]
    fn invalid_transition_names_statuses() {
        let err = PlanError::InvalidTransition {
            objective_id: 9,
            from: "active".into(),
            to: "completed".into(),
        };
        assert!(err.to_string().contains("active → completed"));
    }
}
