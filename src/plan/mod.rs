//! Planning layer: objective trees, trait-derived capacity, decay,
//! delegation, and recurring needs.
//!
//! The layer is built leaf-to-root:
//! - **Traits** (`traits`): cognitive trait definitions and per-agent scores
//! - **Capacity** (`capacity`): pure fold of scores into planning limits
//! - **State** (`state`): per-agent limits plus live load counters
//! - **Objectives** (`objective`): the tree-node records and their enums
//! - **Tree** (`tree`): creation, reads, status machine, cascade deletion
//! - **Decay** (`decay`): turn-driven inactivity sweep and deadlines
//! - **Delegation** (`delegation`): two-sided hand-off with confirmation
//! - **Recurring** (`recurring`): template-driven periodic needs

pub mod capacity;
pub mod decay;
pub mod delegation;
pub mod error;
pub mod objective;
pub mod recurring;
pub mod state;
pub mod traits;
pub mod tree;

pub use capacity::{compute_limits, Multipliers, PlanningLimits};
pub use decay::{advance_turn, DecaySummary};
pub use delegation::{
    confirm, delegate, list_awaiting_confirmation, mark_delegate_complete, withdraw,
    DelegationPair, DelegationSpec,
};
pub use error::{PlanError, PlanResult};
pub use objective::{
    Delegation, MoodEvent, MoodImpact, MoodSink, Objective, ObjectiveKind, ObjectiveMetadata,
    ObjectiveSource, ObjectiveStatus, Priority, ProgressLogEntry,
};
pub use recurring::{
    bundled_basic_needs, EscalationRule, RecurrenceRule, RecurringTemplate, TemplatePack,
    TemplateRegistry, TemplateSpec,
};
pub use state::{ObjectiveCounts, PlanningState, PlanningStateTracker};
pub use traits::{
    CognitiveTrait, TraitEffect, TraitModifiers, TraitRegistry, TraitScore, TraitSpec,
};
pub use tree::{NewObjective, ObjectiveFilter, ObjectiveTree, ObjectiveUpdate, SubtreeNode};
