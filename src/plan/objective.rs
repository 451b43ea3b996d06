//! Objective records: the nodes of an agent's planning tree.
//!
//! An [`Objective`] is a tree node keyed by [`ObjectiveId`] with an explicit
//! parent reference and a depth field set once at creation — depth is never
//! recomputed by re-walking ancestors. Hierarchy fields (parent, depth,
//! owner) are immutable after creation; re-parenting happens only through
//! deletion and recreation.

use serde::{Deserialize, Serialize};

use crate::ident::{AgentId, ObjectiveId, TemplateId};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Where an objective sits in the tree-shape taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    /// A top-level goal the agent pursues directly.
    Main,
    /// A sub-goal produced by breaking down a parent.
    Child,
    /// Spawned from a recurring-need template.
    Recurring,
    /// One side of a cross-agent delegation pair.
    Delegated,
}

impl ObjectiveKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Child => "child",
            Self::Recurring => "recurring",
            Self::Delegated => "delegated",
        }
    }
}

impl std::fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Priority band. Declared lowest-first so the derived `Ord` ranks
/// `Critical` highest; listings sort descending on this.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// The next band up, saturating at `Critical`.
    pub fn escalated(self) -> Self {
        match self {
            Self::Low => Self::Medium,
            Self::Medium => Self::High,
            Self::High => Self::Critical,
            Self::Critical => Self::Critical,
        }
    }

    /// Whether this band counts against the high-priority capacity limit.
    pub fn counts_as_high(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of an objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveStatus {
    /// Being worked on (or available to work on).
    Active,
    /// Finished successfully. Terminal.
    Completed,
    /// An external obstacle prevents progress.
    Blocked,
    /// Given up, either explicitly or by inactivity decay. Terminal.
    Abandoned,
    /// Delegate reported done; the delegator has not yet confirmed.
    WaitingConfirmation,
}

impl ObjectiveStatus {
    /// Whether the objective can still change state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }

    /// Whether the objective occupies planning capacity.
    pub fn is_live(self) -> bool {
        !self.is_terminal()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
            Self::Abandoned => "abandoned",
            Self::WaitingConfirmation => "waiting_confirmation",
        }
    }
}

impl std::fmt::Display for ObjectiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// How an objective came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveSource {
    /// Seeded at character creation.
    Initial,
    /// Handed over by another agent.
    Delegated,
    /// Generated by the agent's own planning (breakdown, tracking).
    Internal,
    /// Spawned from a recurring-need template.
    Recurring,
    /// Reaction to a world event.
    Event,
}

impl ObjectiveSource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Delegated => "delegated",
            Self::Internal => "internal",
            Self::Recurring => "recurring",
            Self::Event => "event",
        }
    }
}

impl std::fmt::Display for ObjectiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Delegation block
// ---------------------------------------------------------------------------

/// Cross-agent hand-off bookkeeping carried by both sides of a delegation
/// pair. The working objective (owned by `to_agent`) and the tracking
/// objective (owned by `from_agent`) reference each other via `counterpart`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delegation {
    /// The agent that handed the task off.
    pub from_agent: AgentId,
    /// The agent doing the work.
    pub to_agent: AgentId,
    /// Whether completion must be confirmed by the delegator.
    pub confirmation_required: bool,
    /// Set once the delegator confirms.
    pub confirmation_received: bool,
    /// Turn on which confirmation happened.
    pub confirmation_turn: Option<u64>,
    /// The other objective of the pair.
    pub counterpart: Option<ObjectiveId>,
}

impl Delegation {
    /// A fresh, unconfirmed delegation between two agents.
    pub fn new(from_agent: AgentId, to_agent: AgentId, confirmation_required: bool) -> Self {
        Self {
            from_agent,
            to_agent,
            confirmation_required,
            confirmation_received: false,
            confirmation_turn: None,
            counterpart: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata & mood impact
// ---------------------------------------------------------------------------

/// Typed per-kind payload attached to an objective.
///
/// A closed union of the known payload shapes rather than a free-form map,
/// so downstream systems match exhaustively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveMetadata {
    /// No extra payload.
    #[default]
    None,
    /// Movement goal: where the agent needs to be.
    Navigation { target_location: String },
    /// Acquisition goal: what and how much.
    Acquisition { item: String, quantity_needed: u32 },
    /// Recovery goal: how much rest is owed.
    Rest { hours_needed: f32 },
}

/// Signed mood-impact magnitudes reported to the external mood subsystem
/// when an objective reaches a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoodImpact {
    /// Reward magnitude emitted on completion.
    pub on_success: f32,
    /// Penalty magnitude emitted on abandonment.
    pub on_failure: f32,
}

impl Default for MoodImpact {
    fn default() -> Self {
        Self {
            on_success: 0.0,
            on_failure: 0.0,
        }
    }
}

/// One-way notification emitted when an objective reaches a terminal status.
///
/// Completion carries the positive magnitude, abandonment the negative one;
/// the other field is zero. The mood subsystem is never awaited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoodEvent {
    pub agent: AgentId,
    pub objective: ObjectiveId,
    pub turn: u64,
    pub positive: f32,
    pub negative: f32,
}

/// Receiver for [`MoodEvent`]s, implemented by the external mood subsystem.
pub trait MoodSink: Send + Sync {
    fn on_mood_event(&self, event: MoodEvent);
}

// ---------------------------------------------------------------------------
// Objective
// ---------------------------------------------------------------------------

/// A goal node in an agent's planning tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    /// Unique identity. ID order is creation order.
    pub id: ObjectiveId,
    /// Owning agent. Immutable.
    pub agent: AgentId,
    /// Game/session the objective belongs to, named by the simulation.
    pub session: String,
    /// Parent node, if this is not a root. Immutable.
    pub parent: Option<ObjectiveId>,
    /// Distance from the root: 0 for roots, `parent.depth + 1` otherwise.
    /// Set once at creation, never recomputed.
    pub depth: u32,
    /// Tree-shape taxonomy.
    pub kind: ObjectiveKind,
    /// What the agent is trying to do.
    pub description: String,
    /// How the agent knows it is done.
    pub success_criteria: String,
    /// Priority band.
    pub priority: Priority,
    /// Current status.
    pub status: ObjectiveStatus,
    /// How the objective came to exist.
    pub source: ObjectiveSource,
    /// Delegation bookkeeping; required when `kind == Delegated`.
    pub delegation: Option<Delegation>,
    /// Passing this turn escalates priority.
    pub deadline_soft: Option<u64>,
    /// Passing this turn forces abandonment.
    pub deadline_hard: Option<u64>,
    /// Turn the objective was created.
    pub created_turn: u64,
    /// Turn the objective completed. Set iff status is `Completed`.
    pub completed_turn: Option<u64>,
    /// Last turn the decay sweep or a progress update touched this node.
    pub last_evaluated_turn: u64,
    /// Inactivity window after which the decay sweep abandons this node.
    /// `None` disables decay.
    pub decay_after_turns: Option<u32>,
    /// Consecutive turns without progress. Reset to 0 by progress updates.
    pub turns_inactive: u32,
    /// Fractional completion in [0, 1]. Reaching 1.0 completes the
    /// objective exactly once.
    pub partial_completion: f32,
    /// Leaf objective completable within a single turn.
    pub is_atomic: bool,
    /// Typed per-kind payload.
    pub metadata: ObjectiveMetadata,
    /// Template this objective was spawned from, for recurring objectives.
    pub template: Option<TemplateId>,
    /// Magnitudes reported to the mood subsystem on terminal transitions.
    pub mood_impact: MoodImpact,
}

impl Objective {
    /// Whether this node is a tree root.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// The delegating agent, when this objective is one side of a pair.
    pub fn delegator(&self) -> Option<AgentId> {
        self.delegation.as_ref().map(|d| d.from_agent)
    }
}

// ---------------------------------------------------------------------------
// Progress log
// ---------------------------------------------------------------------------

/// Append-only record of a progress delta applied to an objective.
///
/// Entries are never mutated after creation; the log exists for audit and
/// history only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressLogEntry {
    /// The objective the delta was applied to.
    pub objective: ObjectiveId,
    /// Turn the delta was applied.
    pub turn: u64,
    /// What the agent did.
    pub action: Option<String>,
    /// The delta applied (before clamping to 1.0).
    pub delta: f32,
    /// Status after the delta was applied.
    pub resulting_status: ObjectiveStatus,
    /// Free-text notes.
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_puts_critical_on_top() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn priority_escalation_saturates() {
        assert_eq!(Priority::Low.escalated(), Priority::Medium);
        assert_eq!(Priority::Medium.escalated(), Priority::High);
        assert_eq!(Priority::High.escalated(), Priority::Critical);
        assert_eq!(Priority::Critical.escalated(), Priority::Critical);
    }

    #[test]
    fn high_and_critical_count_against_capacity() {
        assert!(Priority::Critical.counts_as_high());
        assert!(Priority::High.counts_as_high());
        assert!(!Priority::Medium.counts_as_high());
        assert!(!Priority::Low.counts_as_high());
    }

    #[test]
    fn terminal_statuses() {
        assert!(ObjectiveStatus::Completed.is_terminal());
        assert!(ObjectiveStatus::Abandoned.is_terminal());
        assert!(!ObjectiveStatus::Active.is_terminal());
        assert!(!ObjectiveStatus::Blocked.is_terminal());
        assert!(!ObjectiveStatus::WaitingConfirmation.is_terminal());
    }

    #[test]
    fn status_labels_roundtrip_through_display() {
        assert_eq!(ObjectiveStatus::WaitingConfirmation.to_string(), "waiting_confirmation");
        assert_eq!(ObjectiveKind::Delegated.to_string(), "delegated");
        assert_eq!(ObjectiveSource::Event.to_string(), "event");
    }

    #[test]
    fn metadata_defaults_to_none() {
        assert_eq!(ObjectiveMetadata::default(), ObjectiveMetadata::None);
    }
}
