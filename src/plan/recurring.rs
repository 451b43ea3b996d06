//! Recurring objectives: template-driven spawning of periodic needs.
//!
//! Templates describe needs that come back — hunger, sleep, hygiene — with a
//! recurrence rule, a decay window, and priority-escalation thresholds that
//! the decay sweep applies to spawned objectives as they go unattended.
//! Template packs load from TOML; a bundled pack covers the classic needs.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::TelosResult;
use crate::ident::{AgentId, IdAllocator, TemplateId};

use super::error::{PlanError, PlanResult};
use super::objective::{
    MoodImpact, ObjectiveKind, ObjectiveMetadata, ObjectiveSource, Priority,
};
use super::tree::{NewObjective, ObjectiveTree};

// ---------------------------------------------------------------------------
// Template model
// ---------------------------------------------------------------------------

/// When a template becomes due again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceRule {
    /// Due every N turns.
    EveryTurns(u32),
    /// Due once per in-game day (day length set by the engine config).
    OncePerDay,
}

/// Raise a spawned objective's priority once it has been inactive this long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRule {
    pub after_turns_inactive: u32,
    pub raise_to: Priority,
}

/// A reusable pattern for periodic need-objectives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTemplate {
    pub id: TemplateId,
    pub name: String,
    /// May contain `{agent}` and `{turn}` placeholders.
    pub description_template: String,
    /// May contain `{agent}` and `{turn}` placeholders.
    pub success_criteria_template: String,
    pub default_priority: Priority,
    pub decay_after_turns: Option<u32>,
    pub rule: RecurrenceRule,
    pub metadata: ObjectiveMetadata,
    /// Sorted ascending by threshold at registration time.
    pub escalation: Vec<EscalationRule>,
    pub mood_impact: MoodImpact,
    pub active: bool,
}

impl RecurringTemplate {
    /// The highest escalation target whose threshold `turns_inactive` meets,
    /// if any.
    pub fn escalation_for(&self, turns_inactive: u32) -> Option<Priority> {
        self.escalation
            .iter()
            .filter(|rule| turns_inactive >= rule.after_turns_inactive)
            .map(|rule| rule.raise_to)
            .max()
    }
}

/// TOML-facing template description, prior to registration.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub success_criteria: String,
    pub priority: Priority,
    #[serde(default)]
    pub decay_after_turns: Option<u32>,
    pub rule: RecurrenceRule,
    #[serde(default)]
    pub metadata: ObjectiveMetadata,
    #[serde(default)]
    pub escalation: Vec<EscalationRule>,
    #[serde(default)]
    pub mood_impact: Option<MoodImpact>,
}

// ---------------------------------------------------------------------------
// TOML packs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PackToml {
    pack: PackMeta,
    #[serde(default)]
    templates: Vec<TemplateSpec>,
}

#[derive(Debug, Deserialize)]
struct PackMeta {
    name: String,
    #[serde(default)]
    description: String,
}

/// A named collection of template specs loaded from TOML.
#[derive(Debug, Clone)]
pub struct TemplatePack {
    pub name: String,
    pub description: String,
    pub templates: Vec<TemplateSpec>,
}

impl TemplatePack {
    /// Parse a pack from TOML text.
    pub fn from_toml_str(toml_str: &str) -> PlanResult<Self> {
        let parsed: PackToml = toml::from_str(toml_str).map_err(|e| PlanError::TemplatePack {
            message: e.to_string(),
        })?;
        Ok(Self {
            name: parsed.pack.name,
            description: parsed.pack.description,
            templates: parsed.templates,
        })
    }
}

const BASIC_NEEDS_TOML: &str = include_str!("../../data/templates/basic_needs.toml");

/// The bundled pack of classic periodic needs (hunger, sleep, hygiene).
pub fn bundled_basic_needs() -> TemplatePack {
    // The bundled pack is compiled in; a parse failure is a build defect and
    // surfaces in tests, so fall back to an empty pack rather than panicking.
    TemplatePack::from_toml_str(BASIC_NEEDS_TOML).unwrap_or_else(|e| {
        tracing::warn!("failed to parse bundled template pack: {e}");
        TemplatePack {
            name: "basic-needs".into(),
            description: String::new(),
            templates: Vec::new(),
        }
    })
}

// ---------------------------------------------------------------------------
// Registry & spawner
// ---------------------------------------------------------------------------

/// Registry of recurring templates and per-(template, agent) spawn history.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: DashMap<TemplateId, RecurringTemplate>,
    last_spawned: DashMap<(TemplateId, AgentId), u64>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template, allocating its identity. Escalation rules are
    /// sorted by threshold so `escalation_for` reads naturally.
    pub fn register(&self, spec: TemplateSpec, alloc: &IdAllocator) -> TelosResult<TemplateId> {
        let id = TemplateId::from_nonzero(alloc.next_raw()?);
        let mut escalation = spec.escalation;
        escalation.sort_by_key(|rule| rule.after_turns_inactive);
        self.templates.insert(
            id,
            RecurringTemplate {
                id,
                name: spec.name,
                description_template: spec.description,
                success_criteria_template: spec.success_criteria,
                default_priority: spec.priority,
                decay_after_turns: spec.decay_after_turns,
                rule: spec.rule,
                metadata: spec.metadata,
                escalation,
                mood_impact: spec.mood_impact.unwrap_or_default(),
                active: true,
            },
        );
        Ok(id)
    }

    /// Register every template in a pack. Returns the allocated IDs.
    pub fn register_pack(
        &self,
        pack: TemplatePack,
        alloc: &IdAllocator,
    ) -> TelosResult<Vec<TemplateId>> {
        tracing::info!(pack = %pack.name, templates = pack.templates.len(), "registering template pack");
        pack.templates
            .into_iter()
            .map(|spec| self.register(spec, alloc))
            .collect()
    }

    /// Insert a restored template under its original identity.
    pub fn restore(&self, template: RecurringTemplate) {
        self.templates.insert(template.id, template);
    }

    pub fn get(&self, id: TemplateId) -> PlanResult<RecurringTemplate> {
        self.templates
            .get(&id)
            .map(|t| t.clone())
            .ok_or(PlanError::TemplateNotFound {
                template_id: id.get(),
            })
    }

    /// Deactivate a template; it can no longer spawn.
    pub fn deactivate(&self, id: TemplateId) -> PlanResult<()> {
        let mut entry = self
            .templates
            .get_mut(&id)
            .ok_or(PlanError::TemplateNotFound {
                template_id: id.get(),
            })?;
        entry.active = false;
        Ok(())
    }

    /// All registered templates.
    pub fn all_templates(&self) -> Vec<RecurringTemplate> {
        let mut out: Vec<RecurringTemplate> = self.templates.iter().map(|t| t.clone()).collect();
        out.sort_by_key(|t| t.id);
        out
    }

    /// Whether the template is due to spawn for this agent at `turn`.
    pub fn due(&self, id: TemplateId, agent: AgentId, turn: u64, turns_per_day: u64) -> bool {
        let Some(template) = self.templates.get(&id) else {
            return false;
        };
        let interval = match template.rule {
            RecurrenceRule::EveryTurns(n) => n as u64,
            RecurrenceRule::OncePerDay => turns_per_day,
        };
        match self.last_spawned.get(&(id, agent)) {
            Some(last) => turn.saturating_sub(*last) >= interval.max(1),
            None => true,
        }
    }

    /// Spawn a root objective from a template through the tree manager.
    pub fn spawn(
        &self,
        tree: &ObjectiveTree,
        id: TemplateId,
        agent: AgentId,
        session: &str,
        turn: u64,
    ) -> TelosResult<super::objective::Objective> {
        let template = self.get(id)?;
        if !template.active {
            return Err(PlanError::TemplateInactive {
                name: template.name.clone(),
            }
            .into());
        }

        let description = fill(&template.description_template, agent, turn);
        let criteria = fill(&template.success_criteria_template, agent, turn);

        let mut spec = NewObjective::new(agent, description)
            .with_session(session)
            .with_kind(ObjectiveKind::Recurring)
            .with_source(ObjectiveSource::Recurring)
            .with_priority(template.default_priority)
            .with_criteria(criteria)
            .with_metadata(template.metadata.clone())
            .with_template(id)
            .with_mood_impact(template.mood_impact)
            .at_turn(turn);
        if let Some(window) = template.decay_after_turns {
            spec = spec.with_decay_after(window);
        }

        let objective = tree.create(spec)?;
        self.last_spawned.insert((id, agent), turn);
        tracing::debug!(
            template = %template.name,
            agent = %agent,
            objective = %objective.id,
            "spawned recurring objective"
        );
        Ok(objective)
    }
}

/// Substitute the `{agent}` and `{turn}` placeholders.
fn fill(template: &str, agent: AgentId, turn: u64) -> String {
    template
        .replace("{agent}", &agent.get().to_string())
        .replace("{turn}", &turn.to_string())
}
