//! Cognitive traits: personality attributes that perturb planning behavior.
//!
//! Each trait carries four modifier coefficients applied per point of an
//! agent's score — capacity, focus, max depth, planning frequency — plus a
//! typed bag of secondary effects. Scores are assigned explicitly per
//! (agent, trait) pair and validated against the trait's declared range;
//! they are never auto-created.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::TelosResult;
use crate::ident::{AgentId, IdAllocator, TraitId};

use super::error::{PlanError, PlanResult};

// ---------------------------------------------------------------------------
// Trait definition
// ---------------------------------------------------------------------------

/// Per-point effect coefficients of a cognitive trait.
///
/// An agent scoring `s` on a trait contributes `s × modifier` to each of the
/// four planning baselines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitModifiers {
    /// Effect on simultaneous high/critical-priority capacity.
    pub capacity: f32,
    /// Effect on the focus score.
    pub focus: f32,
    /// Effect on the maximum objective depth.
    pub max_depth: f32,
    /// Effect on how often the agent replans (in turns).
    pub planning_frequency: f32,
}

/// Typed secondary behaviors a trait can carry beyond the four modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TraitEffect {
    /// Scales how quickly the agent gives up on stalled objectives.
    AbandonmentSensitivity(f32),
    /// Scales how strongly passed deadlines escalate priority for this agent.
    DeadlinePressure(f32),
    /// Bias toward delegating work rather than doing it (positive) or
    /// hoarding it (negative).
    DelegationBias(f32),
}

/// A personality attribute whose score linearly perturbs planning limits.
///
/// Traits are immutable once referenced by scores; retiring one is done by
/// deactivation, which removes it from capacity computation without
/// invalidating existing score rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CognitiveTrait {
    /// Unique identity.
    pub id: TraitId,
    /// Short name, e.g. "Impulsive", "Methodical".
    pub name: String,
    /// What the trait means in narrative terms.
    pub description: String,
    /// Per-point effect coefficients.
    pub modifiers: TraitModifiers,
    /// Valid score range, inclusive on both ends.
    pub score_range: (u8, u8),
    /// Secondary behaviors.
    pub effects: Vec<TraitEffect>,
    /// Deactivated traits keep their score rows but stop contributing to
    /// capacity computation.
    pub active: bool,
}

/// Builder-style description of a trait prior to registration.
#[derive(Debug, Clone)]
pub struct TraitSpec {
    pub name: String,
    pub description: String,
    pub modifiers: TraitModifiers,
    pub score_range: (u8, u8),
    pub effects: Vec<TraitEffect>,
}

impl TraitSpec {
    /// A trait with the conventional 0–10 score range and no secondary
    /// effects.
    pub fn new(name: impl Into<String>, modifiers: TraitModifiers) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            modifiers,
            score_range: (0, 10),
            effects: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_score_range(mut self, min: u8, max: u8) -> Self {
        self.score_range = (min, max);
        self
    }

    pub fn with_effect(mut self, effect: TraitEffect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// One (agent, trait) score row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitScore {
    pub agent: AgentId,
    pub trait_id: TraitId,
    pub score: u8,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Registry of trait definitions and per-agent score rows.
#[derive(Debug, Default)]
pub struct TraitRegistry {
    traits: DashMap<TraitId, CognitiveTrait>,
    scores: DashMap<AgentId, HashMap<TraitId, u8>>,
}

impl TraitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new trait, allocating its identity.
    pub fn register(&self, spec: TraitSpec, alloc: &IdAllocator) -> TelosResult<TraitId> {
        let id = TraitId::from_nonzero(alloc.next_raw()?);
        let (min, max) = spec.score_range;
        self.traits.insert(
            id,
            CognitiveTrait {
                id,
                name: spec.name,
                description: spec.description,
                modifiers: spec.modifiers,
                score_range: (min, max.max(min)),
                effects: spec.effects,
                active: true,
            },
        );
        Ok(id)
    }

    /// Insert a restored trait definition under its original identity.
    pub fn restore(&self, def: CognitiveTrait) {
        self.traits.insert(def.id, def);
    }

    /// Look up a trait definition.
    pub fn get(&self, id: TraitId) -> Option<CognitiveTrait> {
        self.traits.get(&id).map(|t| t.clone())
    }

    /// Deactivate a trait: it stops contributing to capacity computation but
    /// keeps existing score rows intact.
    pub fn deactivate(&self, id: TraitId) -> PlanResult<()> {
        let mut entry = self
            .traits
            .get_mut(&id)
            .ok_or(PlanError::TraitNotFound { trait_id: id.get() })?;
        entry.active = false;
        Ok(())
    }

    /// Assign (or overwrite) an agent's score on a trait, validating it
    /// against the trait's declared range.
    pub fn assign_score(&self, agent: AgentId, trait_id: TraitId, score: u8) -> PlanResult<()> {
        let def = self
            .traits
            .get(&trait_id)
            .ok_or(PlanError::TraitNotFound {
                trait_id: trait_id.get(),
            })?;
        let (min, max) = def.score_range;
        if score < min || score > max {
            return Err(PlanError::ScoreOutOfRange {
                name: def.name.clone(),
                score: score as i64,
                min,
                max,
            });
        }
        drop(def);
        self.scores
            .entry(agent)
            .or_default()
            .insert(trait_id, score);
        Ok(())
    }

    /// Insert a restored score row without re-validation (the row was
    /// validated when first written).
    pub fn restore_score(&self, score: TraitScore) {
        self.scores
            .entry(score.agent)
            .or_default()
            .insert(score.trait_id, score.score);
    }

    /// Remove an agent's score row for a trait. Returns whether it existed.
    pub fn remove_score(&self, agent: AgentId, trait_id: TraitId) -> bool {
        self.scores
            .get_mut(&agent)
            .map(|mut rows| rows.remove(&trait_id).is_some())
            .unwrap_or(false)
    }

    /// All (definition, score) pairs for an agent's *active* traits, the
    /// input the capacity calculator folds over.
    pub fn scored_traits(&self, agent: AgentId) -> Vec<(CognitiveTrait, u8)> {
        let Some(rows) = self.scores.get(&agent) else {
            return Vec::new();
        };
        let mut out: Vec<(CognitiveTrait, u8)> = rows
            .iter()
            .filter_map(|(trait_id, score)| {
                self.traits
                    .get(trait_id)
                    .filter(|def| def.active)
                    .map(|def| (def.clone(), *score))
            })
            .collect();
        // Deterministic fold order regardless of map iteration.
        out.sort_by_key(|(def, _)| def.id);
        out
    }

    /// All score rows for an agent, including rows on deactivated traits.
    pub fn scores_for(&self, agent: AgentId) -> Vec<TraitScore> {
        let Some(rows) = self.scores.get(&agent) else {
            return Vec::new();
        };
        let mut out: Vec<TraitScore> = rows
            .iter()
            .map(|(trait_id, score)| TraitScore {
                agent,
                trait_id: *trait_id,
                score: *score,
            })
            .collect();
        out.sort_by_key(|s| s.trait_id);
        out
    }

    /// All registered trait definitions.
    pub fn all_traits(&self) -> Vec<CognitiveTrait> {
        let mut out: Vec<CognitiveTrait> = self.traits.iter().map(|t| t.clone()).collect();
        out.sort_by_key(|t| t.id);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (TraitRegistry, IdAllocator) {
        (TraitRegistry::new(), IdAllocator::new())
    }

    fn agent(raw: u64) -> AgentId {
        AgentId::new(raw).unwrap()
    }

    #[test]
    fn register_and_score() {
        let (reg, alloc) = registry();
        let id = reg
            .register(
                TraitSpec::new(
                    "Methodical",
                    TraitModifiers {
                        max_depth: 0.2,
                        ..Default::default()
                    },
                ),
                &alloc,
            )
            .unwrap();

        reg.assign_score(agent(1), id, 7).unwrap();
        let scored = reg.scored_traits(agent(1));
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].1, 7);
        assert_eq!(scored[0].0.name, "Methodical");
    }

    #[test]
    fn score_out_of_range_rejected() {
        let (reg, alloc) = registry();
        let id = reg
            .register(
                TraitSpec::new("Impulsive", TraitModifiers::default()).with_score_range(0, 10),
                &alloc,
            )
            .unwrap();

        let err = reg.assign_score(agent(1), id, 11).unwrap_err();
        assert!(matches!(err, PlanError::ScoreOutOfRange { score: 11, .. }));
        assert!(reg.scored_traits(agent(1)).is_empty());
    }

    #[test]
    fn score_on_unknown_trait_rejected() {
        let (reg, _alloc) = registry();
        let ghost = TraitId::new(99).unwrap();
        let err = reg.assign_score(agent(1), ghost, 5).unwrap_err();
        assert!(matches!(err, PlanError::TraitNotFound { trait_id: 99 }));
    }

    #[test]
    fn deactivated_trait_excluded_from_fold_but_keeps_rows() {
        let (reg, alloc) = registry();
        let id = reg
            .register(TraitSpec::new("Restless", TraitModifiers::default()), &alloc)
            .unwrap();
        reg.assign_score(agent(1), id, 4).unwrap();

        reg.deactivate(id).unwrap();
        assert!(reg.scored_traits(agent(1)).is_empty());
        // The score row survives deactivation.
        assert_eq!(reg.scores_for(agent(1)).len(), 1);
    }

    #[test]
    fn overwrite_score_keeps_single_row() {
        let (reg, alloc) = registry();
        let id = reg
            .register(TraitSpec::new("Focused", TraitModifiers::default()), &alloc)
            .unwrap();
        reg.assign_score(agent(1), id, 3).unwrap();
        reg.assign_score(agent(1), id, 8).unwrap();

        let rows = reg.scores_for(agent(1));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].score, 8);
    }
}
