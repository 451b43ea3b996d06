//! Capacity calculation: fold trait scores into an agent's planning limits.
//!
//! A pure function of its inputs: base values plus `Σ(score × modifier)`
//! over every active trait the agent holds, then the transient multipliers,
//! then clamping. Re-run whenever a trait score or a multiplier changes;
//! the result is persisted onto the agent's [`PlanningState`]
//! (`crate::plan::state::PlanningState`) by the engine.

use serde::{Deserialize, Serialize};

use super::traits::CognitiveTrait;

/// Baseline simultaneous high/critical-priority objectives.
pub const BASE_CAPACITY: f32 = 3.0;
/// Baseline maximum objective depth.
pub const BASE_DEPTH: f32 = 3.0;
/// Baseline replanning interval in turns.
pub const BASE_FREQUENCY: f32 = 5.0;
/// Baseline focus score.
pub const BASE_FOCUS: f32 = 5.0;

/// Hard bounds on the computed depth limit.
pub const DEPTH_BOUNDS: (u32, u32) = (1, 5);

/// Trait-derived planning limits for one agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanningLimits {
    /// Maximum simultaneous high/critical-priority objectives the agent can
    /// sustain. Advisory, not admission control.
    pub max_active_high_priority: u32,
    /// Maximum objective depth. The one hard constraint at creation.
    pub max_objective_depth: u32,
    /// How often the agent replans, in turns.
    pub planning_frequency_turns: u32,
    /// Focus score in [0, 10].
    pub focus_score: f32,
}

impl Default for PlanningLimits {
    fn default() -> Self {
        compute_limits(&[], 1.0, 1.0)
    }
}

/// Transient multipliers layered on top of the trait-derived baseline,
/// typically driven by mood and fatigue from the external state system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Multipliers {
    /// Scales the high-priority capacity.
    pub capacity: f32,
    /// Scales the focus score.
    pub focus: f32,
}

impl Default for Multipliers {
    fn default() -> Self {
        Self {
            capacity: 1.0,
            focus: 1.0,
        }
    }
}

/// Fold scored traits into planning limits.
///
/// Deactivated traits must already be filtered out by the caller
/// (`TraitRegistry::scored_traits` does this). The fold is monotonic in each
/// score with the sign of its modifier, and the clamps guarantee
/// `capacity ≥ 1`, `depth ∈ [1, 5]`, `frequency ≥ 1`, `focus ∈ [0, 10]`.
pub fn compute_limits(
    scored_traits: &[(CognitiveTrait, u8)],
    capacity_multiplier: f32,
    focus_multiplier: f32,
) -> PlanningLimits {
    let mut capacity = BASE_CAPACITY;
    let mut depth = BASE_DEPTH;
    let mut frequency = BASE_FREQUENCY;
    let mut focus = BASE_FOCUS;

    for (def, score) in scored_traits {
        let s = *score as f32;
        capacity += s * def.modifiers.capacity;
        depth += s * def.modifiers.max_depth;
        frequency += s * def.modifiers.planning_frequency;
        focus += s * def.modifiers.focus;
    }

    capacity *= capacity_multiplier;
    focus *= focus_multiplier;

    PlanningLimits {
        max_active_high_priority: capacity.round().max(1.0) as u32,
        max_objective_depth: (depth.round() as i64)
            .clamp(DEPTH_BOUNDS.0 as i64, DEPTH_BOUNDS.1 as i64) as u32,
        planning_frequency_turns: frequency.round().max(1.0) as u32,
        focus_score: focus.clamp(0.0, 10.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::TraitId;
    use crate::plan::traits::TraitModifiers;

    fn trait_with(modifiers: TraitModifiers) -> CognitiveTrait {
        CognitiveTrait {
            id: TraitId::new(1).unwrap(),
            name: "test".into(),
            description: String::new(),
            modifiers,
            score_range: (0, 10),
            effects: Vec::new(),
            active: true,
        }
    }

    #[test]
    fn baseline_with_no_traits() {
        let limits = compute_limits(&[], 1.0, 1.0);
        assert_eq!(limits.max_active_high_priority, 3);
        assert_eq!(limits.max_objective_depth, 3);
        assert_eq!(limits.planning_frequency_turns, 5);
        assert!((limits.focus_score - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn impulsive_at_five_zeroes_focus() {
        // focusModifier = −1.0 at score 5: focus = max(0, 5.0 − 5) = 0.0.
        let impulsive = trait_with(TraitModifiers {
            focus: -1.0,
            ..Default::default()
        });
        let limits = compute_limits(&[(impulsive, 5)], 1.0, 1.0);
        assert!((limits.focus_score - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn depth_clamped_to_five() {
        let architect = trait_with(TraitModifiers {
            max_depth: 1.0,
            ..Default::default()
        });
        let limits = compute_limits(&[(architect, 10)], 1.0, 1.0);
        assert_eq!(limits.max_objective_depth, 5);
    }

    #[test]
    fn depth_never_below_one() {
        let scatterbrained = trait_with(TraitModifiers {
            max_depth: -1.0,
            ..Default::default()
        });
        let limits = compute_limits(&[(scatterbrained, 10)], 1.0, 1.0);
        assert_eq!(limits.max_objective_depth, 1);
    }

    #[test]
    fn capacity_floor_is_one() {
        let overwhelmed = trait_with(TraitModifiers {
            capacity: -1.0,
            ..Default::default()
        });
        let limits = compute_limits(&[(overwhelmed, 10)], 1.0, 1.0);
        assert_eq!(limits.max_active_high_priority, 1);
    }

    #[test]
    fn frequency_floor_is_one() {
        let frantic = trait_with(TraitModifiers {
            planning_frequency: -1.0,
            ..Default::default()
        });
        let limits = compute_limits(&[(frantic, 10)], 1.0, 1.0);
        assert_eq!(limits.planning_frequency_turns, 1);
    }

    #[test]
    fn multipliers_apply_after_fold() {
        let ambitious = trait_with(TraitModifiers {
            capacity: 0.5,
            ..Default::default()
        });
        // (3 + 4·0.5) × 2 = 10
        let limits = compute_limits(&[(ambitious, 4)], 2.0, 1.0);
        assert_eq!(limits.max_active_high_priority, 10);

        // focus: 5.0 × 0.5 = 2.5
        let limits = compute_limits(&[], 1.0, 0.5);
        assert!((limits.focus_score - 2.5).abs() < f32::EPSILON);
    }

    #[test]
    fn monotonic_in_score_with_modifier_sign() {
        let positive = trait_with(TraitModifiers {
            capacity: 0.4,
            ..Default::default()
        });
        let mut last = 0;
        for score in 0..=10u8 {
            let limits = compute_limits(&[(positive.clone(), score)], 1.0, 1.0);
            assert!(limits.max_active_high_priority >= last);
            last = limits.max_active_high_priority;
        }

        let negative = trait_with(TraitModifiers {
            focus: -0.3,
            ..Default::default()
        });
        let mut last = f32::INFINITY;
        for score in 0..=10u8 {
            let limits = compute_limits(&[(negative.clone(), score)], 1.0, 1.0);
            assert!(limits.focus_score <= last);
            last = limits.focus_score;
        }
    }

    #[test]
    fn focus_clamped_to_ten() {
        let laser = trait_with(TraitModifiers {
            focus: 2.0,
            ..Default::default()
        });
        let limits = compute_limits(&[(laser, 10)], 1.0, 1.0);
        assert!((limits.focus_score - 10.0).abs() < f32::EPSILON);
    }
}
