//! Tiered storage for planning records.
//!
//! Two tiers serve different needs:
//!
//! - [`MemStore`] — the typed working set in concurrent hashmaps (DashMap)
//! - [`DurableStore`] — serialized records in ACID transactions (redb)
//!
//! [`PlanStore`] composes them: the hot tier is always present and is the
//! source of truth at runtime; when a data directory is configured every
//! mutation is mirrored down as a bincode record so the engine can restore
//! mid-simulation state on reopen.

pub mod durable;
pub mod mem;

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};
use crate::ident::{AgentId, ObjectiveId};
use crate::plan::objective::{Objective, ProgressLogEntry};
use crate::plan::recurring::RecurringTemplate;
use crate::plan::state::PlanningState;
use crate::plan::traits::{CognitiveTrait, TraitScore};

pub use durable::DurableStore;
pub use mem::MemStore;

// Key families in the durable tier.
const OBJ_PREFIX: &str = "obj:";
const LOG_PREFIX: &str = "log:";
const TRAIT_PREFIX: &str = "trait:";
const SCORE_PREFIX: &str = "score:";
const TEMPLATE_PREFIX: &str = "tmpl:";
const PSTATE_PREFIX: &str = "pstate:";

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization {
        message: format!("failed to serialize record: {e}"),
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization {
        message: format!("failed to deserialize record: {e}"),
    })
}

/// Everything the durable tier held when the store was opened.
#[derive(Debug, Default)]
pub struct RestoredState {
    pub objectives: Vec<Objective>,
    pub logs: Vec<(ObjectiveId, Vec<ProgressLogEntry>)>,
    pub traits: Vec<CognitiveTrait>,
    pub scores: Vec<TraitScore>,
    pub templates: Vec<RecurringTemplate>,
    pub planning_states: Vec<PlanningState>,
    /// Highest raw ID seen across restored records, for allocator resume.
    pub max_raw_id: u64,
}

/// Composable store: hot (mem) always, durable (redb) when persistent.
#[derive(Debug)]
pub struct PlanStore {
    pub hot: MemStore,
    durable: Option<DurableStore>,
}

impl PlanStore {
    /// Create a memory-only store (no persistence).
    pub fn memory_only() -> Self {
        Self {
            hot: MemStore::new(),
            durable: None,
        }
    }

    /// Open a persistent store, restoring any previous records into the hot
    /// tier and returning them for registry seeding.
    pub fn with_persistence(data_dir: &Path) -> StoreResult<(Self, RestoredState)> {
        let durable = DurableStore::open(data_dir)?;
        let mut restored = RestoredState::default();

        for (_, bytes) in durable.scan_prefix(OBJ_PREFIX.as_bytes())? {
            let obj: Objective = decode(&bytes)?;
            restored.max_raw_id = restored.max_raw_id.max(obj.id.get());
            restored.objectives.push(obj);
        }
        for (key, bytes) in durable.scan_prefix(LOG_PREFIX.as_bytes())? {
            let log: Vec<ProgressLogEntry> = decode(&bytes)?;
            if let Some(id) = parse_id_key(&key, LOG_PREFIX) {
                restored.logs.push((id, log));
            }
        }
        for (_, bytes) in durable.scan_prefix(TRAIT_PREFIX.as_bytes())? {
            let def: CognitiveTrait = decode(&bytes)?;
            restored.max_raw_id = restored.max_raw_id.max(def.id.get());
            restored.traits.push(def);
        }
        for (_, bytes) in durable.scan_prefix(SCORE_PREFIX.as_bytes())? {
            restored.scores.push(decode(&bytes)?);
        }
        for (_, bytes) in durable.scan_prefix(TEMPLATE_PREFIX.as_bytes())? {
            let tmpl: RecurringTemplate = decode(&bytes)?;
            restored.max_raw_id = restored.max_raw_id.max(tmpl.id.get());
            restored.templates.push(tmpl);
        }
        for (_, bytes) in durable.scan_prefix(PSTATE_PREFIX.as_bytes())? {
            restored.planning_states.push(decode(&bytes)?);
        }

        let store = Self {
            hot: MemStore::new(),
            durable: Some(durable),
        };
        for obj in &restored.objectives {
            store.hot.put(obj.clone());
        }
        for (id, log) in &restored.logs {
            store.hot.restore_log(*id, log.clone());
        }

        tracing::info!(
            objectives = restored.objectives.len(),
            traits = restored.traits.len(),
            templates = restored.templates.len(),
            "restored planning records from durable store"
        );
        Ok((store, restored))
    }

    /// Whether a durable tier is configured.
    pub fn is_persistent(&self) -> bool {
        self.durable.is_some()
    }

    // -- objectives ---------------------------------------------------------

    /// Write an objective to both tiers.
    pub fn put_objective(&self, objective: &Objective) -> StoreResult<()> {
        if let Some(d) = &self.durable {
            d.put(&obj_key(objective.id), &encode(objective)?)?;
        }
        self.hot.put(objective.clone());
        Ok(())
    }

    /// Remove an objective (and its log) from both tiers.
    pub fn remove_objective(&self, id: ObjectiveId) -> StoreResult<Option<Objective>> {
        if let Some(d) = &self.durable {
            d.remove(&obj_key(id))?;
            d.remove(&log_key(id))?;
        }
        Ok(self.hot.remove(id))
    }

    pub fn get_objective(&self, id: ObjectiveId) -> Option<Objective> {
        self.hot.get(id)
    }

    pub fn objectives_for(&self, agent: AgentId) -> Vec<Objective> {
        self.hot.objectives_for(agent)
    }

    pub fn children_of(&self, parent: ObjectiveId) -> Vec<Objective> {
        self.hot.children_of(parent)
    }

    pub fn agents(&self) -> Vec<AgentId> {
        self.hot.agents()
    }

    // -- progress log -------------------------------------------------------

    /// Append a log entry, mirroring the whole log down when persistent.
    pub fn append_progress(&self, entry: ProgressLogEntry) -> StoreResult<()> {
        let id = entry.objective;
        self.hot.append_log(entry);
        if let Some(d) = &self.durable {
            d.put(&log_key(id), &encode(&self.hot.log_for(id))?)?;
        }
        Ok(())
    }

    pub fn progress_log(&self, id: ObjectiveId) -> Vec<ProgressLogEntry> {
        self.hot.log_for(id)
    }

    // -- registries ---------------------------------------------------------

    pub fn put_trait(&self, def: &CognitiveTrait) -> StoreResult<()> {
        if let Some(d) = &self.durable {
            d.put(&raw_key(TRAIT_PREFIX, def.id.get()), &encode(def)?)?;
        }
        Ok(())
    }

    pub fn put_score(&self, score: &TraitScore) -> StoreResult<()> {
        if let Some(d) = &self.durable {
            let key = format!(
                "{SCORE_PREFIX}{:016x}:{:016x}",
                score.agent.get(),
                score.trait_id.get()
            );
            d.put(key.as_bytes(), &encode(score)?)?;
        }
        Ok(())
    }

    pub fn put_template(&self, template: &RecurringTemplate) -> StoreResult<()> {
        if let Some(d) = &self.durable {
            d.put(&raw_key(TEMPLATE_PREFIX, template.id.get()), &encode(template)?)?;
        }
        Ok(())
    }

    pub fn put_planning_state(&self, state: &PlanningState) -> StoreResult<()> {
        if let Some(d) = &self.durable {
            d.put(&raw_key(PSTATE_PREFIX, state.agent.get()), &encode(state)?)?;
        }
        Ok(())
    }
}

fn raw_key(prefix: &str, raw: u64) -> Vec<u8> {
    format!("{prefix}{raw:016x}").into_bytes()
}

fn obj_key(id: ObjectiveId) -> Vec<u8> {
    raw_key(OBJ_PREFIX, id.get())
}

fn log_key(id: ObjectiveId) -> Vec<u8> {
    raw_key(LOG_PREFIX, id.get())
}

fn parse_id_key(key: &[u8], prefix: &str) -> Option<ObjectiveId> {
    let rest = std::str::from_utf8(key).ok()?.strip_prefix(prefix)?;
    let raw = u64::from_str_radix(rest, 16).ok()?;
    ObjectiveId::new(raw)
}
