//! In-memory hot storage for planning records, backed by DashMap.
//!
//! The hot tier is always present and holds the typed working set:
//! objectives and their progress logs. All data is lost on process exit
//! unless a durable tier is configured alongside it.

use dashmap::DashMap;

use crate::ident::{AgentId, ObjectiveId};
use crate::plan::objective::{Objective, ProgressLogEntry};

/// Concurrent in-memory store for objectives and progress logs.
#[derive(Debug, Default)]
pub struct MemStore {
    objectives: DashMap<ObjectiveId, Objective>,
    logs: DashMap<ObjectiveId, Vec<ProgressLogEntry>>,
}

impl MemStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an objective.
    pub fn put(&self, objective: Objective) {
        self.objectives.insert(objective.id, objective);
    }

    /// Get a clone of an objective.
    pub fn get(&self, id: ObjectiveId) -> Option<Objective> {
        self.objectives.get(&id).map(|o| o.clone())
    }

    /// Check if an objective exists.
    pub fn contains(&self, id: ObjectiveId) -> bool {
        self.objectives.contains_key(&id)
    }

    /// Remove an objective and its progress log.
    pub fn remove(&self, id: ObjectiveId) -> Option<Objective> {
        self.logs.remove(&id);
        self.objectives.remove(&id).map(|(_, o)| o)
    }

    /// Number of stored objectives.
    pub fn len(&self) -> usize {
        self.objectives.len()
    }

    /// Whether the store holds no objectives.
    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty()
    }

    /// All objectives owned by an agent, in ID (creation) order.
    pub fn objectives_for(&self, agent: AgentId) -> Vec<Objective> {
        let mut out: Vec<Objective> = self
            .objectives
            .iter()
            .filter(|entry| entry.agent == agent)
            .map(|entry| entry.clone())
            .collect();
        out.sort_by_key(|o| o.id);
        out
    }

    /// Direct children of a node, in ID (creation) order.
    pub fn children_of(&self, parent: ObjectiveId) -> Vec<Objective> {
        let mut out: Vec<Objective> = self
            .objectives
            .iter()
            .filter(|entry| entry.parent == Some(parent))
            .map(|entry| entry.clone())
            .collect();
        out.sort_by_key(|o| o.id);
        out
    }

    /// Every stored objective, in ID order (snapshot — not a consistent view
    /// under concurrent writes).
    pub fn all(&self) -> Vec<Objective> {
        let mut out: Vec<Objective> = self.objectives.iter().map(|e| e.clone()).collect();
        out.sort_by_key(|o| o.id);
        out
    }

    /// All agents that own at least one objective.
    pub fn agents(&self) -> Vec<AgentId> {
        let mut out: Vec<AgentId> = self.objectives.iter().map(|e| e.agent).collect();
        out.sort();
        out.dedup();
        out
    }

    /// Append a progress log entry.
    pub fn append_log(&self, entry: ProgressLogEntry) {
        self.logs.entry(entry.objective).or_default().push(entry);
    }

    /// The progress log for an objective, oldest first.
    pub fn log_for(&self, id: ObjectiveId) -> Vec<ProgressLogEntry> {
        self.logs.get(&id).map(|l| l.clone()).unwrap_or_default()
    }

    /// Replace an objective's whole log (used on restore).
    pub fn restore_log(&self, id: ObjectiveId, log: Vec<ProgressLogEntry>) {
        self.logs.insert(id, log);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::objective::{
        MoodImpact, ObjectiveKind, ObjectiveMetadata, ObjectiveSource, ObjectiveStatus, Priority,
    };

    fn objective(id: u64, agent: u64, parent: Option<u64>) -> Objective {
        Objective {
            id: ObjectiveId::new(id).unwrap(),
            agent: AgentId::new(agent).unwrap(),
            session: "s".into(),
            parent: parent.map(|p| ObjectiveId::new(p).unwrap()),
            depth: 0,
            kind: ObjectiveKind::Main,
            description: format!("objective {id}"),
            success_criteria: String::new(),
            priority: Priority::Medium,
            status: ObjectiveStatus::Active,
            source: ObjectiveSource::Initial,
            delegation: None,
            deadline_soft: None,
            deadline_hard: None,
            created_turn: 0,
            completed_turn: None,
            last_evaluated_turn: 0,
            decay_after_turns: None,
            turns_inactive: 0,
            partial_completion: 0.0,
            is_atomic: false,
            metadata: ObjectiveMetadata::None,
            template: None,
            mood_impact: MoodImpact::default(),
        }
    }

    #[test]
    fn put_get_remove() {
        let store = MemStore::new();
        store.put(objective(1, 1, None));
        assert!(store.contains(ObjectiveId::new(1).unwrap()));
        assert_eq!(store.get(ObjectiveId::new(1).unwrap()).unwrap().description, "objective 1");
        assert!(store.remove(ObjectiveId::new(1).unwrap()).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn objectives_for_filters_and_orders() {
        let store = MemStore::new();
        store.put(objective(3, 1, None));
        store.put(objective(1, 1, None));
        store.put(objective(2, 2, None));

        let mine = store.objectives_for(AgentId::new(1).unwrap());
        assert_eq!(mine.len(), 2);
        assert!(mine[0].id < mine[1].id);
    }

    #[test]
    fn children_in_creation_order() {
        let store = MemStore::new();
        store.put(objective(1, 1, None));
        store.put(objective(3, 1, Some(1)));
        store.put(objective(2, 1, Some(1)));

        let kids = store.children_of(ObjectiveId::new(1).unwrap());
        assert_eq!(kids.len(), 2);
        assert_eq!(kids[0].id.get(), 2);
        assert_eq!(kids[1].id.get(), 3);
    }

    #[test]
    fn remove_drops_log() {
        let store = MemStore::new();
        store.put(objective(1, 1, None));
        store.append_log(ProgressLogEntry {
            objective: ObjectiveId::new(1).unwrap(),
            turn: 1,
            action: None,
            delta: 0.5,
            resulting_status: ObjectiveStatus::Active,
            notes: None,
        });
        assert_eq!(store.log_for(ObjectiveId::new(1).unwrap()).len(), 1);

        store.remove(ObjectiveId::new(1).unwrap());
        assert!(store.log_for(ObjectiveId::new(1).unwrap()).is_empty());
    }
}
