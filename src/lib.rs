//! # telos
//!
//! Hierarchical objective engine for turn-based narrative agent simulation.
//! Each character agent holds a tree of objectives; personality traits
//! determine how much it can plan at once and how deep; stale goals decay
//! into abandonment; agents delegate tasks to one another with an optional
//! confirmation handshake; and recurring needs (hunger, sleep, hygiene)
//! respawn from templates.
//!
//! ## Architecture
//!
//! - **Planning layer** (`plan`): objective trees, capacity calculation,
//!   decay sweeps, delegation protocol, recurring templates
//! - **Storage** (`store`): concurrent hot tier (DashMap) with an optional
//!   ACID durable tier (redb)
//! - **Engine facade** (`engine`): per-agent serialized mutations, parallel
//!   cross-agent turn sweeps, the turn-loop and narrative-facing API
//! - **Export** (`export`): label-resolved JSON snapshots for the narrative
//!   layer
//!
//! ## Library usage
//!
//! ```
//! use telos::engine::{Engine, EngineConfig};
//! use telos::ident::AgentId;
//! use telos::plan::{Priority, TraitModifiers, TraitSpec};
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! let alice = AgentId::new(1).unwrap();
//!
//! let methodical = engine
//!     .register_trait(TraitSpec::new(
//!         "Methodical",
//!         TraitModifiers { max_depth: 0.2, ..Default::default() },
//!     ))
//!     .unwrap();
//! engine.assign_trait_score(alice, methodical, 8, 0).unwrap();
//!
//! let root = engine
//!     .create_objective(
//!         engine
//!             .objective(alice, "open a bakery")
//!             .with_priority(Priority::High),
//!     )
//!     .unwrap();
//! engine
//!     .create_objective(engine.objective(alice, "rent a storefront").with_parent(root.id))
//!     .unwrap();
//! ```

pub mod engine;
pub mod error;
pub mod export;
pub mod ident;
pub mod plan;
pub mod store;

pub use engine::{Engine, EngineConfig};
pub use error::{TelosError, TelosResult};
pub use ident::{AgentId, ObjectiveId, TemplateId, TraitId};
