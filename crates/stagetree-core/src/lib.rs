//! stagetree core
//!
//! Lays persona stages out as a session tree and materializes them as
//! hash-chained artifacts.
//!
//! # Components
//!
//! - [`Topology`]: default stage paths, and per-session realized paths with
//!   join-collapse ([`Topology::scan`])
//! - [`MaterializationEngine`]: writes envelopes, reads them back, reports
//!   stale lineage
//! - [`completion`]: completed stages and workflow position
//! - [`PersonaRegistry`]: compiled personas keyed by persona id
//! - [`SessionStore`]: the storage seam ([`FsStore`], [`MemoryStore`])
//!
//! # Example
//!
//! ```rust
//! use std::path::Path;
//! use std::sync::Arc;
//! use stagetree_core::{MaterializationEngine, MemoryStore, PersonaRegistry};
//!
//! let def = stagetree_manifest::parse(&serde_json::json!({
//!     "name": "Demo", "persona": "demo",
//!     "stages": [
//!         {"id": "search", "previous": null, "produces": ["results"]},
//!         {"id": "gather", "previous": ["search"], "produces": ["gathered"]}
//!     ]
//! }))
//! .unwrap();
//! let registry = PersonaRegistry::new();
//! let persona = registry.register(def).unwrap();
//!
//! let engine = MaterializationEngine::new(persona, MemoryStore::new());
//! let session = Path::new("sessions/demo/s1");
//! engine.materialize(session, "search", serde_json::json!({"q": "rust"})).unwrap();
//!
//! let position = engine.position(session).unwrap();
//! assert_eq!(position.current_stage.unwrap().id, "gather");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod store;
pub mod topology;

pub use completion::{completed_ids, is_complete, position, CurrentStage, Position};
pub use config::{SessionLocator, StagetreeConfig};
pub use engine::{EngineOptions, Materialization, MaterializationEngine, StaleReason, StaleStage};
pub use error::{ConfigError, EngineError, EngineResult, RegistryError, StoreError, TopologyError};
pub use registry::{CompiledPersona, PersonaRegistry};
pub use store::{FsStore, MemoryStore, SessionStore};
pub use topology::{SessionLineage, Topology};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
