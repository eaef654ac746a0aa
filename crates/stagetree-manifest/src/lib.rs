//! stagetree manifest layer
//!
//! Turns a persona manifest (YAML or JSON) into a validated, immutable
//! stage DAG.
//!
//! # Pipeline
//!
//! ```text
//! file -> ManifestFormat -> raw document -> parse() -> DagDefinition
//! ```
//!
//! Validation fails fast on the first structural problem: missing or
//! ill-typed fields, duplicate or unknown stage ids, malformed handlers,
//! unknown completion aliases and cycles.
//!
//! # Example
//!
//! ```rust
//! use stagetree_manifest::{parse_str, YamlFormat};
//!
//! let text = r"
//! name: Demo
//! persona: demo
//! stages:
//!   - id: search
//!     produces: [results]
//!   - id: gather
//!     previous: [search]
//!     produces: [gathered]
//! ";
//! let def = parse_str(text, &YamlFormat).unwrap();
//! assert_eq!(def.topological_order(), ["search", "gather"]);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod definition;
pub mod error;
pub mod formats;
mod graph;
mod parser;

pub use definition::{
    CompletionRule, DagDefinition, DagNode, Edge, ManifestHeader, SkipWarning, DEFAULT_VERSION,
};
pub use error::{ManifestError, ManifestResult};
pub use formats::{
    default_formats, load_file, parse_str, FormatRegistry, JsonFormat, ManifestFormat, YamlFormat,
};
pub use parser::{is_valid_handler, parse, HANDLER_PATTERN};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    pub use crate::definition::{CompletionRule, DagDefinition, DagNode};
    pub use crate::error::{ManifestError, ManifestResult};
    pub use crate::formats::{load_file, parse_str, ManifestFormat};
    pub use crate::parser::parse;
}
