//! stagetree artifact primitives
//!
//! Content-addressed, hash-chained stage artifacts.
//!
//! # Core Concepts
//!
//! - [`Fingerprint`]: 32-byte Blake3 digest chaining content to its parents
//! - [`fingerprint()`]: the order-independent lineage hasher
//! - [`LineagePath`] / [`StagePath`]: typed location of a stage in a session tree
//! - [`StagePayload`]: validated stage content with canonical JSON text
//! - [`ArtifactEnvelope`]: the persisted `{content, fingerprint, parentFingerprints}` record
//!
//! # Example
//!
//! ```rust
//! use stagetree_artifact::{ArtifactEnvelope, ParentFingerprints, StagePayload};
//!
//! let payload = StagePayload::new(serde_json::json!({"terms": ["rust"]})).unwrap();
//! let envelope = ArtifactEnvelope::seal(payload, ParentFingerprints::new());
//! assert!(envelope.verify());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod envelope;
mod fingerprint;
mod path;
mod payload;

pub use envelope::ArtifactEnvelope;
pub use fingerprint::{
    fingerprint, fingerprint_sorted, Fingerprint, FingerprintError, ParentFingerprints,
    CONTENT_SEPARATOR, ENTRY_DELIMITER,
};
pub use path::{
    validate_segment, LineagePath, PathError, PathSegment, StagePath, JOIN_PREFIX, META_DIR,
};
pub use payload::{
    canonical_json, canonicalize, PayloadError, StagePayload, DEFAULT_MAX_PAYLOAD_BYTES,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
