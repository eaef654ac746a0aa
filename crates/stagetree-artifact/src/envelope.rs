//! Artifact envelopes
//!
//! The persisted record of a materialized stage:
//! `{ "content": .., "fingerprint": "<hex>", "parentFingerprints": { .. } }`.

use crate::fingerprint::{fingerprint_sorted, Fingerprint, ParentFingerprints};
use crate::payload::{canonical_json, PayloadError, StagePayload};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fingerprinted stage content chained to its parents
///
/// # Invariants
/// - `fingerprint` is the hash of the canonical `content` text and
///   `parent_fingerprints` (see [`crate::fingerprint`])
/// - `parent_fingerprints` only names parents that were present when the
///   stage was materialized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEnvelope {
    /// Stage payload
    pub content: Value,
    /// Lineage digest
    pub fingerprint: Fingerprint,
    /// Fingerprints of the parents this stage was chained against
    #[serde(default)]
    pub parent_fingerprints: ParentFingerprints,
}

impl ArtifactEnvelope {
    /// Fingerprint `payload` against `parents` and wrap both
    #[must_use]
    pub fn seal(payload: StagePayload, parents: ParentFingerprints) -> Self {
        let fingerprint = fingerprint_sorted(payload.canonical(), &parents);
        Self {
            content: payload.into_value(),
            fingerprint,
            parent_fingerprints: parents,
        }
    }

    /// Recompute the fingerprint from the stored content and parents
    ///
    /// # Errors
    /// Returns error if the content cannot be serialized
    pub fn recompute(&self) -> Result<Fingerprint, PayloadError> {
        let canonical = canonical_json(&self.content)?;
        Ok(fingerprint_sorted(&canonical, &self.parent_fingerprints))
    }

    /// Verify integrity (useful after reading from the store)
    ///
    /// Returns true if the stored fingerprint matches recomputation
    #[must_use]
    pub fn verify(&self) -> bool {
        self.recompute()
            .map(|fp| fp == self.fingerprint)
            .unwrap_or(false)
    }

    /// Encode as JSON bytes
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json_vec(&self, pretty: bool) -> Result<Vec<u8>, serde_json::Error> {
        if pretty {
            serde_json::to_vec_pretty(self)
        } else {
            serde_json::to_vec(self)
        }
    }

    /// Decode from JSON bytes
    ///
    /// # Errors
    /// Returns error if the bytes are not a valid envelope
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
