//! Error types for stagetree-core
//!
//! Three families, matching how a workflow driver reacts:
//! - validation: the request itself is malformed (unknown stage, bad payload)
//! - precondition: a mandatory parent has not been materialized yet
//! - storage: the session store failed or holds a corrupt envelope

use stagetree_artifact::{PathError, PayloadError};
use stagetree_manifest::ManifestError;
use std::path::PathBuf;

/// Errors raised while laying out stage paths
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    /// Stage not present in the definition
    #[error("unknown stage '{stage}'")]
    UnknownStage { stage: String },

    /// A stage or join segment could not be built
    #[error("cannot lay out stage '{stage}': {source}")]
    InvalidPath {
        stage: String,
        #[source]
        source: PathError,
    },
}

/// Errors from a session store backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Write into a directory that was never ensured
    #[error("directory does not exist: {0}")]
    MissingDirectory(PathBuf),
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by the materialization engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Stage not declared by the persona
    #[error("unknown stage '{stage}'")]
    UnknownStage { stage: String },

    /// Mandatory parent has no artifact in this session
    #[error("cannot materialize '{stage}': required parent '{parent}' has no artifact")]
    MissingParent { stage: String, parent: String },

    /// Payload rejected at the boundary
    #[error("invalid payload for stage '{stage}': {source}")]
    Payload {
        stage: String,
        #[source]
        source: PayloadError,
    },

    /// Stored envelope is not valid JSON or has the wrong shape
    #[error("corrupt envelope for stage '{stage}' at {path}: {source}")]
    CorruptEnvelope {
        stage: String,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Envelope could not be encoded
    #[error("failed to encode envelope for stage '{stage}': {source}")]
    Encode {
        stage: String,
        #[source]
        source: serde_json::Error,
    },

    /// Path layout failed
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// Store backend failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Check if the caller invoked a stage before its mandatory parents
    #[inline]
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::MissingParent { .. })
    }

    /// Check if the request itself was malformed
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownStage { .. } | Self::Payload { .. } | Self::Topology(_)
        )
    }

    /// Stage id this error points at, if any
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::UnknownStage { stage }
            | Self::MissingParent { stage, .. }
            | Self::Payload { stage, .. }
            | Self::CorruptEnvelope { stage, .. }
            | Self::Encode { stage, .. } => Some(stage),
            Self::Topology(TopologyError::UnknownStage { stage })
            | Self::Topology(TopologyError::InvalidPath { stage, .. }) => Some(stage),
            Self::Store(_) => None,
        }
    }
}

/// Errors raised by the persona registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A persona id was registered twice
    #[error("persona '{persona}' is already registered")]
    DuplicatePersona { persona: String },

    /// Manifest failed to load
    #[error("failed to load manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },

    /// Path layout failed
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// Manifest directory could not be listed
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Persona or session id is not a single path segment
    #[error("invalid {kind} id {id:?}: {source}")]
    InvalidId {
        kind: &'static str,
        id: String,
        #[source]
        source: PathError,
    },
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_classification() {
        let err = EngineError::MissingParent {
            stage: "harmonize".into(),
            parent: "gather".into(),
        };
        assert!(err.is_precondition());
        assert!(!err.is_validation());
        assert_eq!(err.stage(), Some("harmonize"));
        assert!(err.to_string().contains("'gather'"));
    }

    #[test]
    fn validation_classification() {
        let err = EngineError::Payload {
            stage: "search".into(),
            source: PayloadError::Null,
        };
        assert!(err.is_validation());
        assert!(!err.is_precondition());
    }

    #[test]
    fn store_errors_carry_no_stage() {
        let err = EngineError::from(StoreError::MissingDirectory("/s/meta".into()));
        assert_eq!(err.stage(), None);
        assert!(!err.is_validation());
    }
}
