//! Error types for manifest loading
//!
//! Every structural problem in a manifest fails fast with a variant that
//! names the offending stage id or field.

use stagetree_artifact::PathError;
use std::path::PathBuf;

/// Errors raised while loading or validating a manifest
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Document root is not a mapping
    #[error("manifest root must be an object")]
    NotAnObject,

    /// Required header field absent
    #[error("manifest is missing required field '{field}'")]
    MissingField { field: &'static str },

    /// Field present with the wrong shape
    #[error("{}field '{field}' must be {expected}", stage_prefix(.stage.as_deref()))]
    InvalidField {
        stage: Option<String>,
        field: &'static str,
        expected: &'static str,
    },

    /// `stages` absent
    #[error("manifest is missing required field 'stages'")]
    MissingStages,

    /// `stages` is not a list
    #[error("field 'stages' must be a list")]
    StagesNotList,

    /// `stages` is an empty list
    #[error("field 'stages' must not be empty")]
    EmptyStages,

    /// A stage entry is not a mapping
    #[error("stage #{index} must be an object")]
    StageNotAnObject { index: usize },

    /// A stage entry has no `id`
    #[error("stage #{index} is missing required field 'id'")]
    MissingStageId { index: usize },

    /// Stage id cannot be used as a directory name
    #[error("stage id {stage:?} is invalid: {source}")]
    InvalidStageId {
        stage: String,
        #[source]
        source: PathError,
    },

    /// Stage id already declared
    #[error("duplicate stage id '{stage}' (stage #{index}, first declared at #{first_index})")]
    DuplicateStageId {
        stage: String,
        first_index: usize,
        index: usize,
    },

    /// `produces` absent
    #[error("stage '{stage}' is missing required field 'produces'")]
    MissingProduces { stage: String },

    /// `produces` is not a list
    #[error("stage '{stage}': field 'produces' must be a list")]
    ProducesNotList { stage: String },

    /// `produces` is an empty list
    #[error("stage '{stage}': field 'produces' must not be empty")]
    EmptyProduces { stage: String },

    /// `handler` fails the identifier pattern
    #[error("stage '{stage}': handler {handler:?} must match ^[a-z][a-z0-9_-]*$")]
    InvalidHandler { stage: String, handler: String },

    /// `previous` names an undeclared stage
    #[error("stage '{stage}' declares unknown parent '{parent}'")]
    UnknownParent { stage: String, parent: String },

    /// `completes_with` names an undeclared stage
    #[error("stage '{stage}' completes with unknown stage '{target}'")]
    UnknownAlias { stage: String, target: String },

    /// Derived edges contain a cycle
    #[error("stage graph contains a cycle through '{stage}'")]
    CycleDetected { stage: String },

    /// Text could not be decoded
    #[error("{format} syntax error: {message}")]
    Syntax {
        format: &'static str,
        message: String,
    },

    /// No format registered for the file extension
    #[error("no manifest format registered for extension: '{0}'")]
    UnsupportedFormat(String),

    /// IO error during manifest read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn stage_prefix(stage: Option<&str>) -> String {
    stage.map(|s| format!("stage '{s}': ")).unwrap_or_default()
}

impl ManifestError {
    /// Wrong-shape header field
    pub fn invalid_header(field: &'static str, expected: &'static str) -> Self {
        Self::InvalidField {
            stage: None,
            field,
            expected,
        }
    }

    /// Wrong-shape stage field
    pub fn invalid_stage_field(
        stage: impl Into<String>,
        field: &'static str,
        expected: &'static str,
    ) -> Self {
        Self::InvalidField {
            stage: Some(stage.into()),
            field,
            expected,
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stage id this error points at, if any
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::InvalidField { stage, .. } => stage.as_deref(),
            Self::InvalidStageId { stage, .. }
            | Self::DuplicateStageId { stage, .. }
            | Self::MissingProduces { stage }
            | Self::ProducesNotList { stage }
            | Self::EmptyProduces { stage }
            | Self::InvalidHandler { stage, .. }
            | Self::UnknownParent { stage, .. }
            | Self::UnknownAlias { stage, .. }
            | Self::CycleDetected { stage } => Some(stage),
            _ => None,
        }
    }
}

/// Result type alias for manifest operations
pub type ManifestResult<T> = Result<T, ManifestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_field_display_names_stage() {
        let err = ManifestError::invalid_stage_field("gather", "optional", "a boolean");
        assert_eq!(
            err.to_string(),
            "stage 'gather': field 'optional' must be a boolean"
        );
        assert_eq!(err.stage(), Some("gather"));
    }

    #[test]
    fn invalid_header_display() {
        let err = ManifestError::invalid_header("name", "a string");
        assert_eq!(err.to_string(), "field 'name' must be a string");
        assert_eq!(err.stage(), None);
    }

    #[test]
    fn duplicate_display() {
        let err = ManifestError::DuplicateStageId {
            stage: "search".into(),
            first_index: 0,
            index: 3,
        };
        assert!(err.to_string().contains("duplicate stage id 'search'"));
    }
}
