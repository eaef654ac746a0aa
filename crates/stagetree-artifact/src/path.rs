//! Lineage paths inside a session tree
//!
//! Provides [`LineagePath`], an ordered list of [`PathSegment`]s describing
//! where a stage sits in the topology, and [`StagePath`], which pairs a
//! lineage path with the stage's artifact filename.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

/// Sub-directory holding envelopes under every stage directory
pub const META_DIR: &str = "meta";

/// Prefix of synthetic join segments
pub const JOIN_PREFIX: &str = "_join_";

/// One directory level of a lineage path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    /// Directory named after a stage id
    Stage(String),
    /// Synthetic convergence directory over the sorted parent ids
    Join(Vec<String>),
}

impl PathSegment {
    /// Stage segment, validated as a single directory name
    ///
    /// # Errors
    /// Returns error if `id` cannot be used as a directory name
    pub fn stage(id: impl Into<String>) -> Result<Self, PathError> {
        let id = id.into();
        validate_segment(&id)?;
        Ok(Self::Stage(id))
    }

    /// Join segment over `parents`; order of the input does not matter
    ///
    /// # Errors
    /// Returns error if fewer than two parents are given or any parent id
    /// is not a valid segment
    pub fn join<I, S>(parents: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = parents.into_iter().map(Into::into).collect();
        ids.sort();
        ids.dedup();
        if ids.len() < 2 {
            return Err(PathError::JoinArity(ids.len()));
        }
        for id in &ids {
            validate_segment(id)?;
        }
        Ok(Self::Join(ids))
    }

    /// Directory name as written to the store
    #[must_use]
    pub fn dir_name(&self) -> String {
        match self {
            Self::Stage(id) => id.clone(),
            Self::Join(parents) => format!("{JOIN_PREFIX}{}", parents.join("_")),
        }
    }

    /// Check if this is a join segment
    #[inline]
    #[must_use]
    pub fn is_join(&self) -> bool {
        matches!(self, Self::Join(_))
    }
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}

/// Position of a stage directory in the session tree
///
/// # Examples
/// - `["search", "gather"]` -> `search/gather`
/// - `["search", "gather", Join(gather, rename), "harmonize"]`
///   -> `search/gather/_join_gather_rename/harmonize`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LineagePath(Vec<PathSegment>);

impl LineagePath {
    /// Empty path (session root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Create path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty (root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get last segment (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// Get parent path (if not root)
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Append a segment, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut new = self.clone();
        new.0.push(segment);
        new
    }

    /// Check if this path is a prefix of another
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }

    /// Check if this path is a strict ancestor of another
    #[inline]
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && self.is_prefix_of(other)
    }

    /// Longest common prefix of two paths
    #[must_use]
    pub fn common_prefix(&self, other: &Self) -> Self {
        let common = self
            .0
            .iter()
            .zip(&other.0)
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a.clone())
            .collect();
        Self(common)
    }

    /// Check if any segment is a join
    #[inline]
    #[must_use]
    pub fn contains_join(&self) -> bool {
        self.0.iter().any(PathSegment::is_join)
    }

    /// Relative filesystem path below the session root
    #[must_use]
    pub fn to_relative_path(&self) -> PathBuf {
        self.0.iter().map(PathSegment::dir_name).collect()
    }
}

impl Display for LineagePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<Vec<PathSegment>> for LineagePath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

/// Resolved location of one stage: its directory and its envelope file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StagePath {
    dir: LineagePath,
    artifact_file: String,
}

impl StagePath {
    /// Location for `stage_id` under `dir`
    #[inline]
    #[must_use]
    pub fn new(stage_id: &str, dir: LineagePath) -> Self {
        Self {
            dir,
            artifact_file: format!("{stage_id}.json"),
        }
    }

    /// Stage directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &LineagePath {
        &self.dir
    }

    /// Envelope filename (`<stageId>.json`)
    #[inline]
    #[must_use]
    pub fn artifact_file(&self) -> &str {
        &self.artifact_file
    }

    /// `<dir>/meta`, relative to the session root
    #[must_use]
    pub fn meta_dir(&self) -> PathBuf {
        self.dir.to_relative_path().join(META_DIR)
    }

    /// `<dir>/meta/<stageId>.json`, relative to the session root
    #[must_use]
    pub fn artifact_path(&self) -> PathBuf {
        self.meta_dir().join(&self.artifact_file)
    }
}

impl Display for StagePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{META_DIR}/{}", self.dir, self.artifact_file)
    }
}

/// Check that `segment` is usable as a single directory name
///
/// # Errors
/// Returns error if the segment is empty, `.`/`..`, or contains a path
/// separator, `:` or a control character (stage ids are also the keys of
/// the `key:hex` parent encoding)
pub fn validate_segment(segment: &str) -> Result<(), PathError> {
    if segment.is_empty() {
        return Err(PathError::EmptySegment);
    }
    if segment == "."
        || segment == ".."
        || segment.contains(['/', '\\', ':'])
        || segment.chars().any(char::is_control)
    {
        return Err(PathError::InvalidSegment(segment.to_string()));
    }
    Ok(())
}

/// Errors related to lineage paths
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Empty segment
    #[error("path contains empty segment")]
    EmptySegment,

    /// Segment that cannot be a directory name
    #[error("invalid segment: {0:?} (must be a single directory name)")]
    InvalidSegment(String),

    /// Join over fewer than two parents
    #[error("join segment needs at least two parents, got {0}")]
    JoinArity(usize),
}
