//! Configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! sessions_root = "/var/lib/stagetree/sessions"
//! manifests_dir = "/etc/stagetree/manifests"
//! max_payload_bytes = 1048576
//! pretty_envelopes = false
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use stagetree_artifact::{validate_segment, DEFAULT_MAX_PAYLOAD_BYTES};
use std::path::{Path, PathBuf};

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StagetreeConfig {
    /// Root under which `<persona>/<session-id>` trees live
    pub sessions_root: PathBuf,
    /// Directory scanned for persona manifests
    pub manifests_dir: PathBuf,
    /// Upper bound on a stage payload's canonical size
    pub max_payload_bytes: usize,
    /// Write envelopes with indentation
    pub pretty_envelopes: bool,
}

impl Default for StagetreeConfig {
    fn default() -> Self {
        Self {
            sessions_root: PathBuf::from("./sessions"),
            manifests_dir: PathBuf::from("./manifests"),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            pretty_envelopes: true,
        }
    }
}

impl StagetreeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not TOML, or has
    /// unknown keys
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// With sessions root
    #[inline]
    #[must_use]
    pub fn with_sessions_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sessions_root = root.into();
        self
    }

    /// With manifests directory
    #[inline]
    #[must_use]
    pub fn with_manifests_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.manifests_dir = dir.into();
        self
    }

    /// With payload size limit
    #[inline]
    #[must_use]
    pub fn with_max_payload_bytes(mut self, max: usize) -> Self {
        self.max_payload_bytes = max;
        self
    }

    /// With envelope formatting
    #[inline]
    #[must_use]
    pub fn with_pretty_envelopes(mut self, pretty: bool) -> Self {
        self.pretty_envelopes = pretty;
        self
    }

    /// Session locator over [`Self::sessions_root`]
    #[inline]
    #[must_use]
    pub fn locator(&self) -> SessionLocator {
        SessionLocator::new(&self.sessions_root)
    }
}

/// Derives session roots as `<sessions-root>/<persona>/<session-id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLocator {
    sessions_root: PathBuf,
}

impl SessionLocator {
    /// Create locator under `sessions_root`
    #[inline]
    #[must_use]
    pub fn new(sessions_root: impl Into<PathBuf>) -> Self {
        Self {
            sessions_root: sessions_root.into(),
        }
    }

    /// Sessions root
    #[inline]
    #[must_use]
    pub fn sessions_root(&self) -> &Path {
        &self.sessions_root
    }

    /// Root of one session
    ///
    /// # Errors
    /// Returns error if either id is not a single path segment
    pub fn session_root(&self, persona: &str, session_id: &str) -> Result<PathBuf, ConfigError> {
        for (kind, id) in [("persona", persona), ("session", session_id)] {
            validate_segment(id).map_err(|source| ConfigError::InvalidId {
                kind,
                id: id.to_string(),
                source,
            })?;
        }
        Ok(self.sessions_root.join(persona).join(session_id))
    }
}
