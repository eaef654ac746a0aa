//! Session stores
//!
//! The engine only needs four primitives from the hierarchical store that
//! holds session trees: presence, read, write and an explicit "ensure
//! directory". Directory creation is never a side effect of `write`.
//!
//! Two backends ship with the crate:
//! - [`FsStore`]: the local filesystem
//! - [`MemoryStore`]: a map guarded by a `parking_lot` lock, for tests and
//!   dry runs

use crate::error::StoreError;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Hierarchical byte store holding session trees
///
/// Callers serialize operations within one session; implementations need
/// not be transactional.
pub trait SessionStore: Send + Sync {
    /// Check if a file exists at `path`
    fn exists(&self, path: &Path) -> bool;

    /// Read the file at `path`, `None` if absent
    ///
    /// # Errors
    /// Returns error if the backend fails for a reason other than absence
    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write `bytes` at `path`, replacing any previous content
    ///
    /// # Errors
    /// Returns [`StoreError::MissingDirectory`] if the parent directory was
    /// never ensured, or a backend error
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError>;

    /// Create `path` and all its ancestors; a no-op if it already exists
    ///
    /// # Errors
    /// Returns error if the backend cannot create the directory
    fn ensure_dir(&self, path: &Path) -> Result<(), StoreError>;
}

impl<S: SessionStore + ?Sized> SessionStore for &S {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).read(path)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        (**self).write(path, bytes)
    }

    fn ensure_dir(&self, path: &Path) -> Result<(), StoreError> {
        (**self).ensure_dir(path)
    }
}

impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).read(path)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        (**self).write(path, bytes)
    }

    fn ensure_dir(&self, path: &Path) -> Result<(), StoreError> {
        (**self).ensure_dir(path)
    }
}

/// Local filesystem store
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

impl FsStore {
    /// Create filesystem store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SessionStore for FsStore {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io_error(path, e)),
        }
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(StoreError::MissingDirectory(parent.to_path_buf()));
            }
        }
        std::fs::write(path, bytes).map_err(|e| StoreError::io_error(path, e))
    }

    fn ensure_dir(&self, path: &Path) -> Result<(), StoreError> {
        std::fs::create_dir_all(path).map_err(|e| StoreError::io_error(path, e))
    }
}

#[derive(Debug, Default)]
struct MemoryTree {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, Vec<u8>>,
}

/// In-memory store
///
/// Mirrors filesystem rules: writes need an ensured parent directory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tree: RwLock<MemoryTree>,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every file path, sorted
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        self.tree.read().files.keys().cloned().collect()
    }

    /// Every ensured directory, sorted
    #[must_use]
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.tree.read().dirs.iter().cloned().collect()
    }

    /// Files directly or transitively below `dir`
    #[must_use]
    pub fn files_under(&self, dir: &Path) -> Vec<PathBuf> {
        self.tree
            .read()
            .files
            .keys()
            .filter(|p| p.starts_with(dir))
            .cloned()
            .collect()
    }

    /// Number of stored files
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.read().files.len()
    }

    /// Check if no file is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.read().files.is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn exists(&self, path: &Path) -> bool {
        self.tree.read().files.contains_key(path)
    }

    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.tree.read().files.get(path).cloned())
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let mut tree = self.tree.write();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !tree.dirs.contains(parent) {
                return Err(StoreError::MissingDirectory(parent.to_path_buf()));
            }
        }
        tree.files.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn ensure_dir(&self, path: &Path) -> Result<(), StoreError> {
        let mut tree = self.tree.write();
        for ancestor in path.ancestors().filter(|p| !p.as_os_str().is_empty()) {
            if !tree.dirs.insert(ancestor.to_path_buf()) {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_write_requires_ensured_dir() {
        let store = MemoryStore::new();
        let path = Path::new("s/search/meta/search.json");
        assert!(matches!(
            store.write(path, b"{}"),
            Err(StoreError::MissingDirectory(dir)) if dir == Path::new("s/search/meta")
        ));

        store.ensure_dir(Path::new("s/search/meta")).unwrap();
        store.write(path, b"{}").unwrap();
        assert!(store.exists(path));
        assert_eq!(store.read(path).unwrap(), Some(b"{}".to_vec()));
    }

    #[test]
    fn memory_ensure_dir_is_idempotent_and_creates_ancestors() {
        let store = MemoryStore::new();
        store.ensure_dir(Path::new("a/b/c")).unwrap();
        store.ensure_dir(Path::new("a/b/c")).unwrap();
        store.ensure_dir(Path::new("a/b/d")).unwrap();
        assert_eq!(
            store.dirs(),
            vec![
                PathBuf::from("a"),
                PathBuf::from("a/b"),
                PathBuf::from("a/b/c"),
                PathBuf::from("a/b/d"),
            ]
        );
    }

    #[test]
    fn memory_read_missing_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.read(Path::new("nope")).unwrap(), None);
        assert!(!store.exists(Path::new("nope")));
        assert!(store.is_empty());
    }

    #[test]
    fn directories_are_not_files() {
        let store = MemoryStore::new();
        store.ensure_dir(Path::new("s/meta")).unwrap();
        assert!(!store.exists(Path::new("s/meta")));
    }

    #[test]
    fn fs_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new();
        let meta = dir.path().join("search/meta");
        let file = meta.join("search.json");

        assert!(matches!(
            store.write(&file, b"1"),
            Err(StoreError::MissingDirectory(_))
        ));
        store.ensure_dir(&meta).unwrap();
        store.ensure_dir(&meta).unwrap();
        store.write(&file, b"1").unwrap();
        store.write(&file, b"2").unwrap();

        assert!(store.exists(&file));
        assert!(!store.exists(&meta));
        assert_eq!(store.read(&file).unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.read(&meta.join("other.json")).unwrap(), None);
    }

    #[test]
    fn shared_store_through_arc() {
        let store = Arc::new(MemoryStore::new());
        let handle: Arc<dyn SessionStore> = store.clone();
        handle.ensure_dir(Path::new("x")).unwrap();
        handle.write(Path::new("x/f"), b"ok").unwrap();
        assert_eq!(store.len(), 1);
    }
}
