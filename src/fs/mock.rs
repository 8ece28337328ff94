use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// In-memory filesystem for detection tests. Directories are implied by files.
pub struct MockFileSystem {
    files: RwLock<HashMap<PathBuf, String>>,
    root: PathBuf,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::with_root(PathBuf::from("/mock"))
    }

    pub fn with_root(root: PathBuf) -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: &str) {
        let path = self.normalize_path(path.as_ref());
        self.files
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path, content.to_string());
    }

    fn normalize_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn with_files<T>(&self, f: impl FnOnce(&HashMap<PathBuf, String>) -> T) -> T {
        let files = self.files.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&files)
    }
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        let path = self.normalize_path(path);
        self.with_files(|files| {
            files.contains_key(&path) || files.keys().any(|f| f.starts_with(&path))
        })
    }

    fn is_file(&self, path: &Path) -> bool {
        let path = self.normalize_path(path);
        self.with_files(|files| files.contains_key(&path))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let path = self.normalize_path(path);
        self.with_files(|files| files.get(&path).cloned())
            .ok_or_else(|| anyhow!("File not found: {:?}", path))
    }
}
