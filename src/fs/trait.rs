//! FileSystem trait definition

use anyhow::Result;
use std::path::Path;

/// Abstraction over the handful of file operations detection needs
pub trait FileSystem: Send + Sync {
    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a regular file
    fn is_file(&self, path: &Path) -> bool;

    /// Read file contents as string
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Returns true if any of `names` is a file directly under `dir`
    fn has_any_file(&self, dir: &Path, names: &[&str]) -> bool {
        names.iter().any(|name| self.is_file(&dir.join(name)))
    }
}
