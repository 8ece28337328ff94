use super::FileSystem;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl RealFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).context(format!("Failed to read file {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_file_and_read() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("subdir")).unwrap();
        fs::write(temp.path().join("manage.py"), "import django").unwrap();

        let real = RealFileSystem::new();
        assert!(real.exists(&temp.path().join("subdir")));
        assert!(!real.is_file(&temp.path().join("subdir")));
        assert!(real.is_file(&temp.path().join("manage.py")));
        assert_eq!(
            real.read_to_string(&temp.path().join("manage.py")).unwrap(),
            "import django"
        );
        assert!(real.read_to_string(&temp.path().join("missing")).is_err());
    }

    #[test]
    fn test_has_any_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("compose.yaml"), "services: {}").unwrap();

        let real = RealFileSystem::new();
        assert!(real.has_any_file(temp.path(), &["docker-compose.yml", "compose.yaml"]));
        assert!(!real.has_any_file(temp.path(), &["package.json"]));
    }
}
