//! Project classifier
//!
//! Classification is a priority-ordered table of marker files; the first rule
//! with a marker present in the workspace root decides the strategy. New
//! project types are added by appending rows to [`DEFAULT_RULES`].

use crate::fs::FileSystem;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Compose manifest names in lookup order
pub const COMPOSE_FILES: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

/// Startup strategy for a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStrategy {
    Compose,
    Node,
    Django,
    PythonWeb,
    Static,
}

impl ProjectStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ProjectStrategy::Compose => "compose",
            ProjectStrategy::Node => "node",
            ProjectStrategy::Django => "django",
            ProjectStrategy::PythonWeb => "python_web",
            ProjectStrategy::Static => "static",
        }
    }
}

impl fmt::Display for ProjectStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the classification table
#[derive(Debug, Clone, Copy)]
pub struct ClassifierRule {
    pub markers: &'static [&'static str],
    pub strategy: ProjectStrategy,
}

pub const DEFAULT_RULES: &[ClassifierRule] = &[
    ClassifierRule {
        markers: COMPOSE_FILES,
        strategy: ProjectStrategy::Compose,
    },
    ClassifierRule {
        markers: &["package.json"],
        strategy: ProjectStrategy::Node,
    },
    ClassifierRule {
        markers: &["manage.py"],
        strategy: ProjectStrategy::Django,
    },
    ClassifierRule {
        markers: &[
            "pyproject.toml",
            "requirements.txt",
            "requirements-dev.txt",
            "setup.py",
            "Pipfile",
        ],
        strategy: ProjectStrategy::PythonWeb,
    },
];

/// Result of classifying a workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub strategy: ProjectStrategy,
    /// The marker file that matched, absent for the static fallback
    pub marker: Option<PathBuf>,
}

pub struct ProjectClassifier<'a, F: FileSystem> {
    fs: &'a F,
    rules: &'a [ClassifierRule],
}

impl<'a, F: FileSystem> ProjectClassifier<'a, F> {
    pub fn new(fs: &'a F) -> Self {
        Self::with_rules(fs, DEFAULT_RULES)
    }

    pub fn with_rules(fs: &'a F, rules: &'a [ClassifierRule]) -> Self {
        Self { fs, rules }
    }

    /// Returns exactly one strategy for `dir`. Pure inspection, no side effects.
    pub fn classify(&self, dir: &Path) -> Classification {
        for rule in self.rules {
            for marker in rule.markers {
                let candidate = dir.join(marker);
                if self.fs.is_file(&candidate) {
                    return Classification {
                        strategy: rule.strategy,
                        marker: Some(candidate),
                    };
                }
            }
        }

        Classification {
            strategy: ProjectStrategy::Static,
            marker: None,
        }
    }
}

/// First compose manifest present in `dir`, in [`COMPOSE_FILES`] order
pub fn find_compose_manifest<F: FileSystem>(fs: &F, dir: &Path) -> Option<PathBuf> {
    COMPOSE_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| fs.is_file(path))
}
