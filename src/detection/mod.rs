//! Repository classification
//!
//! - [`classifier`]: decides which startup strategy a workspace needs
//! - [`node`]: package manager and dev command selection for Node projects
//! - [`python`]: dependency installation and server framework hints for Python projects

pub mod classifier;
pub mod node;
pub mod python;

pub use classifier::{
    find_compose_manifest, Classification, ClassifierRule, ProjectClassifier, ProjectStrategy, COMPOSE_FILES,
    DEFAULT_RULES,
};
pub use node::{NodeLaunchKind, NodeLaunchPlan, NodeProject, PackageManager};
pub use python::{PythonProject, ServerFlavor};
