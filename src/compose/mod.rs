//! Docker Compose stack adaptation
//!
//! The pipeline for a Compose repository runs strictly in order:
//!
//! 1. [`rewrite`]: patch relative bind mounts, host networking and
//!    localhost-addressed dependencies so the stack works when launched from
//!    inside a sibling container
//! 2. [`launcher`]: bring the stack up and join its default network
//! 3. [`prober`]: find the service that serves the browser-facing UI
//!
//! The [`resolver`] decides which services play the database and cache roles
//! for the localhost rewrite.

pub mod envfile;
pub mod launcher;
pub mod manifest;
pub mod prober;
pub mod resolver;
pub mod rewrite;

pub use launcher::{ComposeProject, NetworkJoiner, StackLauncher, UpFailure};
pub use manifest::{EnvForm, Environment, Manifest, NetworkMode, OverrideDocument, ServiceDescriptor, VolumeSpec};
pub use prober::{Endpoint, ProbeError, ProbeTarget, PsEntry, TcpProbe, WebUiProber};
pub use resolver::{Role, RoleAssignment};
pub use rewrite::{ComposeRewriter, RewritePlan};

use crate::process::ProcessError;
use std::path::PathBuf;
use thiserror::Error;

/// Suffix appended to a file when its pristine copy is preserved
pub const BACKUP_SUFFIX: &str = ".devbox.bak";

/// File name of the generated override, next to the manifest
pub const OVERRIDE_FILE: &str = "docker-compose.devbox.override.yml";

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid compose file {path}: {message}")]
    Invalid { path: PathBuf, message: String },

    #[error("Failed to serialize compose document: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("Stack launch failed: {0}")]
    Launch(String),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Path of the backup kept for `path`
pub fn backup_path(path: &std::path::Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Copies `path` to its backup location unless a backup already exists, so
/// repeated runs keep the pristine original.
pub(crate) fn backup_once(path: &std::path::Path) -> Result<PathBuf, ComposeError> {
    let backup = backup_path(path);
    if !backup.exists() {
        std::fs::copy(path, &backup).map_err(|source| ComposeError::Write {
            path: backup.clone(),
            source,
        })?;
    }
    Ok(backup)
}
