//! Repository checkout inside the shared workspace volume

use crate::config::SandboxConfig;
use crate::process::{CommandRunner, CommandSpec};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

pub fn clone_command(config: &SandboxConfig) -> CommandSpec {
    CommandSpec::new("git")
        .args(["clone", "--depth", "1", "--branch", config.branch.as_str()])
        .arg(config.clone_url())
        .arg(config.repo_dir().to_string_lossy())
        .env("GIT_TERMINAL_PROMPT", "0")
}

/// Clones the repository unless it is already checked out. A missing checkout
/// afterwards is fatal.
pub async fn ensure_checkout<R: CommandRunner + ?Sized>(runner: &R, config: &SandboxConfig) -> Result<PathBuf> {
    let dir = config.repo_dir();
    if dir.is_dir() {
        info!(dir = %dir.display(), "Repository already checked out");
        return Ok(dir);
    }

    std::fs::create_dir_all(&config.workspace_root)
        .with_context(|| format!("Failed to create {}", config.workspace_root.display()))?;

    let spec = clone_command(config);
    info!(repo = %config.repo_full_name, branch = %config.branch, "Cloning repository");
    match runner.run(&spec, config.timeouts.clone).await {
        Ok(output) => {
            if let Err(e) = output.into_result(&spec) {
                warn!(error = %e, "git clone failed");
            }
        }
        Err(e) => warn!(error = %e, "git clone failed"),
    }

    if !dir.is_dir() {
        bail!("Repository {} is not available at {}", config.repo_full_name, dir.display());
    }
    Ok(dir)
}
