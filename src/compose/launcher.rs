//! Stack launcher and network joiner

use super::rewrite::RewritePlan;
use super::ComposeError;
use crate::config::Timeouts;
use crate::docker::DockerError;
use crate::process::{CommandOutput, CommandRunner, CommandSpec};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// stderr fragments meaning "the image isn't there yet", the only failure the
/// slow build path is allowed to handle
const IMAGE_MISSING_PATTERNS: &[&str] = &[
    "pull access denied",
    "no such image",
    "not found",
    "must be built",
    "failed to resolve reference",
];

/// A compose project as the `docker compose` CLI sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeProject {
    pub dir: PathBuf,
    pub manifest: PathBuf,
    pub override_file: Option<PathBuf>,
    pub name: String,
}

impl ComposeProject {
    pub fn new(manifest: impl Into<PathBuf>, override_file: Option<PathBuf>) -> Self {
        let manifest = manifest.into();
        let dir = manifest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let name = Self::project_name(&dir);
        Self {
            dir,
            manifest,
            override_file,
            name,
        }
    }

    pub fn from_plan(plan: &RewritePlan) -> Self {
        Self::new(&plan.manifest_path, Some(plan.override_path.clone()))
    }

    /// Lower-cased directory name restricted to `[a-z0-9_-]` and starting
    /// with a letter or digit, as `docker compose -p` requires
    pub fn project_name(dir: &Path) -> String {
        let raw = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let name: String = raw
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
            .skip_while(|c| *c == '_' || *c == '-')
            .collect();
        if name.is_empty() {
            "default".to_string()
        } else {
            name
        }
    }

    pub fn network_name(&self) -> String {
        format!("{}_default", self.name)
    }

    /// `docker compose -p <name> -f <manifest> [-f <override>]` in the project dir
    pub fn command(&self) -> CommandSpec {
        let mut spec = CommandSpec::new("docker")
            .args(["compose", "-p", self.name.as_str(), "-f"])
            .arg(self.manifest.to_string_lossy())
            .current_dir(&self.dir);
        if let Some(override_file) = &self.override_file {
            spec = spec.arg("-f").arg(override_file.to_string_lossy());
        }
        spec
    }
}

/// Why `up` failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpFailure {
    ImageMissing,
    Other,
}

pub fn classify_up_failure(stderr: &str) -> UpFailure {
    let stderr = stderr.to_lowercase();
    if IMAGE_MISSING_PATTERNS.iter().any(|p| stderr.contains(p)) {
        UpFailure::ImageMissing
    } else {
        UpFailure::Other
    }
}

/// Joins this container to a stack network
#[async_trait]
pub trait NetworkJoiner: Send + Sync {
    async fn join(&self, network: &str, container: &str) -> Result<(), DockerError>;
}

pub struct StackLauncher<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    up_timeout: Duration,
    build_timeout: Duration,
}

impl<'a, R: CommandRunner + ?Sized> StackLauncher<'a, R> {
    pub fn new(runner: &'a R, timeouts: &Timeouts) -> Self {
        Self {
            runner,
            up_timeout: timeouts.install,
            build_timeout: timeouts.build,
        }
    }

    async fn compose(
        &self,
        project: &ComposeProject,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, ComposeError> {
        let spec = project.command().args(args.iter().copied());
        debug!(command = %spec, "Running compose");
        Ok(self.runner.run(&spec, timeout).await?)
    }

    /// Brings the stack up: prebuilt images first, a bounded build and one
    /// retry only when images are missing, then force-recreates services that
    /// lost host networking.
    pub async fn up(&self, project: &ComposeProject, host_mode_services: &[String]) -> Result<(), ComposeError> {
        let fast = self
            .compose(project, &["up", "-d", "--no-build"], self.up_timeout)
            .await?;

        if fast.success() {
            info!(project = %project.name, "Stack started from existing images");
        } else {
            match classify_up_failure(&fast.stderr) {
                UpFailure::Other => {
                    return Err(ComposeError::Launch(last_line(&fast.stderr)));
                }
                UpFailure::ImageMissing => {
                    info!(project = %project.name, "Images missing, building stack");
                    let build_spec = project.command().arg("build");
                    self.compose(project, &["build"], self.build_timeout)
                        .await?
                        .into_result(&build_spec)?;

                    let retry = self.compose(project, &["up", "-d"], self.up_timeout).await?;
                    if !retry.success() {
                        return Err(ComposeError::Launch(last_line(&retry.stderr)));
                    }
                    info!(project = %project.name, "Stack started after build");
                }
            }
        }

        if !host_mode_services.is_empty() {
            let mut args = vec!["up", "-d", "--no-build", "--force-recreate", "--no-deps"];
            args.extend(host_mode_services.iter().map(String::as_str));
            match self.compose(project, &args, self.up_timeout).await {
                Ok(output) if output.success() => {
                    info!(services = ?host_mode_services, "Recreated former host-network services");
                }
                Ok(output) => {
                    warn!(services = ?host_mode_services, error = %last_line(&output.stderr), "Force recreate failed");
                }
                Err(e) => {
                    warn!(services = ?host_mode_services, error = %e, "Force recreate failed");
                }
            }
        }

        Ok(())
    }

    /// Best-effort join of `container` to the project network. Returns
    /// whether the container is now attached.
    pub async fn join_network(
        &self,
        joiner: &dyn NetworkJoiner,
        project: &ComposeProject,
        container: Option<&str>,
    ) -> bool {
        let Some(container) = container else {
            warn!("Own container id unknown, skipping network join");
            return false;
        };
        let network = project.network_name();
        match joiner.join(&network, container).await {
            Ok(()) => {
                info!(network = %network, "Joined stack network");
                true
            }
            Err(e) => {
                warn!(network = %network, error = %e, "Network join failed, continuing");
                false
            }
        }
    }
}

fn last_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("compose exited with an error")
        .trim()
        .to_string()
}
