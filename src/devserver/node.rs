use super::{DevServerPipeline, RunningDevServer};
use crate::detection::{NodeProject, ProjectStrategy};
use crate::fs::FileSystem;
use crate::process::CommandRunner;
use anyhow::Result;
use std::path::Path;
use tracing::info;

impl<R: CommandRunner + ?Sized> DevServerPipeline<'_, R> {
    pub(super) async fn run_node<F: FileSystem>(&self, fs: &F, dir: &Path) -> Result<Option<RunningDevServer>> {
        let project = NodeProject::load(fs, dir)?;
        let Some(plan) = project.launch_plan(self.port()) else {
            return Ok(None);
        };

        self.run_bounded_step("node-install", &project.install_command(), self.config.timeouts.install)
            .await?;

        info!(kind = ?plan.kind, command = %plan.command, "Starting Node dev server");
        let mut child = self.runner.spawn("node-dev-server", &plan.command)?;
        self.ensure_alive(&mut child).await?;

        Ok(Some(RunningDevServer::process(
            self.outcome(ProjectStrategy::Node, self.local_address()),
            child,
        )))
    }
}
