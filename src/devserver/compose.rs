use super::{DevServerPipeline, RunningDevServer};
use crate::compose::prober::list_services;
use crate::compose::{ComposeProject, ComposeRewriter, StackLauncher, WebUiProber};
use crate::detection::ProjectStrategy;
use crate::docker::host_path_for;
use crate::process::CommandRunner;
use crate::relay::TcpRelay;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

const PS_TIMEOUT: Duration = Duration::from_secs(30);

impl<R: CommandRunner + ?Sized> DevServerPipeline<'_, R> {
    /// rewrite, launch, join, probe, relay; strictly in that order
    pub(super) async fn run_compose(&self, dir: &Path, manifest: &Path) -> Result<Option<RunningDevServer>> {
        let volumes = self
            .volumes
            .context("Docker API unavailable, cannot resolve host paths")?;
        let mountpoint = volumes
            .volume_mountpoint(&self.config.volume_name)
            .await
            .with_context(|| format!("Resolving mountpoint of volume {}", self.config.volume_name))?;
        let host_repo = host_path_for(dir, &self.config.workspace_root, &mountpoint)?;
        info!(host_repo = %host_repo.display(), "Resolved host path of repository");

        let plan = ComposeRewriter::new(&host_repo).apply(manifest)?;
        let project = ComposeProject::from_plan(&plan);

        let launcher = StackLauncher::new(self.runner, &self.config.timeouts);
        launcher.up(&project, &plan.host_mode_services).await?;
        if let Some(joiner) = self.joiner {
            launcher
                .join_network(joiner, &project, self.config.container_id.as_deref())
                .await;
        }

        tokio::time::sleep(self.config.timeouts.probe_settle).await;
        let entries = list_services(self.runner, &project, PS_TIMEOUT).await?;
        let endpoint = WebUiProber::new(self.probe).find(&entries).await?;

        let listen = SocketAddr::from(([0, 0, 0, 0], self.port()));
        let relay = TcpRelay::bind(listen, endpoint.to_string()).await?.spawn();

        Ok(Some(RunningDevServer::relayed(
            self.outcome(ProjectStrategy::Compose, endpoint.to_string()),
            relay,
        )))
    }
}
