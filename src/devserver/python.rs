use super::entrypoint;
use super::{DevServerPipeline, RunningDevServer};
use crate::detection::{ProjectStrategy, PythonProject};
use crate::fs::FileSystem;
use crate::process::CommandRunner;
use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

impl<R: CommandRunner + ?Sized> DevServerPipeline<'_, R> {
    async fn install_python(&self, project: &PythonProject) -> Result<()> {
        for spec in project.install_commands(self.config.install_mode) {
            self.run_bounded_step("python-install", &spec, self.config.timeouts.install)
                .await?;
        }
        Ok(())
    }

    pub(super) async fn run_django<F: FileSystem>(&self, fs: &F, dir: &Path) -> Result<Option<RunningDevServer>> {
        let project = PythonProject::load(fs, dir);
        self.install_python(&project).await?;

        if let Err(e) = self
            .run_bounded_step("django-migrate", &project.django_migrate(), self.config.timeouts.install)
            .await
        {
            warn!(stage = "django-migrate", error = %format!("{:#}", e), "Migrations failed, starting anyway");
        }

        let mut child = self
            .runner
            .spawn("django", &project.django_runserver(self.port()))?;
        self.ensure_alive(&mut child).await?;

        Ok(Some(RunningDevServer::process(
            self.outcome(ProjectStrategy::Django, self.local_address()),
            child,
        )))
    }

    pub(super) async fn run_python_web<F: FileSystem>(
        &self,
        fs: &F,
        dir: &Path,
    ) -> Result<Option<RunningDevServer>> {
        let project = PythonProject::load(fs, dir);
        self.install_python(&project).await?;
        self.run_bounded_step(
            "python-server-install",
            &project.server_install_command(self.config.install_mode),
            self.config.timeouts.install,
        )
        .await?;

        let found = entrypoint::search(
            self.runner,
            self.probe,
            &project,
            self.port(),
            self.config.timeouts.entrypoint_grace,
        )
        .await;

        Ok(found.map(|(entry, child)| {
            info!(entry_point = %entry, "Python web app started");
            RunningDevServer::process(
                self.outcome(ProjectStrategy::PythonWeb, self.local_address()),
                child,
            )
        }))
    }
}
