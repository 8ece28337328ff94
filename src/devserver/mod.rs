//! Dev-server pipeline
//!
//! Classifies the checkout, runs the matching branch, and degrades to a
//! static file server on any recoverable failure. The result always serves
//! something on the configured port.

mod compose;
pub mod entrypoint;
mod fallback;
mod node;
mod python;

pub use entrypoint::{EntryPoint, ENTRY_POINTS};
pub use fallback::static_server_command;

use crate::compose::{NetworkJoiner, ProbeTarget};
use crate::config::SandboxConfig;
use crate::detection::{ProjectClassifier, ProjectStrategy};
use crate::docker::VolumeInspector;
use crate::fs::RealFileSystem;
use crate::process::{CommandRunner, ManagedChild};
use crate::relay::RelayHandle;
use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// What the pipeline ended up serving
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DevServerOutcome {
    /// Strategy that produced the server (`static` after a fallback)
    pub strategy: ProjectStrategy,
    /// Strategy the classifier picked
    pub detected: ProjectStrategy,
    /// Address traffic on the public port ends up at
    pub address: String,
    /// Why the static fallback was taken, if it was
    pub fallback: Option<String>,
}

impl fmt::Display for DevServerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} server at {}", self.strategy, self.address)?;
        if let Some(reason) = &self.fallback {
            write!(f, " (fallback from {}: {})", self.detected, reason)?;
        }
        Ok(())
    }
}

/// Processes and listeners backing the dev server. Dropping this stops them.
pub struct RunningDevServer {
    pub outcome: DevServerOutcome,
    child: Option<ManagedChild>,
    relay: Option<RelayHandle>,
}

impl RunningDevServer {
    fn process(outcome: DevServerOutcome, child: ManagedChild) -> Self {
        Self {
            outcome,
            child: Some(child),
            relay: None,
        }
    }

    fn relayed(outcome: DevServerOutcome, relay: RelayHandle) -> Self {
        Self {
            outcome,
            child: None,
            relay: Some(relay),
        }
    }

    pub fn relay(&self) -> Option<&RelayHandle> {
        self.relay.as_ref()
    }

    pub async fn shutdown(mut self) {
        if let Some(child) = self.child.as_mut() {
            child.terminate().await;
        }
        if let Some(relay) = &self.relay {
            relay.stop();
        }
    }
}

pub struct DevServerPipeline<'a, R: CommandRunner + ?Sized> {
    config: &'a SandboxConfig,
    runner: &'a R,
    probe: &'a dyn ProbeTarget,
    volumes: Option<&'a dyn VolumeInspector>,
    joiner: Option<&'a dyn NetworkJoiner>,
}

impl<'a, R: CommandRunner + ?Sized> DevServerPipeline<'a, R> {
    pub fn new(config: &'a SandboxConfig, runner: &'a R, probe: &'a dyn ProbeTarget) -> Self {
        Self {
            config,
            runner,
            probe,
            volumes: None,
            joiner: None,
        }
    }

    /// Enables the compose branch. Without it compose repos fall back to
    /// static serving.
    pub fn with_docker<D>(mut self, docker: &'a D) -> Self
    where
        D: VolumeInspector + NetworkJoiner,
    {
        self.volumes = Some(docker);
        self.joiner = Some(docker);
        self
    }

    fn port(&self) -> u16 {
        self.config.dev_server_port
    }

    /// Classifies `dir` and brings up its dev server. Only fails when even the
    /// static fallback cannot be started.
    pub async fn run(&self, dir: &Path) -> Result<RunningDevServer> {
        let fs = RealFileSystem;
        let classification = ProjectClassifier::new(&fs).classify(dir);
        let detected = classification.strategy;
        info!(
            strategy = %detected,
            marker = ?classification.marker,
            dir = %dir.display(),
            "Classified project"
        );

        let attempt = match detected {
            ProjectStrategy::Compose => match classification.marker.as_deref() {
                Some(manifest) => self.run_compose(dir, manifest).await,
                None => Ok(None),
            },
            ProjectStrategy::Node => self.run_node(&fs, dir).await,
            ProjectStrategy::Django => self.run_django(&fs, dir).await,
            ProjectStrategy::PythonWeb => self.run_python_web(&fs, dir).await,
            ProjectStrategy::Static => {
                return self.serve_static(dir, detected, None);
            }
        };

        match attempt {
            Ok(Some(running)) => {
                info!(outcome = %running.outcome, "Dev server ready");
                Ok(running)
            }
            Ok(None) => {
                let reason = format!("no runnable {} entry point", detected);
                warn!(stage = %detected, fallback = "static", reason = %reason, "Serving files statically");
                self.serve_static(dir, detected, Some(reason))
            }
            Err(e) => {
                warn!(stage = %detected, fallback = "static", error = %format!("{:#}", e), "Dev server branch failed");
                self.serve_static(dir, detected, Some(format!("{:#}", e)))
            }
        }
    }

    fn outcome(&self, strategy: ProjectStrategy, address: String) -> DevServerOutcome {
        DevServerOutcome {
            strategy,
            detected: strategy,
            address,
            fallback: None,
        }
    }

    fn local_address(&self) -> String {
        format!("0.0.0.0:{}", self.port())
    }

    /// Waits out the grace period and fails if the server already died
    async fn ensure_alive(&self, child: &mut ManagedChild) -> Result<()> {
        tokio::time::sleep(self.config.timeouts.entrypoint_grace).await;
        if child.has_exited() {
            anyhow::bail!("{} exited during startup", child.name());
        }
        Ok(())
    }

    fn serve_static(
        &self,
        dir: &Path,
        detected: ProjectStrategy,
        fallback: Option<String>,
    ) -> Result<RunningDevServer> {
        let child = self
            .runner
            .spawn("static-server", &static_server_command(dir, self.port()))?;
        let outcome = DevServerOutcome {
            strategy: ProjectStrategy::Static,
            detected,
            address: self.local_address(),
            fallback,
        };
        info!(outcome = %outcome, "Static file server started");
        Ok(RunningDevServer::process(outcome, child))
    }

    async fn run_bounded_step(&self, stage: &str, spec: &crate::process::CommandSpec, timeout: Duration) -> Result<()> {
        info!(stage, command = %spec, "Running");
        self.runner.run(spec, timeout).await?.into_result(spec)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timeouts;
    use crate::process::runner::testing::ScriptedRunner;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    pub(super) struct CountingProbe {
        pub reachable_on: usize,
        pub calls: AtomicUsize,
    }

    impl CountingProbe {
        pub fn new(reachable_on: usize) -> Self {
            Self {
                reachable_on,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProbeTarget for CountingProbe {
        async fn is_reachable(&self, _host: &str, _port: u16) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.reachable_on
        }
    }

    pub(super) fn config() -> SandboxConfig {
        let vars: HashMap<String, String> = [
            ("REPO_NAME", "app"),
            ("SESSION_ID", "s-1"),
            ("GITHUB_PAT", "ghp_test"),
            ("DEV_SERVER_PORT", "5000"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let mut config = SandboxConfig::from_map(&vars).unwrap();
        config.timeouts = Timeouts {
            entrypoint_grace: Duration::from_millis(10),
            probe_settle: Duration::from_millis(10),
            ..Timeouts::default()
        };
        config
    }

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_plain_directory_serves_static_only() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "index.html", "<h1>hi</h1>");
        let config = config();
        let runner = ScriptedRunner::succeeding();
        let probe = CountingProbe::new(1);

        let running = DevServerPipeline::new(&config, &runner, &probe)
            .run(temp.path())
            .await
            .unwrap();

        assert_eq!(running.outcome.strategy, ProjectStrategy::Static);
        assert_eq!(running.outcome.fallback, None);
        assert_eq!(running.outcome.address, "0.0.0.0:5000");
        assert!(runner.ran().is_empty());

        let spawned = runner.spawned();
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].1, static_server_command(temp.path(), 5000));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_vite_project_uses_vite_dev_server() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "package.json",
            r#"{"scripts": {"dev": "vite", "start": "node server.js"}, "devDependencies": {"vite": "^5.0.0"}}"#,
        );
        write(temp.path(), "vite.config.ts", "export default {}");
        let config = config();
        let runner = ScriptedRunner::succeeding();
        let probe = CountingProbe::new(1);

        let running = DevServerPipeline::new(&config, &runner, &probe)
            .run(temp.path())
            .await
            .unwrap();

        assert_eq!(running.outcome.strategy, ProjectStrategy::Node);
        let ran = runner.ran();
        assert_eq!(ran.len(), 1);
        assert_eq!(ran[0].program, "npm");

        let spawned = runner.spawned();
        assert_eq!(spawned.len(), 1);
        let command = &spawned[0].1;
        assert!(command.has_arg("vite"));
        assert!(command.has_arg("--host") && command.has_arg("0.0.0.0"));
        assert!(command.has_arg("5000"));
        assert!(!command.has_arg("start"));
    }

    #[tokio::test]
    async fn test_node_install_failure_falls_back() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "package.json", r#"{"scripts": {"start": "node ."}}"#);
        let config = config();
        let runner = ScriptedRunner::new(|_| {
            Ok(crate::process::runner::testing::failed_output("npm ERR! network"))
        });
        let probe = CountingProbe::new(1);

        let running = DevServerPipeline::new(&config, &runner, &probe)
            .run(temp.path())
            .await
            .unwrap();

        assert_eq!(running.outcome.strategy, ProjectStrategy::Static);
        assert_eq!(running.outcome.detected, ProjectStrategy::Node);
        assert!(running.outcome.fallback.is_some());
        assert_eq!(runner.spawned()[0].0, "static-server");
    }

    #[tokio::test]
    async fn test_node_without_scripts_falls_back() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "package.json", r#"{"name": "lib"}"#);
        let config = config();
        let runner = ScriptedRunner::succeeding();
        let probe = CountingProbe::new(1);

        let running = DevServerPipeline::new(&config, &runner, &probe)
            .run(temp.path())
            .await
            .unwrap();

        assert_eq!(running.outcome.strategy, ProjectStrategy::Static);
        assert!(runner.ran().is_empty());
    }

    #[tokio::test]
    async fn test_compose_without_docker_falls_back() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "docker-compose.yml", "services:\n  web:\n    image: nginx\n");
        let config = config();
        let runner = ScriptedRunner::succeeding();
        let probe = CountingProbe::new(1);

        let running = DevServerPipeline::new(&config, &runner, &probe)
            .run(temp.path())
            .await
            .unwrap();

        assert_eq!(running.outcome.detected, ProjectStrategy::Compose);
        assert_eq!(running.outcome.strategy, ProjectStrategy::Static);
        assert!(runner.ran().is_empty());
        assert!(!temp.path().join(crate::compose::OVERRIDE_FILE).exists());
    }

    #[tokio::test]
    async fn test_django_migrates_then_runs() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "manage.py", "");
        write(temp.path(), "requirements.txt", "django\n");
        let config = config();
        let runner = ScriptedRunner::succeeding();
        let probe = CountingProbe::new(1);

        let running = DevServerPipeline::new(&config, &runner, &probe)
            .run(temp.path())
            .await
            .unwrap();

        assert_eq!(running.outcome.strategy, ProjectStrategy::Django);
        let ran = runner.ran();
        assert!(ran[0].has_arg("-r"));
        assert!(ran.last().unwrap().has_arg("migrate"));
        let spawned = runner.spawned();
        assert!(spawned[0].1.has_arg("runserver"));
        assert!(spawned[0].1.has_arg("0.0.0.0:5000"));
    }

    #[tokio::test]
    async fn test_python_web_searches_entry_points() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "requirements.txt", "fastapi\nuvicorn\n");
        let config = config();
        let runner = ScriptedRunner::succeeding();
        let probe = CountingProbe::new(3);

        let running = DevServerPipeline::new(&config, &runner, &probe)
            .run(temp.path())
            .await
            .unwrap();

        assert_eq!(running.outcome.strategy, ProjectStrategy::PythonWeb);
        let spawned = runner.spawned();
        assert_eq!(spawned.len(), 3);
        assert!(spawned[2].1.has_arg("app.main:app"));
    }

    #[tokio::test]
    async fn test_python_web_without_entry_point_falls_back() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "pyproject.toml", "[project]\nname = \"x\"\n");
        let config = config();
        let runner = ScriptedRunner::succeeding();
        let probe = CountingProbe::new(usize::MAX);

        let running = DevServerPipeline::new(&config, &runner, &probe)
            .run(temp.path())
            .await
            .unwrap();

        assert_eq!(running.outcome.strategy, ProjectStrategy::Static);
        let spawned = runner.spawned();
        assert_eq!(spawned.len(), ENTRY_POINTS.len() + 1);
        assert_eq!(spawned.last().unwrap().0, "static-server");
    }
}
