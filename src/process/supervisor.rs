//! Session supervisor
//!
//! Runs the editor, the agent API, the optional tunnel and the dev-server
//! pipeline side by side. Losing the editor or the agent ends the session;
//! everything else goes down with them.

use super::{CommandRunner, CommandSpec, ManagedChild, SystemRunner};
use crate::compose::TcpProbe;
use crate::config::{SandboxConfig, AGENT_API_PORT, EDITOR_PORT};
use crate::devserver::DevServerPipeline;
use crate::docker::DockerClient;
use crate::workspace;
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Why the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    EditorExited,
    AgentExited,
    Signal,
}

impl ExitReason {
    pub fn exit_code(&self) -> i32 {
        match self {
            ExitReason::Signal => 0,
            ExitReason::EditorExited | ExitReason::AgentExited => 1,
        }
    }
}

pub struct Supervisor {
    config: Arc<SandboxConfig>,
}

impl Supervisor {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn editor_command(&self) -> CommandSpec {
        CommandSpec::new("code-server")
            .arg("--bind-addr")
            .arg(format!("0.0.0.0:{}", EDITOR_PORT))
            .args(["--auth", "none"])
            .arg(self.config.repo_dir().to_string_lossy())
    }

    pub fn agent_command(&self) -> CommandSpec {
        CommandSpec::new("uvicorn")
            .args(["copilot_agent_runner:app", "--host", "0.0.0.0", "--port"])
            .arg(AGENT_API_PORT.to_string())
            .current_dir(&self.config.agent_app_dir)
            .env("REPO_DIR", self.config.repo_dir().to_string_lossy())
            .env("SESSION_ID", self.config.session_id.as_str())
    }

    /// Token goes in `TUNNEL_TOKEN`, never on argv
    pub fn tunnel_command(&self) -> Option<CommandSpec> {
        self.config.tunnel_token.as_ref().map(|token| {
            CommandSpec::new("cloudflared")
                .args(["tunnel", "--no-autoupdate", "run"])
                .env("TUNNEL_TOKEN", token.as_str())
        })
    }

    /// Runs the session to completion and returns the process exit code
    pub async fn run(self) -> Result<i32> {
        let runner = SystemRunner;
        let repo_dir = workspace::ensure_checkout(&runner, &self.config).await?;

        let mut editor = runner.spawn("editor", &self.editor_command())?;
        let mut agent = runner.spawn("agent-api", &self.agent_command())?;
        info!(editor_port = EDITOR_PORT, agent_port = AGENT_API_PORT, "Core services started");

        let mut tunnel = match self.tunnel_command() {
            Some(spec) => match runner.spawn("tunnel", &spec) {
                Ok(child) => Some(child),
                Err(e) => {
                    warn!(error = %e, "Tunnel failed to start, continuing without it");
                    None
                }
            },
            None => None,
        };

        let pipeline = spawn_pipeline(Arc::clone(&self.config), repo_dir);

        let reason = watch(&mut editor, &mut agent, shutdown_signal()).await;
        match reason {
            ExitReason::Signal => info!("Shutdown requested"),
            ExitReason::EditorExited => error!("Editor exited, ending session"),
            ExitReason::AgentExited => error!("Agent API exited, ending session"),
        }

        pipeline.abort();
        let _ = pipeline.await;
        for child in [Some(&mut editor), Some(&mut agent), tunnel.as_mut()].into_iter().flatten() {
            child.terminate().await;
        }

        Ok(reason.exit_code())
    }
}

/// Dev-server pipeline as a background task. Its servers and relay live as
/// long as the task does.
fn spawn_pipeline(config: Arc<SandboxConfig>, repo_dir: std::path::PathBuf) -> JoinHandle<()> {
    tokio::spawn(async move {
        let runner = SystemRunner;
        let probe = TcpProbe::new(config.timeouts.probe_connect);
        let docker = match DockerClient::connect() {
            Ok(docker) => Some(docker),
            Err(e) => {
                warn!(error = %e, "Docker API unavailable, compose stacks will be served statically");
                None
            }
        };

        let pipeline = DevServerPipeline::new(&config, &runner, &probe);
        let pipeline = match &docker {
            Some(docker) => pipeline.with_docker(docker),
            None => pipeline,
        };

        match pipeline.run(&repo_dir).await {
            Ok(running) => {
                info!(outcome = %running.outcome, "Dev server pipeline finished");
                std::future::pending::<()>().await;
                drop(running);
            }
            Err(e) => error!(error = %format!("{:#}", e), "Dev server could not be started"),
        }
    })
}

/// Waits for the first of: editor exit, agent exit, `shutdown`
pub async fn watch<S>(editor: &mut ManagedChild, agent: &mut ManagedChild, shutdown: S) -> ExitReason
where
    S: Future<Output = ()>,
{
    tokio::select! {
        status = editor.wait() => {
            warn!(status = ?status, "Editor process ended");
            ExitReason::EditorExited
        }
        status = agent.wait() => {
            warn!(status = ?status, "Agent process ended");
            ExitReason::AgentExited
        }
        _ = shutdown => ExitReason::Signal,
    }
}

/// Resolves on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
