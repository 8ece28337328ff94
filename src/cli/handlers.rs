//! Subcommand handlers. Each returns the process exit code.

use super::commands::{AdaptComposeArgs, DetectArgs, ProbeArgs, RelayArgs};
use super::output::{DetectionReport, OutputFormatter};
use crate::compose::prober::list_services;
use crate::compose::{ComposeProject, ComposeRewriter, Manifest, RoleAssignment, TcpProbe, WebUiProber, OVERRIDE_FILE};
use crate::config::SandboxConfig;
use crate::detection::{find_compose_manifest, NodeProject, ProjectClassifier, ProjectStrategy, PythonProject};
use crate::devserver::{static_server_command, ENTRY_POINTS};
use crate::fs::RealFileSystem;
use crate::process::supervisor::shutdown_signal;
use crate::process::{Supervisor, SystemRunner};
use crate::relay::TcpRelay;
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

const PS_TIMEOUT: Duration = Duration::from_secs(30);

fn print_output(output: anyhow::Result<String>) -> i32 {
    match output {
        Ok(text) => {
            print!("{}", text);
            if !text.ends_with('\n') {
                println!();
            }
            0
        }
        Err(e) => {
            error!("Failed to format output: {:#}", e);
            1
        }
    }
}

fn resolve_dir(path: Option<&Path>) -> Result<PathBuf, String> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => env::current_dir().map_err(|e| format!("Failed to get current directory: {}", e))?,
    };
    if !path.is_dir() {
        return Err(format!("Not a directory: {}", path.display()));
    }
    path.canonicalize()
        .map_err(|e| format!("Failed to canonicalize {}: {}", path.display(), e))
}

fn find_manifest(dir: &Path) -> Result<PathBuf, String> {
    find_compose_manifest(&RealFileSystem, dir)
        .ok_or_else(|| format!("No compose manifest found in {}", dir.display()))
}

pub async fn handle_up() -> i32 {
    let config = match SandboxConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return 1;
        }
    };
    info!(session = %config.session_id, repo = %config.repo_full_name, "Starting sandbox session");
    debug!(config = ?config, "Loaded configuration");

    match Supervisor::new(config).run().await {
        Ok(code) => code,
        Err(e) => {
            error!("Session failed: {:#}", e);
            1
        }
    }
}

/// Builds the report `detect` prints
pub fn detection_report(dir: &Path, port: u16) -> DetectionReport {
    let fs = RealFileSystem;
    let classification = ProjectClassifier::new(&fs).classify(dir);
    let mut launch = None;
    let mut notes = Vec::new();

    match classification.strategy {
        ProjectStrategy::Compose => {
            if let Some(manifest_path) = &classification.marker {
                let project = ComposeProject::new(manifest_path, Some(dir.join(OVERRIDE_FILE)));
                launch = Some(project.command().args(["up", "-d", "--no-build"]).to_string());
                notes.push(format!("network: {}", project.network_name()));
                match Manifest::load(manifest_path).and_then(|m| m.services()) {
                    Ok(services) => {
                        let roles = RoleAssignment::resolve(&services);
                        let names: Vec<&str> = services.iter().map(|s| s.name.as_str()).collect();
                        notes.push(format!("services: {}", names.join(", ")));
                        notes.push(format!("database role: {}", roles.database));
                        notes.push(format!("cache role: {}", roles.cache));
                    }
                    Err(e) => notes.push(format!("manifest unreadable: {}", e)),
                }
            }
        }
        ProjectStrategy::Node => match NodeProject::load(&fs, dir) {
            Ok(project) => {
                notes.push(format!("package manager: {}", project.package_manager.program()));
                match project.launch_plan(port) {
                    Some(plan) => launch = Some(plan.command.to_string()),
                    None => notes.push("no dev or start script, would serve statically".to_string()),
                }
            }
            Err(e) => notes.push(format!("package.json unreadable: {:#}", e)),
        },
        ProjectStrategy::Django => {
            launch = Some(PythonProject::load(&fs, dir).django_runserver(port).to_string());
        }
        ProjectStrategy::PythonWeb => {
            let project = PythonProject::load(&fs, dir);
            notes.push(format!("server flavor: {:?}", project.flavor));
            let targets: Vec<String> = ENTRY_POINTS.iter().map(|e| e.to_string()).collect();
            notes.push(format!("entry points tried: {}", targets.join(", ")));
        }
        ProjectStrategy::Static => {
            launch = Some(static_server_command(dir, port).to_string());
        }
    }

    DetectionReport {
        path: dir.to_path_buf(),
        strategy: classification.strategy,
        marker: classification.marker,
        launch,
        notes,
    }
}

pub async fn handle_detect(args: &DetectArgs) -> i32 {
    let dir = match resolve_dir(args.repository_path.as_deref()) {
        Ok(dir) => dir,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };
    debug!("Repository path: {}", dir.display());

    let report = detection_report(&dir, args.port);
    print_output(OutputFormatter::new(args.format.into()).format_detection(&report))
}

pub async fn handle_adapt_compose(args: &AdaptComposeArgs) -> i32 {
    let manifest = match resolve_dir(Some(args.dir.as_path())).and_then(|dir| find_manifest(&dir)) {
        Ok(manifest) => manifest,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    match ComposeRewriter::new(&args.host_path).apply(&manifest) {
        Ok(plan) => print_output(OutputFormatter::new(args.format.into()).format_plan(&plan)),
        Err(e) => {
            error!("Compose rewrite failed: {}", e);
            1
        }
    }
}

pub async fn handle_probe(args: &ProbeArgs) -> i32 {
    let (dir, manifest) = match resolve_dir(Some(args.dir.as_path())).and_then(|dir| {
        let manifest = find_manifest(&dir)?;
        Ok((dir, manifest))
    }) {
        Ok(found) => found,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    let override_file = Some(dir.join(OVERRIDE_FILE)).filter(|p| p.is_file());
    let project = ComposeProject::new(manifest, override_file);

    let entries = match list_services(&SystemRunner, &project, PS_TIMEOUT).await {
        Ok(entries) => entries,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    let probe = TcpProbe::new(Duration::from_secs(args.timeout));
    let mut prober = WebUiProber::new(&probe);
    if !args.ports.is_empty() {
        prober = prober.with_ports(args.ports.clone());
    }

    match prober.find(&entries).await {
        Ok(endpoint) => print_output(OutputFormatter::new(args.format.into()).format_endpoint(&endpoint)),
        Err(e) => {
            error!("{}", e);
            1
        }
    }
}

pub async fn handle_relay(args: &RelayArgs) -> i32 {
    let listen = SocketAddr::new(args.bind, args.listen);
    let relay = match TcpRelay::bind(listen, args.target.clone()).await {
        Ok(relay) => relay,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    tokio::select! {
        _ = relay.run() => {}
        _ = shutdown_signal() => info!("Relay stopped"),
    }
    0
}
