//! Web-UI prober
//!
//! Finds the one service in a running stack that answers on a typical dev
//! server port. Infrastructure services are never candidates.

use super::launcher::ComposeProject;
use crate::process::{CommandRunner, ProcessError};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Ports tried on every candidate service, most common dev servers first
pub const CANDIDATE_PORTS: &[u16] = &[3000, 5173, 8080, 8000, 5000, 4200, 4000, 8081, 80, 8888, 3001];

/// Matched against whole name segments, so `db` does not catch `dashboard`
const DENYLIST_SEGMENTS: &[&str] = &["db", "beat", "cron", "queue"];

const DENYLIST_SUBSTRINGS: &[&str] = &[
    "postgres",
    "mysql",
    "mariadb",
    "mongo",
    "redis",
    "valkey",
    "memcached",
    "rabbitmq",
    "kafka",
    "zookeeper",
    "elasticsearch",
    "minio",
    "worker",
    "celery",
    "scheduler",
    "mailhog",
    "mailpit",
];

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("No web UI found among {candidates} candidate service(s)")]
    NoUiFound { candidates: usize },

    #[error("Failed to list stack services: {0}")]
    Ps(#[from] ProcessError),

    #[error("Unreadable compose ps output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One row of `docker compose ps --format json`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PsEntry {
    #[serde(rename = "Service", default)]
    pub service: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "State", default)]
    pub state: String,
}

impl PsEntry {
    pub fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case("running")
    }
}

/// Accepts both the JSON array (older compose) and JSON-lines (newer) forms
pub fn parse_ps_output(output: &str) -> Result<Vec<PsEntry>, ProbeError> {
    let trimmed = output.trim();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    trimmed
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(ProbeError::from))
        .collect()
}

pub fn is_denylisted(service: &str) -> bool {
    let name = service.to_lowercase();
    name.split(['-', '_', '.'])
        .any(|segment| DENYLIST_SEGMENTS.contains(&segment))
        || DENYLIST_SUBSTRINGS.iter().any(|token| name.contains(token))
}

/// Reachability check used by the prober and the entry-point search
#[async_trait]
pub trait ProbeTarget: Send + Sync {
    async fn is_reachable(&self, host: &str, port: u16) -> bool;
}

/// Plain TCP connect with a per-attempt timeout
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    pub timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProbeTarget for TcpProbe {
    async fn is_reachable(&self, host: &str, port: u16) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect((host, port))).await,
            Ok(Ok(_))
        )
    }
}

/// Address of the discovered web UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub service: String,
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

pub struct WebUiProber<'a, P: ProbeTarget + ?Sized> {
    target: &'a P,
    ports: Vec<u16>,
}

impl<'a, P: ProbeTarget + ?Sized> WebUiProber<'a, P> {
    pub fn new(target: &'a P) -> Self {
        Self {
            target,
            ports: CANDIDATE_PORTS.to_vec(),
        }
    }

    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports;
        self
    }

    /// First reachable host:port among running, non-infrastructure services
    pub async fn find(&self, entries: &[PsEntry]) -> Result<Endpoint, ProbeError> {
        let candidates: Vec<&PsEntry> = entries
            .iter()
            .filter(|e| e.is_running() && !e.service.is_empty())
            .filter(|e| {
                let denied = is_denylisted(&e.service);
                if denied {
                    debug!(service = %e.service, "Skipping infrastructure service");
                }
                !denied
            })
            .collect();

        for entry in &candidates {
            let mut hosts = vec![entry.service.as_str()];
            if !entry.name.is_empty() && entry.name != entry.service {
                hosts.push(entry.name.as_str());
            }

            for &port in &self.ports {
                for host in &hosts {
                    if self.target.is_reachable(host, port).await {
                        let endpoint = Endpoint {
                            service: entry.service.clone(),
                            host: host.to_string(),
                            port,
                        };
                        info!(service = %entry.service, endpoint = %endpoint, "Found web UI");
                        return Ok(endpoint);
                    }
                }
            }
        }

        Err(ProbeError::NoUiFound {
            candidates: candidates.len(),
        })
    }
}

/// Runs `docker compose ps --format json` for the project
pub async fn list_services<R: CommandRunner + ?Sized>(
    runner: &R,
    project: &ComposeProject,
    timeout: Duration,
) -> Result<Vec<PsEntry>, ProbeError> {
    let spec = project.command().args(["ps", "--format", "json"]);
    let output = runner.run(&spec, timeout).await?.into_result(&spec)?;
    parse_ps_output(&output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use yare::parameterized;

    struct FakeTarget {
        open: HashSet<(String, u16)>,
        probed: Mutex<Vec<(String, u16)>>,
    }

    impl FakeTarget {
        fn new(open: &[(&str, u16)]) -> Self {
            Self {
                open: open.iter().map(|(h, p)| (h.to_string(), *p)).collect(),
                probed: Mutex::new(Vec::new()),
            }
        }

        fn probed_hosts(&self) -> HashSet<String> {
            self.probed.lock().unwrap().iter().map(|(h, _)| h.clone()).collect()
        }
    }

    #[async_trait]
    impl ProbeTarget for FakeTarget {
        async fn is_reachable(&self, host: &str, port: u16) -> bool {
            self.probed.lock().unwrap().push((host.to_string(), port));
            self.open.contains(&(host.to_string(), port))
        }
    }

    fn entry(service: &str, name: &str, state: &str) -> PsEntry {
        PsEntry {
            service: service.to_string(),
            name: name.to_string(),
            state: state.to_string(),
        }
    }

    #[test]
    fn test_parse_ps_json_lines() {
        let output = r#"{"Service":"web","Name":"app-web-1","State":"running","Publishers":[]}
{"Service":"db","Name":"app-db-1","State":"running"}
"#;
        let entries = parse_ps_output(output).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], entry("web", "app-web-1", "running"));
    }

    #[test]
    fn test_parse_ps_array() {
        let output = r#"[{"Service":"web","Name":"app-web-1","State":"exited"}]"#;
        let entries = parse_ps_output(output).unwrap();
        assert!(!entries[0].is_running());
    }

    #[test]
    fn test_parse_ps_empty() {
        assert!(parse_ps_output("  \n").unwrap().is_empty());
    }

    #[parameterized(
        db = { "db", true },
        app_db = { "app-db", true },
        postgres = { "postgres", true },
        redis_cache = { "redis-cache", true },
        celery_worker = { "celery_worker", true },
        celery_beat = { "celery-beat", true },
        web = { "web", false },
        dashboard = { "dashboard", false },
        frontend = { "frontend", false },
        api = { "api", false },
    )]
    fn test_is_denylisted(name: &str, expected: bool) {
        assert_eq!(is_denylisted(name), expected);
    }

    #[tokio::test]
    async fn test_find_skips_denylisted_service() {
        let target = FakeTarget::new(&[("db", 3000), ("web", 5173)]);
        let entries = vec![
            entry("db", "app-db-1", "running"),
            entry("web", "app-web-1", "running"),
        ];

        let endpoint = WebUiProber::new(&target).find(&entries).await.unwrap();
        assert_eq!(endpoint.to_string(), "web:5173");
        assert_eq!(endpoint.service, "web");
        assert!(!target.probed_hosts().contains("db"));
    }

    #[tokio::test]
    async fn test_find_falls_back_to_container_name() {
        let target = FakeTarget::new(&[("app-web-1", 8000)]);
        let entries = vec![entry("web", "app-web-1", "running")];

        let endpoint = WebUiProber::new(&target).find(&entries).await.unwrap();
        assert_eq!(endpoint.host, "app-web-1");
        assert_eq!(endpoint.port, 8000);
    }

    #[tokio::test]
    async fn test_find_prefers_earlier_port() {
        let target = FakeTarget::new(&[("web", 8080), ("web", 3000)]);
        let entries = vec![entry("web", "app-web-1", "running")];

        let endpoint = WebUiProber::new(&target).find(&entries).await.unwrap();
        assert_eq!(endpoint.port, 3000);
    }

    #[tokio::test]
    async fn test_find_ignores_stopped_and_reports_none() {
        let target = FakeTarget::new(&[("web", 3000)]);
        let entries = vec![
            entry("web", "app-web-1", "exited"),
            entry("postgres", "app-postgres-1", "running"),
        ];

        let err = WebUiProber::new(&target).find(&entries).await.unwrap_err();
        assert!(matches!(err, ProbeError::NoUiFound { candidates: 0 }));
        assert!(target.probed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tcp_probe_against_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = TcpProbe::new(Duration::from_secs(1));

        assert!(probe.is_reachable("127.0.0.1", port).await);
        drop(listener);
        assert!(!probe.is_reachable("127.0.0.1", port).await);
    }
}
