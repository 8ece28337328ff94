//! Framework entry-point search for generic Python web apps

use crate::compose::ProbeTarget;
use crate::detection::PythonProject;
use crate::process::{CommandRunner, ManagedChild};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// A `module:attr` the server can be pointed at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    pub target: &'static str,
    /// `attr` is an application factory, not an application
    pub factory: bool,
}

impl EntryPoint {
    const fn app(target: &'static str) -> Self {
        Self { target, factory: false }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.factory {
            write!(f, "{} (factory)", self.target)
        } else {
            f.write_str(self.target)
        }
    }
}

pub const ENTRY_POINTS: &[EntryPoint] = &[
    EntryPoint::app("main:app"),
    EntryPoint::app("app:app"),
    EntryPoint::app("app.main:app"),
    EntryPoint::app("src.main:app"),
    EntryPoint::app("api:app"),
    EntryPoint::app("server:app"),
    EntryPoint::app("application:app"),
    EntryPoint::app("wsgi:app"),
    EntryPoint::app("asgi:app"),
    EntryPoint {
        target: "app:create_app",
        factory: true,
    },
];

/// Starts each candidate in turn and keeps the first one that is still alive
/// and accepting connections on `port` after `grace`. Failed attempts are
/// killed before the next one starts.
pub async fn search<R, P>(
    runner: &R,
    probe: &P,
    project: &PythonProject,
    port: u16,
    grace: Duration,
) -> Option<(EntryPoint, ManagedChild)>
where
    R: CommandRunner + ?Sized,
    P: ProbeTarget + ?Sized,
{
    for entry in ENTRY_POINTS {
        let spec = project.serve_command(entry.target, entry.factory, port);
        let mut child = match runner.spawn("python-web", &spec) {
            Ok(child) => child,
            Err(e) => {
                warn!(entry_point = %entry, error = %e, "Could not start candidate");
                continue;
            }
        };

        tokio::time::sleep(grace).await;
        if !child.has_exited() && probe.is_reachable("127.0.0.1", port).await {
            return Some((*entry, child));
        }

        debug!(entry_point = %entry, "Candidate did not bind, trying next");
        child.terminate().await;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devserver::tests::CountingProbe;
    use crate::fs::MockFileSystem;
    use crate::process::runner::testing::ScriptedRunner;
    use std::path::Path;

    fn flask_project() -> PythonProject {
        let fs = MockFileSystem::new();
        fs.add_file("requirements.txt", "flask\n");
        PythonProject::load(&fs, Path::new("/mock"))
    }

    #[tokio::test]
    async fn test_search_adopts_first_bound_candidate() {
        let runner = ScriptedRunner::succeeding();
        let probe = CountingProbe::new(2);

        let (entry, _child) = search(&runner, &probe, &flask_project(), 5000, Duration::from_millis(5))
            .await
            .unwrap();

        assert_eq!(entry.target, "app:app");
        let spawned = runner.spawned();
        assert_eq!(spawned.len(), 2);
        assert!(spawned[1].1.has_arg("flask"));
        assert!(spawned[1].1.has_arg("app:app"));
    }

    #[tokio::test]
    async fn test_factory_candidate_is_last() {
        let runner = ScriptedRunner::succeeding();
        let probe = CountingProbe::new(ENTRY_POINTS.len());
        let fs = MockFileSystem::new();
        fs.add_file("requirements.txt", "fastapi\n");
        let project = PythonProject::load(&fs, Path::new("/mock"));

        let (entry, _child) = search(&runner, &probe, &project, 8000, Duration::from_millis(1))
            .await
            .unwrap();

        assert!(entry.factory);
        assert!(runner.spawned().last().unwrap().1.has_arg("--factory"));
    }

    #[tokio::test]
    async fn test_search_exhausts_candidates() {
        let runner = ScriptedRunner::succeeding();
        let probe = CountingProbe::new(usize::MAX);

        let found = search(&runner, &probe, &flask_project(), 5000, Duration::from_millis(1)).await;
        assert!(found.is_none());
        assert_eq!(runner.spawned().len(), ENTRY_POINTS.len());
    }
}
