//! Command execution seam
//!
//! Components that shell out take a [`CommandRunner`] so tests can substitute a
//! scripted runner for real `docker`, `npm`, or `pip` invocations.

use super::{run_bounded, CommandOutput, CommandSpec, ManagedChild, ProcessError};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs a command to completion under a hard timeout
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput, ProcessError>;

    /// Starts a long-running process
    fn spawn(&self, name: &str, spec: &CommandSpec) -> Result<ManagedChild, ProcessError>;
}

/// Runs commands on the host for real
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput, ProcessError> {
        run_bounded(spec, timeout).await
    }

    fn spawn(&self, name: &str, spec: &CommandSpec) -> Result<ManagedChild, ProcessError> {
        ManagedChild::spawn(name, spec)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_system_runner_runs() {
        let runner = SystemRunner;
        let output = runner
            .run(&CommandSpec::new("echo").arg("hi"), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hi");
    }

    #[tokio::test]
    async fn test_scripted_runner_records() {
        let runner = testing::ScriptedRunner::succeeding();
        runner
            .run(&CommandSpec::new("npm").arg("install"), Duration::from_secs(1))
            .await
            .unwrap();
        let _child = runner.spawn("dev", &CommandSpec::new("npm").arg("start")).unwrap();

        assert_eq!(runner.ran().len(), 1);
        assert_eq!(runner.spawned()[0].0, "dev");
        assert!(runner.spawned()[0].1.has_arg("start"));
    }
}
