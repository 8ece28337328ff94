//! devbox - in-sandbox dev environment bootstrapper
//!
//! Runs inside a per-repository development sandbox. It checks out the
//! repository, keeps the editor and agent API alive, and figures out how to
//! serve the project's dev server on a single public port.
//!
//! # Core Concepts
//!
//! - **Classification**: a priority-ordered table of marker files picks one
//!   strategy per repository (Compose, Node, Django, Python web, static)
//! - **Compose adaptation**: stacks written for a developer laptop are patched
//!   so they work when launched from inside a sibling container; relative bind
//!   mounts, host networking and localhost-addressed databases are rewritten
//! - **Probing and relaying**: the web UI of a stack is discovered by TCP
//!   probing and exposed on the public port through a relay
//! - **Fallback**: every recoverable failure ends in a static file server, so
//!   the port always serves something
//!
//! # Project Structure
//!
//! - [`detection`]: project classification and per-ecosystem launch plans
//! - [`compose`]: manifest model, rewriter, launcher and prober
//! - [`devserver`]: the pipeline tying detection to a running server
//! - [`relay`]: TCP relay
//! - [`process`]: bounded commands, child handles, session supervisor

pub mod cli;
pub mod compose;
pub mod config;
pub mod detection;
pub mod devserver;
pub mod docker;
pub mod fs;
pub mod process;
pub mod relay;
pub mod util;
pub mod workspace;

pub use compose::{ComposeError, ComposeRewriter, RewritePlan};
pub use config::{ConfigError, InstallMode, SandboxConfig, Timeouts};
pub use detection::{ProjectClassifier, ProjectStrategy};
pub use devserver::{DevServerOutcome, DevServerPipeline, RunningDevServer};
pub use process::{CommandRunner, CommandSpec, ManagedChild, ProcessError, Supervisor, SystemRunner};
pub use relay::{RelayError, RelayHandle, TcpRelay};
pub use util::{init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
