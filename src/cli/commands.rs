use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// In-sandbox bootstrapper that detects and serves a repository's dev server
#[derive(Parser, Debug)]
#[command(
    name = "devbox",
    about = "In-sandbox bootstrapper that detects and serves a repository's dev server",
    version,
    long_about = "devbox runs inside a development sandbox. It checks out the repository, \
                  starts the editor and agent services, and detects how to run the project's \
                  dev server: Docker Compose stacks, Node frameworks, Django, generic Python \
                  web apps, or a static file server as the last resort."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

impl CliArgs {
    /// `up` when no subcommand is given
    pub fn command_or_default(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Up)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    #[command(
        about = "Run the full sandbox session (default)",
        long_about = "Reads configuration from the environment, clones the repository if needed, \
                      starts the editor, agent API and optional tunnel, and brings up the dev \
                      server. Exits when the editor or agent dies, or on SIGINT/SIGTERM."
    )]
    Up,

    #[command(
        about = "Classify a repository and show how it would be served",
        long_about = "Inspects a directory and prints the detected strategy.\n\n\
                      Examples:\n  \
                      devbox detect\n  \
                      devbox detect /workspace/app --format json"
    )]
    Detect(DetectArgs),

    #[command(
        about = "Rewrite a compose project for sibling-container execution",
        long_about = "Writes the override file, patches env files and removes host networking, \
                      then prints the resulting plan. Does not start anything.\n\n\
                      Examples:\n  \
                      devbox adapt-compose /workspace/app --host-path /var/lib/docker/volumes/rv_repos/_data/app"
    )]
    AdaptCompose(AdaptComposeArgs),

    #[command(
        about = "Find the web UI of an already running compose stack",
        long_about = "Lists the running services of the compose project in DIR and probes them \
                      for a web UI.\n\n\
                      Examples:\n  \
                      devbox probe /workspace/app\n  \
                      devbox probe /workspace/app --ports 3000,8000"
    )]
    Probe(ProbeArgs),

    #[command(
        about = "Forward a local port to a host:port",
        long_about = "Runs the TCP relay in the foreground until interrupted.\n\n\
                      Examples:\n  \
                      devbox relay --listen 5000 --target web:3000"
    )]
    Relay(RelayArgs),
}

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct DetectArgs {
    #[arg(
        value_name = "PATH",
        help = "Path to repository (defaults to current directory)"
    )]
    pub repository_path: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(long, default_value = "5000", help = "Port the dev server would listen on")]
    pub port: u16,
}

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct AdaptComposeArgs {
    #[arg(value_name = "DIR", help = "Directory containing the compose manifest")]
    pub dir: PathBuf,

    #[arg(
        long,
        value_name = "PATH",
        help = "The repository's path as seen by the Docker host"
    )]
    pub host_path: PathBuf,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct ProbeArgs {
    #[arg(value_name = "DIR", help = "Directory containing the compose manifest")]
    pub dir: PathBuf,

    #[arg(
        long,
        value_delimiter = ',',
        help = "Ports to try, in order (defaults to common dev server ports)"
    )]
    pub ports: Vec<u16>,

    #[arg(
        long,
        value_name = "SECONDS",
        default_value = "2",
        help = "Per-attempt connect timeout in seconds"
    )]
    pub timeout: u64,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct RelayArgs {
    #[arg(long, value_name = "PORT", help = "Local port to listen on")]
    pub listen: u16,

    #[arg(long, value_name = "HOST:PORT", help = "Destination address")]
    pub target: String,

    #[arg(long, default_value = "0.0.0.0", help = "Address to bind the listener on")]
    pub bind: std::net::IpAddr,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}
