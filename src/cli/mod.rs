pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{AdaptComposeArgs, CliArgs, Commands, DetectArgs, ProbeArgs, RelayArgs};
pub use output::{DetectionReport, OutputFormat, OutputFormatter};
