use devbox::cli::commands::{CliArgs, Commands};
use devbox::cli::handlers::{handle_adapt_compose, handle_detect, handle_probe, handle_relay, handle_up};
use devbox::util::logging::{init_logging, parse_level, LoggingConfig};
use devbox::{NAME, VERSION};

use clap::Parser;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("{} v{} starting", NAME, VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match args.command_or_default() {
        Commands::Up => handle_up().await,
        Commands::Detect(detect_args) => handle_detect(&detect_args).await,
        Commands::AdaptCompose(adapt_args) => handle_adapt_compose(&adapt_args).await,
        Commands::Probe(probe_args) => handle_probe(&probe_args).await,
        Commands::Relay(relay_args) => handle_relay(&relay_args).await,
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let mut config = LoggingConfig::from_env();
    if let Some(level_str) = &args.log_level {
        config.level = parse_level(level_str);
    } else if args.verbose {
        config.level = Level::DEBUG;
    } else if args.quiet {
        config.level = Level::ERROR;
    }

    init_logging(config);
}
