use clap::Parser;

use pylet::cli::args::{Cli, Commands};
use pylet::cli::commands;
use pylet::config::load_config;
use pylet::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.global_opts.verbose);

    // Load configuration (file + CLI overrides)
    let config = load_config(cli.global_opts.config.as_deref())?;

    // Dispatch to subcommand handler
    match cli.command {
        Commands::Serve(args) => {
            commands::serve(args, config).await?;
        }
        Commands::Check(args) => {
            commands::check(args, config).await?;
        }
        Commands::Config(args) => {
            commands::config(args, config)?;
        }
    }

    Ok(())
}

fn init_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr: stdout belongs to the stdio transport
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
