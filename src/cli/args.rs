use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Transport;

#[derive(Parser, Debug)]
#[clap(name = "pylet")]
#[clap(version, about = "Isolated Python code execution served over MCP")]
#[clap(propagate_version = true)]
pub struct Cli {
    #[clap(flatten)]
    pub global_opts: GlobalOpts,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct GlobalOpts {
    /// Configuration file path
    #[clap(short, long, global = true, env = "PYLET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the MCP server
    Serve(ServeArgs),

    /// Probe the interpreter and sandbox runtime without serving
    Check(CheckArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[clap(flatten)]
    pub execution: ExecutionOpts,

    /// MCP transport to serve on
    #[clap(long, value_enum)]
    pub transport: Option<Transport>,

    /// Host to bind the HTTP transport to
    #[clap(long)]
    pub host: Option<String>,

    /// Port to bind the HTTP transport to
    #[clap(long)]
    pub port: Option<u16>,

    /// Route the HTTP transport serves the tool on
    #[clap(long)]
    pub path: Option<String>,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[clap(flatten)]
    pub execution: ExecutionOpts,
}

/// Execution options shared by `serve` and `check`; each overrides the
/// corresponding config-file value.
#[derive(Args, Debug)]
pub struct ExecutionOpts {
    /// Sandbox-runtime policy file passed through via --settings
    #[clap(long, env = "PYLET_SRT_SETTINGS")]
    pub srt_settings: Option<PathBuf>,

    /// Python interpreter the staged code is run with
    #[clap(long, env = "PYLET_PYTHON")]
    pub python: Option<PathBuf>,

    /// Parent directory for per-invocation workspaces
    #[clap(long)]
    pub workdir: Option<PathBuf>,

    /// Seconds before a running snippet is forcibly terminated
    #[clap(long)]
    pub timeout: Option<u64>,

    /// Python package available in the interpreter environment (repeatable).
    /// Surfaced in the tool description, not enforced.
    #[clap(long = "dependency", short = 'd')]
    pub dependencies: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[clap(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show configuration file path
    Path,
}
