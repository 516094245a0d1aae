use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

/// Output format of `stakehouse list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "stakehouse")]
#[command(
    author,
    version,
    about = "Deploy, verify and record the staking contracts"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "STAKEHOUSE_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the Stakehouse.toml configuration file.
    ///
    /// If not provided, ./Stakehouse.toml is used when it exists, built-in defaults otherwise.
    #[arg(long, alias = "conf", global = true, env = "STAKEHOUSE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile and deploy the contracts, verify them on live networks and record their addresses.
    Deploy(DeployArgs),
    /// Show the recorded contract addresses.
    List(ListArgs),
    /// Write a default configuration file.
    Init(InitArgs),
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// The network to deploy to. Defaults to `default_network` from the configuration.
    #[arg(short, long, env = "STAKEHOUSE_NETWORK")]
    pub network: Option<String>,

    /// Skip compiling the contracts before deploying.
    #[arg(long)]
    pub skip_compile: bool,

    /// Skip block explorer verification on live networks.
    #[arg(long)]
    pub no_verify: bool,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only show the contracts of this network.
    #[arg(short, long)]
    pub network: Option<String>,

    /// The output format (table or json).
    #[arg(long, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Overwrite an existing configuration file.
    #[arg(long)]
    pub force: bool,
}
