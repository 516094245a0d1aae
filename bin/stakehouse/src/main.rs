//! stakehouse is a CLI tool to deploy, verify and keep track of the staking contracts.

mod cli;
mod config;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;

use cli::{Cli, Command, DeployArgs, InitArgs, ListArgs, OutputFormat};
use stakehouse_deploy::{
    ArtifactStore, CONFIG_FILENAME, DeployConfig, DeploymentRecords, EtherscanVerifier,
    RecordStore, RpcDeployer, RunOptions, Sequencer, compile::compile,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match cli.command {
        Command::Deploy(args) => deploy(cli.config.as_deref(), args).await,
        Command::List(args) => list(cli.config.as_deref(), args),
        Command::Init(args) => init(cli.config.as_deref(), args),
    }
}

async fn deploy(config_path: Option<&Path>, args: DeployArgs) -> Result<()> {
    let config = config::load(config_path)?;

    if !args.skip_compile {
        compile(&config.compile_command).await?;
    }

    let network = args.network.unwrap_or_else(|| config.default_network.clone());
    let profile = config.resolve_network(&network)?;

    tracing::info!(
        network = %profile.name,
        chain_id = profile.chain_id,
        rpc_url = %profile.rpc_url,
        development = profile.is_development,
        deployer = ?profile.credentials.address(),
        "Network resolved"
    );

    let artifacts = ArtifactStore::new(&config.artifacts_dir);
    let deployer = RpcDeployer::new(&profile, artifacts.clone())?
        .receipt_timeout(config.receipt_timeout())
        .confirmation_timeout(config.confirmation_timeout());
    let verifier = EtherscanVerifier::new(&config.etherscan, &profile, artifacts)?;
    let store = RecordStore::new(&config.records_path);

    let sequencer = Sequencer::new(
        deployer,
        verifier,
        store,
        RunOptions {
            verify: !args.no_verify,
        },
    );

    let results = sequencer
        .run(&profile, &config.plan())
        .await
        .with_context(|| format!("Deployment to {} failed", profile.name))?;

    tracing::info!(
        network = %profile.name,
        contracts = results.len(),
        records = %config.records_path.display(),
        "Deployment complete"
    );

    Ok(())
}

fn list(config_path: Option<&Path>, args: ListArgs) -> Result<()> {
    let config = config::load(config_path)?;
    let records = RecordStore::new(&config.records_path).load()?;

    let records = match &args.network {
        Some(network) => {
            let mut filtered = DeploymentRecords::default();
            for (contract, address) in records.network(network).into_iter().flatten() {
                filtered.record(network, contract, address);
            }
            filtered
        }
        None => records,
    };

    match args.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&records).context("Failed to serialize records")?
            );
        }
        OutputFormat::Table => {
            if records.is_empty() {
                tracing::info!(path = %config.records_path.display(), "No deployed contracts recorded");
                return Ok(());
            }
            println!("{}", records_table(&records));
        }
    }

    Ok(())
}

fn records_table(records: &DeploymentRecords) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Network", "Contract", "Address"]);
    for (network, contracts) in records.networks() {
        for (contract, address) in contracts {
            table.add_row(vec![network, contract.as_str(), address.as_str()]);
        }
    }
    table
}

fn init(config_path: Option<&Path>, args: InitArgs) -> Result<()> {
    let path = config_path.unwrap_or(Path::new(CONFIG_FILENAME));

    if path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists, use --force to overwrite it",
            path.display()
        );
    }

    DeployConfig::default().save_to_file(path)
}
