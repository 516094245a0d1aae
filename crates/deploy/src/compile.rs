//! Contract compilation before a run.

use anyhow::{Context, Result};
use tokio::process::Command;

/// Run the configured compile command (e.g. `npx hardhat compile`).
///
/// An empty command skips compilation.
pub async fn compile(command: &[String]) -> Result<()> {
    let Some((program, args)) = command.split_first() else {
        tracing::debug!("No compile command configured, skipping compilation");
        return Ok(());
    };

    let rendered = command.join(" ");
    tracing::info!(command = %rendered, "Compiling contracts...");

    let status = Command::new(program)
        .args(args)
        .status()
        .await
        .with_context(|| format!("Failed to run compile command '{}'", rendered))?;

    if !status.success() {
        anyhow::bail!("Compile command '{}' failed with {}", rendered, status);
    }

    tracing::info!("Contracts compiled");
    Ok(())
}
