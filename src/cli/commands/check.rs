use crate::cli::commands::{load_config, override_rpc};
use crate::config::{AppConfig, BalanceMethod};
use crate::errors::AppResult;
use crate::processor::{read_addresses, BatchBalanceScanner, ConfigValidator};
use crate::report::{ReportSummary, ReportWriter};
use crate::rpc::{CoreRpcConnector, NodeConnector};
use crate::types::ReportRow;
use clap::Args;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args)]
pub struct CheckCommand {
    /// Address list, one address per line (overrides config.toml)
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Report CSV path (overrides config.toml)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Addresses per section (overrides config.toml)
    #[arg(long)]
    pub section_size: Option<usize>,

    /// Look up addresses exactly as given instead of converting to legacy
    #[arg(long)]
    pub no_normalize: bool,

    /// How balances are looked up (overrides config.toml)
    #[arg(long, value_enum)]
    pub balance_method: Option<BalanceMethod>,

    /// Skip the per-section partial snapshots
    #[arg(long)]
    pub no_partial: bool,

    /// Bitcoin RPC URL (overrides config.toml)
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Bitcoin RPC username (overrides config.toml)
    #[arg(long)]
    pub rpc_username: Option<String>,

    /// Bitcoin RPC password (overrides config.toml)
    #[arg(long)]
    pub rpc_password: Option<String>,

    /// Maximum connection attempts per section (overrides config.toml)
    #[arg(long)]
    pub max_retries: Option<usize>,
}

impl CheckCommand {
    pub async fn run(&self) -> AppResult<()> {
        info!("=== Bitcoin Address Balance Checker ===");

        let config = self.resolve_config(load_config()?);
        let rows = check(&config, Arc::new(CoreRpcConnector)).await?;

        ReportSummary::from_rows(&rows).print();
        println!("\nResults saved to {}", config.paths.output_csv.display());
        Ok(())
    }

    /// CLI arguments override config values
    pub fn resolve_config(&self, mut config: AppConfig) -> AppConfig {
        if let Some(input) = &self.input {
            config.paths.addresses = input.clone();
        }
        if let Some(output) = &self.output {
            config.paths.output_csv = output.clone();
        }
        if let Some(size) = self.section_size {
            config.scan.section_size = size;
        }
        if self.no_normalize {
            config.scan.normalize = false;
        }
        if let Some(method) = self.balance_method {
            config.scan.balance_method = method;
        }
        if self.no_partial {
            config.scan.save_partial = false;
        }
        if let Some(retries) = self.max_retries {
            config.bitcoin_rpc.max_retries = retries;
        }
        override_rpc(
            &mut config.bitcoin_rpc,
            &self.rpc_url,
            &self.rpc_username,
            &self.rpc_password,
        );
        config
    }
}

/// Read the address list, check every address and write the report
///
/// Input problems abort before any node connection is attempted. Returns the
/// rows written, in input order.
pub async fn check(
    config: &AppConfig,
    connector: Arc<dyn NodeConnector>,
) -> AppResult<Vec<ReportRow>> {
    let addresses = read_addresses(&config.paths.addresses)?;
    ConfigValidator::log_config_summary(&config.bitcoin_rpc, &config.scan);

    let output = &config.paths.output_csv;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut scanner =
        BatchBalanceScanner::new(config.bitcoin_rpc.clone(), config.scan.clone(), connector)?
            .with_partial_output(output);
    let rows = scanner.run(&addresses).await?;

    ReportWriter::write_csv(output, &rows)?;
    Ok(rows)
}
