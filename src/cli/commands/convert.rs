use crate::cli::commands::{load_config, override_rpc};
use crate::detection::{classify_offline, network_from_chain, AddressNormalizer, ConversionStatus, ScriptType};
use crate::errors::{AppError, AppResult};
use crate::processor::read_addresses;
use crate::report::ReportWriter;
use crate::rpc::{CoreRpcConnector, NodeClient};
use crate::types::{BalanceResult, ConversionResult, ReportRow};
use bitcoin::Network;
use clap::Args;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tracing::{info, warn};

/// Print legacy conversions without checking balances
#[derive(Args)]
pub struct ConvertCommand {
    /// Address list, one address per line
    #[arg(long, short)]
    pub input: PathBuf,

    /// Classify locally instead of asking the node (P2SH is never converted)
    #[arg(long)]
    pub offline: bool,

    /// Network for offline mode: main, test, testnet4, signet or regtest
    #[arg(long, default_value = "main")]
    pub network: String,

    /// Bitcoin RPC URL (overrides config.toml)
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Bitcoin RPC username (overrides config.toml)
    #[arg(long)]
    pub rpc_username: Option<String>,

    /// Bitcoin RPC password (overrides config.toml)
    #[arg(long)]
    pub rpc_password: Option<String>,
}

impl ConvertCommand {
    pub async fn run(&self) -> AppResult<()> {
        let addresses = read_addresses(&self.input)?;

        let rows = if self.offline {
            let network = network_from_chain(&self.network).ok_or_else(|| {
                AppError::Config(format!("Unknown network '{}'", self.network))
            })?;
            convert_offline(&addresses, network)
        } else {
            self.convert_with_node(&addresses).await?
        };

        ReportWriter::write_conversions(std::io::stdout().lock(), &rows)
    }

    async fn convert_with_node(&self, addresses: &[String]) -> AppResult<Vec<ReportRow>> {
        let mut config = load_config()?;
        override_rpc(
            &mut config.bitcoin_rpc,
            &self.rpc_url,
            &self.rpc_username,
            &self.rpc_password,
        );

        let client = NodeClient::connect(
            &config.bitcoin_rpc,
            &config.scan,
            Arc::new(CoreRpcConnector),
            Arc::new(AtomicU64::new(0)),
        )
        .await?;
        let network = network_from_chain(&client.chain_info().chain).unwrap_or(Network::Bitcoin);
        let normalizer = AddressNormalizer::new(network);
        info!("Converting {} addresses on {}", addresses.len(), network);

        let mut rows = Vec::with_capacity(addresses.len());
        for address in addresses {
            let conversion = match client.validate_address(address).await {
                Ok(validation) => {
                    let info = if normalizer.wants_address_info(&validation) {
                        client
                            .get_address_info(address)
                            .await
                            .map_err(|e| warn!("getaddressinfo for {} failed: {}", address, e))
                            .ok()
                    } else {
                        None
                    };
                    normalizer.normalize(address, &validation, info.as_ref())
                }
                Err(e) => {
                    warn!("Validation of {} failed: {}", address, e);
                    ConversionResult::rejected(
                        ConversionStatus::ValidationFailed(e.to_string()),
                        ScriptType::Unknown,
                    )
                }
            };
            rows.push(conversion_row(address, conversion));
        }
        Ok(rows)
    }
}

/// Convert addresses using only local decoding
pub fn convert_offline(addresses: &[String], network: Network) -> Vec<ReportRow> {
    let normalizer = AddressNormalizer::new(network);
    addresses
        .iter()
        .map(|address| {
            let validation = classify_offline(address, network);
            conversion_row(address, normalizer.normalize(address, &validation, None))
        })
        .collect()
}

fn conversion_row(address: &str, conversion: ConversionResult) -> ReportRow {
    ReportRow {
        original_address: address.to_string(),
        conversion,
        balance: BalanceResult::default(),
    }
}
