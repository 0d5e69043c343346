use crate::config::{BalanceMethod, BitcoinRpcConfig, ScanConfig};
use crate::detection::{
    network_from_chain, script_pubkey_hex, AddressNormalizer, ConversionStatus, ScriptType,
    GENESIS_ADDRESS, GENESIS_BLOCK_HASH, GENESIS_COINBASE_SATS,
};
use crate::errors::{AppResult, RpcResult};
use crate::processor::{ConfigValidator, ProgressReporter, StandardProgressTracker};
use crate::report::ReportWriter;
use crate::rpc::{NodeClient, NodeConnector, ScanResult, ScannedOutput};
use crate::types::{
    BalanceResult, ConversionResult, ReportRow, ScanStats, StatisticsCollector,
};
use crate::utils::currency::format_sats_as_btc;
use bitcoin::Network;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Address looked up on the node, with the script its outputs will carry
#[derive(Debug, Clone, PartialEq)]
pub struct ScanTarget {
    pub address: String,
    pub script_pubkey: Option<String>,
}

impl ScanTarget {
    pub fn new(address: &str, network: Network) -> Self {
        Self {
            address: address.to_string(),
            script_pubkey: script_pubkey_hex(address, network),
        }
    }

    pub fn descriptor(&self) -> String {
        format!("addr({})", self.address)
    }
}

/// Conversion and balance for one original address
#[derive(Debug, Clone, PartialEq)]
pub struct AddressOutcome {
    pub conversion: ConversionResult,
    pub balance: BalanceResult,
}

/// Address inside an `addr(...)` descriptor, checksum suffix ignored
pub fn descriptor_address(descriptor: &str) -> Option<&str> {
    descriptor.strip_prefix("addr(")?.split(')').next()
}

/// Sum scan outputs per target address
///
/// Outputs are matched by scriptPubKey first, then by the address in their
/// descriptor. Every target gets an entry, zero when nothing matched.
pub fn attribute_outputs(result: &ScanResult, targets: &[ScanTarget]) -> HashMap<String, u64> {
    let by_script: HashMap<String, &str> = targets
        .iter()
        .filter_map(|t| {
            t.script_pubkey
                .as_ref()
                .map(|s| (s.to_ascii_lowercase(), t.address.as_str()))
        })
        .collect();

    let mut balances: HashMap<String, u64> =
        targets.iter().map(|t| (t.address.clone(), 0)).collect();

    for output in &result.unspents {
        let owner = by_script
            .get(&output.script_pubkey.to_ascii_lowercase())
            .copied()
            .or_else(|| {
                descriptor_address(&output.descriptor).filter(|a| balances.contains_key(*a))
            });

        match owner {
            Some(address) => {
                *balances.entry(address.to_string()).or_insert(0) += output.amount_sats;
            }
            None => warn!(
                "Scan output {}:{} ({} sats, {}) matches no requested address",
                output.txid, output.vout, output.amount_sats, output.descriptor
            ),
        }
    }

    balances
}

/// Join results back onto the input list; one row per input line, in order
pub fn build_rows(addresses: &[String], results: &HashMap<String, AddressOutcome>) -> Vec<ReportRow> {
    addresses
        .iter()
        .map(|address| {
            let outcome = results.get(address).cloned().unwrap_or_else(|| AddressOutcome {
                conversion: ConversionResult::rejected(
                    ConversionStatus::ValidationFailed("not processed".to_string()),
                    ScriptType::Unknown,
                ),
                balance: BalanceResult::failed("Not processed"),
            });
            ReportRow {
                original_address: address.clone(),
                conversion: outcome.conversion,
                balance: outcome.balance,
            }
        })
        .collect()
}

/// Splits an address list into sections and looks up balances section by section
///
/// Each section gets its own node connection. A section whose connection cannot
/// be established is recorded as failed and the run moves on; per-address
/// failures stay on their address.
pub struct BatchBalanceScanner {
    rpc_config: BitcoinRpcConfig,
    scan_config: ScanConfig,
    connector: Arc<dyn NodeConnector>,
    partial_output: Option<PathBuf>,
    error_count: Arc<AtomicU64>,
    genesis_exempt: Option<bool>,
    stats: ScanStats,
    progress_tracker: StandardProgressTracker,
}

impl BatchBalanceScanner {
    pub fn new(
        rpc_config: BitcoinRpcConfig,
        scan_config: ScanConfig,
        connector: Arc<dyn NodeConnector>,
    ) -> AppResult<Self> {
        ConfigValidator::validate_scan_config(&rpc_config, &scan_config)?;

        Ok(Self {
            rpc_config,
            scan_config,
            connector,
            partial_output: None,
            error_count: Arc::new(AtomicU64::new(0)),
            genesis_exempt: None,
            stats: ScanStats::new(),
            progress_tracker: StandardProgressTracker::new(),
        })
    }

    /// Write a snapshot after every section next to `output`
    pub fn with_partial_output(mut self, output: &Path) -> Self {
        if self.scan_config.save_partial {
            self.partial_output = Some(output.to_path_buf());
        }
        self
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// Check every address; the returned rows match `addresses` one-to-one
    pub async fn run(&mut self, addresses: &[String]) -> AppResult<Vec<ReportRow>> {
        let section_size = self.scan_config.section_size;
        let total_sections = addresses.len().div_ceil(section_size);
        let mut results: HashMap<String, AddressOutcome> = HashMap::new();
        let mut processed = 0usize;
        let mut progress_printed = false;

        self.stats = ScanStats::new();
        self.progress_tracker.start();

        info!(
            "Checking {} addresses in {} sections of up to {}",
            addresses.len(),
            total_sections,
            section_size
        );

        for (index, section) in addresses.chunks(section_size).enumerate() {
            let number = index + 1;
            info!(
                "Processing section {}/{} ({} addresses)",
                number,
                total_sections,
                section.len()
            );

            match self.process_section(section).await {
                Ok(section_results) => {
                    self.stats.sections_completed += 1;
                    results.extend(section_results);
                }
                Err(e) => {
                    error!("Section {} aborted: {}", number, e);
                    self.stats.sections_failed += 1;
                    for address in section {
                        results.insert(
                            address.clone(),
                            AddressOutcome {
                                conversion: ConversionResult::rejected(
                                    ConversionStatus::ValidationFailed(e.to_string()),
                                    ScriptType::Unknown,
                                ),
                                balance: BalanceResult::failed(format!(
                                    "Section {} aborted: {}",
                                    number, e
                                )),
                            },
                        );
                    }
                    self.stats.balance_errors += section.len();
                }
            }

            processed += section.len();
            self.stats.addresses_processed = processed;
            self.stats.rpc_errors_encountered = self.error_count.load(Ordering::Relaxed);

            self.persist_partial(number, &addresses[..processed], &results);

            if self.progress_tracker.should_report() {
                ProgressReporter::report_progress_with_metrics(
                    &self.stats,
                    processed,
                    addresses.len(),
                    self.progress_tracker.elapsed_seconds(),
                )?;
                progress_printed = true;
            }

            if number < total_sections && self.scan_config.section_pause_ms > 0 {
                sleep(Duration::from_millis(self.scan_config.section_pause_ms)).await;
            }
        }

        if progress_printed {
            ProgressReporter::finish_progress_line();
        }
        self.stats.finish();
        ProgressReporter::report_completion(
            "Balance Check",
            processed,
            self.stats.duration().as_secs_f64(),
        );
        info!("{}", self.stats.summary());

        Ok(build_rows(addresses, &results))
    }

    async fn process_section(
        &mut self,
        section: &[String],
    ) -> RpcResult<HashMap<String, AddressOutcome>> {
        let client = NodeClient::connect(
            &self.rpc_config,
            &self.scan_config,
            Arc::clone(&self.connector),
            Arc::clone(&self.error_count),
        )
        .await?;

        let chain = client.chain_info().clone();
        if chain.pruned {
            self.stats.pruned_sections += 1;
            warn!(
                "Node is running in pruned mode (prune height {:?}); historical lookups may be incomplete, UTXO set scans still reflect current unspent outputs",
                chain.pruneheight
            );
        }

        let network = network_from_chain(&chain.chain).unwrap_or_else(|| {
            warn!("Unknown chain '{}', encoding addresses for mainnet", chain.chain);
            Network::Bitcoin
        });
        let normalizer = if self.scan_config.normalize {
            AddressNormalizer::new(network)
        } else {
            AddressNormalizer::passthrough(network)
        };

        let genesis_exempt = if section.iter().any(|a| a == GENESIS_ADDRESS) {
            self.genesis_exemption(&client).await
        } else {
            false
        };

        // Validate and normalise each distinct address once
        let mut seen = HashSet::new();
        let mut conversions: Vec<(String, ConversionResult, Option<String>)> = Vec::new();
        for address in section {
            if !seen.insert(address.as_str()) {
                continue;
            }
            match client.validate_address(address).await {
                Ok(validation) => {
                    let info = if normalizer.wants_address_info(&validation) {
                        match client.get_address_info(address).await {
                            Ok(info) => Some(info),
                            Err(e) => {
                                warn!("getaddressinfo for {} failed, not converting: {}", address, e);
                                None
                            }
                        }
                    } else {
                        None
                    };
                    let conversion = normalizer.normalize(address, &validation, info.as_ref());
                    debug!("{}: {} ({})", address, conversion.status, conversion.script_type);
                    conversions.push((address.clone(), conversion, None));
                }
                Err(e) => {
                    warn!("Validation of {} failed: {}", address, e);
                    self.stats.validation_failures += 1;
                    conversions.push((
                        address.clone(),
                        ConversionResult::rejected(
                            ConversionStatus::ValidationFailed(e.to_string()),
                            ScriptType::Unknown,
                        ),
                        Some(e.to_string()),
                    ));
                }
            }
        }

        let mut target_seen = HashSet::new();
        let targets: Vec<ScanTarget> = conversions
            .iter()
            .filter(|(original, _, _)| !(genesis_exempt && original == GENESIS_ADDRESS))
            .filter_map(|(_, conversion, _)| conversion.scan_address.as_deref())
            .filter(|scan| target_seen.insert(scan.to_string()))
            .map(|scan| ScanTarget::new(scan, network))
            .collect();

        let lookup = if targets.is_empty() {
            Ok(HashMap::new())
        } else {
            match self.scan_config.balance_method {
                BalanceMethod::Scan => self.scan_balances(&client, &targets).await,
                BalanceMethod::Wallet => self.wallet_balances(&client, &targets).await,
            }
        };
        if let Err(e) = &lookup {
            error!("Balance lookup for {} addresses failed: {}", targets.len(), e);
        }

        let mut outcomes = HashMap::new();
        for (original, conversion, validation_error) in conversions {
            let balance = if let Some(e) = validation_error {
                BalanceResult::failed(e)
            } else if genesis_exempt && original == GENESIS_ADDRESS {
                debug!("Genesis coinbase address, using fixed balance");
                BalanceResult::found(GENESIS_COINBASE_SATS)
            } else {
                match (&conversion.scan_address, &lookup) {
                    (None, _) if conversion.status == ConversionStatus::InvalidAddress => {
                        self.stats.invalid_addresses += 1;
                        BalanceResult::failed("Invalid address")
                    }
                    (None, _) => {
                        self.stats.conversions_skipped += 1;
                        BalanceResult::failed(format!(
                            "Balance check skipped: {}",
                            conversion.status
                        ))
                    }
                    (Some(scan), Ok(balances)) => {
                        BalanceResult::found(balances.get(scan).copied().unwrap_or(0))
                    }
                    (Some(_), Err(e)) => BalanceResult::failed(format!("Balance lookup failed: {}", e)),
                }
            };

            match balance.balance_sats {
                Some(sats) if sats > 0 => self.stats.non_zero_balances += 1,
                None => self.stats.balance_errors += 1,
                _ => {}
            }
            outcomes.insert(original, AddressOutcome { conversion, balance });
        }

        Ok(outcomes)
    }

    async fn scan_balances(
        &self,
        client: &NodeClient,
        targets: &[ScanTarget],
    ) -> RpcResult<HashMap<String, u64>> {
        let descriptors: Vec<String> = targets.iter().map(ScanTarget::descriptor).collect();
        let result = client.scan_utxo_set(&descriptors).await?;
        let balances = attribute_outputs(&result, targets);

        let attributed: u64 = balances.values().sum();
        if attributed != result.total_sats {
            warn!(
                "Attributed {} but the node reported {} for this scan",
                format_sats_as_btc(attributed),
                format_sats_as_btc(result.total_sats)
            );
        }
        info!(
            "Scan at height {} found {} unspents totalling {}",
            result.height,
            result.unspents.len(),
            format_sats_as_btc(result.total_sats)
        );
        Ok(balances)
    }

    async fn wallet_balances(
        &self,
        client: &NodeClient,
        targets: &[ScanTarget],
    ) -> RpcResult<HashMap<String, u64>> {
        let addresses: Vec<String> = targets.iter().map(|t| t.address.clone()).collect();
        let entries = client.list_unspent(&addresses).await?;

        let mut unspents = Vec::with_capacity(entries.len());
        for entry in &entries {
            unspents.push(ScannedOutput {
                txid: entry.txid.clone(),
                vout: entry.vout,
                script_pubkey: entry.script_pubkey.clone(),
                descriptor: entry
                    .address
                    .as_ref()
                    .map(|a| format!("addr({})", a))
                    .unwrap_or_default(),
                amount_sats: entry.amount_sats()?,
                height: 0,
            });
        }
        let total_sats = unspents.iter().map(|u| u.amount_sats).sum();

        Ok(attribute_outputs(
            &ScanResult {
                height: 0,
                unspents,
                total_sats,
            },
            targets,
        ))
    }

    /// Whether the genesis coinbase exemption applies on this node's chain
    async fn genesis_exemption(&mut self, client: &NodeClient) -> bool {
        if let Some(exempt) = self.genesis_exempt {
            return exempt;
        }

        let exempt = match client.genesis_hash().await {
            Ok(hash) => hash == GENESIS_BLOCK_HASH,
            Err(e) => {
                warn!(
                    "Could not read the genesis block hash, deciding from chain '{}': {}",
                    client.chain_info().chain,
                    e
                );
                client.chain_info().chain == "main"
            }
        };
        self.genesis_exempt = Some(exempt);
        exempt
    }

    /// Best-effort snapshot; a failed write is logged and the run continues
    fn persist_partial(
        &self,
        section_number: usize,
        addresses: &[String],
        results: &HashMap<String, AddressOutcome>,
    ) {
        let Some(output) = &self.partial_output else {
            return;
        };

        let path = ReportWriter::partial_snapshot_path(output, section_number);
        match ReportWriter::write_csv(&path, &build_rows(addresses, results)) {
            Ok(()) => debug!("Partial results saved to {}", path.display()),
            Err(e) => warn!("Failed to save partial results to {}: {}", path.display(), e),
        }
    }
}
