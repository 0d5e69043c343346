use crate::config::{BitcoinRpcConfig, RetryPolicy, ScanConfig};
use crate::errors::{RpcError, RpcResult};
use crate::rpc::node::{NodeConnector, NodeRpc};
use crate::rpc::types::{
    AddressInfo, BlockchainInfo, RawScanResult, ScanProgress, ScanResult, UnspentEntry,
    ValidationInfo,
};
use crate::rpc::{calculate_next_backoff, call_with_retry, execute_with_timeout};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Bitcoin RPC client with per-category retry budgets
///
/// One instance is created per section through [`NodeClient::connect`]. Calls
/// are issued one at a time; the node allows only a single UTXO scan, so
/// [`NodeClient::scan_utxo_set`] clears any running scan before every start and
/// releases its own afterwards.
pub struct NodeClient {
    rpc: Arc<dyn NodeRpc>,
    config: BitcoinRpcConfig,
    scan_config: ScanConfig,
    error_count: Arc<AtomicU64>,
    chain_info: BlockchainInfo,
}

impl NodeClient {
    /// Open a connection and probe it with `getblockchaininfo`
    ///
    /// Every failure during open or probe counts against the connect budget
    /// (`bitcoin_rpc.max_retries`).
    pub async fn connect(
        config: &BitcoinRpcConfig,
        scan_config: &ScanConfig,
        connector: Arc<dyn NodeConnector>,
        error_count: Arc<AtomicU64>,
    ) -> RpcResult<Self> {
        let open_config = config.clone();
        let result = call_with_retry(
            "connect",
            &config.connect_retry_policy(),
            config.timeout_seconds,
            &error_count,
            move || -> RpcResult<(Arc<dyn NodeRpc>, BlockchainInfo)> {
                let rpc = connector
                    .open(&open_config)
                    .map_err(|e| RpcError::ConnectionFailed(e.to_string()))?;
                let info = rpc.get_blockchain_info().map_err(|e| {
                    RpcError::ConnectionFailed(format!(
                        "Failed to connect to Bitcoin RPC - check URL, credentials, and that Bitcoin Core is running: {}",
                        e
                    ))
                })?;
                Ok((rpc, info))
            },
        )
        .await;

        let (rpc, chain_info) = result.map_err(|e| match e {
            RpcError::ConnectionFailed(msg) => RpcError::ConnectionFailed(msg),
            other => RpcError::ConnectionFailed(other.to_string()),
        })?;

        info!(
            "Connected to Bitcoin Core at {} (chain: {}, blocks: {})",
            config.url, chain_info.chain, chain_info.blocks
        );

        Ok(Self {
            rpc,
            config: config.clone(),
            scan_config: scan_config.clone(),
            error_count,
            chain_info,
        })
    }

    /// Chain state captured when the connection was established
    pub fn chain_info(&self) -> &BlockchainInfo {
        &self.chain_info
    }

    /// Get the current error count from RPC operations
    pub fn get_error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Validate an address, retrying transient failures
    ///
    /// An `isvalid: false` answer is a definitive response and is returned as-is.
    pub async fn validate_address(&self, address: &str) -> RpcResult<ValidationInfo> {
        let rpc = Arc::clone(&self.rpc);
        let address_owned = address.to_string();
        self.retrying(
            &format!("validateaddress({})", address),
            &self.scan_config.validate_retry_policy(),
            move || rpc.validate_address(&address_owned),
        )
        .await
    }

    /// `getaddressinfo`, used to look for the redeem script behind a P2SH address
    pub async fn get_address_info(&self, address: &str) -> RpcResult<AddressInfo> {
        let rpc = Arc::clone(&self.rpc);
        let address_owned = address.to_string();
        self.retrying(
            &format!("getaddressinfo({})", address),
            &self.scan_config.validate_retry_policy(),
            move || rpc.get_address_info(&address_owned),
        )
        .await
    }

    /// Hash of the block at `height`
    pub async fn get_block_hash(&self, height: u64) -> RpcResult<String> {
        let rpc = Arc::clone(&self.rpc);
        self.retrying(
            &format!("getblockhash({})", height),
            &self.config.connect_retry_policy(),
            move || rpc.get_block_hash(height),
        )
        .await
    }

    /// Genesis block hash, used to recognise mainnet
    pub async fn genesis_hash(&self) -> RpcResult<String> {
        self.get_block_hash(0).await
    }

    /// Fresh `getblockchaininfo`
    pub async fn blockchain_info(&self) -> RpcResult<BlockchainInfo> {
        let rpc = Arc::clone(&self.rpc);
        self.retrying(
            "getblockchaininfo",
            &self.config.connect_retry_policy(),
            move || rpc.get_blockchain_info(),
        )
        .await
    }

    /// Scan the UTXO set for `descriptors`
    ///
    /// Every attempt first clears any scan running on the node, then issues a
    /// single `start` under `bitcoin_rpc.scan_timeout_seconds` and releases
    /// node-side scan state afterwards, so at most one of our scans is ever
    /// running. A timed out start is not retried: the node may still be
    /// walking the UTXO set for it.
    pub async fn scan_utxo_set(&self, descriptors: &[String]) -> RpcResult<ScanResult> {
        let operation = format!("scantxoutset start ({} descriptors)", descriptors.len());
        let policy = self.scan_config.scan_retry_policy();
        let max_attempts = policy.max_attempts.max(1);
        let mut backoff = Duration::from_millis(policy.initial_backoff_ms);
        let mut attempts = 0;

        loop {
            attempts += 1;
            self.ensure_scan_idle().await?;

            let started = Instant::now();
            let outcome = self.start_scan(&operation, descriptors).await;
            self.release_scan().await;

            let failure = match outcome {
                Ok(raw) => {
                    let result = ScanResult::from_raw(raw)?;
                    debug!(
                        "Scan of {} descriptors finished in {:.1}s: {} unspents, {} sats",
                        descriptors.len(),
                        started.elapsed().as_secs_f64(),
                        result.unspents.len(),
                        result.total_sats
                    );
                    return Ok(result);
                }
                Err(e) => e,
            };

            self.error_count.fetch_add(1, Ordering::Relaxed);

            if failure.is_timeout() {
                warn!(
                    "{} gave no answer within {}s; not retrying",
                    operation, self.config.scan_timeout_seconds
                );
                return Err(failure);
            }
            if !failure.is_transient() {
                debug!("{} failed (non-retryable): {}", operation, failure);
                return Err(failure);
            }
            if attempts >= max_attempts {
                warn!("{} failed after {} attempts: {}", operation, attempts, failure);
                return Err(RpcError::MaxRetriesExceeded {
                    operation,
                    attempts,
                    last_error: failure.to_string(),
                });
            }

            warn!(
                "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                operation, attempts, max_attempts, failure, backoff
            );
            sleep(backoff).await;
            backoff = calculate_next_backoff(
                backoff,
                policy.backoff_multiplier,
                policy.max_backoff_seconds,
            );
        }
    }

    /// One `scantxoutset start`, bounded by the scan timeout
    async fn start_scan(&self, operation: &str, descriptors: &[String]) -> RpcResult<RawScanResult> {
        let rpc = Arc::clone(&self.rpc);
        let descriptors_owned = descriptors.to_vec();
        let timeout_seconds = self.config.scan_timeout_seconds;

        match execute_with_timeout(timeout_seconds, move || {
            rpc.scan_tx_out_set_start(&descriptors_owned)
        })
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(RpcError::CallFailed {
                method: "spawn_blocking".to_string(),
                message: format!("Task execution error: {}", e),
            }),
            Err(_) => Err(RpcError::Timeout {
                timeout_seconds,
                operation: operation.to_string(),
            }),
        }
    }

    /// Wallet UTXOs for `addresses` (`listunspent`)
    pub async fn list_unspent(&self, addresses: &[String]) -> RpcResult<Vec<UnspentEntry>> {
        let rpc = Arc::clone(&self.rpc);
        let addresses_owned = addresses.to_vec();
        self.retrying(
            &format!("listunspent ({} addresses)", addresses.len()),
            &self.scan_config.scan_retry_policy(),
            move || rpc.list_unspent(&addresses_owned),
        )
        .await
    }

    /// Abort any scan already running and wait for the node to go idle
    async fn ensure_scan_idle(&self) -> RpcResult<()> {
        let status = self.scan_status().await?;
        let Some(progress) = status else {
            return Ok(());
        };

        warn!(
            "A UTXO scan is already running on the node ({:.1}% done), aborting it",
            progress.progress
        );
        self.abort_scan().await?;

        let waited = Instant::now();
        let limit = Duration::from_secs(self.scan_config.scan_idle_timeout_seconds);
        let poll = Duration::from_millis(self.scan_config.scan_poll_interval_ms);

        loop {
            if self.scan_status().await?.is_none() {
                debug!("Node scan state idle after {:?}", waited.elapsed());
                return Ok(());
            }
            if waited.elapsed() >= limit {
                return Err(RpcError::ScanInProgress {
                    waited_seconds: self.scan_config.scan_idle_timeout_seconds,
                });
            }
            sleep(poll).await;
        }
    }

    async fn scan_status(&self) -> RpcResult<Option<ScanProgress>> {
        let rpc = Arc::clone(&self.rpc);
        self.retrying(
            "scantxoutset status",
            &self.scan_config.scan_retry_policy(),
            move || rpc.scan_tx_out_set_status(),
        )
        .await
    }

    async fn abort_scan(&self) -> RpcResult<bool> {
        let rpc = Arc::clone(&self.rpc);
        self.retrying(
            "scantxoutset abort",
            &self.scan_config.scan_retry_policy(),
            move || rpc.scan_tx_out_set_abort(),
        )
        .await
    }

    /// Single best-effort abort after a scan; failures are only logged
    async fn release_scan(&self) {
        let rpc = Arc::clone(&self.rpc);
        match execute_with_timeout(self.config.timeout_seconds, move || {
            rpc.scan_tx_out_set_abort()
        })
        .await
        {
            Ok(Ok(Ok(_))) => {}
            Ok(Ok(Err(e))) => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
                warn!("Failed to release scan state on the node: {}", e);
            }
            Ok(Err(e)) => warn!("Scan release task failed: {}", e),
            Err(_) => warn!(
                "Scan release timed out after {}s",
                self.config.timeout_seconds
            ),
        }
    }

    async fn retrying<T, F>(&self, operation: &str, policy: &RetryPolicy, call: F) -> RpcResult<T>
    where
        T: Send + 'static,
        F: Fn() -> RpcResult<T> + Clone + Send + 'static,
    {
        let result = call_with_retry(
            operation,
            policy,
            self.config.timeout_seconds,
            &self.error_count,
            call,
        )
        .await;

        if self.scan_config.call_pause_ms > 0 {
            sleep(Duration::from_millis(self.scan_config.call_pause_ms)).await;
        }

        result
    }
}
