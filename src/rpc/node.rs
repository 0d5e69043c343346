//! Blocking access to a Bitcoin Core node
//!
//! [`NodeRpc`] is the seam between the retrying [`NodeClient`](crate::rpc::NodeClient)
//! and the wire. [`CoreRpcNode`] speaks JSON-RPC over `minreq` through the
//! `jsonrpc` crate, with credentials resolved by `corepc-client`; tests
//! substitute scripted nodes.

use crate::config::BitcoinRpcConfig;
use crate::errors::{RpcError, RpcResult};
use crate::rpc::types::{
    AddressInfo, BlockchainInfo, RawScanResult, ScanProgress, UnspentEntry, ValidationInfo,
};
use corepc_client::client_sync::Auth;
use jsonrpc::minreq_http::Builder;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Blocking RPC surface the checker needs from a node
pub trait NodeRpc: Send + Sync {
    fn get_blockchain_info(&self) -> RpcResult<BlockchainInfo>;

    fn get_block_hash(&self, height: u64) -> RpcResult<String>;

    fn validate_address(&self, address: &str) -> RpcResult<ValidationInfo>;

    /// Script details from `getaddressinfo`; redeem scripts only appear for
    /// scripts the node's wallet knows
    fn get_address_info(&self, address: &str) -> RpcResult<AddressInfo>;

    /// `None` when no scan is running
    fn scan_tx_out_set_status(&self) -> RpcResult<Option<ScanProgress>>;

    fn scan_tx_out_set_start(&self, descriptors: &[String]) -> RpcResult<RawScanResult>;

    /// Returns whether a running scan was aborted
    fn scan_tx_out_set_abort(&self) -> RpcResult<bool>;

    fn list_unspent(&self, addresses: &[String]) -> RpcResult<Vec<UnspentEntry>>;
}

/// Opens node handles; called once per section so no connection outlives it
pub trait NodeConnector: Send + Sync {
    fn open(&self, config: &BitcoinRpcConfig) -> RpcResult<Arc<dyn NodeRpc>>;
}

/// Connector for a real Bitcoin Core node
#[derive(Debug, Default, Clone)]
pub struct CoreRpcConnector;

impl NodeConnector for CoreRpcConnector {
    fn open(&self, config: &BitcoinRpcConfig) -> RpcResult<Arc<dyn NodeRpc>> {
        Ok(Arc::new(CoreRpcNode::new(config)?))
    }
}

/// JSON-RPC node handle
///
/// Holds two transports to the same node: `client` carries the per-call
/// timeout, `scan_client` the much longer UTXO scan timeout.
pub struct CoreRpcNode {
    client: jsonrpc::Client,
    scan_client: jsonrpc::Client,
}

impl CoreRpcNode {
    pub fn new(config: &BitcoinRpcConfig) -> RpcResult<Self> {
        let auth = match &config.cookie_file {
            Some(path) => Auth::CookieFile(path.clone()),
            None => Auth::UserPass(config.username.clone(), config.password.clone()),
        };
        let (user, pass) = auth.get_user_pass().map_err(|e| {
            RpcError::ConnectionFailed(format!("Failed to read RPC credentials: {}", e))
        })?;
        let user = user.unwrap_or_default();

        let client = Self::transport(config, &user, &pass, config.timeout_seconds)?;
        let scan_client = Self::transport(config, &user, &pass, config.scan_timeout_seconds)?;

        Ok(Self {
            client,
            scan_client,
        })
    }

    fn transport(
        config: &BitcoinRpcConfig,
        user: &str,
        pass: &Option<String>,
        timeout_seconds: u64,
    ) -> RpcResult<jsonrpc::Client> {
        let transport = Builder::new()
            .timeout(Duration::from_secs(timeout_seconds))
            .url(&config.url)
            .map_err(|e| {
                RpcError::ConnectionFailed(format!("Failed to create Bitcoin RPC client: {}", e))
            })?
            .basic_auth(user.to_string(), pass.clone())
            .build();

        Ok(jsonrpc::Client::with_transport(transport))
    }

    fn call<T: DeserializeOwned>(
        client: &jsonrpc::Client,
        method: &str,
        args: &[Value],
    ) -> RpcResult<T> {
        let failed = |message: String| RpcError::CallFailed {
            method: method.to_string(),
            message,
        };
        let params = serde_json::value::to_raw_value(args).map_err(|e| failed(e.to_string()))?;

        client
            .call::<T>(method, Some(&*params))
            .map_err(|e| failed(e.to_string()))
    }
}

impl NodeRpc for CoreRpcNode {
    fn get_blockchain_info(&self) -> RpcResult<BlockchainInfo> {
        Self::call(&self.client, "getblockchaininfo", &[])
    }

    fn get_block_hash(&self, height: u64) -> RpcResult<String> {
        Self::call(&self.client, "getblockhash", &[json!(height)])
    }

    fn validate_address(&self, address: &str) -> RpcResult<ValidationInfo> {
        Self::call(&self.client, "validateaddress", &[json!(address)])
    }

    fn get_address_info(&self, address: &str) -> RpcResult<AddressInfo> {
        Self::call(&self.client, "getaddressinfo", &[json!(address)])
    }

    fn scan_tx_out_set_status(&self) -> RpcResult<Option<ScanProgress>> {
        Self::call(&self.client, "scantxoutset", &[json!("status")])
    }

    fn scan_tx_out_set_start(&self, descriptors: &[String]) -> RpcResult<RawScanResult> {
        Self::call(
            &self.scan_client,
            "scantxoutset",
            &[json!("start"), json!(descriptors)],
        )
    }

    fn scan_tx_out_set_abort(&self) -> RpcResult<bool> {
        Self::call(&self.client, "scantxoutset", &[json!("abort")])
    }

    fn list_unspent(&self, addresses: &[String]) -> RpcResult<Vec<UnspentEntry>> {
        Self::call(
            &self.client,
            "listunspent",
            &[json!(0), json!(9_999_999), json!(addresses)],
        )
    }
}
