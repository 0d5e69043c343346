//! Response payloads for the Bitcoin Core RPC calls used by the checker
//!
//! Amounts arrive from the node as BTC floats; they are converted to satoshis
//! exactly once, in [`ScanResult::from_raw`] and [`UnspentEntry::amount_sats`].

use crate::errors::{RpcError, RpcResult};
use crate::utils::currency::btc_to_sats;
use serde::{Deserialize, Serialize};

/// Subset of `getblockchaininfo`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockchainInfo {
    pub chain: String,
    pub blocks: u64,
    #[serde(default)]
    pub pruned: bool,
    #[serde(default)]
    pub pruneheight: Option<u64>,
}

/// Inner script of a P2SH address as `getaddressinfo` reports it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddedScript {
    #[serde(rename = "scriptPubKey")]
    pub script_pubkey: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub iswitness: Option<bool>,
    #[serde(default)]
    pub witness_version: Option<u32>,
}

/// `validateaddress` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationInfo {
    pub isvalid: bool,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(rename = "scriptPubKey", default)]
    pub script_pubkey: Option<String>,
    #[serde(default)]
    pub isscript: Option<bool>,
    #[serde(default)]
    pub iswitness: Option<bool>,
    #[serde(default)]
    pub witness_version: Option<u32>,
    #[serde(default)]
    pub witness_program: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ValidationInfo {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            isvalid: false,
            error: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// Subset of `getaddressinfo`
///
/// Core only reports `hex` (the redeem script) and `embedded` for P2SH
/// scripts its wallet can solve; otherwise both are absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressInfo {
    pub address: String,
    #[serde(rename = "scriptPubKey")]
    pub script_pubkey: String,
    #[serde(default)]
    pub isscript: Option<bool>,
    #[serde(default)]
    pub iswitness: Option<bool>,
    #[serde(default)]
    pub solvable: Option<bool>,
    /// Script type name, e.g. `witness_v0_keyhash`
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub hex: Option<String>,
    #[serde(default)]
    pub embedded: Option<EmbeddedScript>,
}

impl AddressInfo {
    /// Redeem script hex, from `hex` or else the embedded scriptPubKey
    pub fn redeem_script(&self) -> Option<&str> {
        self.hex
            .as_deref()
            .or_else(|| self.embedded.as_ref().map(|e| e.script_pubkey.as_str()))
    }
}

/// `scantxoutset status` progress while a scan is running
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    pub progress: f64,
}

/// One entry of `scantxoutset start` unspents, as sent by the node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawScanUnspent {
    pub txid: String,
    pub vout: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pubkey: String,
    #[serde(default)]
    pub desc: String,
    pub amount: f64,
    #[serde(default)]
    pub height: u64,
}

/// `scantxoutset start` response, as sent by the node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawScanResult {
    pub success: bool,
    #[serde(default)]
    pub txouts: u64,
    #[serde(default)]
    pub height: u64,
    #[serde(default)]
    pub unspents: Vec<RawScanUnspent>,
    pub total_amount: f64,
}

/// Unspent output found by a scan, amount in satoshis
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedOutput {
    pub txid: String,
    pub vout: u32,
    pub script_pubkey: String,
    pub descriptor: String,
    pub amount_sats: u64,
    pub height: u64,
}

/// Completed UTXO set scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub height: u64,
    pub unspents: Vec<ScannedOutput>,
    pub total_sats: u64,
}

impl ScanResult {
    pub fn from_raw(raw: RawScanResult) -> RpcResult<Self> {
        if !raw.success {
            return Err(RpcError::InvalidResponse(
                "scantxoutset reported an unsuccessful scan".to_string(),
            ));
        }

        let unspents = raw
            .unspents
            .into_iter()
            .map(|u| {
                Ok(ScannedOutput {
                    amount_sats: btc_to_sats(u.amount).map_err(RpcError::InvalidResponse)?,
                    txid: u.txid,
                    vout: u.vout,
                    script_pubkey: u.script_pubkey,
                    descriptor: u.desc,
                    height: u.height,
                })
            })
            .collect::<RpcResult<Vec<_>>>()?;

        Ok(Self {
            height: raw.height,
            total_sats: btc_to_sats(raw.total_amount).map_err(RpcError::InvalidResponse)?,
            unspents,
        })
    }
}

/// `listunspent` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnspentEntry {
    pub txid: String,
    pub vout: u32,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(rename = "scriptPubKey", default)]
    pub script_pubkey: String,
    pub amount: f64,
    #[serde(default)]
    pub confirmations: u64,
}

impl UnspentEntry {
    pub fn amount_sats(&self) -> RpcResult<u64> {
        btc_to_sats(self.amount).map_err(RpcError::InvalidResponse)
    }
}
