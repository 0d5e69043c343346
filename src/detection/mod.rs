//! Address script detection
//!
//! Classification works on the scriptPubKey hex the node reports for an
//! address. Structural work (parsing addresses, building scripts, encoding
//! P2PKH) is left to the `bitcoin` crate.

pub mod normalizer;

use crate::rpc::types::ValidationInfo;
use bitcoin::{Address, Network};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use normalizer::{AddressNormalizer, ConversionStatus};

/// Genesis block coinbase output address
pub const GENESIS_ADDRESS: &str = "1A1zP1eP5QDefi2DMPTfTL5SLmv7DivfNa";

/// Mainnet genesis block hash
pub const GENESIS_BLOCK_HASH: &str =
    "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";

/// Genesis coinbase value; the output is unspendable so UTXO scans never report it
pub const GENESIS_COINBASE_SATS: u64 = 5_000_000_000;

/// Output script type, identified by scriptPubKey prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptType {
    P2PKH,
    P2SH,
    P2WPKH,
    P2WSH,
    Unknown,
}

impl ScriptType {
    /// Classify a scriptPubKey given as hex
    pub fn from_script_hex(script_hex: &str) -> Self {
        let script = script_hex.to_ascii_lowercase();
        if script.starts_with("76a914") {
            ScriptType::P2PKH
        } else if script.starts_with("a914") {
            ScriptType::P2SH
        } else if script.starts_with("0014") {
            ScriptType::P2WPKH
        } else if script.starts_with("0020") {
            ScriptType::P2WSH
        } else {
            ScriptType::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptType::P2PKH => "P2PKH",
            ScriptType::P2SH => "P2SH",
            ScriptType::P2WPKH => "P2WPKH",
            ScriptType::P2WSH => "P2WSH",
            ScriptType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a `getblockchaininfo` chain name to a network
pub fn network_from_chain(chain: &str) -> Option<Network> {
    Network::from_core_arg(chain).ok()
}

/// scriptPubKey hex for an address on `network`, if it parses
pub fn script_pubkey_hex(address: &str, network: Network) -> Option<String> {
    Address::from_str(address)
        .ok()?
        .require_network(network)
        .ok()
        .map(|a| a.script_pubkey().to_hex_string())
}

/// Build a `validateaddress`-shaped answer without a node
///
/// Used when converting offline; only the fields classification needs are set.
pub fn classify_offline(address: &str, network: Network) -> ValidationInfo {
    let parsed = match Address::from_str(address) {
        Ok(parsed) => parsed,
        Err(e) => return ValidationInfo::invalid(e.to_string()),
    };
    let checked = match parsed.require_network(network) {
        Ok(checked) => checked,
        Err(e) => return ValidationInfo::invalid(e.to_string()),
    };

    let script = checked.script_pubkey();
    let witness = script.witness_version();
    ValidationInfo {
        isvalid: true,
        address: Some(checked.to_string()),
        script_pubkey: Some(script.to_hex_string()),
        isscript: Some(script.is_p2sh() || script.is_p2wsh()),
        iswitness: Some(witness.is_some()),
        witness_version: witness.map(|v| v.to_num() as u32),
        witness_program: witness.map(|_| hex::encode(&script.as_bytes()[2..])),
        error: None,
    }
}
