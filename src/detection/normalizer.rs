//! Legacy (P2PKH) normalisation of validated addresses
//!
//! Only key-hash outputs have a P2PKH equivalent: native P2WPKH, and P2SH when
//! `getaddressinfo` exposes a redeem script that is a P2WPKH program hashing to
//! the address. Script-hash outputs (P2WSH, generic P2SH) are reported as
//! unsupported.

use super::ScriptType;
use crate::rpc::types::{AddressInfo, ValidationInfo};
use crate::types::ConversionResult;
use bitcoin::hashes::Hash;
use bitcoin::{Address, Network, PubkeyHash, ScriptBuf};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Outcome of normalising one address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionStatus {
    AlreadyLegacy,
    ConvertedFromBech32,
    ConvertedFromP2sh,
    /// Script hash or unrecognised script; no key hash to re-encode
    Unsupported,
    InvalidAddress,
    ParseError(String),
    ValidationFailed(String),
    /// Normalisation switched off; the address is scanned as given
    NotConverted,
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionStatus::AlreadyLegacy => write!(f, "Already legacy"),
            ConversionStatus::ConvertedFromBech32 => write!(f, "Converted from Bech32"),
            ConversionStatus::ConvertedFromP2sh => write!(f, "Converted from P2SH"),
            ConversionStatus::Unsupported => {
                write!(f, "Cannot convert complex or unsupported address type")
            }
            ConversionStatus::InvalidAddress => write!(f, "Invalid address"),
            ConversionStatus::ParseError(e) => write!(f, "Address parsing error: {}", e),
            ConversionStatus::ValidationFailed(e) => write!(f, "Validation failed: {}", e),
            ConversionStatus::NotConverted => write!(f, "Not converted"),
        }
    }
}

/// Derives legacy equivalents for validated addresses
#[derive(Debug, Clone)]
pub struct AddressNormalizer {
    network: Network,
    enabled: bool,
}

impl AddressNormalizer {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            enabled: true,
        }
    }

    /// Classify only; every valid address is scanned in its own encoding
    pub fn passthrough(network: Network) -> Self {
        Self {
            network,
            enabled: false,
        }
    }

    /// Whether normalising `validation` can use a `getaddressinfo` answer
    pub fn wants_address_info(&self, validation: &ValidationInfo) -> bool {
        self.enabled
            && validation.isvalid
            && validation
                .script_pubkey
                .as_deref()
                .map(ScriptType::from_script_hex)
                == Some(ScriptType::P2SH)
    }

    /// Normalise `address` using the node's validation answer
    ///
    /// `info` is only consulted for P2SH addresses. Never fails: library and
    /// parsing errors become a status.
    pub fn normalize(
        &self,
        address: &str,
        validation: &ValidationInfo,
        info: Option<&AddressInfo>,
    ) -> ConversionResult {
        if !validation.isvalid {
            return ConversionResult::rejected(ConversionStatus::InvalidAddress, ScriptType::Unknown);
        }

        let script_hex = validation.script_pubkey.clone().unwrap_or_default();
        let script_type = ScriptType::from_script_hex(&script_hex);
        let script = match ScriptBuf::from_hex(&script_hex) {
            Ok(script) => script,
            Err(e) => {
                return ConversionResult::rejected(
                    ConversionStatus::ParseError(format!("bad scriptPubKey: {}", e)),
                    script_type,
                )
            }
        };
        let script_out = Some(script.to_hex_string());

        if !self.enabled {
            return ConversionResult {
                legacy_address: None,
                scan_address: Some(address.to_string()),
                status: ConversionStatus::NotConverted,
                script_type,
                script_pubkey: script_out,
            };
        }

        if script_type == ScriptType::P2PKH {
            return ConversionResult {
                legacy_address: Some(address.to_string()),
                scan_address: Some(address.to_string()),
                status: ConversionStatus::AlreadyLegacy,
                script_type,
                script_pubkey: script_out,
            };
        }

        // Everything below needs the address library to accept the address
        if let Err(e) = Address::from_str(address).and_then(|a| a.require_network(self.network)) {
            return ConversionResult {
                legacy_address: None,
                scan_address: None,
                status: ConversionStatus::ParseError(e.to_string()),
                script_type,
                script_pubkey: script_out,
            };
        }

        let converted = match script_type {
            ScriptType::P2WPKH if script.is_p2wpkh() => self
                .legacy_from_key_hash(&script.as_bytes()[2..22])
                .map(|legacy| (legacy, ConversionStatus::ConvertedFromBech32)),
            ScriptType::P2SH => info
                .and_then(|info| wrapped_key_hash(&script, info))
                .and_then(|hash| self.legacy_from_key_hash(&hash))
                .map(|legacy| (legacy, ConversionStatus::ConvertedFromP2sh)),
            _ => None,
        };

        match converted {
            Some((legacy, status)) => {
                debug!("{} -> {} ({})", address, legacy, status);
                ConversionResult {
                    legacy_address: Some(legacy.clone()),
                    scan_address: Some(legacy),
                    status,
                    script_type,
                    script_pubkey: script_out,
                }
            }
            None => ConversionResult {
                legacy_address: None,
                scan_address: None,
                status: ConversionStatus::Unsupported,
                script_type,
                script_pubkey: script_out,
            },
        }
    }

    fn legacy_from_key_hash(&self, hash: &[u8]) -> Option<String> {
        let hash = PubkeyHash::from_slice(hash).ok()?;
        Some(Address::p2pkh(hash, self.network).to_string())
    }
}

/// Key hash of a P2SH-wrapped P2WPKH
///
/// The redeem script must be a P2WPKH program whose hash is the one committed
/// to by `outer`.
fn wrapped_key_hash(outer: &ScriptBuf, info: &AddressInfo) -> Option<Vec<u8>> {
    let inner = ScriptBuf::from_hex(info.redeem_script()?).ok()?;
    if !inner.is_p2wpkh() {
        return None;
    }
    if ScriptBuf::new_p2sh(&inner.script_hash()) != *outer {
        debug!("Redeem script {} does not hash to {}", inner.to_hex_string(), outer.to_hex_string());
        return None;
    }
    Some(inner.as_bytes()[2..22].to_vec())
}
