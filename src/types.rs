//! Per-address results flowing from validation through to the report

pub mod statistics;

use crate::detection::{ConversionStatus, ScriptType};

pub use statistics::{ScanStats, StatisticsCollector, TimingInfo};

/// Normalisation outcome for one input address
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    /// Legacy (P2PKH) form, when one exists
    pub legacy_address: Option<String>,
    /// Address looked up on the node; `None` skips the balance check
    pub scan_address: Option<String>,
    pub status: ConversionStatus,
    pub script_type: ScriptType,
    pub script_pubkey: Option<String>,
}

impl ConversionResult {
    /// Result for an address that cannot be scanned at all
    pub fn rejected(status: ConversionStatus, script_type: ScriptType) -> Self {
        Self {
            legacy_address: None,
            scan_address: None,
            status,
            script_type,
            script_pubkey: None,
        }
    }
}

/// Balance lookup outcome for one input address
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BalanceResult {
    pub balance_sats: Option<u64>,
    pub error: Option<String>,
}

impl BalanceResult {
    pub fn found(balance_sats: u64) -> Self {
        Self {
            balance_sats: Some(balance_sats),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            balance_sats: None,
            error: Some(error.into()),
        }
    }
}

/// One report line: an input address joined with its results
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub original_address: String,
    pub conversion: ConversionResult,
    pub balance: BalanceResult,
}
