//! Common Test Utilities
//!
//! Shared helpers for the unit and integration test trees: a scripted node,
//! fast test configuration and report readers.

#![allow(dead_code)]


use btc_balance_checker::config::{AppConfig, BitcoinRpcConfig, PathsConfig, ScanConfig};
use std::fs;
use std::path::{Path, PathBuf};

pub use mock_node::{MockConnector, MockNode, ALWAYS};

/// Genesis coinbase address (P2PKH)
pub const GENESIS: &str = "1A1zP1eP5QDefi2DMPTfTL5SLmv7DivfNa";
/// Block 1 coinbase address (P2PKH)
pub const LEGACY_A: &str = "12c6DSiU4Rq3P4ZxziKxzrL5LmMBrzjrJX";
/// Block 2 coinbase address (P2PKH)
pub const LEGACY_B: &str = "1HLoD9E4SDFFPDiYfNYnkBLQ85Y51J3Zb1";
/// P2WPKH and its legacy equivalent
pub const BECH32: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
pub const BECH32_LEGACY: &str = "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH";
pub const P2WSH: &str = "bc1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3qccfmv3";
pub const P2SH: &str = "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy";
/// P2SH wrapping the P2WPKH program of [`BECH32`]
pub const P2SH_WPKH: &str = "3JvL6Ymt8MVWiCNHC7oWU6nLeHNJKLZGLN";
pub const P2SH_WPKH_REDEEM_SCRIPT: &str = "0014751e76e8199196d454941c45d1b3a323f1433bd6";
pub const INVALID: &str = "not-a-bitcoin-address";

/// Node settings with millisecond delays so retries finish quickly
pub fn fast_rpc_config() -> BitcoinRpcConfig {
    BitcoinRpcConfig {
        url: "http://127.0.0.1:18443".to_string(),
        timeout_seconds: 5,
        scan_timeout_seconds: 5,
        max_retries: 3,
        initial_backoff_ms: 1,
        backoff_multiplier: 1.0,
        max_backoff_seconds: 1,
        ..Default::default()
    }
}

pub fn fast_scan_config(section_size: usize) -> ScanConfig {
    ScanConfig {
        section_size,
        call_pause_ms: 0,
        section_pause_ms: 0,
        validate_retries: 3,
        validate_retry_delay_ms: 1,
        scan_retries: 3,
        scan_retry_delay_ms: 1,
        scan_backoff_multiplier: 1.0,
        scan_poll_interval_ms: 1,
        scan_idle_timeout_seconds: 1,
        ..Default::default()
    }
}

/// Complete configuration reading and writing inside `dir`
pub fn test_app_config(dir: &Path, section_size: usize) -> AppConfig {
    AppConfig {
        paths: PathsConfig {
            addresses: dir.join("addresses.txt"),
            output_csv: dir.join("report").join("balances.csv"),
        },
        bitcoin_rpc: fast_rpc_config(),
        scan: fast_scan_config(section_size),
    }
}

/// Write one address per line
pub fn write_address_file(path: &Path, lines: &[&str]) -> PathBuf {
    fs::write(path, lines.join("\n")).unwrap();
    path.to_path_buf()
}

/// Every CSV record of a written report, header and summary included
pub fn read_report(path: &Path) -> Vec<Vec<String>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .unwrap()
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

/// Value in column 1 of the summary record labelled `label`
pub fn summary_value(records: &[Vec<String>], label: &str) -> Option<String> {
    records
        .iter()
        .find(|r| r.first().map(String::as_str) == Some(label))
        .map(|r| r[1].clone())
}
