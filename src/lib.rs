//! Bitcoin address balance checker
//!
//! Validates addresses against a Bitcoin Core node, converts them to legacy
//! P2PKH where possible, looks up balances with UTXO set scans section by
//! section and writes a CSV report.

pub mod cli;
pub mod config;
pub mod detection;
pub mod errors;
pub mod processor;
pub mod report;
pub mod rpc;
pub mod types;
pub mod utils;
