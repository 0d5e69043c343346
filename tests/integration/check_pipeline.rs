//! Full check runs against the scripted node
//!
//! Each test writes an address file into a temporary directory, runs the
//! `check` pipeline and reads the CSV back.

use anyhow::Result;
use btc_balance_checker::cli::commands::check::{check, CheckCommand};
use btc_balance_checker::config::BalanceMethod;
use btc_balance_checker::errors::AppError;
use btc_balance_checker::report::HEADERS;
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::{
    read_report, summary_value, test_app_config, write_address_file, MockConnector, MockNode,
    BECH32, BECH32_LEGACY, GENESIS, INVALID, LEGACY_A, LEGACY_B, P2WSH,
};

#[tokio::test]
async fn test_report_has_one_row_per_input_line() -> Result<()> {
    let dir = TempDir::new()?;
    let config = test_app_config(dir.path(), 2);
    write_address_file(
        &config.paths.addresses,
        &[LEGACY_A, "", BECH32, "   ", P2WSH, INVALID, GENESIS, LEGACY_A, LEGACY_B],
    );

    let node = MockNode::mainnet();
    node.fund(LEGACY_A, 125_000_000);
    node.fund(BECH32_LEGACY, 1);

    let rows = check(&config, MockConnector::new(Arc::clone(&node))).await?;
    assert_eq!(rows.len(), 7);

    let records = read_report(&config.paths.output_csv);
    assert_eq!(records[0], HEADERS.map(str::to_string).to_vec());

    let originals: Vec<&str> = records[1..8].iter().map(|r| r[0].as_str()).collect();
    assert_eq!(
        originals,
        vec![LEGACY_A, BECH32, P2WSH, INVALID, GENESIS, LEGACY_A, LEGACY_B]
    );

    // LEGACY_A row
    assert_eq!(records[1][1], LEGACY_A);
    assert_eq!(records[1][2], "1.25000000");
    assert_eq!(records[1][4], "P2PKH");
    assert_eq!(records[1][5], "Already legacy");

    // Bech32 row
    assert_eq!(records[2][1], BECH32_LEGACY);
    assert_eq!(records[2][2], "0.00000001");
    assert_eq!(records[2][5], "Converted from Bech32");

    // P2WSH row
    assert_eq!(records[3][1], "N/A");
    assert_eq!(records[3][2], "N/A");
    assert_eq!(records[3][4], "P2WSH");
    assert_eq!(records[3][5], "Cannot convert complex or unsupported address type");

    // Invalid row
    assert_eq!(records[4][2], "N/A");
    assert_eq!(records[4][3], "Invalid address");
    assert_eq!(records[4][5], "Invalid address");

    // Genesis row and an unfunded address
    assert_eq!(records[5][2], "50.00000000");
    assert_eq!(records[7][2], "0.00000000");
    assert_eq!(records[7][3], "");

    assert_eq!(records[8], vec![""; 6]);
    assert_eq!(summary_value(&records, "Total Addresses Processed").as_deref(), Some("7"));
    assert_eq!(
        summary_value(&records, "Addresses with Non-Zero Balance").as_deref(),
        Some("4")
    );
    assert_eq!(
        summary_value(&records, "Total Balance (BTC)").as_deref(),
        Some("52.50000001")
    );
    assert_eq!(
        summary_value(&records, &format!("Non-Zero Balance: {}", GENESIS)).as_deref(),
        Some("50.00000000")
    );
    Ok(())
}

#[tokio::test]
async fn test_partial_files_written_next_to_report() -> Result<()> {
    let dir = TempDir::new()?;
    let config = test_app_config(dir.path(), 1);
    write_address_file(&config.paths.addresses, &[LEGACY_A, LEGACY_B]);

    check(&config, MockConnector::new(MockNode::mainnet())).await?;

    let report_dir = config.paths.output_csv.parent().unwrap();
    assert!(report_dir.join("balances_partial_section_1.csv").exists());
    assert!(report_dir.join("balances_partial_section_2.csv").exists());
    assert!(config.paths.output_csv.exists());
    Ok(())
}

#[tokio::test]
async fn test_missing_input_aborts_before_connecting() -> Result<()> {
    let dir = TempDir::new()?;
    let config = test_app_config(dir.path(), 10);
    let connector = MockConnector::new(MockNode::mainnet());

    let result = check(&config, connector.clone()).await;

    assert!(matches!(result, Err(AppError::Input(_))));
    assert_eq!(connector.opens(), 0);
    assert!(!config.paths.output_csv.exists());
    Ok(())
}

#[tokio::test]
async fn test_blank_input_aborts() -> Result<()> {
    let dir = TempDir::new()?;
    let config = test_app_config(dir.path(), 10);
    write_address_file(&config.paths.addresses, &["", "  ", ""]);
    let connector = MockConnector::new(MockNode::mainnet());

    let result = check(&config, connector.clone()).await;

    assert!(matches!(result, Err(AppError::Input(_))));
    assert_eq!(connector.opens(), 0);
    Ok(())
}

#[tokio::test]
async fn test_node_down_for_whole_run_still_writes_report() -> Result<()> {
    let dir = TempDir::new()?;
    let config = test_app_config(dir.path(), 1);
    write_address_file(&config.paths.addresses, &[LEGACY_A, LEGACY_B]);
    let connector = MockConnector::refusing(MockNode::mainnet(), crate::common::ALWAYS);

    let rows = check(&config, connector).await?;

    assert!(rows.iter().all(|r| r.balance.balance_sats.is_none()));
    let records = read_report(&config.paths.output_csv);
    assert_eq!(records[1][2], "N/A");
    assert!(!records[1][3].is_empty());
    assert_eq!(summary_value(&records, "Total Balance (BTC)").as_deref(), Some("0.00000000"));
    Ok(())
}

#[test]
fn test_cli_flags_override_config() {
    let dir = TempDir::new().unwrap();
    let command = CheckCommand {
        input: Some(dir.path().join("in.txt")),
        output: Some(dir.path().join("out.csv")),
        section_size: Some(250),
        no_normalize: true,
        balance_method: Some(BalanceMethod::Wallet),
        no_partial: true,
        rpc_url: Some("http://10.0.0.2:8332".to_string()),
        rpc_username: Some("alice".to_string()),
        rpc_password: None,
        max_retries: Some(9),
    };

    let config = command.resolve_config(test_app_config(dir.path(), 1000));

    assert_eq!(config.paths.addresses, dir.path().join("in.txt"));
    assert_eq!(config.paths.output_csv, dir.path().join("out.csv"));
    assert_eq!(config.scan.section_size, 250);
    assert!(!config.scan.normalize);
    assert_eq!(config.scan.balance_method, BalanceMethod::Wallet);
    assert!(!config.scan.save_partial);
    assert_eq!(config.bitcoin_rpc.url, "http://10.0.0.2:8332");
    assert_eq!(config.bitcoin_rpc.username, "alice");
    assert_eq!(config.bitcoin_rpc.password, "password");
    assert_eq!(config.bitcoin_rpc.max_retries, 9);
}
