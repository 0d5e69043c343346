use anyhow::Result;
use btc_balance_checker::config::{BalanceMethod, ScanConfig};
use btc_balance_checker::detection::{ConversionStatus, ScriptType, GENESIS_COINBASE_SATS};
use btc_balance_checker::processor::BatchBalanceScanner;
use btc_balance_checker::report::ReportWriter;
use btc_balance_checker::config::BitcoinRpcConfig;
use btc_balance_checker::rpc::{AddressInfo, EmbeddedScript};
use btc_balance_checker::types::ReportRow;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::common::{
    fast_rpc_config, fast_scan_config, read_report, MockConnector, MockNode, ALWAYS, BECH32,
    BECH32_LEGACY, GENESIS, INVALID, LEGACY_A, LEGACY_B, P2SH, P2SH_WPKH, P2SH_WPKH_REDEEM_SCRIPT,
    P2WSH,
};

fn addresses(list: &[&str]) -> Vec<String> {
    list.iter().map(|a| a.to_string()).collect()
}

async fn run_with(
    connector: Arc<MockConnector>,
    scan_config: ScanConfig,
    list: &[&str],
) -> Result<Vec<ReportRow>> {
    let mut scanner = BatchBalanceScanner::new(fast_rpc_config(), scan_config, connector)?;
    Ok(scanner.run(&addresses(list)).await?)
}

fn balance_of<'a>(rows: &'a [ReportRow], address: &str) -> &'a ReportRow {
    rows.iter()
        .find(|r| r.original_address == address)
        .expect("address missing from report")
}

fn funded_node() -> Arc<MockNode> {
    let node = MockNode::mainnet();
    node.fund(LEGACY_A, 100_000_000);
    node.fund(LEGACY_A, 50_000_000);
    node.fund(LEGACY_B, 30_000_000);
    node.fund(BECH32_LEGACY, 20_000_001);
    node
}

#[tokio::test]
async fn test_balances_independent_of_section_size() -> Result<()> {
    let list = [LEGACY_A, P2WSH, LEGACY_B, BECH32, INVALID];

    for section_size in [1, 2, 3, 10] {
        let node = funded_node();
        let rows = run_with(
            MockConnector::new(Arc::clone(&node)),
            fast_scan_config(section_size),
            &list,
        )
        .await?;

        let total: u64 = rows.iter().filter_map(|r| r.balance.balance_sats).sum();
        assert_eq!(total, node.total_funded(), "section size {}", section_size);
        assert_eq!(balance_of(&rows, LEGACY_A).balance.balance_sats, Some(150_000_000));
        assert_eq!(balance_of(&rows, BECH32).balance.balance_sats, Some(20_000_001));
    }
    Ok(())
}

#[tokio::test]
async fn test_rows_follow_input_order() -> Result<()> {
    let node = funded_node();
    let list = [BECH32, LEGACY_B, INVALID, LEGACY_B, LEGACY_A];

    let rows = run_with(MockConnector::new(Arc::clone(&node)), fast_scan_config(2), &list).await?;

    let originals: Vec<&str> = rows.iter().map(|r| r.original_address.as_str()).collect();
    assert_eq!(originals, list.to_vec());
    assert_eq!(rows[1].balance, rows[3].balance);
    Ok(())
}

#[tokio::test]
async fn test_conversion_statuses() -> Result<()> {
    let node = funded_node();
    let rows = run_with(
        MockConnector::new(Arc::clone(&node)),
        fast_scan_config(10),
        &[LEGACY_A, BECH32, P2WSH, P2SH, INVALID],
    )
    .await?;

    assert_eq!(rows[0].conversion.status, ConversionStatus::AlreadyLegacy);
    assert_eq!(rows[0].conversion.legacy_address.as_deref(), Some(LEGACY_A));

    assert_eq!(rows[1].conversion.status, ConversionStatus::ConvertedFromBech32);
    assert_eq!(rows[1].conversion.legacy_address.as_deref(), Some(BECH32_LEGACY));
    assert_eq!(rows[1].conversion.script_type, ScriptType::P2WPKH);

    for row in &rows[2..4] {
        assert_eq!(row.conversion.status, ConversionStatus::Unsupported);
        assert!(row.conversion.legacy_address.is_none());
        assert!(row.balance.balance_sats.is_none());
        assert!(row
            .balance
            .error
            .as_deref()
            .unwrap_or_default()
            .starts_with("Balance check skipped"));
    }

    assert_eq!(rows[4].conversion.status, ConversionStatus::InvalidAddress);
    assert_eq!(rows[4].balance.error.as_deref(), Some("Invalid address"));

    // Only the two convertible addresses reach the scan
    let batches = node.scan_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(
        batches[0],
        vec![format!("addr({})", LEGACY_A), format!("addr({})", BECH32_LEGACY)]
    );
    Ok(())
}

#[tokio::test]
async fn test_wrapped_segwit_converted_when_node_knows_redeem_script() -> Result<()> {
    let node = funded_node();
    node.set_address_info(
        P2SH_WPKH,
        AddressInfo {
            address: P2SH_WPKH.to_string(),
            script_pubkey: "a914bcfeb728b584253d5f3f70bcb780e9ef218a68f487".to_string(),
            isscript: Some(true),
            iswitness: Some(false),
            solvable: Some(true),
            script: Some("witness_v0_keyhash".to_string()),
            hex: Some(P2SH_WPKH_REDEEM_SCRIPT.to_string()),
            embedded: Some(EmbeddedScript {
                script_pubkey: P2SH_WPKH_REDEEM_SCRIPT.to_string(),
                address: Some(BECH32.to_string()),
                iswitness: Some(true),
                witness_version: Some(0),
            }),
        },
    );

    let rows = run_with(
        MockConnector::new(Arc::clone(&node)),
        fast_scan_config(10),
        &[P2SH_WPKH, LEGACY_B],
    )
    .await?;

    assert_eq!(rows[0].conversion.status, ConversionStatus::ConvertedFromP2sh);
    assert_eq!(rows[0].conversion.legacy_address.as_deref(), Some(BECH32_LEGACY));
    assert_eq!(rows[0].balance.balance_sats, Some(20_000_001));
    // Only the P2SH address needs the extra lookup
    assert_eq!(node.call_count("getaddressinfo"), 1);
    Ok(())
}

#[tokio::test]
async fn test_wrapped_segwit_unknown_to_wallet_is_unsupported() -> Result<()> {
    let node = funded_node();

    let rows = run_with(MockConnector::new(Arc::clone(&node)), fast_scan_config(10), &[P2SH_WPKH]).await?;

    assert_eq!(rows[0].conversion.status, ConversionStatus::Unsupported);
    assert!(rows[0].balance.balance_sats.is_none());
    assert_eq!(node.call_count("getaddressinfo"), 1);
    assert_eq!(node.call_count("scantxoutset start"), 0);
    Ok(())
}

#[tokio::test]
async fn test_genesis_address_is_not_scanned() -> Result<()> {
    let node = funded_node();
    node.fund(GENESIS, 777);

    let rows = run_with(
        MockConnector::new(Arc::clone(&node)),
        fast_scan_config(10),
        &[GENESIS, LEGACY_B],
    )
    .await?;

    assert_eq!(rows[0].balance.balance_sats, Some(GENESIS_COINBASE_SATS));
    assert_eq!(rows[1].balance.balance_sats, Some(30_000_000));
    assert!(node
        .scan_batches()
        .iter()
        .flatten()
        .all(|d| !d.contains(GENESIS)));
    Ok(())
}

#[tokio::test]
async fn test_genesis_exemption_needs_mainnet_genesis() -> Result<()> {
    let node = MockNode::with_chain("main", &"11".repeat(32));
    node.fund(GENESIS, 777);

    let rows = run_with(MockConnector::new(Arc::clone(&node)), fast_scan_config(10), &[GENESIS]).await?;

    assert_eq!(rows[0].balance.balance_sats, Some(777));
    Ok(())
}

#[tokio::test]
async fn test_validation_recovers_after_two_failures() -> Result<()> {
    let node = funded_node();
    node.fail_validation(LEGACY_B, 2);

    let rows = run_with(MockConnector::new(Arc::clone(&node)), fast_scan_config(10), &[LEGACY_B]).await?;

    assert_eq!(rows[0].balance.balance_sats, Some(30_000_000));
    assert!(rows[0].balance.error.is_none());
    Ok(())
}

#[tokio::test]
async fn test_persistent_validation_failure_is_isolated() -> Result<()> {
    let node = funded_node();
    node.fail_validation(LEGACY_B, ALWAYS);
    let connector = MockConnector::new(Arc::clone(&node));

    let mut scanner =
        BatchBalanceScanner::new(fast_rpc_config(), fast_scan_config(10), connector)?;
    let rows = scanner.run(&addresses(&[LEGACY_A, LEGACY_B, BECH32])).await?;

    let failed = &rows[1];
    assert!(failed.balance.balance_sats.is_none());
    assert!(!failed.balance.error.as_deref().unwrap_or_default().is_empty());
    assert!(matches!(
        failed.conversion.status,
        ConversionStatus::ValidationFailed(_)
    ));

    assert_eq!(rows[0].balance.balance_sats, Some(150_000_000));
    assert_eq!(rows[2].balance.balance_sats, Some(20_000_001));
    assert_eq!(scanner.stats().validation_failures, 1);
    assert_eq!(scanner.stats().balance_errors, 1);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_section_does_not_stop_the_run() -> Result<()> {
    let node = funded_node();
    // Three refusals exhaust the first section's connect budget
    let connector = MockConnector::refusing(Arc::clone(&node), 3);

    let mut scanner =
        BatchBalanceScanner::new(fast_rpc_config(), fast_scan_config(2), connector.clone())?;
    let rows = scanner
        .run(&addresses(&[LEGACY_A, BECH32, LEGACY_B]))
        .await?;

    assert_eq!(rows.len(), 3);
    for row in &rows[..2] {
        assert!(row.balance.balance_sats.is_none());
        assert!(row.balance.error.as_deref().unwrap_or_default().contains("Section 1"));
    }
    assert_eq!(rows[2].balance.balance_sats, Some(30_000_000));
    assert_eq!(scanner.stats().sections_failed, 1);
    assert_eq!(scanner.stats().sections_completed, 1);
    assert_eq!(connector.opens(), 4);
    Ok(())
}

#[tokio::test]
async fn test_failed_scan_marks_only_scanned_addresses() -> Result<()> {
    let node = funded_node();
    node.fail_scans(ALWAYS);

    let rows = run_with(
        MockConnector::new(Arc::clone(&node)),
        fast_scan_config(10),
        &[LEGACY_A, P2WSH],
    )
    .await?;

    assert!(rows[0]
        .balance
        .error
        .as_deref()
        .unwrap_or_default()
        .starts_with("Balance lookup failed"));
    assert_eq!(rows[0].conversion.status, ConversionStatus::AlreadyLegacy);
    assert!(rows[1]
        .balance
        .error
        .as_deref()
        .unwrap_or_default()
        .starts_with("Balance check skipped"));
    Ok(())
}

#[tokio::test]
async fn test_without_normalisation_addresses_are_scanned_as_given() -> Result<()> {
    let node = MockNode::mainnet();
    node.fund(BECH32, 4_200);
    node.fund(BECH32_LEGACY, 1);
    let scan_config = ScanConfig {
        normalize: false,
        ..fast_scan_config(10)
    };

    let rows = run_with(MockConnector::new(Arc::clone(&node)), scan_config, &[BECH32]).await?;

    assert_eq!(rows[0].conversion.status, ConversionStatus::NotConverted);
    assert!(rows[0].conversion.legacy_address.is_none());
    assert_eq!(rows[0].balance.balance_sats, Some(4_200));
    assert_eq!(node.scan_batches()[0], vec![format!("addr({})", BECH32)]);
    Ok(())
}

#[tokio::test]
async fn test_wallet_method_uses_listunspent() -> Result<()> {
    let node = funded_node();
    let scan_config = ScanConfig {
        balance_method: BalanceMethod::Wallet,
        ..fast_scan_config(10)
    };

    let rows = run_with(
        MockConnector::new(Arc::clone(&node)),
        scan_config,
        &[LEGACY_A, BECH32],
    )
    .await?;

    assert_eq!(rows[0].balance.balance_sats, Some(150_000_000));
    assert_eq!(rows[1].balance.balance_sats, Some(20_000_001));
    assert_eq!(node.call_count("listunspent"), 1);
    assert_eq!(node.call_count("scantxoutset start"), 0);
    Ok(())
}

#[tokio::test]
async fn test_pruned_node_still_scans() -> Result<()> {
    let node = funded_node();
    node.set_pruned(true);

    let mut scanner = BatchBalanceScanner::new(
        fast_rpc_config(),
        fast_scan_config(10),
        MockConnector::new(Arc::clone(&node)),
    )?;
    let rows = scanner.run(&addresses(&[LEGACY_B])).await?;

    assert_eq!(rows[0].balance.balance_sats, Some(30_000_000));
    assert_eq!(scanner.stats().pruned_sections, 1);
    Ok(())
}

#[tokio::test]
async fn test_slow_scan_never_overlaps_next_section() -> Result<()> {
    let node = funded_node();
    node.slow_scans(1, Duration::from_millis(2500));
    let rpc_config = BitcoinRpcConfig {
        scan_timeout_seconds: 1,
        ..fast_rpc_config()
    };

    let mut scanner =
        BatchBalanceScanner::new(rpc_config, fast_scan_config(1), MockConnector::new(Arc::clone(&node)))?;
    let rows = scanner.run(&addresses(&[LEGACY_A, LEGACY_B])).await?;

    // First section's scan timed out and was not restarted
    assert!(rows[0]
        .balance
        .error
        .as_deref()
        .unwrap_or_default()
        .starts_with("Balance lookup failed"));
    assert_eq!(rows[1].balance.balance_sats, Some(30_000_000));
    assert_eq!(node.call_count("scantxoutset start"), 2);
    assert_eq!(node.max_scans_in_flight(), 1);
    Ok(())
}

#[tokio::test]
async fn test_duplicates_validated_once_per_section() -> Result<()> {
    let node = funded_node();

    let rows = run_with(
        MockConnector::new(Arc::clone(&node)),
        fast_scan_config(10),
        &[LEGACY_B, LEGACY_B, LEGACY_B],
    )
    .await?;

    assert_eq!(rows.len(), 3);
    assert_eq!(node.call_count("validateaddress"), 1);
    Ok(())
}

#[tokio::test]
async fn test_partial_snapshots_are_cumulative() -> Result<()> {
    let dir = TempDir::new()?;
    let output = dir.path().join("balances.csv");
    let node = funded_node();

    let mut scanner = BatchBalanceScanner::new(
        fast_rpc_config(),
        fast_scan_config(2),
        MockConnector::new(Arc::clone(&node)),
    )?
    .with_partial_output(&output);
    scanner
        .run(&addresses(&[LEGACY_A, LEGACY_B, BECH32]))
        .await?;

    let first = read_report(&ReportWriter::partial_snapshot_path(&output, 1));
    let second = read_report(&ReportWriter::partial_snapshot_path(&output, 2));

    // header + rows, then the summary block
    assert_eq!(first[1][0], LEGACY_A);
    assert_eq!(first[2][0], LEGACY_B);
    assert_eq!(first[3], vec![""; 6]);
    assert_eq!(second[3][0], BECH32);
    assert!(!output.exists());
    Ok(())
}

#[tokio::test]
async fn test_no_partial_snapshots_when_disabled() -> Result<()> {
    let dir = TempDir::new()?;
    let output = dir.path().join("balances.csv");
    let scan_config = ScanConfig {
        save_partial: false,
        ..fast_scan_config(1)
    };

    let mut scanner = BatchBalanceScanner::new(
        fast_rpc_config(),
        scan_config,
        MockConnector::new(MockNode::mainnet()),
    )?
    .with_partial_output(&output);
    scanner.run(&addresses(&[LEGACY_A])).await?;

    assert!(!ReportWriter::partial_snapshot_path(&output, 1).exists());
    Ok(())
}
