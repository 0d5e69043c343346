//! CSV report and console summary
//!
//! One row per input address in input order, then a blank separator row and a
//! summary block. `N/A` marks missing values; a zero balance prints as
//! `0.00000000`.

pub mod summary;

use crate::errors::AppResult;
use crate::types::ReportRow;
use crate::utils::currency::format_btc;
use csv::Writer;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub use summary::ReportSummary;

/// Report column headers
pub const HEADERS: [&str; 6] = [
    "Original Address",
    "Legacy Address",
    "Balance (BTC)",
    "Balance Error",
    "Address Type",
    "Conversion Status",
];

const NOT_AVAILABLE: &str = "N/A";

/// Writes balance reports as CSV
pub struct ReportWriter;

impl ReportWriter {
    /// Write the full report to `path`
    pub fn write_csv(path: &Path, rows: &[ReportRow]) -> AppResult<()> {
        let file = File::create(path)?;
        Self::write_to(file, rows)?;
        info!("Wrote {} report rows to {}", rows.len(), path.display());
        Ok(())
    }

    /// Write rows plus summary block to any writer
    pub fn write_to<W: Write>(writer: W, rows: &[ReportRow]) -> AppResult<()> {
        let mut csv = Writer::from_writer(writer);
        csv.write_record(HEADERS)?;

        for row in rows {
            csv.write_record(Self::row_fields(row))?;
        }

        let summary = ReportSummary::from_rows(rows);
        for record in summary.csv_records() {
            csv.write_record(&record)?;
        }

        csv.flush()?;
        Ok(())
    }

    /// Write only the conversion columns (no balances, no summary)
    pub fn write_conversions<W: Write>(writer: W, rows: &[ReportRow]) -> AppResult<()> {
        let mut csv = Writer::from_writer(writer);
        csv.write_record([
            HEADERS[0], HEADERS[1], HEADERS[4], HEADERS[5],
        ])?;
        for row in rows {
            let fields = Self::row_fields(row);
            csv.write_record([&fields[0], &fields[1], &fields[4], &fields[5]])?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn row_fields(row: &ReportRow) -> [String; 6] {
        [
            row.original_address.clone(),
            row.conversion
                .legacy_address
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            row.balance
                .balance_sats
                .map(format_btc)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            row.balance.error.clone().unwrap_or_default(),
            row.conversion.script_type.to_string(),
            row.conversion.status.to_string(),
        ]
    }

    /// Path of the snapshot written after section `section_index` (1-based)
    ///
    /// `out/bitcoin_balances.csv` -> `out/bitcoin_balances_partial_section_3.csv`
    pub fn partial_snapshot_path(output: &Path, section_index: usize) -> PathBuf {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "bitcoin_balances".to_string());
        output.with_file_name(format!("{}_partial_section_{}.csv", stem, section_index))
    }
}
