use crate::types::ReportRow;
use crate::utils::currency::format_btc;

/// Totals shown after the per-address rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub total_addresses: usize,
    /// Original address and balance, in input order
    pub non_zero: Vec<(String, u64)>,
    pub total_sats: u64,
}

impl ReportSummary {
    pub fn from_rows(rows: &[ReportRow]) -> Self {
        let non_zero: Vec<(String, u64)> = rows
            .iter()
            .filter_map(|row| match row.balance.balance_sats {
                Some(sats) if sats > 0 => Some((row.original_address.clone(), sats)),
                _ => None,
            })
            .collect();

        Self {
            total_addresses: rows.len(),
            total_sats: non_zero.iter().map(|(_, sats)| sats).sum(),
            non_zero,
        }
    }

    /// Summary block as 6-column CSV records, starting with the blank separator
    pub fn csv_records(&self) -> Vec<[String; 6]> {
        let line = |label: String, value: String| {
            [
                label,
                value,
                String::new(),
                String::new(),
                String::new(),
                String::new(),
            ]
        };

        let mut records = vec![
            line(String::new(), String::new()),
            line("Summary".to_string(), String::new()),
            line(
                "Total Addresses Processed".to_string(),
                self.total_addresses.to_string(),
            ),
            line(
                "Addresses with Non-Zero Balance".to_string(),
                self.non_zero.len().to_string(),
            ),
            line("Total Balance (BTC)".to_string(), format_btc(self.total_sats)),
        ];
        for (address, sats) in &self.non_zero {
            records.push(line(
                format!("Non-Zero Balance: {}", address),
                format_btc(*sats),
            ));
        }
        records
    }

    pub fn print(&self) {
        println!("\nSummary of Results");
        println!("{}", "-".repeat(50));
        println!("Total Addresses Processed: {}", self.total_addresses);
        println!("Addresses with Non-Zero Balance: {}", self.non_zero.len());
        if self.non_zero.is_empty() {
            println!("No addresses with non-zero balances found.");
        } else {
            println!("Addresses with Balances:");
            for (address, sats) in &self.non_zero {
                println!("  {}: {} BTC", address, format_btc(*sats));
            }
        }
        println!("Total Balance Found: {} BTC", format_btc(self.total_sats));
        println!("{}", "-".repeat(50));
    }
}
