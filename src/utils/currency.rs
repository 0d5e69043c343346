//! Currency conversion and formatting for Bitcoin and satoshi values
//!
//! Balances are carried as whole satoshis (`u64`). Node amounts (BTC floats)
//! are converted once on the way in, and BTC decimals are produced only for
//! display.

use bitcoin::Amount;

/// Satoshis per Bitcoin
pub const SATS_PER_BTC: u64 = 100_000_000;

/// Convert a node-reported BTC amount to satoshis
///
/// # Examples
/// ```
/// use btc_balance_checker::utils::currency::btc_to_sats;
///
/// assert_eq!(btc_to_sats(0.1), Ok(10_000_000));
/// assert_eq!(btc_to_sats(50.0), Ok(5_000_000_000));
/// assert!(btc_to_sats(-1.0).is_err());
/// ```
pub fn btc_to_sats(btc: f64) -> Result<u64, String> {
    Amount::from_btc(btc)
        .map(Amount::to_sat)
        .map_err(|e| format!("invalid BTC amount {}: {}", btc, e))
}

/// Format satoshis as a BTC decimal with 8 places, using integer arithmetic
///
/// # Examples
/// ```
/// use btc_balance_checker::utils::currency::format_btc;
///
/// assert_eq!(format_btc(5_000_000_000), "50.00000000");
/// assert_eq!(format_btc(5471), "0.00005471");
/// assert_eq!(format_btc(0), "0.00000000");
/// ```
pub fn format_btc(sats: u64) -> String {
    format!("{}.{:08}", sats / SATS_PER_BTC, sats % SATS_PER_BTC)
}

/// Format a satoshi amount as dual BTC + sats display
///
/// # Examples
/// ```
/// use btc_balance_checker::utils::currency::format_sats_as_btc;
///
/// assert_eq!(
///     format_sats_as_btc(28125351850),
///     "281.25351850 BTC (28125351850 sats)"
/// );
/// ```
pub fn format_sats_as_btc(sats: u64) -> String {
    format!("{} BTC ({} sats)", format_btc(sats), sats)
}
