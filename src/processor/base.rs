use crate::config::{BitcoinRpcConfig, ScanConfig};
use crate::errors::{AppError, AppResult};
use std::time::Instant;
use tracing::{info, warn};

/// Progress tracking for long-running operations
pub struct StandardProgressTracker {
    start_time: Option<Instant>,
    last_report: Option<Instant>,
    report_interval_ms: u64,
}

impl Default for StandardProgressTracker {
    fn default() -> Self {
        Self {
            start_time: None,
            last_report: None,
            report_interval_ms: 500,
        }
    }
}

impl StandardProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        let now = Instant::now();
        self.start_time = Some(now);
        self.last_report = Some(now);
    }

    pub fn should_report(&mut self) -> bool {
        let now = Instant::now();
        match self.last_report {
            Some(last) => {
                if now.duration_since(last).as_millis() > self.report_interval_ms as u128 {
                    self.last_report = Some(now);
                    true
                } else {
                    false
                }
            }
            None => {
                self.last_report = Some(now);
                true
            }
        }
    }

    pub fn elapsed_seconds(&self) -> f64 {
        match self.start_time {
            Some(start) => start.elapsed().as_secs_f64(),
            None => 0.0,
        }
    }
}

/// Configuration validation utilities
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate_scan_config(rpc: &BitcoinRpcConfig, scan: &ScanConfig) -> AppResult<()> {
        if scan.section_size == 0 {
            return Err(AppError::Config(
                "Section size must be greater than 0".to_string(),
            ));
        }
        if rpc.timeout_seconds == 0 || rpc.scan_timeout_seconds == 0 {
            return Err(AppError::Config(
                "RPC timeouts must be greater than 0".to_string(),
            ));
        }
        if rpc.scan_timeout_seconds < rpc.timeout_seconds {
            warn!(
                "scan_timeout_seconds ({}) is below timeout_seconds ({}) - mainnet UTXO scans take minutes",
                rpc.scan_timeout_seconds, rpc.timeout_seconds
            );
        }
        if rpc.max_retries == 0 || scan.validate_retries == 0 || scan.scan_retries == 0 {
            return Err(AppError::Config(
                "Retry budgets must allow at least one attempt".to_string(),
            ));
        }
        if scan.section_size > 10_000 {
            warn!(
                "Large section size: {} - a single scantxoutset call may run for a long time",
                scan.section_size
            );
        }
        if scan.call_pause_ms == 0 {
            warn!("call_pause_ms is 0 - node calls will not be rate limited");
        }
        Ok(())
    }

    pub fn log_config_summary(rpc: &BitcoinRpcConfig, scan: &ScanConfig) {
        info!("=== Balance Check Configuration ===");
        info!("  Bitcoin RPC: {}", rpc.url);
        match &rpc.cookie_file {
            Some(cookie) => info!("  RPC Auth: cookie file {}", cookie.display()),
            None => info!("  RPC Username: {}", rpc.username),
        }
        info!(
            "  Timeouts: {}s per call, {}s per UTXO scan",
            rpc.timeout_seconds, rpc.scan_timeout_seconds
        );
        info!("  Section size: {}", scan.section_size);
        info!("  Normalise to legacy: {}", scan.normalize);
        info!("  Balance method: {:?}", scan.balance_method);
        info!(
            "  Retries: connect {}, validate {}, scan {}",
            rpc.max_retries, scan.validate_retries, scan.scan_retries
        );
        info!(
            "  Pauses: {}ms between calls, {}ms between sections",
            scan.call_pause_ms, scan.section_pause_ms
        );
    }
}

/// Run-specific metrics appended to progress lines
pub trait ProgressMetrics {
    /// Format metrics for progress display (e.g., "Funded: 3 | Errors: 0")
    fn format_custom_metrics(&self) -> String;
}

/// Progress reporting utilities
pub struct ProgressReporter;

impl ProgressReporter {
    /// Format elapsed seconds into human-readable time (days, hours, minutes, seconds)
    pub fn format_elapsed_time(elapsed_secs: f64) -> String {
        if elapsed_secs < 60.0 {
            format!("{:.1}s", elapsed_secs)
        } else if elapsed_secs < 3600.0 {
            let minutes = (elapsed_secs / 60.0).floor();
            let seconds = elapsed_secs % 60.0;
            format!("{}m {:.0}s ({:.1}s)", minutes, seconds, elapsed_secs)
        } else {
            let hours = (elapsed_secs / 3600.0).floor();
            let remaining = elapsed_secs % 3600.0;
            let minutes = (remaining / 60.0).floor();
            let seconds = remaining % 60.0;
            format!(
                "{}h {}m {:.0}s ({:.1}s)",
                hours, minutes, seconds, elapsed_secs
            )
        }
    }

    pub fn report_completion(operation: &str, total_processed: usize, elapsed: f64) {
        let rate = if elapsed > 0.0 {
            total_processed as f64 / elapsed
        } else {
            0.0
        };
        info!("=== {} Completed ===", operation);
        info!("  Total processed: {}", total_processed);
        info!("  Time elapsed: {}", Self::format_elapsed_time(elapsed));
        info!("  Average rate: {:.1} addresses/sec", rate);
    }

    pub fn finish_progress_line() {
        println!();
    }

    pub fn format_standard_progress(
        processed_count: usize,
        total: usize,
        elapsed: f64,
        custom_metrics: &str,
    ) -> String {
        let progress_pct = if total > 0 {
            format!(" ({:.1}%)", (processed_count as f64 / total as f64) * 100.0)
        } else {
            String::new()
        };

        format!(
            "Checked: {}/{}{} | Elapsed: {} | {}",
            processed_count,
            total,
            progress_pct,
            Self::format_elapsed_time(elapsed),
            custom_metrics
        )
    }

    pub fn print_progress_line(message: &str) -> AppResult<()> {
        print!("\r{}", message);
        use std::io::Write;
        std::io::stdout().flush().map_err(AppError::Io)?;
        Ok(())
    }

    pub fn report_progress_with_metrics<T: ProgressMetrics>(
        metrics: &T,
        processed_count: usize,
        total: usize,
        elapsed_secs: f64,
    ) -> AppResult<()> {
        let progress_message = Self::format_standard_progress(
            processed_count,
            total,
            elapsed_secs,
            &metrics.format_custom_metrics(),
        );
        Self::print_progress_line(&progress_message)
    }
}
