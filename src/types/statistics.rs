//! Run statistics for the balance checker
//!
//! Collected by the scanner while sections are processed and reported on
//! completion and in progress lines.

use std::time::{Duration, Instant};

/// Common trait for statistics collectors
pub trait StatisticsCollector {
    /// Get the processing start time
    fn start_time(&self) -> Instant;

    /// Get the total processing duration
    fn duration(&self) -> Duration;

    /// Calculate the processing rate (items per second)
    fn processing_rate(&self) -> f64;

    /// Finalize statistics collection
    fn finish(&mut self);

    /// Get a summary of the statistics
    fn summary(&self) -> String;
}

/// Common timing information for all statistics
#[derive(Debug, Clone)]
pub struct TimingInfo {
    pub start_time: Instant,
    pub processing_duration: Duration,
}

impl Default for TimingInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingInfo {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            processing_duration: Duration::default(),
        }
    }

    pub fn finish(&mut self) {
        self.processing_duration = self.start_time.elapsed();
    }

    pub fn elapsed(&self) -> Duration {
        if self.processing_duration.is_zero() {
            self.start_time.elapsed()
        } else {
            self.processing_duration
        }
    }
}

/// Balance check statistics
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub addresses_processed: usize,
    pub sections_completed: usize,
    pub sections_failed: usize,
    pub validation_failures: usize,
    pub invalid_addresses: usize,
    pub conversions_skipped: usize,
    pub balance_errors: usize,
    pub non_zero_balances: usize,
    pub rpc_errors_encountered: u64,
    /// Sections served by a node in pruned mode
    pub pruned_sections: usize,
    pub timing: TimingInfo,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }
}

impl crate::processor::ProgressMetrics for ScanStats {
    fn format_custom_metrics(&self) -> String {
        format!(
            "Sections: {} ok / {} failed | Funded: {} | Errors: {}",
            self.sections_completed,
            self.sections_failed,
            self.non_zero_balances,
            self.balance_errors
        )
    }
}

impl StatisticsCollector for ScanStats {
    fn start_time(&self) -> Instant {
        self.timing.start_time
    }

    fn duration(&self) -> Duration {
        self.timing.elapsed()
    }

    fn processing_rate(&self) -> f64 {
        let elapsed = self.timing.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.addresses_processed as f64 / elapsed
        } else {
            0.0
        }
    }

    fn finish(&mut self) {
        self.timing.finish();
    }

    fn summary(&self) -> String {
        format!(
            "{} addresses in {} sections ({} failed), {} validation failures, {} invalid, {} unsupported, {} balance errors, {} RPC errors, {:.1} addresses/sec",
            self.addresses_processed,
            self.sections_completed + self.sections_failed,
            self.sections_failed,
            self.validation_failures,
            self.invalid_addresses,
            self.conversions_skipped,
            self.balance_errors,
            self.rpc_errors_encountered,
            self.processing_rate()
        )
    }
}
