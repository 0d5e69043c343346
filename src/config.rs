use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration loaded from config.toml or environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub bitcoin_rpc: BitcoinRpcConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub addresses: PathBuf,
    pub output_csv: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            addresses: PathBuf::from("bitcoin_addresses.txt"),
            output_csv: PathBuf::from("bitcoin_balances.csv"),
        }
    }
}

/// Bitcoin RPC connection settings and the connect retry budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoinRpcConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    /// `.cookie` file; when set it replaces username and password
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,
    /// Limit for ordinary calls
    pub timeout_seconds: u64,
    /// Limit for `scantxoutset start`, which walks the whole UTXO set
    pub scan_timeout_seconds: u64,
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_seconds: u64,
}

impl Default for BitcoinRpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8332".to_string(),
            username: "bitcoin".to_string(),
            password: "password".to_string(),
            cookie_file: None,
            timeout_seconds: 60,
            scan_timeout_seconds: 900,
            max_retries: 5,
            initial_backoff_ms: 5000,
            backoff_multiplier: 1.0,
            max_backoff_seconds: 30,
        }
    }
}

impl BitcoinRpcConfig {
    pub fn connect_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            initial_backoff_ms: self.initial_backoff_ms,
            backoff_multiplier: self.backoff_multiplier,
            max_backoff_seconds: self.max_backoff_seconds,
        }
    }
}

/// How balances are looked up on the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BalanceMethod {
    /// `scantxoutset` over the whole UTXO set
    Scan,
    /// `listunspent` against watch-only addresses in the node wallet
    Wallet,
}

/// Section processing, pacing and per-category retry budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub section_size: usize,
    pub normalize: bool,
    pub balance_method: BalanceMethod,
    pub save_partial: bool,
    pub call_pause_ms: u64,
    pub section_pause_ms: u64,
    pub validate_retries: usize,
    pub validate_retry_delay_ms: u64,
    pub scan_retries: usize,
    pub scan_retry_delay_ms: u64,
    pub scan_backoff_multiplier: f64,
    pub scan_poll_interval_ms: u64,
    pub scan_idle_timeout_seconds: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            section_size: 1000,
            normalize: true,
            balance_method: BalanceMethod::Scan,
            save_partial: true,
            call_pause_ms: 100,
            section_pause_ms: 1000,
            validate_retries: 3,
            validate_retry_delay_ms: 2000,
            scan_retries: 3,
            scan_retry_delay_ms: 5000,
            scan_backoff_multiplier: 2.0,
            scan_poll_interval_ms: 1000,
            scan_idle_timeout_seconds: 60,
        }
    }
}

impl ScanConfig {
    pub fn validate_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.validate_retries, self.validate_retry_delay_ms)
    }

    pub fn scan_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.scan_retries,
            initial_backoff_ms: self.scan_retry_delay_ms,
            backoff_multiplier: self.scan_backoff_multiplier,
            max_backoff_seconds: 60,
        }
    }
}

/// Retry budget for one category of RPC call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_seconds: u64,
}

impl RetryPolicy {
    /// Fixed delay between attempts
    pub fn fixed(max_attempts: usize, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: delay_ms,
            backoff_multiplier: 1.0,
            max_backoff_seconds: delay_ms.div_ceil(1000).max(1),
        }
    }
}

impl AppConfig {
    /// Load configuration from config.toml file and environment variables
    /// Environment variables take precedence over file configuration
    pub fn load() -> Result<Self, ConfigError> {
        let paths = PathsConfig::default();
        let rpc = BitcoinRpcConfig::default();
        let scan = ScanConfig::default();
        let config = Config::builder()
            .set_default("paths.addresses", paths.addresses.to_string_lossy().to_string())?
            .set_default(
                "paths.output_csv",
                paths.output_csv.to_string_lossy().to_string(),
            )?
            // Bitcoin RPC defaults
            .set_default("bitcoin_rpc.url", rpc.url)?
            .set_default("bitcoin_rpc.username", rpc.username)?
            .set_default("bitcoin_rpc.password", rpc.password)?
            .set_default("bitcoin_rpc.timeout_seconds", rpc.timeout_seconds)?
            .set_default("bitcoin_rpc.scan_timeout_seconds", rpc.scan_timeout_seconds)?
            .set_default("bitcoin_rpc.max_retries", rpc.max_retries as i64)?
            .set_default("bitcoin_rpc.initial_backoff_ms", rpc.initial_backoff_ms)?
            .set_default("bitcoin_rpc.backoff_multiplier", rpc.backoff_multiplier)?
            .set_default("bitcoin_rpc.max_backoff_seconds", rpc.max_backoff_seconds)?
            // Section processing defaults
            .set_default("scan.section_size", scan.section_size as i64)?
            .set_default("scan.normalize", scan.normalize)?
            .set_default("scan.balance_method", "scan")?
            .set_default("scan.save_partial", scan.save_partial)?
            .set_default("scan.call_pause_ms", scan.call_pause_ms)?
            .set_default("scan.section_pause_ms", scan.section_pause_ms)?
            .set_default("scan.validate_retries", scan.validate_retries as i64)?
            .set_default("scan.validate_retry_delay_ms", scan.validate_retry_delay_ms)?
            .set_default("scan.scan_retries", scan.scan_retries as i64)?
            .set_default("scan.scan_retry_delay_ms", scan.scan_retry_delay_ms)?
            .set_default("scan.scan_backoff_multiplier", scan.scan_backoff_multiplier)?
            .set_default("scan.scan_poll_interval_ms", scan.scan_poll_interval_ms)?
            .set_default(
                "scan.scan_idle_timeout_seconds",
                scan.scan_idle_timeout_seconds,
            )?
            // Load from config.toml if it exists
            .add_source(File::with_name("config").required(false))
            // BITCOIN_RPC__URL, SCAN__SECTION_SIZE etc. override file settings
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;

        if app_config.scan.section_size == 0 {
            return Err(ConfigError::Message(
                "scan.section_size must be greater than 0".to_string(),
            ));
        }

        Ok(app_config)
    }

    /// Get default config values for CLI argument defaults
    pub fn get_defaults() -> Result<Self, ConfigError> {
        match Self::load() {
            Ok(config) => Ok(config),
            Err(_) => Ok(Self {
                paths: PathsConfig::default(),
                bitcoin_rpc: BitcoinRpcConfig::default(),
                scan: ScanConfig::default(),
            }),
        }
    }
}
