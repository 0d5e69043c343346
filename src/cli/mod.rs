use crate::errors::AppResult;
use clap::{Parser, Subcommand};

pub mod commands;

/// Bitcoin address balance checker
#[derive(Parser)]
#[command(name = "btc-balance-checker")]
#[command(about = "Check Bitcoin address balances against a Bitcoin Core node")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Check balances for an address list and write a CSV report
    Check(commands::check::CheckCommand),
    /// Print legacy conversions for an address list as CSV
    Convert(commands::convert::ConvertCommand),
    /// Test Bitcoin RPC connectivity
    TestRpc(commands::test_rpc::TestRpcCommand),
}

pub async fn run() -> AppResult<()> {
    // Uses RUST_LOG environment variable (defaults to "error" if not set)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error")),
        )
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check(command) => command.run().await,
        Commands::Convert(command) => command.run().await,
        Commands::TestRpc(command) => command.run().await,
    }
}
