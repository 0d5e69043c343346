use crate::cli::commands::{load_config, override_rpc};
use crate::detection::GENESIS_BLOCK_HASH;
use crate::errors::{AppError, AppResult};
use crate::rpc::{CoreRpcConnector, NodeClient};
use clap::Args;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tracing::{error, info};

/// Test Bitcoin RPC connectivity
#[derive(Args)]
pub struct TestRpcCommand {
    /// Bitcoin RPC URL
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Bitcoin RPC username
    #[arg(long)]
    pub rpc_username: Option<String>,

    /// Bitcoin RPC password
    #[arg(long)]
    pub rpc_password: Option<String>,
}

impl TestRpcCommand {
    pub async fn run(&self) -> AppResult<()> {
        info!("=== Testing Bitcoin RPC Connection ===");

        let mut config = load_config()?;
        override_rpc(
            &mut config.bitcoin_rpc,
            &self.rpc_url,
            &self.rpc_username,
            &self.rpc_password,
        );

        info!("Testing connection to: {}", config.bitcoin_rpc.url);
        info!("Username: {}", config.bitcoin_rpc.username);

        let client = match NodeClient::connect(
            &config.bitcoin_rpc,
            &config.scan,
            Arc::new(CoreRpcConnector),
            Arc::new(AtomicU64::new(0)),
        )
        .await
        {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect: {}", e);
                println!("Bitcoin RPC connection test FAILED");
                println!("Error: {}", e);
                println!("\nTroubleshooting tips:");
                println!("1. Check that Bitcoin Core is running");
                println!("2. Verify the RPC URL is correct");
                println!("3. Ensure RPC credentials are valid");
                println!("4. Check that RPC server is enabled in bitcoin.conf");
                return Err(AppError::Config(format!("RPC connection failed: {}", e)));
            }
        };

        let chain = client.blockchain_info().await?;
        println!("Bitcoin RPC connection test PASSED");
        println!("Chain: {} (height {})", chain.chain, chain.blocks);
        if chain.pruned {
            println!(
                "Node is pruned (prune height {}); scantxoutset still sees the full UTXO set",
                chain
                    .pruneheight
                    .map(|h| h.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            );
        } else {
            println!("Node is not pruned");
        }

        match client.genesis_hash().await {
            Ok(hash) if hash == GENESIS_BLOCK_HASH => {
                println!("Genesis block matches mainnet; genesis coinbase exemption applies")
            }
            Ok(hash) => println!("Genesis block {} is not mainnet's", hash),
            Err(e) => println!("Could not read genesis block hash: {}", e),
        }

        Ok(())
    }
}
