//! Bitcoin Core RPC integration module
//!
//! - **Node** - the blocking [`NodeRpc`] seam and its JSON-RPC implementation
//! - **Client** - [`NodeClient`], per-category retry budgets and the scan protocol
//! - **Retry** - backoff calculation, timeout wrapper and the generic retry loop
//! - **Types** - RPC response payloads

pub mod client;
pub mod node;
pub mod retry;
pub mod types;

// Re-export main types
pub use client::NodeClient;
pub use node::{CoreRpcConnector, CoreRpcNode, NodeConnector, NodeRpc};
pub use retry::{calculate_next_backoff, call_with_retry, execute_with_timeout};
pub use types::{
    AddressInfo, BlockchainInfo, EmbeddedScript, ScanProgress, ScanResult, ScannedOutput, UnspentEntry,
    ValidationInfo,
};
