//! CLI arguments.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "evm-client-cli", about = "Demonstrates the evm-client SDK")]
pub struct Cli {
    /// JSON-RPC endpoint. `ws://`/`wss://` uses the WebSocket dispatch
    /// engine; `http://`/`https://` uses the plain HTTP transport.
    #[arg(long, global = true)]
    pub rpc_url: String,

    /// Numeric chain id (defaults to 1, Ethereum mainnet).
    #[arg(long, global = true, default_value_t = 1)]
    pub chain_id: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetches `eth_chainId` from the node.
    ChainId,
    /// Fetches the balance of an address.
    Balance {
        /// Address as a `0x`-prefixed hex string.
        address: String,
    },
    /// Signs and submits an EIP-1559 transfer.
    Transfer {
        /// Sender private key as a 32-byte hex string (no `0x` prefix required).
        #[arg(long)]
        private_key: String,
        /// Recipient address as a `0x`-prefixed hex string.
        #[arg(long)]
        to: String,
        /// Amount to send, in wei.
        #[arg(long)]
        value: u128,
        /// Account nonce to use; fetched from the node when omitted.
        #[arg(long)]
        nonce: Option<u64>,
        /// Gas limit for the transfer.
        #[arg(long, default_value_t = 21_000)]
        gas_limit: u64,
        /// Max priority fee per gas, in wei.
        #[arg(long, default_value_t = 1_500_000_000)]
        max_priority_fee_per_gas: u128,
        /// Max fee per gas, in wei.
        #[arg(long, default_value_t = 30_000_000_000)]
        max_fee_per_gas: u128,
    },
    /// Opens an `eth_subscribe` stream and prints notifications as they
    /// arrive. Requires a `ws://`/`wss://` endpoint.
    Subscribe {
        /// Subscription kind, e.g. `newHeads`, `logs`, `newPendingTransactions`.
        #[arg(default_value = "newHeads")]
        kind: String,
        /// Number of notifications to print before exiting; runs forever when omitted.
        #[arg(long)]
        count: Option<usize>,
    },
}
