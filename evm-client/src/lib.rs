//! High-throughput Ethereum JSON-RPC client SDK.
//!
//! Layers bottom-up: byte-level codecs ([`hex`], [`rlp`], [`abi`],
//! [`eip712`]), typed transactions ([`tx`], [`signer`], [`kzg`]), the
//! WebSocket dispatch engine ([`ws`]) and HTTP transport ([`http`]) with
//! their shared [`jsonrpc`] framing, cross-cutting [`retry`] and [`metrics`]
//! policy, and finally the [`client`] facade applications hold onto.

pub mod abi;
pub mod chains;
pub mod client;
pub mod contract;
pub mod eip712;
pub mod error;
pub mod hex;
pub mod http;
pub mod jsonrpc;
pub mod kzg;
pub mod metrics;
pub mod retry;
pub mod rlp;
pub mod signer;
pub mod testnode;
pub mod tx;
pub mod wallet;
pub mod ws;

pub use chains::Chain;
pub use client::Provider;
pub use error::{ProviderError, ProviderResult};
