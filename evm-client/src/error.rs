//! Closed error taxonomy surfaced to callers of the client (spec §4.14, §7).
//!
//! No network or codec path in this crate panics; every fallible operation
//! returns one of these variants (or a narrower error that converts into one).

use std::fmt;
use thiserror::Error;

use crate::abi::AbiError;
use crate::eip712::Eip712Error;
use crate::hex::HexError;
use crate::rlp::RlpError;

/// Top-level error returned by every public client operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not connected")]
    NotConnected,

    #[error("too many in-flight requests (slot table saturated)")]
    TooManyInFlight,

    #[error("outbound ring buffer saturated")]
    RingBufferSaturated,

    #[error("request timed out")]
    RequestTimeout,

    #[error("connection lost")]
    ConnectionLost,

    #[error("request was cancelled")]
    Cancelled,

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("RPC error {code}: {message}")]
    RpcError {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("ABI error: {0}")]
    AbiEncoding(#[from] AbiError),

    #[error("RLP error: {0}")]
    RlpInvalid(#[from] RlpError),

    #[error("hex error: {0}")]
    HexInvalid(#[from] HexError),

    #[error("EIP-712 error: {0}")]
    Eip712(#[from] Eip712Error),

    #[error("transaction reverted: {}", .reason.as_deref().unwrap_or("<no reason>"))]
    Revert {
        reason: Option<String>,
        data: Vec<u8>,
    },
}

impl ProviderError {
    /// Classifies errors that the retry policy (C12) is allowed to retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::TransportError(_)
                | ProviderError::ConnectionLost
                | ProviderError::RequestTimeout
        )
    }
}

/// Lightweight alias mirroring the teacher's `RpcResult<T>` convention.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A single JSON-RPC error object (spec §3, §4.10).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error (code: {}): {}", self.code, self.message)
    }
}

impl From<JsonRpcError> for ProviderError {
    fn from(e: JsonRpcError) -> Self {
        if let Some(data) = e.data.as_ref().and_then(|v| v.as_str()) {
            if let Ok(raw) = crate::hex::decode(data) {
                if let Some(reason) = decode_revert_reason(&raw) {
                    return ProviderError::Revert {
                        reason: Some(reason),
                        data: raw,
                    };
                }
                if !raw.is_empty() {
                    return ProviderError::Revert {
                        reason: None,
                        data: raw,
                    };
                }
            }
        }
        ProviderError::RpcError {
            code: e.code,
            message: e.message,
            data: e.data,
        }
    }
}

/// The standard `Error(string)` selector (`0x08c379a0`) Solidity's `revert
/// "reason"` and `require(cond, "reason")` emit as call return/error data
/// (spec §7).
pub const REVERT_REASON_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Decodes a revert reason out of raw call-failure data, if it carries the
/// standard `Error(string)` selector. Returns `None` for custom errors,
/// `Panic(uint256)`, or any other shape, which callers surface as an opaque
/// [`ProviderError::Revert`] with `reason: None`.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != REVERT_REASON_SELECTOR {
        return None;
    }
    let tokens = crate::abi::decode(&[crate::abi::AbiType::String], &data[4..]).ok()?;
    match tokens.into_iter().next()? {
        crate::abi::Token::String(s) => Some(s),
        _ => None,
    }
}
