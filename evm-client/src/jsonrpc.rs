//! JSON-RPC 2.0 request/response framing and inbound-frame dispatch routing
//! (spec §4.10).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{JsonRpcError, ProviderError};

#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl Request {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProviderError> {
        serde_json::to_vec(self).map_err(|e| ProviderError::SerializationError(e.to_string()))
    }
}

/// The payload of a successfully parsed response: either a result value or
/// a structured RPC error.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Result(Value),
    Error(JsonRpcError),
}

/// A subscription notification: `{method:"eth_subscription", params:
/// {subscription, result}}`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SubscriptionNotification {
    pub subscription: String,
    pub result: Value,
}

/// The result of routing an inbound frame: either it targets the slot
/// table (has an `id`) or the subscription registry (`eth_subscription`).
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Response { id: u64, payload: ResponsePayload },
    Subscription(SubscriptionNotification),
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    id: Option<u64>,
    method: Option<String>,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// Parses one inbound WebSocket text frame. Never panics: malformed shapes
/// surface as [`ProviderError::ProtocolError`] so the caller can log and
/// count without tearing down the connection (spec §4.10).
pub fn parse_inbound(raw: &[u8]) -> Result<InboundFrame, ProviderError> {
    let frame: RawFrame =
        serde_json::from_slice(raw).map_err(|e| ProviderError::ProtocolError(e.to_string()))?;

    if let Some(id) = frame.id {
        let payload = match (frame.result, frame.error) {
            (Some(result), None) => ResponsePayload::Result(result),
            (None, Some(error)) => ResponsePayload::Error(error),
            (None, None) => {
                return Err(ProviderError::ProtocolError(
                    "response has neither result nor error".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(ProviderError::ProtocolError(
                    "response has both result and error".to_string(),
                ))
            }
        };
        return Ok(InboundFrame::Response { id, payload });
    }

    match frame.method.as_deref() {
        Some("eth_subscription") => {
            let notification: SubscriptionNotification = serde_json::from_value(frame.params)
                .map_err(|e| ProviderError::ProtocolError(e.to_string()))?;
            Ok(InboundFrame::Subscription(notification))
        }
        _ => Err(ProviderError::ProtocolError(
            "frame has no id and is not an eth_subscription notification".to_string(),
        )),
    }
}

/// Encodes a `u64` as minimal hex (no leading zeros, `0x0` for zero),
/// matching the wire convention for integer parameters (spec §4.10).
pub fn minimal_hex_u64(value: u64) -> String {
    if value == 0 {
        return "0x0".to_string();
    }
    format!("0x{value:x}")
}
