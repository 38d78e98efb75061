//! The `Provider` facade (spec supplement), composing a JSON-RPC transport,
//! an optional [`crate::signer::Signer`], and the chain profile into the
//! single entry point applications hold, mirroring the teacher's
//! `EvmRpcClientBuilder` builder pattern.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::abi::{self, AbiType, Token};
use crate::chains::Chain;
use crate::error::{ProviderError, ProviderResult};
use crate::hex;
use crate::http::HttpClient;
use crate::retry::RetryPolicy;
use crate::signer::Signer;
use crate::tx::{Address, EcdsaSignature, Eip1559TransactionRequest, Hash};
use crate::ws::lifecycle::Dispatcher;

/// Anything that can carry a single JSON-RPC call to the node and back,
/// whether it is the HTTP transport (C11) or a connected WebSocket
/// dispatcher (C9).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> ProviderResult<Value>;
}

#[async_trait]
impl Transport for HttpClient {
    async fn call(&self, method: &str, params: Value) -> ProviderResult<Value> {
        HttpClient::call(self, method, params).await
    }
}

#[async_trait]
impl Transport for Dispatcher {
    async fn call(&self, method: &str, params: Value) -> ProviderResult<Value> {
        self.send_async(method, params, None).await
    }
}

/// The client facade: read access over any [`Transport`], with optional
/// write access when a [`Signer`] is attached.
pub struct Provider {
    transport: Arc<dyn Transport>,
    signer: Option<Arc<dyn Signer>>,
    chain: Chain,
    retry: RetryPolicy,
}

impl Provider {
    pub fn new(transport: Arc<dyn Transport>, chain: Chain) -> Self {
        Self {
            transport,
            signer: None,
            chain,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    pub fn signer(&self) -> Option<&Arc<dyn Signer>> {
        self.signer.as_ref()
    }

    async fn call_with_retry(&self, method: &str, params: Value) -> ProviderResult<Value> {
        self.retry
            .retry(|| self.transport.call(method, params.clone()))
            .await
    }

    /// Issues an arbitrary JSON-RPC method, for callers (e.g.
    /// [`crate::testnode`]) reaching node-specific methods this facade
    /// doesn't wrap directly.
    pub async fn raw_call(&self, method: &str, params: Value) -> ProviderResult<Value> {
        self.call_with_retry(method, params).await
    }

    pub async fn chain_id(&self) -> ProviderResult<u64> {
        let result = self.call_with_retry("eth_chainId", json!([])).await?;
        decode_hex_quantity(&result)
    }

    pub async fn get_balance(&self, address: Address) -> ProviderResult<Vec<u8>> {
        let params = json!([hex::encode(&address, true), "latest"]);
        let result = self.call_with_retry("eth_getBalance", params).await?;
        decode_hex_bytes(&result)
    }

    pub async fn get_transaction_count(&self, address: Address) -> ProviderResult<u64> {
        let params = json!([hex::encode(&address, true), "pending"]);
        let result = self
            .call_with_retry("eth_getTransactionCount", params)
            .await?;
        decode_hex_quantity(&result)
    }

    pub async fn gas_price(&self) -> ProviderResult<Vec<u8>> {
        let result = self.call_with_retry("eth_gasPrice", json!([])).await?;
        decode_hex_bytes(&result)
    }

    /// `eth_call`: a read-only contract invocation against the latest
    /// (or given) block, returning the raw ABI-encoded reply.
    pub async fn eth_call(&self, to: Address, data: &[u8]) -> ProviderResult<Vec<u8>> {
        let params = json!([
            {
                "to": hex::encode(&to, true),
                "data": hex::encode(data, true),
            },
            "latest"
        ]);
        let result = self.call_with_retry("eth_call", params).await?;
        decode_hex_bytes(&result)
    }

    pub async fn estimate_gas(&self, to: Option<Address>, data: &[u8]) -> ProviderResult<u64> {
        let mut object = serde_json::Map::new();
        if let Some(to) = to {
            object.insert("to".to_string(), json!(hex::encode(&to, true)));
        }
        object.insert("data".to_string(), json!(hex::encode(data, true)));
        let result = self
            .call_with_retry("eth_estimateGas", json!([Value::Object(object)]))
            .await?;
        decode_hex_quantity(&result)
    }

    /// Signs and submits an EIP-1559 transaction, requiring an attached
    /// signer (spec §7's "Missing signer" edge case).
    pub async fn send_transaction(
        &self,
        mut request: Eip1559TransactionRequest,
    ) -> ProviderResult<Hash> {
        let signer = self
            .signer
            .as_ref()
            .ok_or(ProviderError::ProtocolError(
                "no signer attached to this provider".to_string(),
            ))?;
        request.chain_id = self.chain.chain_id();
        let digest = request.signing_hash();
        let signature: EcdsaSignature = signer.sign_digest(&digest).await?;
        let signed = request.into_signed(signature);
        let raw = signed.raw_transaction_hex();
        let result = self
            .call_with_retry("eth_sendRawTransaction", json!([raw]))
            .await?;
        decode_hex_hash(&result)
    }

    pub async fn get_transaction_receipt(&self, hash: Hash) -> ProviderResult<Value> {
        let params = json!([hex::encode(&hash, true)]);
        self.call_with_retry("eth_getTransactionReceipt", params).await
    }

    pub async fn block_number(&self) -> ProviderResult<u64> {
        let result = self.call_with_retry("eth_blockNumber", json!([])).await?;
        decode_hex_quantity(&result)
    }
}

fn decode_hex_quantity(value: &Value) -> ProviderResult<u64> {
    let text = value
        .as_str()
        .ok_or_else(|| ProviderError::ProtocolError("expected a hex-quantity string".to_string()))?;
    let text = text.strip_prefix("0x").unwrap_or(text);
    let text = if text.is_empty() { "0" } else { text };
    u64::from_str_radix(text, 16)
        .map_err(|e| ProviderError::ProtocolError(format!("invalid hex quantity: {e}")))
}

fn decode_hex_bytes(value: &Value) -> ProviderResult<Vec<u8>> {
    let text = value
        .as_str()
        .ok_or_else(|| ProviderError::ProtocolError("expected a hex-data string".to_string()))?;
    hex::decode(text).map_err(ProviderError::from)
}

fn decode_hex_hash(value: &Value) -> ProviderResult<Hash> {
    let bytes = decode_hex_bytes(value)?;
    let mut hash = [0u8; 32];
    if bytes.len() != 32 {
        return Err(ProviderError::ProtocolError(
            "expected a 32-byte transaction hash".to_string(),
        ));
    }
    hash.copy_from_slice(&bytes);
    Ok(hash)
}

/// Encodes `method(arg1,arg2,...)` calldata from already-built [`Token`]s,
/// shared by [`crate::contract`] and direct callers.
pub fn encode_call(name: &str, arg_types: &[&str], args: &[Token]) -> ProviderResult<Vec<u8>> {
    let selector = abi::function_selector(&abi::canonical_signature(name, arg_types));
    let mut calldata = selector.to_vec();
    calldata.extend_from_slice(&abi::encode(args)?);
    Ok(calldata)
}

pub fn decode_reply(types: &[AbiType], data: &[u8]) -> ProviderResult<Vec<Token>> {
    Ok(abi::decode(types, data)?)
}

/// Minimal big-endian amount helper for constructing `value`/`gasPrice`
/// fields from a `u128`, used by callers assembling transaction requests.
pub fn amount_from_u128(value: u128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first_nonzero = bytes.iter().position(|b| *b != 0);
    match first_nonzero {
        Some(index) => bytes[index..].to_vec(),
        None => vec![],
    }
}

