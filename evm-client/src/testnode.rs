//! Snapshot/revert/impersonate passthrough for local development nodes
//! (Anvil/Hardhat/Ganache-style `evm_*`/`hardhat_*` methods), layered over
//! the same [`Provider`] used against a real chain.

use std::sync::Arc;

use serde_json::json;

use crate::client::Provider;
use crate::error::{ProviderError, ProviderResult};
use crate::hex;
use crate::tx::Address;

/// Wraps a [`Provider`] connected to a local dev node with the
/// snapshot/impersonation methods production RPC endpoints don't expose.
pub struct TestNode {
    provider: Arc<Provider>,
}

impl TestNode {
    pub fn new(provider: Arc<Provider>) -> Self {
        Self { provider }
    }

    /// `evm_snapshot`: returns an opaque id the node restores to on
    /// [`TestNode::revert`].
    pub async fn snapshot(&self) -> ProviderResult<String> {
        let result = self.provider.raw_call("evm_snapshot", json!([])).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::ProtocolError("evm_snapshot returned a non-string id".to_string()))
    }

    /// `evm_revert`: restores the node to a prior snapshot, returning
    /// whether the snapshot id was valid.
    pub async fn revert(&self, snapshot_id: &str) -> ProviderResult<bool> {
        let result = self
            .provider
            .raw_call("evm_revert", json!([snapshot_id]))
            .await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    /// `anvil_impersonateAccount` / `hardhat_impersonateAccount`: lets
    /// subsequent transactions be sent as `address` without a signature.
    pub async fn impersonate_account(&self, address: Address) -> ProviderResult<()> {
        self.provider
            .raw_call("anvil_impersonateAccount", json!([hex::encode(&address, true)]))
            .await?;
        Ok(())
    }

    pub async fn stop_impersonating_account(&self, address: Address) -> ProviderResult<()> {
        self.provider
            .raw_call(
                "anvil_stopImpersonatingAccount",
                json!([hex::encode(&address, true)]),
            )
            .await?;
        Ok(())
    }

    /// `anvil_setBalance`: overwrites an account's balance for test setup.
    pub async fn set_balance(&self, address: Address, balance: &[u8]) -> ProviderResult<()> {
        self.provider
            .raw_call(
                "anvil_setBalance",
                json!([hex::encode(&address, true), hex::encode(balance, true)]),
            )
            .await?;
        Ok(())
    }

    /// `evm_mine`: mines a single block immediately, useful after queuing
    /// transactions against auto-mining-disabled nodes.
    pub async fn mine(&self) -> ProviderResult<()> {
        self.provider.raw_call("evm_mine", json!([])).await?;
        Ok(())
    }

    /// `evm_setAutomine`: toggles whether the node mines a block per
    /// submitted transaction.
    pub async fn set_automine(&self, enabled: bool) -> ProviderResult<()> {
        self.provider
            .raw_call("evm_setAutomine", json!([enabled]))
            .await?;
        Ok(())
    }
}
