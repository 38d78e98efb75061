//! Thin ABI-encode-then-call contract proxy (spec supplement): builds
//! calldata from a function signature and argument [`Token`]s, then routes
//! the call through a [`Provider`].

use std::sync::Arc;

use crate::abi::{AbiType, Token};
use crate::client::{encode_call, Provider};
use crate::error::ProviderResult;
use crate::tx::{AccessList, Address, Eip1559TransactionRequest};

/// A deployed contract's address plus the provider used to reach it.
pub struct Contract {
    address: Address,
    provider: Arc<Provider>,
}

impl Contract {
    pub fn new(address: Address, provider: Arc<Provider>) -> Self {
        Self { address, provider }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Builds `name(arg_types...)` calldata and submits it through
    /// `eth_call`, decoding the reply against `return_types`.
    pub async fn read(
        &self,
        name: &str,
        arg_types: &[&str],
        args: &[Token],
        return_types: &[AbiType],
    ) -> ProviderResult<Vec<Token>> {
        let calldata = encode_call(name, arg_types, args)?;
        let reply = self.provider.eth_call(self.address, &calldata).await?;
        crate::client::decode_reply(return_types, &reply)
    }

    /// Builds a state-changing call's calldata and signs+submits it as an
    /// EIP-1559 transaction, requiring the provider to carry a signer.
    pub async fn write(
        &self,
        name: &str,
        arg_types: &[&str],
        args: &[Token],
        nonce: u64,
        max_priority_fee_per_gas: Vec<u8>,
        max_fee_per_gas: Vec<u8>,
        gas_limit: u64,
    ) -> ProviderResult<crate::tx::Hash> {
        let calldata = encode_call(name, arg_types, args)?;
        let request = Eip1559TransactionRequest {
            chain_id: self.provider.chain().chain_id(),
            nonce,
            max_priority_fee_per_gas,
            max_fee_per_gas,
            gas_limit,
            destination: Some(self.address),
            amount: vec![],
            data: calldata,
            access_list: AccessList::new(),
        };
        self.provider.send_transaction(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::function_selector;

    #[test]
    fn calldata_starts_with_the_function_selector() {
        let calldata =
            encode_call("balanceOf", &["address"], &[Token::Address([0xaa; 20])]).unwrap();
        assert_eq!(
            &calldata[..4],
            function_selector("balanceOf(address)")
        );
    }
}
