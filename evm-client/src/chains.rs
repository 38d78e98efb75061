//! Chain profiles, generalized from the teacher's `EvmNetwork` enum to a
//! chain-id-indexed registry so the client is not bound to a fixed chain
//! list at compile time.

use std::fmt::{Display, Formatter};

use strum::EnumIter;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, EnumIter)]
pub enum Chain {
    #[default]
    Ethereum,
    Sepolia,
    ArbitrumOne,
    Bsc,
    BscTestnet,
    Polygon,
    Optimism,
    Base,
    Avalanche,
    Fantom,
    Other(u64),
}

impl Chain {
    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Sepolia => 11_155_111,
            Chain::ArbitrumOne => 42_161,
            Chain::Bsc => 56,
            Chain::BscTestnet => 97,
            Chain::Polygon => 137,
            Chain::Optimism => 10,
            Chain::Base => 8453,
            Chain::Avalanche => 43_114,
            Chain::Fantom => 250,
            Chain::Other(id) => *id,
        }
    }

    /// `true` for chains that have activated EIP-4844 blob transactions.
    pub fn supports_blobs(&self) -> bool {
        matches!(self, Chain::Ethereum | Chain::Sepolia)
    }
}

impl From<u64> for Chain {
    fn from(chain_id: u64) -> Self {
        match chain_id {
            1 => Chain::Ethereum,
            11_155_111 => Chain::Sepolia,
            42_161 => Chain::ArbitrumOne,
            56 => Chain::Bsc,
            97 => Chain::BscTestnet,
            137 => Chain::Polygon,
            10 => Chain::Optimism,
            8453 => Chain::Base,
            43_114 => Chain::Avalanche,
            250 => Chain::Fantom,
            other => Chain::Other(other),
        }
    }
}

impl Display for Chain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Chain::Ethereum => write!(f, "Ethereum mainnet"),
            Chain::Sepolia => write!(f, "Sepolia testnet"),
            Chain::ArbitrumOne => write!(f, "Arbitrum One mainnet"),
            Chain::Bsc => write!(f, "BNB Smart Chain mainnet"),
            Chain::BscTestnet => write!(f, "BNB Smart Chain testnet"),
            Chain::Polygon => write!(f, "Polygon mainnet"),
            Chain::Optimism => write!(f, "Optimism mainnet"),
            Chain::Base => write!(f, "Base mainnet"),
            Chain::Avalanche => write!(f, "Avalanche mainnet"),
            Chain::Fantom => write!(f, "Fantom mainnet"),
            Chain::Other(id) => write!(f, "chain {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_id_round_trips_through_from_u64() {
        for chain in [Chain::Ethereum, Chain::Base, Chain::Polygon] {
            assert_eq!(Chain::from(chain.chain_id()), chain);
        }
    }

    #[test]
    fn unknown_chain_id_becomes_other() {
        assert_eq!(Chain::from(999_999), Chain::Other(999_999));
    }
}
