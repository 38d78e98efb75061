//! Gas fee estimation helpers generalized from the teacher's
//! `tx::gas_fees` module: given a `eth_feeHistory` response, compute an
//! EIP-1559 fee estimate and the resulting worst-case transaction cost.

/// Base fee plus a priority fee, from which `max_fee_per_gas` is derived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GasFeeEstimate {
    pub base_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl GasFeeEstimate {
    /// `2 * base_fee + priority_fee`, saturating at `u128::MAX` so a
    /// pathological fee history can never panic the caller.
    pub fn max_fee_per_gas(&self) -> u128 {
        self.base_fee_per_gas
            .saturating_mul(2)
            .saturating_add(self.max_priority_fee_per_gas)
    }

    pub fn to_price(&self, gas_limit: u64) -> TransactionPrice {
        TransactionPrice {
            gas_limit,
            max_fee_per_gas: self.max_fee_per_gas(),
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionPrice {
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl TransactionPrice {
    pub fn max_transaction_fee(&self) -> u128 {
        self.max_fee_per_gas.saturating_mul(self.gas_limit as u128)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum FeeEstimationError {
    EmptyFeeHistory,
}

/// Estimates an EIP-1559 fee from a `eth_feeHistory` result: next-block
/// base fee plus the median of the requested reward percentile across the
/// sampled blocks.
pub fn estimate_fee(
    base_fee_per_gas_next_block: u128,
    mut rewards: Vec<u128>,
) -> Result<GasFeeEstimate, FeeEstimationError> {
    if rewards.is_empty() {
        return Err(FeeEstimationError::EmptyFeeHistory);
    }
    let median = median(&mut rewards);
    Ok(GasFeeEstimate {
        base_fee_per_gas: base_fee_per_gas_next_block,
        max_priority_fee_per_gas: median,
    })
}

fn median(values: &mut [u128]) -> u128 {
    let (_, item, _) = values.select_nth_unstable(values.len() / 2);
    *item
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_uses_median_reward() {
        let estimate = estimate_fee(100, vec![1, 5, 3, 4, 2]).unwrap();
        assert_eq!(estimate.max_priority_fee_per_gas, 3);
        assert_eq!(estimate.max_fee_per_gas(), 203);
    }

    #[test]
    fn empty_fee_history_is_rejected() {
        assert_eq!(estimate_fee(100, vec![]), Err(FeeEstimationError::EmptyFeeHistory));
    }

    #[test]
    fn transaction_fee_multiplies_by_gas_limit() {
        let price = TransactionPrice {
            gas_limit: 21_000,
            max_fee_per_gas: 10,
            max_priority_fee_per_gas: 1,
        };
        assert_eq!(price.max_transaction_fee(), 210_000);
    }
}
