use ethers_core::types::U256;

/// Wei in one ether.
pub const ETH: u128 = 1_000_000_000_000_000_000;

/// Converts a whole ether amount into wei.
pub fn ether(amount: u64) -> U256 {
    U256::from(amount) * U256::from(ETH)
}

/// Whole ether contained in `wei`, rounding down.
pub fn whole_units(wei: U256) -> U256 {
    wei / U256::from(ETH)
}
