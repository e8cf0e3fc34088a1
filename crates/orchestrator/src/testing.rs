//! Fixtures shared by the unit tests of this crate.

use alloy::primitives::{Address, U256};

/// The protocol account the in-memory chains are created for.
pub(crate) const ACCOUNT: Address = Address::repeat_byte(0xaa);

/// A beneficiary with scheduled withdrawals.
pub(crate) const BENEFICIARY: Address = Address::repeat_byte(0xbb);

/// Address made of `byte` repeated, used for groups.
pub(crate) fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

/// Shorthand for amounts.
pub(crate) fn u(amount: u64) -> U256 {
    U256::from(amount)
}
