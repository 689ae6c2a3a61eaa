//! Fixed-point currency amounts.
//!
//! The contract stores every amount as an integer scaled by `10^8`. Human
//! input is parsed digit by digit so the conversion never goes through a
//! float and is exact for anything representable at eight decimals.

use std::{fmt, num::IntErrorKind, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decimal places used by the marketplace coin.
pub const AMOUNT_DECIMALS: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount must not be negative")]
    Negative,
    #[error("amount {0:?} is not a decimal number")]
    Malformed(String),
    #[error("amount has more than {decimals} fractional digits")]
    TooPrecise { decimals: u32 },
    #[error("amount does not fit in a 64-bit on-chain value")]
    Overflow,
}

/// Converts a human-readable decimal (e.g. `"2.5"`) into its on-chain
/// integer scaled by `10^decimals`.
pub fn to_on_chain(human: &str, decimals: u32) -> Result<u64, AmountError> {
    let human = human.trim();
    if human.is_empty() {
        return Err(AmountError::Empty);
    }
    if human.starts_with('-') {
        return Err(AmountError::Negative);
    }

    let (whole, fraction) = match human.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (human, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(AmountError::Malformed(human.to_string()));
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(AmountError::Malformed(human.to_string()));
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(AmountError::TooPrecise { decimals });
    }

    let mut digits = String::with_capacity(whole.len() + decimals as usize + 1);
    digits.push_str(whole);
    digits.push_str(fraction);
    digits.extend(std::iter::repeat('0').take(decimals as usize - fraction.len()));

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    digits.parse::<u64>().map_err(|err| match err.kind() {
        IntErrorKind::PosOverflow => AmountError::Overflow,
        _ => AmountError::Malformed(human.to_string()),
    })
}

/// Renders an on-chain integer as an exact decimal string with trailing
/// fractional zeros removed (`250000000` at 8 decimals is `"2.5"`).
pub fn from_on_chain(value: u64, decimals: u32) -> String {
    let decimals = decimals as usize;
    let digits = format!("{value:0>width$}", width = decimals + 1);
    let (whole, fraction) = digits.split_at(digits.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

/// An amount in on-chain units (`10^-8` of a coin).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(human: &str) -> Result<Self, Self::Err> {
        to_on_chain(human, AMOUNT_DECIMALS).map(Self)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&from_on_chain(self.0, AMOUNT_DECIMALS))
    }
}

#[cfg(test)]
#[path = "tests/amount_tests.rs"]
mod tests;
