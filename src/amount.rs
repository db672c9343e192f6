//! Amount input: decimal text field → positive integer in the smallest unit.

use crate::error::SessionError;
use alloy_primitives::U256;
use std::fmt;

/// A validated, strictly positive amount in the contract's smallest unit.
///
/// The only way to build one from user input is [`Amount::parse`], so raw strings never reach a
/// contract call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(U256);

impl Amount {
    pub fn parse(input: &str) -> Result<Self, SessionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SessionError::InvalidAmount("empty".into()));
        }
        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SessionError::InvalidAmount(format!("not a whole number: {}", trimmed)));
        }
        let value = U256::from_str_radix(trimmed, 10)
            .map_err(|_| SessionError::InvalidAmount(format!("out of range: {}", trimmed)))?;
        Self::from_units(value)
    }

    pub fn from_units(value: U256) -> Result<Self, SessionError> {
        if value.is_zero() {
            return Err(SessionError::InvalidAmount("must be greater than zero".into()));
        }
        Ok(Self(value))
    }

    pub fn units(&self) -> U256 { self.0 }
}

impl From<Amount> for U256 {
    fn from(amount: Amount) -> Self { amount.0 }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
