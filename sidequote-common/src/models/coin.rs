use std::{fmt, str::FromStr};

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Denom;

/// A non-negative amount of a single denom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: Denom,
    pub amount: BigUint,
}

impl Coin {
    pub fn new(denom: impl Into<Denom>, amount: impl Into<BigUint>) -> Self {
        Self { denom: denom.into(), amount: amount.into() }
    }

    pub fn zero(denom: impl Into<Denom>) -> Self {
        Self { denom: denom.into(), amount: BigUint::zero() }
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoinParseError {
    #[error("coin string is missing a numeric amount: {0:?}")]
    MissingAmount(String),
    #[error("coin string is missing a denom: {0:?}")]
    MissingDenom(String),
}

impl FromStr for Coin {
    type Err = CoinParseError;

    /// Parses the `{amount}{denom}` form used in query strings, e.g.
    /// `1000000uosmo`. The amount is the longest decimal-digit prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (amount, denom) = s.split_at(split);
        if amount.is_empty() {
            return Err(CoinParseError::MissingAmount(s.to_string()));
        }
        if denom.is_empty() {
            return Err(CoinParseError::MissingDenom(s.to_string()));
        }
        // The prefix is all ASCII digits, so this cannot fail.
        let amount = BigUint::from_str(amount).map_err(|_| CoinParseError::MissingAmount(s.to_string()))?;
        Ok(Coin { denom: denom.to_string(), amount })
    }
}
