pub mod coin;
pub mod fee;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use coin::{Coin, CoinParseError};
pub use fee::TakerFeeMap;

/// Opaque identifier for a fungible token as it appears on chain.
pub type Denom = String;

/// Unique identifier of a liquidity pool.
pub type PoolId = u64;

/// The behaviour class of a pool's math.
///
/// `GeneralizedCosmWasm` is the only variant whose simulation may suspend on
/// network I/O; routes containing such a pool are excluded from split
/// optimisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolType {
    ConstantProduct,
    Stable,
    Concentrated,
    Transmuter,
    #[serde(rename = "generalized_cosmwasm")]
    GeneralizedCosmWasm,
}

impl PoolType {
    /// True if simulating this pool may perform a network round-trip.
    pub fn is_remote(&self) -> bool {
        matches!(self, PoolType::GeneralizedCosmWasm)
    }
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PoolType::ConstantProduct => "constant_product",
            PoolType::Stable => "stable",
            PoolType::Concentrated => "concentrated",
            PoolType::Transmuter => "transmuter",
            PoolType::GeneralizedCosmWasm => "generalized_cosmwasm",
        };
        f.write_str(s)
    }
}

/// Directed (token-in, token-out) denom pair.
///
/// Used as the key of the route and price caches. The direction matters:
/// `(A, B)` and `(B, A)` are distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DenomPair {
    pub token_in: Denom,
    pub token_out: Denom,
}

impl DenomPair {
    pub fn new(token_in: impl Into<Denom>, token_out: impl Into<Denom>) -> Self {
        Self { token_in: token_in.into(), token_out: token_out.into() }
    }
}

impl fmt::Display for DenomPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.token_in, self.token_out)
    }
}
