use std::fmt;

use async_trait::async_trait;
use num_bigint::BigUint;
use rust_decimal::Decimal;

use crate::{
    models::{Coin, Denom, PoolId, PoolType},
    simulation::errors::SimulationError,
};

/// The capability set a pool must expose to participate in routing.
///
/// Implementations are installed into the registry by the ingest
/// collaborator and treated as immutable snapshots: a pool's denom set
/// never changes for its lifetime in the registry.
///
/// Only [`PoolType::GeneralizedCosmWasm`] implementations may suspend on
/// I/O inside [`swap`](PoolSim::swap) and
/// [`spot_price`](PoolSim::spot_price); every other variant is pure CPU.
#[async_trait]
pub trait PoolSim: fmt::Debug + Send + Sync + 'static {
    fn id(&self) -> PoolId;

    fn pool_type(&self) -> PoolType;

    /// The denoms this pool holds. Fixed for the pool's lifetime.
    fn denoms(&self) -> &[Denom];

    /// The pool's depth expressed in the common accounting denom, used for
    /// admission filtering during route discovery.
    fn base_liquidity(&self) -> &BigUint;

    /// Taker fee charged for the given trade direction, as a ratio.
    fn taker_fee(&self, token_in_denom: &str, token_out_denom: &str) -> Decimal;

    /// Deterministically computes the output of swapping `token_in` for
    /// `token_out_denom` against the current pool state.
    async fn swap(&self, token_in: &Coin, token_out_denom: &str) -> Result<Coin, SimulationError>;

    /// The instantaneous exchange rate between two denoms in this pool:
    /// how many units of `quote_denom` one unit of `base_denom` is worth,
    /// independent of trade size.
    async fn spot_price(
        &self,
        base_denom: &str,
        quote_denom: &str,
    ) -> Result<Decimal, SimulationError>;

    fn has_denom(&self, denom: &str) -> bool {
        self.denoms().iter().any(|d| d == denom)
    }
}
