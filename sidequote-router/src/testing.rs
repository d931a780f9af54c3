//! Deterministic pool fixtures shared across the crate's tests.

use std::{
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use num_bigint::BigUint;
use num_traits::Zero;
use rust_decimal::Decimal;
use sidequote_common::{Coin, Denom, PoolId, PoolSim, PoolType, SimulationError};

use crate::num::{decimal_from_biguint, mul_amount_by_decimal};

/// A constant-product (`x * y = k`) pool over two or more denoms.
///
/// Liquidity in the accounting denom defaults to the sum of reserves; tests
/// that exercise admission filtering override it. `spot_price` can be
/// pinned to a fixed value to drive error paths.
#[derive(Debug)]
pub struct ConstantProductPool {
    id: PoolId,
    denoms: Vec<Denom>,
    reserves: Vec<BigUint>,
    fee: Decimal,
    base_liquidity: BigUint,
    pool_type: PoolType,
    spot_price_override: Option<Decimal>,
    spot_price_error: Option<SimulationError>,
    spot_price_calls: AtomicU32,
}

impl ConstantProductPool {
    pub fn new(id: PoolId, reserves: &[(&str, u64)]) -> Self {
        let denoms: Vec<Denom> = reserves.iter().map(|(d, _)| d.to_string()).collect();
        let amounts: Vec<BigUint> = reserves
            .iter()
            .map(|(_, r)| BigUint::from(*r))
            .collect();
        let base_liquidity = amounts.iter().sum();
        Self {
            id,
            denoms,
            reserves: amounts,
            fee: Decimal::new(3, 3),
            base_liquidity,
            pool_type: PoolType::ConstantProduct,
            spot_price_override: None,
            spot_price_error: None,
            spot_price_calls: AtomicU32::new(0),
        }
    }

    pub fn with_base_liquidity(mut self, base_liquidity: u64) -> Self {
        self.base_liquidity = BigUint::from(base_liquidity);
        self
    }

    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_pool_type(mut self, pool_type: PoolType) -> Self {
        self.pool_type = pool_type;
        self
    }

    pub fn with_spot_price(mut self, spot_price: Decimal) -> Self {
        self.spot_price_override = Some(spot_price);
        self
    }

    pub fn with_spot_price_error(mut self, error: SimulationError) -> Self {
        self.spot_price_error = Some(error);
        self
    }

    /// How often `spot_price` was queried, for assertions on error paths.
    pub fn spot_price_calls(&self) -> u32 {
        self.spot_price_calls.load(Ordering::Relaxed)
    }

    fn reserve(&self, denom: &str) -> Result<&BigUint, SimulationError> {
        self.denoms
            .iter()
            .position(|d| d == denom)
            .map(|i| &self.reserves[i])
            .ok_or_else(|| {
                SimulationError::InvalidInput(format!("pool {} does not hold {denom}", self.id))
            })
    }
}

#[async_trait]
impl PoolSim for ConstantProductPool {
    fn id(&self) -> PoolId {
        self.id
    }

    fn pool_type(&self) -> PoolType {
        self.pool_type
    }

    fn denoms(&self) -> &[Denom] {
        &self.denoms
    }

    fn base_liquidity(&self) -> &BigUint {
        &self.base_liquidity
    }

    fn taker_fee(&self, _token_in_denom: &str, _token_out_denom: &str) -> Decimal {
        self.fee
    }

    async fn swap(&self, token_in: &Coin, token_out_denom: &str) -> Result<Coin, SimulationError> {
        let reserve_in = self.reserve(&token_in.denom)?.clone();
        let reserve_out = self.reserve(token_out_denom)?.clone();
        let fee = mul_amount_by_decimal(&token_in.amount, self.fee);
        let amount_in = &token_in.amount - fee;
        if amount_in.is_zero() {
            return Ok(Coin::zero(token_out_denom));
        }
        let amount_out = &reserve_out * &amount_in / (reserve_in + amount_in);
        Ok(Coin { denom: token_out_denom.to_string(), amount: amount_out })
    }

    async fn spot_price(
        &self,
        base_denom: &str,
        quote_denom: &str,
    ) -> Result<Decimal, SimulationError> {
        self.spot_price_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = &self.spot_price_error {
            return Err(error.clone());
        }
        if let Some(price) = self.spot_price_override {
            return Ok(price);
        }
        let reserve_base = self.reserve(base_denom)?;
        let reserve_quote = self.reserve(quote_denom)?;
        let (Some(base), Some(quote)) =
            (decimal_from_biguint(reserve_base), decimal_from_biguint(reserve_quote))
        else {
            return Err(SimulationError::FatalError(format!(
                "pool {} reserves exceed decimal range",
                self.id
            )));
        };
        if base.is_zero() {
            return Err(SimulationError::FatalError(format!(
                "pool {} has an empty {base_denom} side",
                self.id
            )));
        }
        Ok(quote / base)
    }
}

/// Wraps a pool as a generalised CosmWasm pool: remote type tag and an
/// optional artificial round-trip latency.
#[derive(Debug)]
pub struct RemotePool {
    inner: ConstantProductPool,
    latency: Duration,
}

impl RemotePool {
    pub fn new(inner: ConstantProductPool) -> Self {
        Self { inner, latency: Duration::ZERO }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn round_trip(&self) {
        if self.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl PoolSim for RemotePool {
    fn id(&self) -> PoolId {
        self.inner.id()
    }

    fn pool_type(&self) -> PoolType {
        PoolType::GeneralizedCosmWasm
    }

    fn denoms(&self) -> &[Denom] {
        self.inner.denoms()
    }

    fn base_liquidity(&self) -> &BigUint {
        self.inner.base_liquidity()
    }

    fn taker_fee(&self, token_in_denom: &str, token_out_denom: &str) -> Decimal {
        self.inner.taker_fee(token_in_denom, token_out_denom)
    }

    async fn swap(&self, token_in: &Coin, token_out_denom: &str) -> Result<Coin, SimulationError> {
        self.round_trip().await;
        self.inner.swap(token_in, token_out_denom).await
    }

    async fn spot_price(
        &self,
        base_denom: &str,
        quote_denom: &str,
    ) -> Result<Decimal, SimulationError> {
        self.round_trip().await;
        self.inner.spot_price(base_denom, quote_denom).await
    }
}
