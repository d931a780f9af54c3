//! Route evaluation: simulating a swap pool-by-pool.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sidequote_common::{Coin, Denom, PoolId, PoolSim, PoolType, TakerFeeMap};
use tracing::trace;

use crate::{
    num::decimal_from_biguint,
    registry::PoolSet,
    router::{candidate::CandidateRoute, RouterError},
};

/// The stripped, client-facing view of a pool on a route: no internal math
/// state, only what the caller needs to reproduce the trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPool {
    pub id: PoolId,
    pub pool_type: PoolType,
    pub taker_fee: Decimal,
    pub token_in_denom: Denom,
    pub token_out_denom: Denom,
}

#[derive(Debug, Clone)]
pub struct RouteStep {
    pub pool: Arc<dyn PoolSim>,
    pub token_out_denom: Denom,
}

/// A candidate bound to live pools from the current snapshot.
#[derive(Debug, Clone)]
pub struct Route {
    token_in_denom: Denom,
    steps: Vec<RouteStep>,
    contains_generalized_cw_pool: bool,
}

/// Everything the quote assembly needs from one evaluated route.
#[derive(Debug, Clone)]
pub struct EvaluatedRoute {
    pub result_pools: Vec<ResultPool>,
    pub token_out: Coin,
    /// Product of per-step spot prices before the swap, in units of
    /// token-out per token-in.
    pub pre_swap_spot_price: Decimal,
    /// Product of per-step realised exchange rates, same units.
    pub effective_spot_price: Decimal,
}

impl Route {
    /// Binds a candidate against the given snapshot. Fails if any pool has
    /// left the registry or no longer holds the denoms the candidate was
    /// discovered with; the caller treats that route as disqualified.
    pub fn from_candidate(
        pool_set: &PoolSet,
        token_in_denom: &str,
        candidate: &CandidateRoute,
    ) -> Result<Self, RouterError> {
        let mut steps = Vec::with_capacity(candidate.hops.len());
        let mut current_denom = token_in_denom;
        let mut contains_remote = false;
        for hop in &candidate.hops {
            let pool = pool_set
                .get(hop.pool_id)
                .ok_or(RouterError::PoolNotFound(hop.pool_id))?;
            if !pool.has_denom(current_denom) || !pool.has_denom(&hop.token_out_denom) {
                return Err(RouterError::InvalidInput(format!(
                    "pool {} no longer trades {} -> {}",
                    hop.pool_id, current_denom, hop.token_out_denom
                )));
            }
            contains_remote = contains_remote || pool.pool_type().is_remote();
            steps.push(RouteStep {
                pool: Arc::clone(pool),
                token_out_denom: hop.token_out_denom.clone(),
            });
            current_denom = &hop.token_out_denom;
        }
        if steps.is_empty() {
            return Err(RouterError::InvalidInput("empty route".to_string()));
        }
        Ok(Self {
            token_in_denom: token_in_denom.to_string(),
            steps,
            contains_generalized_cw_pool: contains_remote,
        })
    }

    /// Builds a route directly from pools, used by custom direct quotes.
    pub fn from_steps(token_in_denom: &str, steps: Vec<RouteStep>) -> Result<Self, RouterError> {
        if steps.is_empty() {
            return Err(RouterError::InvalidInput("empty route".to_string()));
        }
        let contains_remote = steps
            .iter()
            .any(|step| step.pool.pool_type().is_remote());
        Ok(Self {
            token_in_denom: token_in_denom.to_string(),
            steps,
            contains_generalized_cw_pool: contains_remote,
        })
    }

    pub fn token_in_denom(&self) -> &str {
        &self.token_in_denom
    }

    pub fn token_out_denom(&self) -> &str {
        // Construction guarantees at least one step.
        &self.steps[self.steps.len() - 1].token_out_denom
    }

    pub fn steps(&self) -> &[RouteStep] {
        &self.steps
    }

    pub fn contains_generalized_cw_pool(&self) -> bool {
        self.contains_generalized_cw_pool
    }

    /// Simulates the swap along the route. Evaluations within one route are
    /// sequential: each step consumes the previous step's output.
    pub async fn calculate_token_out(&self, token_in: &Coin) -> Result<Coin, RouterError> {
        let mut current = token_in.clone();
        for step in &self.steps {
            let out = step
                .pool
                .swap(&current, &step.token_out_denom)
                .await?;
            if out.is_zero() {
                return Err(RouterError::Simulation(
                    sidequote_common::SimulationError::FatalError(format!(
                        "pool {} returned zero output for {}",
                        step.pool.id(),
                        current
                    )),
                ));
            }
            current = out;
        }
        trace!(token_in = %token_in, token_out = %current, "route evaluated");
        Ok(current)
    }

    /// Runs the swap once more recording per-step spot prices and produces
    /// the stripped result pools for client output.
    ///
    /// A zero output, a non-positive spot price or an amount beyond decimal
    /// range aborts the evaluation; the route is then disqualified by the
    /// caller.
    pub async fn prepare_result_pools(
        &self,
        token_in: &Coin,
        taker_fees: &TakerFeeMap,
    ) -> Result<EvaluatedRoute, RouterError> {
        let mut current = token_in.clone();
        let mut result_pools = Vec::with_capacity(self.steps.len());
        let mut pre_swap_spot_price = Decimal::ONE;
        let mut effective_spot_price = Decimal::ONE;

        for step in &self.steps {
            let pool = &step.pool;
            // A failed spot price lookup disqualifies the route; a zero one
            // only taints the pre-swap price, and the pricing engine falls
            // back to the amount ratio downstream.
            let spot = pool
                .spot_price(&current.denom, &step.token_out_denom)
                .await?;
            if spot.is_sign_negative() {
                return Err(RouterError::Simulation(
                    sidequote_common::SimulationError::FatalError(format!(
                        "pool {} returned a negative spot price for {}/{}",
                        pool.id(),
                        current.denom,
                        step.token_out_denom
                    )),
                ));
            }

            let out = pool.swap(&current, &step.token_out_denom).await?;
            let (Some(amount_in), Some(amount_out)) =
                (decimal_from_biguint(&current.amount), decimal_from_biguint(&out.amount))
            else {
                return Err(RouterError::Simulation(
                    sidequote_common::SimulationError::FatalError(format!(
                        "amount out of decimal range on pool {}",
                        pool.id()
                    )),
                ));
            };
            if amount_out.is_zero() {
                return Err(RouterError::Simulation(
                    sidequote_common::SimulationError::FatalError(format!(
                        "pool {} returned zero output for {}",
                        pool.id(),
                        current
                    )),
                ));
            }

            pre_swap_spot_price *= spot;
            effective_spot_price *= amount_out / amount_in;

            result_pools.push(ResultPool {
                id: pool.id(),
                pool_type: pool.pool_type(),
                taker_fee: step_fee(pool, taker_fees, &current.denom, &step.token_out_denom),
                token_in_denom: current.denom.clone(),
                token_out_denom: step.token_out_denom.clone(),
            });
            current = out;
        }

        Ok(EvaluatedRoute {
            result_pools,
            token_out: current,
            pre_swap_spot_price,
            effective_spot_price,
        })
    }

    /// The route-level spread factor: the complement of the product of
    /// per-step fee complements.
    pub fn effective_spread_factor(&self, taker_fees: &TakerFeeMap) -> Decimal {
        let mut kept = Decimal::ONE;
        let mut current_denom = self.token_in_denom.as_str();
        for step in &self.steps {
            let fee = step_fee(&step.pool, taker_fees, current_denom, &step.token_out_denom);
            kept *= Decimal::ONE - fee;
            current_denom = &step.token_out_denom;
        }
        Decimal::ONE - kept
    }
}

/// The fee charged on one step: the pool's own fee composed with the
/// network taker fee for the pair.
fn step_fee(
    pool: &Arc<dyn PoolSim>,
    taker_fees: &TakerFeeMap,
    token_in_denom: &str,
    token_out_denom: &str,
) -> Decimal {
    let pool_fee = pool.taker_fee(token_in_denom, token_out_denom);
    let taker_fee = taker_fees.fee(token_in_denom, token_out_denom);
    Decimal::ONE - (Decimal::ONE - pool_fee) * (Decimal::ONE - taker_fee)
}
