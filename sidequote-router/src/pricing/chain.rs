//! Chain pricing: prices derived by routing a scaled probe amount and
//! combining per-pool spot prices along the chosen route.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use metrics::counter;
use num_bigint::BigUint;
use rust_decimal::Decimal;
use sidequote_common::{
    cache::{Cache, Expiration},
    singleflight::SingleFlight,
    Coin, Denom, DenomPair,
};
use tracing::{debug, instrument, warn};

use crate::{
    config::PricingConfig,
    num::decimal_from_biguint,
    pricing::{PricingError, PricingOptions, PricingSource},
    router::{usecase::RouterUsecase, RouterOptions},
    tokens::TokenRegistry,
};

/// Probe amounts are a multiple of the quote denom's scaling factor so
/// that low-liquidity routes are filtered out by output magnitude. Ten
/// units of a stablecoin is enough.
const TOKEN_IN_MULTIPLIER: u64 = 10;

pub struct ChainPricing {
    router: Arc<dyn RouterUsecase>,
    tokens: Arc<TokenRegistry>,
    cache: Cache<DenomPair, Decimal>,
    cache_expiry: Duration,
    /// Resolved chain form of the configured default quote denom. Prices
    /// against it are stored with the no-expiry sentinel and rewritten by
    /// the block-driven refresher.
    default_quote_denom: Denom,
    /// Base routing parameters for probe quotes: pricing uses more and
    /// shallower pools than user quotes, and never splits.
    routing_options: RouterOptions,
    min_liquidity: u64,
    flight: SingleFlight<DenomPair, Decimal, PricingError>,
}

impl ChainPricing {
    /// Fails when the configured default quote human denom has no chain
    /// form in the token registry.
    pub fn new(
        router: Arc<dyn RouterUsecase>,
        tokens: Arc<TokenRegistry>,
        config: &PricingConfig,
    ) -> Result<Self, PricingError> {
        let default_quote_denom = tokens.chain_denom(&config.default_quote_human_denom)?;
        let routing_options = RouterOptions {
            max_pools_per_route: config.max_pools_per_route,
            max_routes: config.max_routes,
            max_split_routes: crate::config::DISABLE_SPLIT_ROUTES,
            max_split_iterations: 0,
            min_liquidity: config.min_liquidity,
        };
        Ok(Self {
            router,
            tokens,
            cache: Cache::new(),
            cache_expiry: Duration::from_millis(config.cache_expiry_ms),
            default_quote_denom,
            routing_options,
            min_liquidity: config.min_liquidity,
            flight: SingleFlight::new(),
        })
    }

    pub fn default_quote_denom(&self) -> &str {
        &self.default_quote_denom
    }

    async fn compute_price(
        &self,
        base_denom: &str,
        quote_denom: &str,
        min_liquidity: u64,
    ) -> Result<Decimal, PricingError> {
        let base_scaling_factor = self.tokens.scaling_factor(base_denom)?;
        let quote_scaling_amount = self.tokens.scaling_factor_amount(quote_denom)?;

        // Probe with several quote units so shallow routes lose on output
        // magnitude.
        let probe_amount = BigUint::from(TOKEN_IN_MULTIPLIER) * quote_scaling_amount;
        let probe = Coin { denom: quote_denom.to_string(), amount: probe_amount.clone() };

        // The caller's liquidity override replaces the configured default.
        let routing_options = self
            .routing_options
            .clone()
            .with_min_liquidity(min_liquidity);

        let quote = self
            .router
            .get_optimal_quote(probe, base_denom, routing_options)
            .await?;
        let route = quote
            .routes
            .first()
            .ok_or_else(|| PricingError::NoRouteFound {
                base_denom: base_denom.to_string(),
                quote_denom: quote_denom.to_string(),
            })?;

        // Multiplicative path: walk the route's pools, rotating the quote
        // denom to each pool's out denom and multiplying spot prices.
        let mut chain_price = Decimal::ONE;
        let mut temp_quote_denom = quote_denom.to_string();
        let mut use_alternative_method = false;
        for pool in &route.pools {
            let temp_base_denom = pool.token_out_denom.clone();
            match self
                .router
                .get_pool_spot_price(pool.id, &temp_quote_denom, &temp_base_denom)
                .await
            {
                Ok(spot_price) if !spot_price.is_zero() => {
                    chain_price *= spot_price;
                    temp_quote_denom = temp_base_denom;
                }
                result => {
                    counter!(
                        "pricing_spot_price_error_total",
                        "base" => base_denom.to_string(),
                        "quote" => quote_denom.to_string(),
                    )
                    .increment(1);
                    warn!(
                        pool_id = pool.id,
                        base_denom,
                        quote_denom,
                        error = ?result.err(),
                        "spot price unavailable; falling back to amount ratio"
                    );
                    use_alternative_method = true;
                    break;
                }
            }
        }

        if use_alternative_method {
            // On-chain price of one probe: amount in over amount out.
            let (Some(amount_in), Some(amount_out)) = (
                decimal_from_biguint(&probe_amount),
                decimal_from_biguint(&quote.amount_out),
            ) else {
                return Err(PricingError::ZeroQuoteAmountOut {
                    base_denom: base_denom.to_string(),
                    quote_denom: quote_denom.to_string(),
                });
            };
            if amount_out.is_zero() {
                return Err(PricingError::ZeroQuoteAmountOut {
                    base_denom: base_denom.to_string(),
                    quote_denom: quote_denom.to_string(),
                });
            }
            chain_price = amount_in / amount_out;
        }

        if chain_price.is_zero() {
            counter!(
                "pricing_truncation_total",
                "base" => base_denom.to_string(),
                "quote" => quote_denom.to_string(),
            )
            .increment(1);
        }

        // Descale raw chain units to human units. The probe amount is
        // multiplier * quote scaling factor, so `multiplier * s_base /
        // probe` reduces to the ratio of scaling factors; the division
        // happens exactly once.
        let quote_scaling_factor = self.tokens.scaling_factor(quote_denom)?;
        let precision_scaling_factor = base_scaling_factor / quote_scaling_factor;
        let price = chain_price * precision_scaling_factor;

        let expiration = if quote_denom == self.default_quote_denom {
            Expiration::Never
        } else {
            Expiration::After(self.cache_expiry)
        };
        self.cache
            .set(DenomPair::new(base_denom, quote_denom), price, expiration);
        debug!(base_denom, quote_denom, %price, "price computed");

        Ok(price)
    }
}

#[async_trait]
impl PricingSource for ChainPricing {
    #[instrument(skip(self, options))]
    async fn get_price(
        &self,
        base_denom: &str,
        quote_denom: &str,
        options: PricingOptions,
    ) -> Result<Decimal, PricingError> {
        if base_denom == quote_denom {
            return Ok(Decimal::ONE);
        }

        let min_liquidity = options.min_liquidity.unwrap_or(self.min_liquidity);
        let pair = DenomPair::new(base_denom, quote_denom);

        if !options.recompute_prices {
            if let Some(price) = self.cache.get(&pair) {
                counter!(
                    "pricing_cache_hits_total",
                    "base" => base_denom.to_string(),
                    "quote" => quote_denom.to_string(),
                )
                .increment(1);
                return Ok(price);
            }
            counter!(
                "pricing_cache_misses_total",
                "base" => base_denom.to_string(),
                "quote" => quote_denom.to_string(),
            )
            .increment(1);
        }

        // At most one computation in flight per pair; concurrent callers
        // share the leader's result.
        self.flight
            .run(pair, || self.compute_price(base_denom, quote_denom, min_liquidity))
            .await
    }
}
