//! Quote assembly: combining evaluated routes into the client-facing
//! result with effective spread factor and price impact.

use num_bigint::BigUint;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sidequote_common::Coin;

use crate::{num::decimal_from_biguint, router::route::{EvaluatedRoute, ResultPool}};

/// One leg of a quote: the share of the input executed over a single route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRoute {
    pub pools: Vec<ResultPool>,
    pub in_amount: BigUint,
    pub out_amount: BigUint,
}

/// The optimal quote for an input coin and output denom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub amount_in: Coin,
    pub amount_out: BigUint,
    pub routes: Vec<QuoteRoute>,
    /// Amount-in weighted mean of per-route spread factors.
    pub effective_spread_factor: Decimal,
    /// `1 - effective_price / pre_swap_price`; zero when the pre-swap price
    /// is unavailable.
    pub price_impact: Decimal,
    /// Amount-in weighted pre-swap spot price, rescaled to human units by
    /// the caller-provided scaling factor. Zero when precision information
    /// is missing for either denom.
    pub pre_swap_spot_price: Decimal,
}

/// An evaluated route plus the amounts and spread factor of its share.
#[derive(Debug, Clone)]
pub struct QuoteLeg {
    pub evaluated: EvaluatedRoute,
    pub amount_in: BigUint,
    pub spread_factor: Decimal,
}

impl Quote {
    /// Combines evaluated legs into the final quote.
    ///
    /// `spot_price_scaling_factor` converts raw spot prices to human units;
    /// zero is a valid value meaning precision information is missing for
    /// one of the denoms, in which case the reported spot price is
    /// invalidated to zero rather than erroring.
    pub fn assemble(
        amount_in: Coin,
        legs: Vec<QuoteLeg>,
        spot_price_scaling_factor: Decimal,
    ) -> Self {
        let amount_out: BigUint = legs
            .iter()
            .map(|leg| &leg.evaluated.token_out.amount)
            .sum();

        let total_in = decimal_from_biguint(&amount_in.amount).unwrap_or(Decimal::ZERO);
        let mut spread_factor = Decimal::ZERO;
        let mut pre_swap_price = Decimal::ZERO;
        let mut effective_price = Decimal::ZERO;
        if total_in > Decimal::ZERO {
            for leg in &legs {
                let weight =
                    decimal_from_biguint(&leg.amount_in).unwrap_or(Decimal::ZERO) / total_in;
                spread_factor += weight * leg.spread_factor;
                pre_swap_price += weight * leg.evaluated.pre_swap_spot_price;
                effective_price += weight * leg.evaluated.effective_spot_price;
            }
        }

        let price_impact = if pre_swap_price > Decimal::ZERO {
            Decimal::ONE - effective_price / pre_swap_price
        } else {
            Decimal::ZERO
        };

        let routes = legs
            .into_iter()
            .map(|leg| QuoteRoute {
                pools: leg.evaluated.result_pools,
                in_amount: leg.amount_in,
                out_amount: leg.evaluated.token_out.amount,
            })
            .collect();

        Self {
            amount_in,
            amount_out,
            routes,
            effective_spread_factor: spread_factor,
            price_impact,
            pre_swap_spot_price: pre_swap_price * spot_price_scaling_factor,
        }
    }

    /// The quote for swapping a coin into its own denom: the full amount
    /// flows through a single empty route at price one.
    pub fn identity(amount_in: Coin) -> Self {
        let amount = amount_in.amount.clone();
        Self {
            amount_in,
            amount_out: amount.clone(),
            routes: vec![QuoteRoute { pools: Vec::new(), in_amount: amount.clone(), out_amount: amount }],
            effective_spread_factor: Decimal::ZERO,
            price_impact: Decimal::ZERO,
            pre_swap_spot_price: Decimal::ONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn leg(amount_in: u64, amount_out: u64, pre: Decimal, eff: Decimal, spread: Decimal) -> QuoteLeg {
        QuoteLeg {
            evaluated: EvaluatedRoute {
                result_pools: Vec::new(),
                token_out: Coin::new("tokenb", amount_out),
                pre_swap_spot_price: pre,
                effective_spot_price: eff,
            },
            amount_in: BigUint::from(amount_in),
            spread_factor: spread,
        }
    }

    #[test]
    fn identity_quote_swaps_nothing() {
        let quote = Quote::identity(Coin::new("tokena", 100u32));
        assert_eq!(quote.amount_out, BigUint::from(100u32));
        assert_eq!(quote.routes.len(), 1);
        assert!(quote.routes[0].pools.is_empty());
        assert_eq!(quote.price_impact, dec!(0));
        assert_eq!(quote.pre_swap_spot_price, dec!(1));
    }

    #[test]
    fn weighted_aggregation_over_two_legs() {
        let quote = Quote::assemble(
            Coin::new("tokena", 100u32),
            vec![
                leg(75, 150, dec!(2), dec!(1.9), dec!(0.01)),
                leg(25, 50, dec!(2), dec!(1.8), dec!(0.03)),
            ],
            dec!(1),
        );

        assert_eq!(quote.amount_out, BigUint::from(200u32));
        // 0.75 * 0.01 + 0.25 * 0.03
        assert_eq!(quote.effective_spread_factor, dec!(0.015));
        // effective = 0.75 * 1.9 + 0.25 * 1.8 = 1.875; impact = 1 - 1.875/2
        assert_eq!(quote.price_impact, dec!(0.0625));
        assert_eq!(quote.pre_swap_spot_price, dec!(2));
    }

    #[test]
    fn zero_scaling_factor_invalidates_the_spot_price() {
        let quote = Quote::assemble(
            Coin::new("tokena", 100u32),
            vec![leg(100, 200, dec!(2), dec!(1.9), dec!(0.01))],
            dec!(0),
        );

        assert_eq!(quote.pre_swap_spot_price, dec!(0));
        // Impact is computed from raw prices and survives the invalidation.
        assert_eq!(quote.price_impact, dec!(0.05));
    }
}
