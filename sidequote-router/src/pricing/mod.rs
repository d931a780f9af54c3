//! Token pricing: turning quotes into unit prices between denoms.

pub mod chain;
pub mod worker;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{router::RouterError, tokens::TokenError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    #[error("no route found when pricing {base_denom} (base) against {quote_denom} (quote)")]
    NoRouteFound { base_denom: String, quote_denom: String },
    #[error("quote produced a zero output when pricing {base_denom} against {quote_denom}")]
    ZeroQuoteAmountOut { base_denom: String, quote_denom: String },
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Router(#[from] RouterError),
}

/// Per-request pricing parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingOptions {
    /// Overrides the engine's liquidity admission threshold.
    pub min_liquidity: Option<u64>,
    /// Bypasses the cache read and recomputes the price. The result is
    /// still stored.
    pub recompute_prices: bool,
}

/// A source of prices: how many units of the quote denom one unit of the
/// base denom is worth.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PricingSource: Send + Sync {
    async fn get_price(
        &self,
        base_denom: &str,
        quote_denom: &str,
        options: PricingOptions,
    ) -> Result<Decimal, PricingError>;
}
