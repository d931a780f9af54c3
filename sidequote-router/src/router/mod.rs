//! Route discovery, evaluation, ranking, split optimisation and caching.

pub mod cache;
pub mod candidate;
pub mod quote;
pub mod route;
pub mod split;
pub mod usecase;

use sidequote_common::{PoolId, SimulationError};
use thiserror::Error;

use crate::{config::RouterConfig, tokens::TokenError};

/// Errors surfaced by the router usecase.
///
/// Route-level failures (a pool disappearing, pool math erroring) are
/// recovered internally by disqualifying the route; only request-level
/// conditions reach this type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouterError {
    #[error("no routes found from {token_in_denom} to {token_out_denom}")]
    NoRoutes { token_in_denom: String, token_out_denom: String },
    #[error("pool {0} not found")]
    PoolNotFound(PoolId),
    #[error("invalid request: {0}")]
    InvalidInput(String),
    #[error("request deadline exceeded")]
    Timeout,
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Per-request routing parameters.
///
/// The router usecase is constructed with the service-level
/// [`RouterConfig`]; callers such as the pricing engine overwrite
/// individual knobs per request.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterOptions {
    pub max_pools_per_route: usize,
    pub max_routes: usize,
    pub max_split_routes: usize,
    pub max_split_iterations: usize,
    pub min_liquidity: u64,
}

impl RouterOptions {
    pub fn with_max_pools_per_route(mut self, max_pools_per_route: usize) -> Self {
        self.max_pools_per_route = max_pools_per_route;
        self
    }

    pub fn with_max_routes(mut self, max_routes: usize) -> Self {
        self.max_routes = max_routes;
        self
    }

    pub fn with_min_liquidity(mut self, min_liquidity: u64) -> Self {
        self.min_liquidity = min_liquidity;
        self
    }

    pub fn with_max_split_routes(mut self, max_split_routes: usize) -> Self {
        self.max_split_routes = max_split_routes;
        self
    }

    pub fn with_disabled_splits(self) -> Self {
        self.with_max_split_routes(crate::config::DISABLE_SPLIT_ROUTES)
    }
}

impl From<&RouterConfig> for RouterOptions {
    fn from(config: &RouterConfig) -> Self {
        Self {
            max_pools_per_route: config.max_pools_per_route,
            max_routes: config.max_routes,
            max_split_routes: config.max_split_routes,
            max_split_iterations: config.max_split_iterations,
            min_liquidity: config.min_liquidity,
        }
    }
}

