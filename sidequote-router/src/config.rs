//! Service configuration.
//!
//! Keys are kebab-case to match the deployment configuration files; every
//! field carries a default so a partial file is enough.

use std::{collections::HashMap, fs, path::Path};

use serde::{Deserialize, Serialize};
use sidequote_common::{Denom, PoolId};
use thiserror::Error;

use crate::tokens::TokenMetadata;

/// Splitting is disabled when `max-split-routes` is set to this value.
pub const DISABLE_SPLIT_ROUTES: usize = 0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RouterConfig {
    /// Pools explored first during route discovery, in bias order.
    pub preferred_pool_ids: Vec<PoolId>,
    pub max_pools_per_route: usize,
    pub max_routes: usize,
    /// Upper bound on split fan-out; zero disables splitting.
    pub max_split_routes: usize,
    pub max_split_iterations: usize,
    /// Admission threshold on a pool's liquidity, denominated in the
    /// OSMO-equivalent accounting denom.
    #[serde(rename = "min-osmo-liquidity")]
    pub min_liquidity: u64,
    pub route_cache_enabled: bool,
    pub candidate_route_cache_expiry_seconds: u64,
    pub ranked_route_cache_expiry_seconds: u64,
    pub enable_overwrite_routes_cache: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            preferred_pool_ids: Vec::new(),
            max_pools_per_route: 4,
            max_routes: 20,
            max_split_routes: 3,
            max_split_iterations: 10,
            min_liquidity: 10_000,
            route_cache_enabled: true,
            candidate_route_cache_expiry_seconds: 600,
            ranked_route_cache_expiry_seconds: 300,
            enable_overwrite_routes_cache: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PricingConfig {
    /// TTL of computed prices. Prices against the default quote denom are
    /// exempt and live until the block-driven refresher rewrites them.
    pub cache_expiry_ms: u64,
    /// The denom all prices are expressed in by default, named by its
    /// human-readable form.
    pub default_quote_human_denom: String,
    /// Pricing quotes use more and shallower pools than user quotes, so
    /// these override the router defaults.
    pub max_pools_per_route: usize,
    pub max_routes: usize,
    #[serde(rename = "min-osmo-liquidity")]
    pub min_liquidity: u64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            cache_expiry_ms: 2_000,
            default_quote_human_denom: "usdc".to_string(),
            max_pools_per_route: 4,
            max_routes: 5,
            min_liquidity: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AppConfig {
    pub router: RouterConfig,
    pub pricing: PricingConfig,
    pub request_timeout_ms: u64,
    /// Seed asset list: denom metadata available before the first ingest
    /// push. Must cover the default quote denom.
    pub tokens: HashMap<Denom, TokenMetadata>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let pricing = PricingConfig::default();
        let tokens = HashMap::from([(
            format!("u{}", pricing.default_quote_human_denom),
            TokenMetadata::new(pricing.default_quote_human_denom.clone(), 6),
        )]);
        Self { router: RouterConfig::default(), pricing, request_timeout_ms: 0, tokens }
    }
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        let ms = if self.request_timeout_ms == 0 { 10_000 } else { self.request_timeout_ms };
        std::time::Duration::from_millis(ms)
    }
}
