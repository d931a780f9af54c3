//! Route caching tiers.
//!
//! Lookup order is overwrite, then ranked, then candidate; the finder runs
//! only when all tiers miss. All tiers store candidate descriptors rather
//! than bound routes, so entries survive pool snapshot churn and are
//! re-bound against the live registry at evaluation time.

use std::time::Duration;

use metrics::counter;
use sidequote_common::{cache::Cache, cache::Expiration, DenomPair};
use tracing::debug;

use crate::{config::RouterConfig, router::candidate::CandidateRoute};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteCacheTier {
    Overwrite,
    Ranked,
    Candidate,
}

impl RouteCacheTier {
    fn label(&self) -> &'static str {
        match self {
            RouteCacheTier::Overwrite => "overwrite",
            RouteCacheTier::Ranked => "ranked",
            RouteCacheTier::Candidate => "candidate",
        }
    }
}

#[derive(Debug)]
pub struct RouteCache {
    enabled: bool,
    overwrite_enabled: bool,
    candidate_ttl: Duration,
    ranked_ttl: Duration,
    overwrite: Cache<DenomPair, Vec<CandidateRoute>>,
    ranked: Cache<DenomPair, Vec<CandidateRoute>>,
    candidate: Cache<DenomPair, Vec<CandidateRoute>>,
}

impl RouteCache {
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            enabled: config.route_cache_enabled,
            overwrite_enabled: config.enable_overwrite_routes_cache,
            candidate_ttl: Duration::from_secs(config.candidate_route_cache_expiry_seconds),
            ranked_ttl: Duration::from_secs(config.ranked_route_cache_expiry_seconds),
            overwrite: Cache::new(),
            ranked: Cache::new(),
            candidate: Cache::new(),
        }
    }

    /// Operator-pinned routes for a pair. When present they replace both
    /// derived tiers and never expire until explicitly cleared.
    pub fn get_overwrite(&self, pair: &DenomPair) -> Option<Vec<CandidateRoute>> {
        if !self.overwrite_enabled {
            return None;
        }
        Self::counted(RouteCacheTier::Overwrite, self.overwrite.get(pair))
    }

    pub fn set_overwrite(&self, pair: DenomPair, routes: Vec<CandidateRoute>) {
        debug!(%pair, count = routes.len(), "pinning overwrite routes");
        self.overwrite.set(pair, routes, Expiration::Never);
    }

    pub fn clear_overwrite(&self, pair: &DenomPair) {
        self.overwrite.delete(pair);
    }

    pub fn get_ranked(&self, pair: &DenomPair) -> Option<Vec<CandidateRoute>> {
        if !self.enabled {
            return None;
        }
        Self::counted(RouteCacheTier::Ranked, self.ranked.get(pair))
    }

    pub fn set_ranked(&self, pair: DenomPair, routes: Vec<CandidateRoute>) {
        if self.enabled {
            self.ranked.set(pair, routes, Expiration::After(self.ranked_ttl));
        }
    }

    pub fn get_candidate(&self, pair: &DenomPair) -> Option<Vec<CandidateRoute>> {
        if !self.enabled {
            return None;
        }
        Self::counted(RouteCacheTier::Candidate, self.candidate.get(pair))
    }

    pub fn set_candidate(&self, pair: DenomPair, routes: Vec<CandidateRoute>) {
        if self.enabled {
            self.candidate
                .set(pair, routes, Expiration::After(self.candidate_ttl));
        }
    }

    fn counted(
        tier: RouteCacheTier,
        value: Option<Vec<CandidateRoute>>,
    ) -> Option<Vec<CandidateRoute>> {
        match &value {
            Some(_) => {
                counter!("route_cache_hits_total", "tier" => tier.label()).increment(1);
            }
            None => {
                counter!("route_cache_misses_total", "tier" => tier.label()).increment(1);
            }
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::router::candidate::CandidateHop;

    fn config() -> RouterConfig {
        RouterConfig {
            route_cache_enabled: true,
            enable_overwrite_routes_cache: true,
            candidate_route_cache_expiry_seconds: 600,
            ranked_route_cache_expiry_seconds: 300,
            ..RouterConfig::default()
        }
    }

    fn routes() -> Vec<CandidateRoute> {
        vec![CandidateRoute {
            hops: vec![CandidateHop { pool_id: 1, token_out_denom: "tokenb".to_string() }],
            contains_generalized_cw_pool: false,
        }]
    }

    #[test]
    fn tiers_are_independent() {
        let cache = RouteCache::new(&config());
        let pair = DenomPair::new("tokena", "tokenb");

        cache.set_candidate(pair.clone(), routes());
        assert_eq!(cache.get_candidate(&pair), Some(routes()));
        assert_eq!(cache.get_ranked(&pair), None);
        assert_eq!(cache.get_overwrite(&pair), None);
    }

    #[test]
    fn disabled_cache_stores_and_serves_nothing() {
        let cache = RouteCache::new(&RouterConfig {
            route_cache_enabled: false,
            ..config()
        });
        let pair = DenomPair::new("tokena", "tokenb");

        cache.set_candidate(pair.clone(), routes());
        cache.set_ranked(pair.clone(), routes());

        assert_eq!(cache.get_candidate(&pair), None);
        assert_eq!(cache.get_ranked(&pair), None);
    }

    #[test]
    fn overwrite_routes_persist_until_cleared() {
        let cache = RouteCache::new(&config());
        let pair = DenomPair::new("tokena", "tokenb");

        cache.set_overwrite(pair.clone(), routes());
        assert_eq!(cache.get_overwrite(&pair), Some(routes()));

        cache.clear_overwrite(&pair);
        assert_eq!(cache.get_overwrite(&pair), None);
    }

    #[test]
    fn overwrite_tier_requires_the_flag() {
        let cache = RouteCache::new(&RouterConfig {
            enable_overwrite_routes_cache: false,
            ..config()
        });
        let pair = DenomPair::new("tokena", "tokenb");

        cache.set_overwrite(pair.clone(), routes());
        assert_eq!(cache.get_overwrite(&pair), None);
    }
}
