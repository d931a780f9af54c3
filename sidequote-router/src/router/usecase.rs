//! The router usecase: quote requests end-to-end.
//!
//! Control flow for a quote: pair -> route cache (ranked hit skips ahead)
//! -> candidate finder -> evaluation over each candidate -> ranking ->
//! split optimisation -> result assembly. Route-level failures disqualify
//! the route and the request succeeds as long as one route survives.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::future::join_all;
use num_bigint::BigUint;
use rust_decimal::Decimal;
use sidequote_common::{
    singleflight::SingleFlight, Coin, Denom, DenomPair, PoolId, PoolSim,
};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::{
    config::RouterConfig,
    registry::{PoolRegistry, PoolSet, TakerFeeTable},
    router::{
        cache::RouteCache,
        candidate::{find_candidate_routes, CandidateRoute, CandidateSearchOptions},
        quote::{Quote, QuoteLeg},
        route::{Route, RouteStep},
        split::optimize_splits,
        RouterError, RouterOptions,
    },
    tokens::TokenRegistry,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RouterUsecase: Send + Sync {
    /// Computes the output-maximising quote for swapping `token_in` into
    /// `token_out_denom`, possibly split across routes.
    async fn get_optimal_quote(
        &self,
        token_in: Coin,
        token_out_denom: &str,
        options: RouterOptions,
    ) -> Result<Quote, RouterError>;

    /// Computes a quote forced through the given pool sequence; no route
    /// search, no splitting.
    async fn get_custom_direct_quote(
        &self,
        token_in: Coin,
        pool_ids: &[PoolId],
        token_out_denom: &str,
    ) -> Result<Quote, RouterError>;

    /// The spot price of `base_denom` expressed in `quote_denom` on one
    /// pool.
    async fn get_pool_spot_price(
        &self,
        pool_id: PoolId,
        quote_denom: &str,
        base_denom: &str,
    ) -> Result<Decimal, RouterError>;

    /// The candidate routes the finder would consider for the pair.
    async fn get_candidate_routes(
        &self,
        token_in_denom: &str,
        token_out_denom: &str,
        options: RouterOptions,
    ) -> Result<Vec<CandidateRoute>, RouterError>;
}

pub struct Router {
    registry: Arc<PoolRegistry>,
    taker_fees: Arc<TakerFeeTable>,
    tokens: Arc<TokenRegistry>,
    preferred_pool_ids: Vec<PoolId>,
    route_cache: RouteCache,
    candidate_flight: SingleFlight<DenomPair, Vec<CandidateRoute>, RouterError>,
    request_timeout: Duration,
}

impl Router {
    pub fn new(
        registry: Arc<PoolRegistry>,
        taker_fees: Arc<TakerFeeTable>,
        tokens: Arc<TokenRegistry>,
        config: &RouterConfig,
        request_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            taker_fees,
            tokens,
            preferred_pool_ids: config.preferred_pool_ids.clone(),
            route_cache: RouteCache::new(config),
            candidate_flight: SingleFlight::new(),
            request_timeout,
        }
    }

    /// Overwrite-tier management, exposed for operator tooling.
    pub fn set_overwrite_routes(&self, pair: DenomPair, routes: Vec<CandidateRoute>) {
        self.route_cache.set_overwrite(pair, routes);
    }

    pub fn clear_overwrite_routes(&self, pair: &DenomPair) {
        self.route_cache.clear_overwrite(pair);
    }

    async fn optimal_quote_inner(
        &self,
        token_in: Coin,
        token_out_denom: &str,
        options: RouterOptions,
    ) -> Result<Quote, RouterError> {
        if token_in.denom == token_out_denom {
            return Ok(Quote::identity(token_in));
        }

        let pair = DenomPair::new(&token_in.denom, token_out_denom);
        let snapshot = self.registry.snapshot();
        let taker_fees = self.taker_fees.snapshot();

        let (candidates, pre_ranked) = self
            .resolve_candidates(&pair, &snapshot, &options)
            .await?;
        if candidates.is_empty() {
            return Err(no_routes(&pair));
        }

        // Bind candidates to the live snapshot; a candidate whose pool has
        // left the registry is disqualified, not fatal.
        let routes: Vec<(CandidateRoute, Route)> = candidates
            .into_iter()
            .filter_map(|candidate| {
                match Route::from_candidate(&snapshot, &token_in.denom, &candidate) {
                    Ok(route) => Some((candidate, route)),
                    Err(err) => {
                        debug!(%pair, %err, "dropping stale candidate route");
                        None
                    }
                }
            })
            .collect();

        // Evaluate every surviving route for the actual input. Evaluations
        // across routes are independent and run concurrently.
        let outputs = join_all(
            routes
                .iter()
                .map(|(_, route)| route.calculate_token_out(&token_in)),
        )
        .await;
        let mut evaluated: Vec<(CandidateRoute, Route, BigUint)> = routes
            .into_iter()
            .zip(outputs)
            .filter_map(|((candidate, route), output)| match output {
                Ok(coin) => Some((candidate, route, coin.amount)),
                Err(err) => {
                    debug!(%pair, %err, "route disqualified during evaluation");
                    None
                }
            })
            .collect();
        if evaluated.is_empty() {
            return Err(no_routes(&pair));
        }

        // A ranked-tier hit bypasses re-ranking; otherwise order by output
        // and remember the ordering.
        if !pre_ranked {
            evaluated.sort_by(|a, b| b.2.cmp(&a.2));
            self.route_cache.set_ranked(
                pair.clone(),
                evaluated
                    .iter()
                    .map(|(candidate, _, _)| candidate.clone())
                    .collect(),
            );
        }

        let (routes, ranked_outputs): (Vec<Route>, Vec<BigUint>) = evaluated
            .into_iter()
            .map(|(_, route, output)| (route, output))
            .unzip();

        let allocations = optimize_splits(
            &token_in,
            &routes,
            &ranked_outputs,
            options.max_split_routes,
            options.max_split_iterations,
        )
        .await;
        if allocations.is_empty() {
            return Err(no_routes(&pair));
        }

        let mut legs = Vec::with_capacity(allocations.len());
        for allocation in allocations {
            let route = &routes[allocation.route_index];
            let share = Coin { denom: token_in.denom.clone(), amount: allocation.amount_in.clone() };
            match route.prepare_result_pools(&share, &taker_fees).await {
                Ok(evaluated) => legs.push(QuoteLeg {
                    spread_factor: route.effective_spread_factor(&taker_fees),
                    amount_in: allocation.amount_in,
                    evaluated,
                }),
                Err(err) => {
                    warn!(%pair, %err, "route failed during result preparation");
                }
            }
        }
        if legs.is_empty() {
            return Err(no_routes(&pair));
        }

        let scaling_factor = self.spot_price_scaling_factor(&token_in.denom, token_out_denom);
        Ok(Quote::assemble(token_in, legs, scaling_factor))
    }

    /// Lookup order: overwrite -> ranked -> candidate -> finder, with an
    /// at-most-one in-flight finder execution per pair. The boolean is true
    /// when the returned routes are already ordered.
    async fn resolve_candidates(
        &self,
        pair: &DenomPair,
        snapshot: &Arc<PoolSet>,
        options: &RouterOptions,
    ) -> Result<(Vec<CandidateRoute>, bool), RouterError> {
        if let Some(routes) = self.route_cache.get_overwrite(pair) {
            return Ok((routes, true));
        }
        if let Some(routes) = self.route_cache.get_ranked(pair) {
            return Ok((routes, true));
        }
        if let Some(routes) = self.route_cache.get_candidate(pair) {
            return Ok((routes, false));
        }

        let routes = self
            .candidate_flight
            .run(pair.clone(), || {
                let snapshot = Arc::clone(snapshot);
                let search = CandidateSearchOptions {
                    max_pools_per_route: options.max_pools_per_route,
                    max_routes: options.max_routes,
                    min_liquidity: options.min_liquidity,
                    preferred_pool_ids: self.preferred_pool_ids.clone(),
                };
                let pair = pair.clone();
                async move {
                    let routes = find_candidate_routes(
                        &snapshot,
                        &pair.token_in,
                        &pair.token_out,
                        &search,
                    );
                    debug!(%pair, count = routes.len(), "candidate routes computed");
                    self.route_cache.set_candidate(pair, routes.clone());
                    Ok(routes)
                }
            })
            .await?;
        Ok((routes, false))
    }

    /// Converts raw spot prices to human units for the pair; zero when
    /// precision information is missing for either denom.
    fn spot_price_scaling_factor(&self, token_in_denom: &str, token_out_denom: &str) -> Decimal {
        match (
            self.tokens.scaling_factor(token_in_denom),
            self.tokens.scaling_factor(token_out_denom),
        ) {
            (Ok(scale_in), Ok(scale_out)) if !scale_out.is_zero() => scale_in / scale_out,
            _ => Decimal::ZERO,
        }
    }
}

fn no_routes(pair: &DenomPair) -> RouterError {
    RouterError::NoRoutes {
        token_in_denom: pair.token_in.clone(),
        token_out_denom: pair.token_out.clone(),
    }
}

#[async_trait]
impl RouterUsecase for Router {
    #[instrument(skip(self, token_in, options), fields(token_in = %token_in))]
    async fn get_optimal_quote(
        &self,
        token_in: Coin,
        token_out_denom: &str,
        options: RouterOptions,
    ) -> Result<Quote, RouterError> {
        timeout(
            self.request_timeout,
            self.optimal_quote_inner(token_in, token_out_denom, options),
        )
        .await
        .map_err(|_| RouterError::Timeout)?
    }

    #[instrument(skip(self, token_in), fields(token_in = %token_in))]
    async fn get_custom_direct_quote(
        &self,
        token_in: Coin,
        pool_ids: &[PoolId],
        token_out_denom: &str,
    ) -> Result<Quote, RouterError> {
        timeout(
            self.request_timeout,
            self.custom_direct_quote_inner(token_in, pool_ids, token_out_denom),
        )
        .await
        .map_err(|_| RouterError::Timeout)?
    }

    async fn get_pool_spot_price(
        &self,
        pool_id: PoolId,
        quote_denom: &str,
        base_denom: &str,
    ) -> Result<Decimal, RouterError> {
        let pool = self
            .registry
            .get(pool_id)
            .ok_or(RouterError::PoolNotFound(pool_id))?;
        let price = timeout(self.request_timeout, pool.spot_price(base_denom, quote_denom))
            .await
            .map_err(|_| RouterError::Timeout)??;
        Ok(price)
    }

    async fn get_candidate_routes(
        &self,
        token_in_denom: &str,
        token_out_denom: &str,
        options: RouterOptions,
    ) -> Result<Vec<CandidateRoute>, RouterError> {
        if token_in_denom == token_out_denom {
            return Ok(Vec::new());
        }
        let pair = DenomPair::new(token_in_denom, token_out_denom);
        let snapshot = self.registry.snapshot();
        let (routes, _) = timeout(
            self.request_timeout,
            self.resolve_candidates(&pair, &snapshot, &options),
        )
        .await
        .map_err(|_| RouterError::Timeout)??;
        Ok(routes)
    }
}

impl Router {
    async fn custom_direct_quote_inner(
        &self,
        token_in: Coin,
        pool_ids: &[PoolId],
        token_out_denom: &str,
    ) -> Result<Quote, RouterError> {
        if token_in.denom == token_out_denom {
            return Err(RouterError::InvalidInput(
                "custom quotes require distinct token in and token out denoms".to_string(),
            ));
        }
        if pool_ids.is_empty() {
            return Err(RouterError::InvalidInput("no pool ids provided".to_string()));
        }

        let snapshot = self.registry.snapshot();
        let mut steps = Vec::with_capacity(pool_ids.len());
        let mut current: Denom = token_in.denom.clone();
        for (position, pool_id) in pool_ids.iter().enumerate() {
            let pool = snapshot
                .get(*pool_id)
                .ok_or_else(|| RouterError::InvalidInput(format!("pool {pool_id} not found")))?;
            if !pool.has_denom(&current) {
                return Err(RouterError::InvalidInput(format!(
                    "pool {pool_id} does not trade {current}"
                )));
            }
            let out_denom = if position + 1 == pool_ids.len() {
                if !pool.has_denom(token_out_denom) {
                    return Err(RouterError::InvalidInput(format!(
                        "pool {pool_id} does not trade {token_out_denom}"
                    )));
                }
                token_out_denom.to_string()
            } else {
                continuation_denom(pool, &current)?
            };
            steps.push(RouteStep { pool: Arc::clone(pool), token_out_denom: out_denom.clone() });
            current = out_denom;
        }

        let route = Route::from_steps(&token_in.denom, steps)?;
        let taker_fees = self.taker_fees.snapshot();
        let evaluated = route.prepare_result_pools(&token_in, &taker_fees).await?;
        let leg = QuoteLeg {
            spread_factor: route.effective_spread_factor(&taker_fees),
            amount_in: token_in.amount.clone(),
            evaluated,
        };
        let scaling_factor = self.spot_price_scaling_factor(&token_in.denom, token_out_denom);
        Ok(Quote::assemble(token_in, vec![leg], scaling_factor))
    }
}

/// The denom an intermediate pool hands to the next one. Ambiguity is an
/// input error rather than a guess.
fn continuation_denom(pool: &Arc<dyn PoolSim>, current: &str) -> Result<Denom, RouterError> {
    let continuations: Vec<&Denom> = pool
        .denoms()
        .iter()
        .filter(|denom| denom.as_str() != current)
        .collect();
    match continuations.as_slice() {
        [single] => Ok((*single).clone()),
        [] => Err(RouterError::InvalidInput(format!(
            "pool {} has no denom to continue the route with",
            pool.id()
        ))),
        _ => Err(RouterError::InvalidInput(format!(
            "pool {} has an ambiguous continuation; split the route explicitly",
            pool.id()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::testing::{ConstantProductPool, RemotePool};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn router_with(pools: Vec<Arc<dyn PoolSim>>, config: RouterConfig) -> Router {
        let registry = Arc::new(PoolRegistry::new());
        registry.replace(pools);
        Router::new(
            registry,
            Arc::new(TakerFeeTable::new()),
            Arc::new(TokenRegistry::new()),
            &config,
            TIMEOUT,
        )
    }

    fn options() -> RouterOptions {
        RouterOptions {
            max_pools_per_route: 4,
            max_routes: 20,
            max_split_routes: 0,
            max_split_iterations: 10,
            min_liquidity: 0,
        }
    }

    fn cp(id: PoolId, denoms: &[(&str, u64)]) -> Arc<dyn PoolSim> {
        Arc::new(ConstantProductPool::new(id, denoms))
    }

    #[tokio::test]
    async fn identity_quote_never_touches_the_registry() {
        let router = router_with(Vec::new(), RouterConfig::default());

        let quote = router
            .get_optimal_quote(Coin::new("tokena", 100u32), "tokena", options())
            .await
            .unwrap();

        assert_eq!(quote.amount_out, BigUint::from(100u32));
        assert_eq!(quote.routes.len(), 1);
        assert!(quote.routes[0].pools.is_empty());
        assert_eq!(quote.price_impact, dec!(0));
    }

    #[tokio::test]
    async fn two_hop_quote_over_a_linear_graph() {
        let router = router_with(
            vec![
                cp(1, &[("tokena", 1_000_000), ("tokenc", 1_000_000)]),
                cp(2, &[("tokenc", 1_000_000), ("tokenb", 1_000_000)]),
            ],
            RouterConfig::default(),
        );

        let quote = router
            .get_optimal_quote(Coin::new("tokena", 100u32), "tokenb", options())
            .await
            .unwrap();

        assert_eq!(quote.routes.len(), 1);
        assert_eq!(quote.routes[0].pools.len(), 2);
        assert_eq!(quote.routes[0].pools[0].id, 1);
        assert_eq!(quote.routes[0].pools[1].id, 2);
        assert_eq!(quote.amount_out, BigUint::from(98u32));
    }

    #[tokio::test]
    async fn missing_path_is_not_found() {
        let router = router_with(
            vec![cp(1, &[("tokena", 1_000_000), ("tokenc", 1_000_000)])],
            RouterConfig::default(),
        );

        let err = router
            .get_optimal_quote(Coin::new("tokena", 100u32), "tokenb", options())
            .await
            .unwrap_err();

        assert!(matches!(err, RouterError::NoRoutes { .. }));
    }

    #[tokio::test]
    async fn warm_cache_serves_identical_quotes() {
        let router = router_with(
            vec![
                cp(1, &[("tokena", 1_000_000), ("tokenb", 1_000_000)]),
                cp(2, &[("tokena", 2_000_000), ("tokenb", 2_000_000)]),
            ],
            RouterConfig::default(),
        );

        let first = router
            .get_optimal_quote(Coin::new("tokena", 10_000u32), "tokenb", options())
            .await
            .unwrap();
        // The second request hits the ranked tier.
        assert!(router
            .route_cache
            .get_ranked(&DenomPair::new("tokena", "tokenb"))
            .is_some());
        let second = router
            .get_optimal_quote(Coin::new("tokena", 10_000u32), "tokenb", options())
            .await
            .unwrap();

        assert_eq!(first.amount_out, second.amount_out);
        assert_eq!(first.routes, second.routes);
    }

    #[tokio::test]
    async fn cached_route_with_a_removed_pool_is_disqualified() {
        let registry = Arc::new(PoolRegistry::new());
        registry.replace(vec![
            cp(1, &[("tokena", 1_000_000), ("tokenb", 1_000_000)]),
            cp(2, &[("tokena", 1_000_000), ("tokenb", 1_000_000)]),
        ]);
        let router = Router::new(
            Arc::clone(&registry),
            Arc::new(TakerFeeTable::new()),
            Arc::new(TokenRegistry::new()),
            &RouterConfig::default(),
            TIMEOUT,
        );

        let first = router
            .get_optimal_quote(Coin::new("tokena", 1_000u32), "tokenb", options())
            .await
            .unwrap();
        assert_eq!(first.routes[0].pools[0].id, 1);

        // Pool 1 leaves the registry while the cached routes still name it.
        registry.replace(vec![cp(2, &[("tokena", 1_000_000), ("tokenb", 1_000_000)])]);

        let second = router
            .get_optimal_quote(Coin::new("tokena", 1_000u32), "tokenb", options())
            .await
            .unwrap();

        assert_eq!(second.routes.len(), 1);
        assert_eq!(second.routes[0].pools[0].id, 2);
    }

    #[tokio::test]
    async fn split_quote_distributes_across_disjoint_paths() {
        let router = router_with(
            vec![
                cp(1, &[("tokena", 1_000_000), ("tokenb", 1_000_000)]),
                cp(2, &[("tokena", 1_000_000), ("tokenb", 1_000_000)]),
            ],
            RouterConfig::default(),
        );
        let options = RouterOptions { max_split_routes: 2, ..options() };

        let quote = router
            .get_optimal_quote(Coin::new("tokena", 1_000_000u64), "tokenb", options)
            .await
            .unwrap();

        assert_eq!(quote.routes.len(), 2);
        let total_in: BigUint = quote.routes.iter().map(|r| &r.in_amount).sum();
        assert_eq!(total_in, BigUint::from(1_000_000u64));
        let total_out: BigUint = quote.routes.iter().map(|r| &r.out_amount).sum();
        assert_eq!(total_out, quote.amount_out);
    }

    #[tokio::test]
    async fn custom_direct_quote_follows_the_given_pools() {
        let router = router_with(
            vec![
                cp(1, &[("tokena", 1_000_000), ("tokenc", 1_000_000)]),
                cp(2, &[("tokenc", 1_000_000), ("tokenb", 1_000_000)]),
                cp(3, &[("tokena", 100), ("tokenb", 100)]),
            ],
            RouterConfig::default(),
        );

        let quote = router
            .get_custom_direct_quote(Coin::new("tokena", 100u32), &[1, 2], "tokenb")
            .await
            .unwrap();

        assert_eq!(quote.routes.len(), 1);
        assert_eq!(
            quote.routes[0]
                .pools
                .iter()
                .map(|p| p.id)
                .collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn custom_direct_quote_rejects_incompatible_pools() {
        let router = router_with(
            vec![cp(1, &[("tokena", 1_000_000), ("tokenc", 1_000_000)])],
            RouterConfig::default(),
        );

        let unknown = router
            .get_custom_direct_quote(Coin::new("tokena", 100u32), &[9], "tokenb")
            .await
            .unwrap_err();
        assert!(matches!(unknown, RouterError::InvalidInput(_)));

        let wrong_denoms = router
            .get_custom_direct_quote(Coin::new("tokena", 100u32), &[1], "tokenb")
            .await
            .unwrap_err();
        assert!(matches!(wrong_denoms, RouterError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn pool_spot_price_reads_the_live_pool() {
        let router = router_with(
            vec![cp(1, &[("tokena", 1_000_000), ("tokenb", 2_000_000)])],
            RouterConfig::default(),
        );

        let price = router
            .get_pool_spot_price(1, "tokena", "tokenb")
            .await
            .unwrap();

        // One tokenb is worth half a tokena: quote reserve over base
        // reserve.
        assert_eq!(price, dec!(0.5));

        let missing = router
            .get_pool_spot_price(9, "tokena", "tokenb")
            .await
            .unwrap_err();
        assert_eq!(missing, RouterError::PoolNotFound(9));
    }

    #[tokio::test]
    async fn slow_remote_pools_hit_the_deadline() {
        let registry = Arc::new(PoolRegistry::new());
        registry.replace(vec![Arc::new(
            RemotePool::new(ConstantProductPool::new(
                1,
                &[("tokena", 1_000_000), ("tokenb", 1_000_000)],
            ))
            .with_latency(Duration::from_millis(200)),
        ) as Arc<dyn PoolSim>]);
        let router = Router::new(
            registry,
            Arc::new(TakerFeeTable::new()),
            Arc::new(TokenRegistry::new()),
            &RouterConfig::default(),
            Duration::from_millis(20),
        );

        let err = router
            .get_optimal_quote(Coin::new("tokena", 100u32), "tokenb", options())
            .await
            .unwrap_err();

        assert_eq!(err, RouterError::Timeout);
    }

    #[tokio::test]
    async fn overwrite_routes_replace_discovery() {
        let router = router_with(
            vec![
                cp(1, &[("tokena", 1_000_000), ("tokenb", 1_000_000)]),
                cp(2, &[("tokena", 9_000_000), ("tokenb", 9_000_000)]),
            ],
            RouterConfig {
                enable_overwrite_routes_cache: true,
                ..RouterConfig::default()
            },
        );
        // Pin the shallower pool; discovery would have preferred pool 2.
        router.set_overwrite_routes(
            DenomPair::new("tokena", "tokenb"),
            vec![CandidateRoute {
                hops: vec![crate::router::candidate::CandidateHop {
                    pool_id: 1,
                    token_out_denom: "tokenb".to_string(),
                }],
                contains_generalized_cw_pool: false,
            }],
        );

        let quote = router
            .get_optimal_quote(Coin::new("tokena", 1_000u32), "tokenb", options())
            .await
            .unwrap();

        assert_eq!(quote.routes.len(), 1);
        assert_eq!(quote.routes[0].pools[0].id, 1);
    }
}
