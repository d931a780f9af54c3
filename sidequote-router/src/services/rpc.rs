//! Request handlers, wire DTOs and the error to status mapping.

use std::sync::Arc;

use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use sidequote_common::{models::CoinParseError, Coin, PoolId};
use thiserror::Error;
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::{
    pricing::{PricingError, PricingOptions, PricingSource},
    router::{
        quote::{Quote, QuoteRoute},
        route::ResultPool,
        usecase::RouterUsecase,
        RouterError, RouterOptions,
    },
};

/// Shared handler state.
pub struct AppState {
    pub router: Arc<dyn RouterUsecase>,
    pub pricing: Arc<dyn PricingSource>,
    pub router_options: RouterOptions,
    pub default_quote_denom: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/router/quote").route(web::get().to(quote)))
        .service(
            web::resource("/router/custom-direct-quote")
                .route(web::get().to(custom_direct_quote)),
        )
        .service(web::resource("/tokens/prices").route(web::get().to(token_prices)))
        .service(web::resource("/healthcheck").route(web::get().to(healthcheck)))
        .service(web::resource("/docs/openapi.json").route(web::get().to(openapi)));
}

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

impl From<CoinParseError> for RpcError {
    fn from(err: CoinParseError) -> Self {
        RpcError::InvalidRequest(err.to_string())
    }
}

impl ResponseError for RpcError {
    fn status_code(&self) -> StatusCode {
        match self {
            RpcError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::Router(err) => router_status(err),
            RpcError::Pricing(err) => pricing_status(err),
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "message": self.to_string() }))
    }
}

fn router_status(err: &RouterError) -> StatusCode {
    match err {
        RouterError::InvalidInput(_) | RouterError::Token(_) => StatusCode::BAD_REQUEST,
        RouterError::NoRoutes { .. } | RouterError::PoolNotFound(_) => StatusCode::NOT_FOUND,
        RouterError::Timeout => StatusCode::REQUEST_TIMEOUT,
        RouterError::Simulation(_) | RouterError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn pricing_status(err: &PricingError) -> StatusCode {
    match err {
        PricingError::NoRouteFound { .. } => StatusCode::NOT_FOUND,
        PricingError::Token(_) => StatusCode::BAD_REQUEST,
        PricingError::ZeroQuoteAmountOut { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        PricingError::Router(err) => router_status(err),
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct QuoteParams {
    /// Input coin in `{amount}{denom}` form, e.g. `1000000uosmo`.
    #[serde(rename = "tokenIn")]
    token_in: String,
    #[serde(rename = "tokenOutDenom")]
    token_out_denom: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CustomQuoteParams {
    #[serde(rename = "tokenIn")]
    token_in: String,
    #[serde(rename = "tokenOutDenom")]
    token_out_denom: String,
    /// A pool id, or a pipe-separated sequence of pool ids.
    #[serde(rename = "poolID")]
    pool_id: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PriceParams {
    base: String,
    /// Defaults to the configured default quote denom.
    quote: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CoinDto {
    pub denom: String,
    pub amount: String,
}

impl From<&Coin> for CoinDto {
    fn from(coin: &Coin) -> Self {
        Self { denom: coin.denom.clone(), amount: coin.amount.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResultPoolDto {
    pub id: PoolId,
    #[serde(rename = "type")]
    pub pool_type: String,
    #[schema(value_type = String)]
    pub taker_fee: rust_decimal::Decimal,
    pub token_in_denom: String,
    pub token_out_denom: String,
}

impl From<&ResultPool> for ResultPoolDto {
    fn from(pool: &ResultPool) -> Self {
        Self {
            id: pool.id,
            pool_type: pool.pool_type.to_string(),
            taker_fee: pool.taker_fee,
            token_in_denom: pool.token_in_denom.clone(),
            token_out_denom: pool.token_out_denom.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuoteRouteDto {
    pub pools: Vec<ResultPoolDto>,
    pub in_amount: String,
    pub out_amount: String,
}

impl From<&QuoteRoute> for QuoteRouteDto {
    fn from(route: &QuoteRoute) -> Self {
        Self {
            pools: route.pools.iter().map(ResultPoolDto::from).collect(),
            in_amount: route.in_amount.to_string(),
            out_amount: route.out_amount.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuoteResponse {
    pub amount_in: CoinDto,
    pub amount_out: String,
    pub route: Vec<QuoteRouteDto>,
    #[schema(value_type = String)]
    pub effective_spread_factor: rust_decimal::Decimal,
    #[schema(value_type = String)]
    pub price_impact: rust_decimal::Decimal,
}

impl From<Quote> for QuoteResponse {
    fn from(quote: Quote) -> Self {
        Self {
            amount_in: CoinDto::from(&quote.amount_in),
            amount_out: quote.amount_out.to_string(),
            route: quote.routes.iter().map(QuoteRouteDto::from).collect(),
            effective_spread_factor: quote.effective_spread_factor,
            price_impact: quote.price_impact,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PriceResponse {
    pub base: String,
    pub quote: String,
    #[schema(value_type = String)]
    pub price: rust_decimal::Decimal,
}

/// The optimal quote for swapping `tokenIn` into `tokenOutDenom`.
#[utoipa::path(
    get,
    path = "/router/quote",
    params(QuoteParams),
    responses(
        (status = 200, description = "Optimal quote", body = QuoteResponse),
        (status = 404, description = "No route between the denoms"),
    )
)]
pub async fn quote(
    state: web::Data<AppState>,
    params: web::Query<QuoteParams>,
) -> Result<HttpResponse, RpcError> {
    let token_in: Coin = params.token_in.parse()?;
    let quote = state
        .router
        .get_optimal_quote(token_in, &params.token_out_denom, state.router_options.clone())
        .await?;
    Ok(HttpResponse::Ok().json(QuoteResponse::from(quote)))
}

/// A quote forced through an explicit pool sequence.
#[utoipa::path(
    get,
    path = "/router/custom-direct-quote",
    params(CustomQuoteParams),
    responses(
        (status = 200, description = "Quote over the given pools", body = QuoteResponse),
        (status = 400, description = "Incompatible pool sequence"),
    )
)]
pub async fn custom_direct_quote(
    state: web::Data<AppState>,
    params: web::Query<CustomQuoteParams>,
) -> Result<HttpResponse, RpcError> {
    let token_in: Coin = params.token_in.parse()?;
    let pool_ids = parse_pool_ids(&params.pool_id)?;
    let quote = state
        .router
        .get_custom_direct_quote(token_in, &pool_ids, &params.token_out_denom)
        .await?;
    Ok(HttpResponse::Ok().json(QuoteResponse::from(quote)))
}

/// The price of the base denom expressed in the quote denom.
#[utoipa::path(
    get,
    path = "/tokens/prices",
    params(PriceParams),
    responses(
        (status = 200, description = "Unit price", body = PriceResponse),
        (status = 404, description = "No route to price through"),
    )
)]
pub async fn token_prices(
    state: web::Data<AppState>,
    params: web::Query<PriceParams>,
) -> Result<HttpResponse, RpcError> {
    let quote_denom = params
        .quote
        .clone()
        .unwrap_or_else(|| state.default_quote_denom.clone());
    let price = state
        .pricing
        .get_price(&params.base, &quote_denom, PricingOptions::default())
        .await?;
    Ok(HttpResponse::Ok().json(PriceResponse {
        base: params.base.clone(),
        quote: quote_denom,
        price,
    }))
}

#[utoipa::path(
    get,
    path = "/healthcheck",
    responses((status = 200, description = "Service is up"))
)]
pub async fn healthcheck() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub async fn openapi() -> HttpResponse {
    HttpResponse::Ok().json(super::ApiDoc::openapi())
}

fn parse_pool_ids(raw: &str) -> Result<Vec<PoolId>, RpcError> {
    raw.split('|')
        .map(|part| {
            part.trim()
                .parse::<PoolId>()
                .map_err(|_| RpcError::InvalidRequest(format!("invalid pool id: {part:?}")))
        })
        .collect()
}
