//! HTTP surface of the sidecar.

pub mod rpc;

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(rpc::quote, rpc::custom_direct_quote, rpc::token_prices, rpc::healthcheck),
    components(schemas(
        rpc::QuoteResponse,
        rpc::QuoteRouteDto,
        rpc::ResultPoolDto,
        rpc::CoinDto,
        rpc::PriceResponse
    ))
)]
pub struct ApiDoc;
