use std::sync::Arc;

use actix_web::{dev::ServerHandle, web, App, HttpResponse, HttpServer};
use anyhow::Context;
use clap::Parser;
use futures::future::select_all;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sidequote_router::{
    cli::Cli,
    config::AppConfig,
    ingest::IngestUsecase,
    pricing::{chain::ChainPricing, worker::PriceRefresher, PricingSource},
    registry::{PoolRegistry, TakerFeeTable},
    router::{
        usecase::{Router, RouterUsecase},
        RouterOptions,
    },
    services::rpc::{self, AppState},
    tokens::TokenRegistry,
};
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading configuration from {path}"))?,
        None => AppConfig::default(),
    };

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("installing the prometheus recorder")?;

    let registry = Arc::new(PoolRegistry::new());
    let taker_fees = Arc::new(TakerFeeTable::new());
    let tokens = Arc::new(TokenRegistry::new());
    // The default quote denom must resolve before the pricing engine can
    // be constructed; ingest pushes replace this seed list later.
    tokens.set_tokens(config.tokens.clone());

    let router = Arc::new(Router::new(
        Arc::clone(&registry),
        Arc::clone(&taker_fees),
        Arc::clone(&tokens),
        &config.router,
        config.request_timeout(),
    ));
    let pricing = Arc::new(
        ChainPricing::new(
            Arc::clone(&router) as Arc<dyn RouterUsecase>,
            Arc::clone(&tokens),
            &config.pricing,
        )
        .context("constructing the pricing engine")?,
    );
    let default_quote_denom = pricing.default_quote_denom().to_string();

    let (block_tx, block_rx) = mpsc::channel(cli.block_update_queue);
    // Held for the lifetime of the process: the ingest collaborator is
    // handed this surface when it attaches in-process, and dropping it
    // would close the refresher's channel.
    let _ingest = IngestUsecase::new(
        Arc::clone(&registry),
        Arc::clone(&taker_fees),
        Arc::clone(&tokens),
        block_tx,
    );
    let refresher = PriceRefresher::new(
        Arc::clone(&pricing) as Arc<dyn PricingSource>,
        default_quote_denom.clone(),
        config.request_timeout(),
        block_rx,
    )
    .spawn();

    let state = web::Data::new(AppState {
        router,
        pricing,
        router_options: RouterOptions::from(&config.router),
        default_quote_denom,
    });

    let bind = (cli.server_ip.clone(), cli.server_port);
    info!(ip = %cli.server_ip, port = cli.server_port, "starting http server");
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::Data::new(prometheus.clone()))
            .configure(rpc::configure)
            .service(web::resource("/metrics").route(web::get().to(metrics)))
    })
    // Signals are handled by the shutdown task so cleanup runs before the
    // server stops.
    .disable_signals()
    .bind(bind)?
    .run();
    let server_handle = server.handle();

    let server_task: JoinHandle<anyhow::Result<()>> =
        tokio::spawn(async move { server.await.map_err(anyhow::Error::from) });
    let shutdown_task = tokio::spawn(shutdown_handler(server_handle, refresher));

    let (result, _, _) = select_all(vec![server_task, shutdown_task]).await;
    result??;
    Ok(())
}

async fn shutdown_handler(
    server_handle: ServerHandle,
    refresher: JoinHandle<()>,
) -> anyhow::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut sigterm = signal(SignalKind::terminate()).context("installing the SIGTERM handler")?;

    tokio::select! {
        _ = ctrl_c => {
            info!("SIGINT (Ctrl+C) received. Cleaning up...");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM received. Cleaning up...");
        },
    }

    refresher.abort();
    server_handle.stop(true).await;
    Ok(())
}

async fn metrics(handle: web::Data<PrometheusHandle>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(handle.render())
}
