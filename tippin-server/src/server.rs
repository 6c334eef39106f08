use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::routes::home::{get_home, post_home};
use crate::tippin::Tippin;

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();
}

pub async fn run_server(tippin: Tippin) -> anyhow::Result<()> {
    if let Some(ref buildtime) = tippin.build_params.build_time {
        info!("build time: {}", buildtime);
    }
    if let Some(ref commithash) = tippin.build_params.commit_hash {
        info!("git commit-hash: {}", commithash);
    }
    info!("listening on: {}", &tippin.config.server.host_port);
    info!("serving static files from: {:?}", tippin.config.server.static_dir);
    info!("node-binding: {}", tippin.handler.node());
    info!(
        "invoice cooldown: {}s, max amount: {}, node timeout: {}s",
        tippin.config.invoice.cooldown_secs,
        tippin.config.invoice.max_amount,
        tippin.config.invoice.timeout_secs
    );
    match tippin.config.page.node_addr {
        Some(ref node_addr) => info!("node-addr: {}", node_addr),
        None => info!("node-addr is not configured"),
    }

    let listener = tokio::net::TcpListener::bind(&tippin.config.server.host_port).await?;

    axum::serve(
        listener,
        app(tippin).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("unable to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

pub fn app(tippin: Tippin) -> Router {
    let static_dir = tippin.config.server.static_dir.clone();

    Router::new()
        .route("/", get(get_home).post(post_home))
        .route("/health", get(get_health))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(tippin)
        .layer(TraceLayer::new_for_http())
}

async fn get_health() -> impl IntoResponse {
    StatusCode::OK
}
