use anyhow::Result;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use layout_engine::config::Config;
use layout_engine::reconstruction::ReconstructionEngine;
use layout_engine::routes::build_router;
use layout_engine::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; invalid layout settings abort startup
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("layout_engine={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting layout engine v{}", env!("CARGO_PKG_VERSION"));

    let engine = ReconstructionEngine::new(config.engine.clone())?;
    info!(
        workers = config.engine.worker_concurrency,
        page_timeout_ms = config.engine.page_timeout_ms,
        strict = config.engine.strict,
        "Reconstruction engine initialized"
    );

    let state = AppState::new(config.clone(), engine);

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
