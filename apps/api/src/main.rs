mod config;
mod db;
mod errors;
mod matching;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::db::create_pool;
use crate::matching::manager::MatchManager;
use crate::matching::scoring::WeightedMatchScorer;
use crate::matching::store::PgMatchStore;
use crate::matching::triggers::{MatchTriggers, TokioExecutor};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing or malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting matchmaker v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.database_max_connections).await?;
    let store = Arc::new(PgMatchStore::new(db));

    // Initialize scorer (WeightedMatchScorer with weights from config)
    let scorer = Arc::new(WeightedMatchScorer::new(config.match_weights));
    info!("Match weights: {:?}", scorer.weights());

    let manager = MatchManager::new(store.clone(), scorer);
    let triggers = MatchTriggers::new(manager, Arc::new(TokioExecutor), config.match_min_score);
    info!(
        "Match threshold {} (full list limit {})",
        config.match_min_score, config.match_list_limit
    );

    // Build app state
    let state = AppState {
        store,
        triggers,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
