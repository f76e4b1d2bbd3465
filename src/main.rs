use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use query_latency_bench::config::ServerConfig;
use query_latency_bench::store::{RedisStore, Store};
use query_latency_bench::timing::LineSink;
use query_latency_bench::{server, telemetry, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init();

    let config = ServerConfig::from_env()?;

    // ── 1. Connect to Redis ──────────────────────────────────────
    let namespace = config.store.database_name();
    info!(url = %config.store.redis_url, %namespace, "connecting to store");
    let store = RedisStore::connect(&config.store.redis_url, namespace).await?;

    // ── 2. Warm the connection ───────────────────────────────────
    if let Err(e) = store.ping().await {
        warn!(error = %e, "warm-up query failed");
    }

    // ── 3. Build shared state ────────────────────────────────────
    let state = Arc::new(AppState {
        store: Arc::new(store),
        query_cases: config.query_cases,
        time_zone: config.time_zone,
        timing: LineSink::stdout(),
        log_row_scanned: config.log_row_scanned,
    });
    info!(cases = state.query_cases.len(), "query table loaded");

    // ── 4. Build Axum router ─────────────────────────────────────
    let app = server::create_router(state);

    // ── 5. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "listening; GET /startTest");

    axum::serve(listener, app)
        .await
        .context("server exited with error")?;
    Ok(())
}
