use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use livelog_server::state::AppState;

/// Site created on first start so the live endpoints answer out of the box.
const DEFAULT_SITE_ID: i64 = 1;

/// `livelog health` - liveness probe for Docker HEALTHCHECK.
///
/// Calls `GET http://localhost:$LIVELOG_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("LIVELOG_PORT").unwrap_or_else(|_| "3000".to_string());
    let url = format!("http://localhost:{}/health", port);
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }
    // Structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("livelog=info".parse()?),
        )
        .json()
        .init();

    let cfg = livelog_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    std::fs::create_dir_all(&cfg.data_dir)?;
    let db = livelog_duckdb::DuckDbBackend::open(&cfg.db_path(), &cfg.duckdb_memory_limit)?;

    if let Err(e) = db
        .seed_site(DEFAULT_SITE_ID, "Default site", &cfg.default_timezone)
        .await
    {
        tracing::warn!(error = %e, "Failed to seed default site");
    } else {
        info!(
            site_id = DEFAULT_SITE_ID,
            timezone = %cfg.default_timezone,
            "Default site ready"
        );
    }

    let state = Arc::new(AppState::new(db, cfg.clone()));

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = livelog_server::app::build_app(state);

    info!(port = cfg.port, "Livelog listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
