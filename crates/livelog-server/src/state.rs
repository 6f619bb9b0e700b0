use std::sync::Arc;

use livelog_core::config::Config;
use livelog_core::segment::SqlSegmentCompiler;
use livelog_core::LiveModel;
use livelog_duckdb::DuckDbBackend;

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
pub struct AppState {
    /// The DuckDB backend. Internally uses `Arc<tokio::sync::Mutex<Connection>>`
    /// so it is already cheap to clone and async-safe.
    pub db: Arc<DuckDbBackend>,

    /// Live query builder wired to `db` for both query execution and site
    /// lookup.
    pub live: LiveModel,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        let db = Arc::new(db);
        let live = LiveModel::new(db.clone(), Arc::new(SqlSegmentCompiler::new()), db.clone());
        Self::with_live(db, live, config)
    }

    /// Use a pre-built [`LiveModel`], e.g. one with a fixed clock or site
    /// scope hooks.
    pub fn with_live(db: Arc<DuckDbBackend>, live: LiveModel, config: Config) -> Self {
        Self {
            db,
            live,
            config: Arc::new(config),
        }
    }
}
