/// DuckDB initialization SQL.
///
/// Executed once at open time via `Connection::execute_batch`. Every
/// statement uses `IF NOT EXISTS`, so re-running it on each startup is safe.
///
/// `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `LIVELOG_DUCKDB_MEMORY`, default `"1GB"`). The DuckDB default of 80%
/// of system RAM is not acceptable for a server process, so the limit is
/// always set explicitly.
///
/// Visitor IDs are stored as raw bytes (`BLOB`) and exposed as lowercase hex
/// at the API boundary. Timestamps are UTC.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- SITES
-- ===========================================
CREATE TABLE IF NOT EXISTS site (
    idsite          INTEGER PRIMARY KEY,
    name            VARCHAR NOT NULL,
    main_url        VARCHAR NOT NULL DEFAULT '',
    timezone        VARCHAR(64) NOT NULL DEFAULT 'UTC',  -- IANA timezone string
    ts_created      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- ===========================================
-- VISITS (one row per visit, updated as actions arrive)
-- ===========================================
CREATE TABLE IF NOT EXISTS log_visit (
    idvisit                 BIGINT PRIMARY KEY,
    idsite                  INTEGER NOT NULL,
    idvisitor               BLOB NOT NULL,
    visit_first_action_time TIMESTAMP NOT NULL,
    visit_last_action_time  TIMESTAMP NOT NULL,
    visit_total_actions     INTEGER NOT NULL DEFAULT 0,
    visit_total_time        INTEGER NOT NULL DEFAULT 0,   -- seconds
    visitor_returning       TINYINT NOT NULL DEFAULT 0,   -- 0 = new, 1 = returning
    visit_goal_converted    TINYINT NOT NULL DEFAULT 0,
    location_country        VARCHAR,
    config_browser_name     VARCHAR,
    config_os               VARCHAR,
    config_device_type      VARCHAR,
    referer_type            VARCHAR,
    referer_name            VARCHAR
);
CREATE INDEX IF NOT EXISTS idx_visit_site_time
    ON log_visit(idsite, visit_last_action_time);
CREATE INDEX IF NOT EXISTS idx_visit_site_visitor_time
    ON log_visit(idsite, idvisitor, visit_last_action_time);

-- ===========================================
-- ACTIONS (one row per tracked action)
-- ===========================================
CREATE TABLE IF NOT EXISTS log_link_visit_action (
    idlink_va       BIGINT PRIMARY KEY,
    idsite          INTEGER NOT NULL,
    idvisitor       BLOB NOT NULL,
    idvisit         BIGINT NOT NULL,
    server_time     TIMESTAMP NOT NULL,
    url             VARCHAR
);
CREATE INDEX IF NOT EXISTS idx_action_site_time
    ON log_link_visit_action(idsite, server_time);

-- ===========================================
-- CONVERSIONS (goal hits)
-- ===========================================
CREATE TABLE IF NOT EXISTS log_conversion (
    idconversion    BIGINT PRIMARY KEY,
    idvisit         BIGINT NOT NULL,
    idsite          INTEGER NOT NULL,
    idvisitor       BLOB NOT NULL,
    idgoal          INTEGER NOT NULL,
    server_time     TIMESTAMP NOT NULL,
    revenue         DOUBLE
);
CREATE INDEX IF NOT EXISTS idx_conversion_site_time
    ON log_conversion(idsite, server_time);
"#
    )
}
