use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDateTime;
use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::info;

use livelog_core::time_range::STORAGE_FORMAT;

use crate::schema::init_sql;

/// DuckDB storage for the visit logs.
///
/// DuckDB is single-writer: concurrent reads are fine, but concurrent writes
/// contend. The connection sits behind `Arc<Mutex<_>>` so the struct can be
/// cloned cheaply and shared across Axum handlers while statements run one
/// at a time.
///
/// Memory and thread limits are enforced by [`init_sql`] at open time.
#[derive(Clone)]
pub struct DuckDbBackend {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

/// A visit row to store. Times are UTC.
#[derive(Debug, Clone)]
pub struct NewVisit {
    pub idvisit: i64,
    pub idsite: i64,
    pub idvisitor: Vec<u8>,
    pub first_action_time: NaiveDateTime,
    pub last_action_time: NaiveDateTime,
    pub total_actions: i64,
    pub total_time: i64,
    pub returning: bool,
    pub goal_converted: bool,
    pub country: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<String>,
    pub referer_type: Option<String>,
    pub referer_name: Option<String>,
}

impl NewVisit {
    /// A single-action visit with every optional dimension unset.
    pub fn new(idvisit: i64, idsite: i64, idvisitor: Vec<u8>, at: NaiveDateTime) -> Self {
        Self {
            idvisit,
            idsite,
            idvisitor,
            first_action_time: at,
            last_action_time: at,
            total_actions: 1,
            total_time: 0,
            returning: false,
            goal_converted: false,
            country: None,
            browser: None,
            os: None,
            device_type: None,
            referer_type: None,
            referer_name: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAction {
    pub idlink_va: i64,
    pub idsite: i64,
    pub idvisitor: Vec<u8>,
    pub idvisit: i64,
    pub server_time: NaiveDateTime,
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewConversion {
    pub idconversion: i64,
    pub idvisit: i64,
    pub idsite: i64,
    pub idvisitor: Vec<u8>,
    pub idgoal: i64,
    pub server_time: NaiveDateTime,
    pub revenue: Option<f64>,
}

fn ts(value: &NaiveDateTime) -> String {
    value.format(STORAGE_FORMAT).to_string()
}

impl DuckDbBackend {
    /// Open (or create) a DuckDB database file at `path`.
    ///
    /// `memory_limit` is a DuckDB size string such as `"1GB"` or `"512MB"`.
    pub fn open(path: &str, memory_limit: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(&init_sql(memory_limit))?;
        info!(
            "DuckDB opened at {} with memory_limit={}, threads=2",
            path, memory_limit
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database. Data is discarded on drop.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&init_sql("1GB"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute `SELECT 1` as a lightweight liveness check for `/health`.
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }

    /// Create a site, or update the name and timezone of an existing one.
    pub async fn seed_site(&self, idsite: i64, name: &str, timezone: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO site (idsite, name, timezone, ts_created)
               VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
               ON CONFLICT (idsite) DO UPDATE SET
                   name = EXCLUDED.name,
                   timezone = EXCLUDED.timezone"#,
            duckdb::params![idsite, name, timezone],
        )?;
        Ok(())
    }

    /// Insert visits in a single transaction. No-op when `visits` is empty.
    pub async fn insert_visits(&self, visits: &[NewVisit]) -> Result<()> {
        if visits.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for visit in visits {
            tx.execute(
                r#"INSERT INTO log_visit (
                    idvisit, idsite, idvisitor,
                    visit_first_action_time, visit_last_action_time,
                    visit_total_actions, visit_total_time,
                    visitor_returning, visit_goal_converted,
                    location_country, config_browser_name, config_os, config_device_type,
                    referer_type, referer_name
                ) VALUES (
                    ?1,  ?2,  ?3,
                    ?4,  ?5,
                    ?6,  ?7,
                    ?8,  ?9,
                    ?10, ?11, ?12, ?13,
                    ?14, ?15
                )"#,
                duckdb::params![
                    visit.idvisit,
                    visit.idsite,
                    visit.idvisitor,
                    ts(&visit.first_action_time),
                    ts(&visit.last_action_time),
                    visit.total_actions,
                    visit.total_time,
                    i64::from(visit.returning),
                    i64::from(visit.goal_converted),
                    visit.country,
                    visit.browser,
                    visit.os,
                    visit.device_type,
                    visit.referer_type,
                    visit.referer_name,
                ],
            )?;
        }
        tx.commit()?;
        tracing::debug!("Inserted {} visits into DuckDB", visits.len());
        Ok(())
    }

    pub async fn insert_actions(&self, actions: &[NewAction]) -> Result<()> {
        if actions.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for action in actions {
            tx.execute(
                "INSERT INTO log_link_visit_action \
                 (idlink_va, idsite, idvisitor, idvisit, server_time, url) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                duckdb::params![
                    action.idlink_va,
                    action.idsite,
                    action.idvisitor,
                    action.idvisit,
                    ts(&action.server_time),
                    action.url,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub async fn insert_conversions(&self, conversions: &[NewConversion]) -> Result<()> {
        if conversions.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for conversion in conversions {
            tx.execute(
                "INSERT INTO log_conversion \
                 (idconversion, idvisit, idsite, idvisitor, idgoal, server_time, revenue) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                duckdb::params![
                    conversion.idconversion,
                    conversion.idvisit,
                    conversion.idsite,
                    conversion.idvisitor,
                    conversion.idgoal,
                    ts(&conversion.server_time),
                    conversion.revenue,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
