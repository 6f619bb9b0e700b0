//! Collaborator interfaces consumed by the live query layer.

use async_trait::async_trait;
use chrono_tz::Tz;

use crate::value::{Row, SqlValue};

/// Read-only SQL execution with positional `?` binding.
///
/// Implementations must bind every element of `bind` in order and never
/// interpolate it into the SQL text.
#[async_trait]
pub trait QueryExecutor: Send + Sync + 'static {
    async fn fetch_all(&self, sql: &str, bind: &[SqlValue]) -> anyhow::Result<Vec<Row>>;

    /// First column of the first row, `None` when the query returns no rows.
    async fn fetch_one(&self, sql: &str, bind: &[SqlValue]) -> anyhow::Result<Option<SqlValue>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub id: i64,
    pub timezone: Tz,
}

/// Site lookup. Returns `Ok(None)` when no site has the given ID.
#[async_trait]
pub trait SiteResolver: Send + Sync + 'static {
    async fn resolve(&self, site_id: i64) -> anyhow::Result<Option<Site>>;
}
