use anyhow::Result;
use async_trait::async_trait;
use chrono_tz::Tz;
use duckdb::OptionalExt;
use tracing::warn;

use livelog_core::backend::{Site, SiteResolver};

use crate::DuckDbBackend;

#[async_trait]
impl SiteResolver for DuckDbBackend {
    /// Look the site up in the `site` table.
    ///
    /// A stored timezone that is not a valid IANA name is logged and treated
    /// as UTC so one bad row does not take the live view down.
    async fn resolve(&self, site_id: i64) -> Result<Option<Site>> {
        let conn = self.conn.lock().await;
        let timezone: Option<String> = conn
            .prepare("SELECT timezone FROM site WHERE idsite = ?1")?
            .query_row(duckdb::params![site_id], |row| row.get(0))
            .optional()?;

        Ok(timezone.map(|name| {
            let timezone = name.parse::<Tz>().unwrap_or_else(|_| {
                warn!(site_id, timezone = %name, "Unknown site timezone, using UTC");
                Tz::UTC
            });
            Site {
                id: site_id,
                timezone,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_stored_timezone() {
        let db = DuckDbBackend::open_in_memory().expect("db");
        db.seed_site(3, "Shop", "Europe/Paris").await.expect("seed");

        let site = db.resolve(3).await.expect("resolve").expect("site");
        assert_eq!(site.id, 3);
        assert_eq!(site.timezone, chrono_tz::Europe::Paris);
    }

    #[tokio::test]
    async fn unknown_site_is_none() {
        let db = DuckDbBackend::open_in_memory().expect("db");
        assert!(db.resolve(42).await.expect("resolve").is_none());
    }

    #[tokio::test]
    async fn bad_timezone_falls_back_to_utc() {
        let db = DuckDbBackend::open_in_memory().expect("db");
        db.seed_site(1, "Blog", "Mars/Olympus_Mons")
            .await
            .expect("seed");

        let site = db.resolve(1).await.expect("resolve").expect("site");
        assert_eq!(site.timezone, Tz::UTC);
    }
}
