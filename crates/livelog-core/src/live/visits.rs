use chrono::DateTime;
use tracing::debug;

use crate::error::LiveError;
use crate::segment::{CompiledQuery, LogTable, Segment, SelectQuery};
use crate::time_range::{resolve_time_range, STORAGE_FORMAT};
use crate::value::{Row, SqlValue};
use crate::visitor::decode_visitor_id;

use super::{LiveModel, VisitsQuery};

/// Window used when the caller narrows nothing: everything since yesterday's
/// local midnight.
const DEFAULT_PERIOD: &str = "day";
const DEFAULT_DATE: &str = "yesterdaySameTime";

impl LiveModel {
    /// Fetch the visit rows for `query`, newest first unless `asc` was asked.
    pub async fn query_log_visits(&self, query: &VisitsQuery) -> Result<Vec<Row>, LiveError> {
        let compiled = self.make_log_visits_query(query).await?;
        let rows = self
            .executor
            .fetch_all(&compiled.sql, &compiled.bind)
            .await
            .map_err(LiveError::Database)?;
        debug!(
            site_id = query.site_id,
            rows = rows.len(),
            "Fetched live visits"
        );
        Ok(rows)
    }

    /// Build the visit listing SQL without running it.
    ///
    /// The inner query sorts by `(idsite, visit_last_action_time)` so the
    /// site/time index drives the LIMIT. A segment that joins a one-to-many
    /// table repeats visits, so the outer query keeps one row per `idvisit`
    /// and sorts again.
    pub async fn make_log_visits_query(
        &self,
        query: &VisitsQuery,
    ) -> Result<CompiledQuery, LiveError> {
        let (site_clause, mut bind) = self
            .site_scope
            .where_clause(query.site_id, LogTable::Visit.name())?;
        let mut conditions = vec![site_clause];

        let visitor_id = query
            .visitor_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(raw) = visitor_id {
            match decode_visitor_id(raw) {
                Some(bytes) => {
                    conditions.push("log_visit.idvisitor = ?".to_string());
                    bind.push(SqlValue::Blob(bytes));
                }
                None => debug!(visitor_id = raw, "Ignoring visitor filter, id is not hex"),
            }
        }

        if let Some(ts) = query.min_timestamp.filter(|ts| *ts != 0) {
            let min = DateTime::from_timestamp(ts, 0)
                .ok_or_else(|| LiveError::InvalidTimestamp(ts.to_string()))?;
            conditions.push("log_visit.visit_last_action_time > ?".to_string());
            bind.push(SqlValue::Text(min.format(STORAGE_FORMAT).to_string()));
        }

        let period = non_empty(query.period.as_deref());
        let date = non_empty(query.date.as_deref());
        let (period, date) = if visitor_id.is_none()
            && query.fetch_limit == 0
            && (period.is_none() || date.is_none())
        {
            (Some(DEFAULT_PERIOD), Some(DEFAULT_DATE))
        } else {
            (period, date)
        };

        if let (Some(period), Some(date)) = (period, date) {
            let site = self.site(query.site_id).await?;
            let range = resolve_time_range(period, date, site.timezone, self.now())?;
            conditions.push("log_visit.visit_last_action_time >= ?".to_string());
            bind.push(SqlValue::Text(range.start_string()));
            if let Some(end) = range.end_string() {
                conditions.push("log_visit.visit_last_action_time <= ?".to_string());
                bind.push(SqlValue::Text(end));
            }
        }

        let order = query.sort_order.as_sql();
        let limit = u64::try_from(query.fetch_limit).unwrap_or(0);
        let inner = SelectQuery::new("log_visit.*", LogTable::Visit)
            .filter(conditions.join(" AND "), bind)
            .order_by(format!(
                "log_visit.idsite, log_visit.visit_last_action_time {order}"
            ))
            .limit(limit);

        let segment = Segment::new(query.segment.clone(), query.site_id);
        let compiled = self.segments.compile(&segment, inner)?;

        Ok(CompiledQuery {
            sql: format!(
                "SELECT sub.* FROM ({}) AS sub \
                 QUALIFY ROW_NUMBER() OVER (PARTITION BY sub.idvisit) = 1 \
                 ORDER BY sub.visit_last_action_time {order}",
                compiled.sql
            ),
            bind: compiled.bind,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::live::test_support::{model, RecordingExecutor};
    use crate::live::SortOrder;
    use crate::site_scope::SiteScope;

    use super::*;

    fn texts(bind: &[SqlValue]) -> Vec<String> {
        bind.iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn defaults_to_trailing_day_when_nothing_narrows() {
        let executor = Arc::new(RecordingExecutor::default());
        let live = model(executor, "UTC", "2024-03-20 09:30:00");

        let compiled = live
            .make_log_visits_query(&VisitsQuery {
                site_id: 1,
                ..Default::default()
            })
            .await
            .expect("query");

        assert!(compiled
            .sql
            .contains("log_visit.idsite IN (?) AND log_visit.visit_last_action_time >= ?"));
        assert!(!compiled.sql.contains("visit_last_action_time <= ?"));
        assert_eq!(compiled.bind[0], SqlValue::Int(1));
        assert_eq!(texts(&compiled.bind), vec!["2024-03-19 00:00:00"]);
        assert!(!compiled.sql.contains("LIMIT"));
    }

    #[tokio::test]
    async fn fetch_limit_disables_the_default_window() {
        let executor = Arc::new(RecordingExecutor::default());
        let live = model(executor, "UTC", "2024-03-20 09:30:00");

        let compiled = live
            .make_log_visits_query(&VisitsQuery {
                site_id: 1,
                fetch_limit: 10,
                ..Default::default()
            })
            .await
            .expect("query");

        assert!(!compiled.sql.contains("visit_last_action_time >="));
        assert!(compiled.sql.contains("LIMIT 10"));
        assert_eq!(compiled.bind, vec![SqlValue::Int(1)]);
    }

    #[tokio::test]
    async fn full_filter_chain_keeps_binds_aligned() {
        let executor = Arc::new(RecordingExecutor::default());
        let live = model(executor, "Europe/Paris", "2026-10-19 12:00:00");

        let compiled = live
            .make_log_visits_query(&VisitsQuery {
                site_id: 1,
                period: Some("week".to_string()),
                date: Some("2024-01-10".to_string()),
                segment: "countryCode==fr".to_string(),
                fetch_limit: 25,
                visitor_id: Some("0123456789ABCDEF".to_string()),
                min_timestamp: Some(1_704_931_200),
                sort_order: SortOrder::Asc,
            })
            .await
            .expect("query");

        assert_eq!(compiled.placeholder_count(), compiled.bind.len());
        assert_eq!(
            compiled.bind,
            vec![
                SqlValue::Int(1),
                SqlValue::Blob(vec![0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]),
                SqlValue::Text("2024-01-11 00:00:00".to_string()),
                SqlValue::Text("2024-01-07 23:00:00".to_string()),
                SqlValue::Text("2024-01-14 23:00:00".to_string()),
                SqlValue::Text("fr".to_string()),
            ]
        );
        assert!(compiled.sql.contains(
            "ORDER BY log_visit.idsite, log_visit.visit_last_action_time ASC LIMIT 25"
        ));
        assert!(compiled
            .sql
            .ends_with("ORDER BY sub.visit_last_action_time ASC"));
        assert!(compiled
            .sql
            .contains("QUALIFY ROW_NUMBER() OVER (PARTITION BY sub.idvisit) = 1"));
    }

    #[tokio::test]
    async fn undecodable_visitor_id_is_ignored() {
        let executor = Arc::new(RecordingExecutor::default());
        let live = model(executor, "UTC", "2024-03-20 09:30:00");

        let compiled = live
            .make_log_visits_query(&VisitsQuery {
                site_id: 1,
                visitor_id: Some("not-hex".to_string()),
                ..Default::default()
            })
            .await
            .expect("query");

        assert!(!compiled.sql.contains("idvisitor"));
        // A visitor was named, so no default window either.
        assert_eq!(compiled.bind, vec![SqlValue::Int(1)]);
    }

    #[tokio::test]
    async fn unknown_sort_order_falls_back_to_desc() {
        let executor = Arc::new(RecordingExecutor::default());
        let live = model(executor, "UTC", "2024-03-20 09:30:00");

        let compiled = live
            .make_log_visits_query(&VisitsQuery {
                site_id: 1,
                fetch_limit: 5,
                sort_order: SortOrder::parse(Some("sideways")),
                ..Default::default()
            })
            .await
            .expect("query");
        assert!(compiled
            .sql
            .ends_with("ORDER BY sub.visit_last_action_time DESC"));
    }

    #[tokio::test]
    async fn site_scope_hooks_widen_the_site_clause() {
        let executor = Arc::new(RecordingExecutor::default());
        let mut scope = SiteScope::new();
        scope.register(|mut ids| {
            ids.push(2);
            ids
        });
        let live = model(executor, "UTC", "2024-03-20 09:30:00").with_site_scope(scope);

        let compiled = live
            .make_log_visits_query(&VisitsQuery {
                site_id: 1,
                fetch_limit: 5,
                ..Default::default()
            })
            .await
            .expect("query");
        assert!(compiled.sql.contains("log_visit.idsite IN (?, ?)"));
        assert_eq!(compiled.bind, vec![SqlValue::Int(1), SqlValue::Int(2)]);
    }

    #[tokio::test]
    async fn bad_period_is_a_validation_error() {
        let executor = Arc::new(RecordingExecutor::default());
        let live = model(executor.clone(), "UTC", "2024-03-20 09:30:00");

        let err = live
            .query_log_visits(&VisitsQuery {
                site_id: 1,
                period: Some("fortnight".to_string()),
                date: Some("today".to_string()),
                ..Default::default()
            })
            .await
            .expect_err("invalid period");
        assert!(matches!(err, LiveError::InvalidPeriod(ref p) if p == "fortnight"));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_site_is_reported() {
        let executor = Arc::new(RecordingExecutor::default());
        let live = model(executor, "UTC", "2024-03-20 09:30:00");

        let err = live
            .make_log_visits_query(&VisitsQuery {
                site_id: 404,
                ..Default::default()
            })
            .await
            .expect_err("missing site");
        assert!(matches!(err, LiveError::SiteNotFound(404)));
    }

    #[tokio::test]
    async fn database_failures_surface_as_errors() {
        let executor = Arc::new(RecordingExecutor {
            fail: true,
            ..Default::default()
        });
        let live = model(executor, "UTC", "2024-03-20 09:30:00");

        let err = live
            .query_log_visits(&VisitsQuery {
                site_id: 1,
                fetch_limit: 3,
                ..Default::default()
            })
            .await
            .expect_err("db failure");
        assert!(matches!(err, LiveError::Database(_)));
        assert!(!err.is_validation());
    }
}
