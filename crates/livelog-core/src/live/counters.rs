use chrono::Duration;
use serde::Serialize;
use tracing::debug;

use crate::error::LiveError;
use crate::segment::{CompiledQuery, LogTable, Segment, SelectQuery};
use crate::time_range::STORAGE_FORMAT;
use crate::value::SqlValue;

use super::LiveModel;

/// Trailing-window activity for a site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub visits: i64,
    pub actions: i64,
    pub visitors: i64,
    pub visits_converted: i64,
}

impl LiveModel {
    /// Count visits, visitors, actions and conversions of the last
    /// `last_minutes` minutes.
    ///
    /// `None` or `0` returns zeroes without touching the database. The three
    /// table queries are independent and run concurrently.
    pub async fn query_counters(
        &self,
        site_id: i64,
        last_minutes: Option<u32>,
        segment: &str,
    ) -> Result<Counters, LiveError> {
        let last_minutes = last_minutes.unwrap_or(0);
        if last_minutes == 0 {
            return Ok(Counters::default());
        }

        let cutoff = (self.now() - Duration::minutes(i64::from(last_minutes)))
            .format(STORAGE_FORMAT)
            .to_string();
        let segment = Segment::new(segment, site_id);

        let visits = self.counter_query(
            &segment,
            LogTable::Visit,
            "COUNT(DISTINCT log_visit.idvisit) AS visits, \
             COUNT(DISTINCT log_visit.idvisitor) AS visitors",
            "visit_last_action_time",
            &cutoff,
        )?;
        let actions = self.counter_query(
            &segment,
            LogTable::Action,
            "COUNT(DISTINCT log_link_visit_action.idlink_va)",
            "server_time",
            &cutoff,
        )?;
        let conversions = self.counter_query(
            &segment,
            LogTable::Conversion,
            "COUNT(DISTINCT log_conversion.idconversion)",
            "server_time",
            &cutoff,
        )?;

        let (visit_rows, action_count, conversion_count) = tokio::try_join!(
            self.executor.fetch_all(&visits.sql, &visits.bind),
            self.executor.fetch_one(&actions.sql, &actions.bind),
            self.executor.fetch_one(&conversions.sql, &conversions.bind),
        )
        .map_err(LiveError::Database)?;

        let visit_row = visit_rows.first();
        let counters = Counters {
            visits: visit_row.map_or(0, |row| row.get_i64("visits")),
            visitors: visit_row.map_or(0, |row| row.get_i64("visitors")),
            actions: scalar_count(action_count),
            visits_converted: scalar_count(conversion_count),
        };
        debug!(site_id, last_minutes, ?counters, "Computed live counters");
        Ok(counters)
    }

    fn counter_query(
        &self,
        segment: &Segment,
        table: LogTable,
        select: &str,
        time_column: &str,
        cutoff: &str,
    ) -> Result<CompiledQuery, LiveError> {
        let table_name = table.name();
        let (site_clause, mut bind) = self.site_scope.where_clause(segment.site_id, table_name)?;
        bind.push(SqlValue::Text(cutoff.to_string()));
        let query = SelectQuery::new(select, table).filter(
            format!("{site_clause} AND {table_name}.{time_column} >= ?"),
            bind,
        );
        Ok(self.segments.compile(segment, query)?)
    }
}

fn scalar_count(value: Option<SqlValue>) -> i64 {
    value.and_then(|v| v.as_i64()).unwrap_or(0).max(0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::live::test_support::{model, RecordingExecutor};
    use crate::segment::SegmentError;
    use crate::value::Row;

    use super::*;

    #[tokio::test]
    async fn zero_or_missing_minutes_issue_no_query() {
        let executor = Arc::new(RecordingExecutor::default());
        let live = model(executor.clone(), "UTC", "2024-03-20 09:30:00");

        for minutes in [None, Some(0)] {
            let counters = live
                .query_counters(1, minutes, "countryCode==fr")
                .await
                .expect("counters");
            assert_eq!(counters, Counters::default());
        }
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn three_site_scoped_queries_share_the_cutoff() {
        let mut row = Row::new();
        row.push("visits", SqlValue::Int(4));
        row.push("visitors", SqlValue::Int(3));
        let executor = Arc::new(RecordingExecutor {
            rows: vec![row],
            scalar: Some(SqlValue::Int(9)),
            ..Default::default()
        });
        let live = model(executor.clone(), "UTC", "2024-03-20 09:30:00");

        let counters = live.query_counters(1, Some(30), "").await.expect("counters");
        assert_eq!(
            counters,
            Counters {
                visits: 4,
                actions: 9,
                visitors: 3,
                visits_converted: 9,
            }
        );

        let calls = executor.calls();
        assert_eq!(calls.len(), 3);
        for (table, column) in [
            ("log_visit", "visit_last_action_time"),
            ("log_link_visit_action", "server_time"),
            ("log_conversion", "server_time"),
        ] {
            let (sql, bind) = calls
                .iter()
                .find(|(sql, _)| sql.contains(&format!("FROM {table} WHERE")))
                .expect("query for table");
            assert!(sql.contains(&format!("{table}.idsite IN (?) AND {table}.{column} >= ?")));
            assert_eq!(
                bind,
                &vec![
                    SqlValue::Int(1),
                    SqlValue::Text("2024-03-20 09:00:00".to_string()),
                ]
            );
        }
    }

    #[tokio::test]
    async fn segment_applies_to_every_table() {
        let executor = Arc::new(RecordingExecutor::default());
        let live = model(executor.clone(), "UTC", "2024-03-20 09:30:00");

        live.query_counters(1, Some(5), "browserCode==FF")
            .await
            .expect("counters");

        let calls = executor.calls();
        assert_eq!(calls.len(), 3);
        for (sql, bind) in &calls {
            assert!(sql.contains("log_visit.config_browser_name = ?"), "{sql}");
            assert_eq!(bind.last(), Some(&SqlValue::Text("FF".to_string())));
        }
    }

    #[tokio::test]
    async fn segment_errors_come_back_unchanged() {
        let executor = Arc::new(RecordingExecutor::default());
        let live = model(executor.clone(), "UTC", "2024-03-20 09:30:00");

        let err = live
            .query_counters(1, Some(5), "planet==mars")
            .await
            .expect_err("bad segment");
        assert!(matches!(
            err,
            LiveError::Segment(SegmentError::UnknownDimension(ref d)) if d == "planet"
        ));
        assert!(executor.calls().is_empty());
    }
}
