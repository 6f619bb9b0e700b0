use chrono::{Duration, NaiveDateTime};
use tracing::debug;

use crate::error::LiveError;
use crate::segment::{CompiledQuery, LogTable, Segment, SelectQuery};
use crate::time_range::STORAGE_FORMAT;
use crate::value::SqlValue;
use crate::visitor::{decode_visitor_id, encode_visitor_id};

use super::{AdjacentQuery, Direction, LiveModel};

impl LiveModel {
    /// Hex ID of the visitor whose latest action sits next to
    /// `visit_last_action_time`, or `None`.
    ///
    /// `Next` walks back in time (newest-first listing order), `Prev` walks
    /// forward. Only visitors active within a day either side are considered.
    pub async fn query_adjacent_visitor_id(
        &self,
        query: &AdjacentQuery,
    ) -> Result<Option<String>, LiveError> {
        let compiled = self.make_adjacent_visitor_query(query)?;
        let value = self
            .executor
            .fetch_one(&compiled.sql, &compiled.bind)
            .await
            .map_err(LiveError::Database)?;

        Ok(value
            .as_ref()
            .and_then(SqlValue::as_bytes)
            .filter(|raw| !raw.is_empty())
            .map(encode_visitor_id))
    }

    /// The grouped per-visitor maxima are computed in a subquery; the
    /// boundary against the reference time is applied outside it, after
    /// aggregation.
    pub fn make_adjacent_visitor_query(
        &self,
        query: &AdjacentQuery,
    ) -> Result<CompiledQuery, LiveError> {
        let raw_time = query.visit_last_action_time.trim();
        let reference = NaiveDateTime::parse_from_str(raw_time, STORAGE_FORMAT)
            .map_err(|_| LiveError::InvalidTimestamp(raw_time.to_string()))?;
        let out_of_range = || LiveError::InvalidTimestamp(raw_time.to_string());
        let window_start = reference
            .checked_sub_signed(Duration::days(1))
            .ok_or_else(out_of_range)?;
        let window_end = reference
            .checked_add_signed(Duration::days(1))
            .ok_or_else(out_of_range)?;

        let (boundary, order) = match query.direction {
            Direction::Next => ("sub.visit_last_action_time <= ?", "DESC"),
            Direction::Prev => ("sub.visit_last_action_time >= ?", "ASC"),
        };

        let mut conditions = vec!["log_visit.idsite = ?".to_string()];
        let mut bind = vec![SqlValue::Int(query.site_id)];
        match decode_visitor_id(&query.visitor_id) {
            Some(raw) => {
                conditions.push("log_visit.idvisitor <> ?".to_string());
                bind.push(SqlValue::Blob(raw));
            }
            None => debug!(
                visitor_id = %query.visitor_id,
                "Visitor id is not hex, nothing to exclude"
            ),
        }
        conditions.push("log_visit.visit_last_action_time >= ?".to_string());
        bind.push(SqlValue::Text(window_start.format(STORAGE_FORMAT).to_string()));
        conditions.push("log_visit.visit_last_action_time <= ?".to_string());
        bind.push(SqlValue::Text(window_end.format(STORAGE_FORMAT).to_string()));

        let inner = SelectQuery::new(
            "log_visit.idvisitor, MAX(log_visit.visit_last_action_time) AS visit_last_action_time",
            LogTable::Visit,
        )
        .filter(conditions.join(" AND "), bind)
        .group_by("log_visit.idvisitor")
        .order_by(format!("MAX(log_visit.visit_last_action_time) {order}"));

        let segment = Segment::new(query.segment.clone(), query.site_id);
        let compiled = self.segments.compile(&segment, inner)?;

        let mut bind = compiled.bind;
        bind.push(SqlValue::Text(reference.format(STORAGE_FORMAT).to_string()));
        Ok(CompiledQuery {
            sql: format!(
                "SELECT sub.idvisitor, sub.visit_last_action_time FROM ({}) AS sub \
                 WHERE {boundary} \
                 ORDER BY sub.visit_last_action_time {order} \
                 LIMIT 1",
                compiled.sql
            ),
            bind,
        })
    }
}
