use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate};
use duckdb::types::{TimeUnit, Value};

use livelog_core::backend::QueryExecutor;
use livelog_core::time_range::STORAGE_FORMAT;
use livelog_core::value::{Row, SqlValue};

use crate::DuckDbBackend;

fn to_duckdb(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Int(v) => Value::BigInt(*v),
        SqlValue::Float(v) => Value::Double(*v),
        SqlValue::Text(v) => Value::Text(v.clone()),
        SqlValue::Blob(v) => Value::Blob(v.clone()),
    }
}

fn micros(unit: TimeUnit, raw: i64) -> i64 {
    match unit {
        TimeUnit::Second => raw.saturating_mul(1_000_000),
        TimeUnit::Millisecond => raw.saturating_mul(1_000),
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    }
}

/// Timestamps come back in storage format so rows read the same whichever
/// backend produced them. Types the live queries never select are rendered
/// through their debug form rather than dropped.
fn from_duckdb(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Boolean(v) => SqlValue::Int(i64::from(v)),
        Value::TinyInt(v) => SqlValue::Int(i64::from(v)),
        Value::SmallInt(v) => SqlValue::Int(i64::from(v)),
        Value::Int(v) => SqlValue::Int(i64::from(v)),
        Value::BigInt(v) => SqlValue::Int(v),
        Value::UTinyInt(v) => SqlValue::Int(i64::from(v)),
        Value::USmallInt(v) => SqlValue::Int(i64::from(v)),
        Value::UInt(v) => SqlValue::Int(i64::from(v)),
        Value::UBigInt(v) => i64::try_from(v)
            .map(SqlValue::Int)
            .unwrap_or(SqlValue::Float(v as f64)),
        Value::HugeInt(v) => i64::try_from(v)
            .map(SqlValue::Int)
            .unwrap_or(SqlValue::Float(v as f64)),
        Value::Float(v) => SqlValue::Float(f64::from(v)),
        Value::Double(v) => SqlValue::Float(v),
        Value::Text(v) => SqlValue::Text(v),
        Value::Blob(v) => SqlValue::Blob(v),
        Value::Timestamp(unit, raw) => match DateTime::from_timestamp_micros(micros(unit, raw)) {
            Some(at) => SqlValue::Text(at.format(STORAGE_FORMAT).to_string()),
            None => SqlValue::Null,
        },
        Value::Date32(days) => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1);
            match epoch.and_then(|e| e.checked_add_signed(Duration::days(i64::from(days)))) {
                Some(date) => SqlValue::Text(date.format("%Y-%m-%d").to_string()),
                None => SqlValue::Null,
            }
        }
        other => SqlValue::Text(format!("{other:?}")),
    }
}

#[async_trait]
impl QueryExecutor for DuckDbBackend {
    async fn fetch_all(&self, sql: &str, bind: &[SqlValue]) -> Result<Vec<Row>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(sql)?;
        let params: Vec<Value> = bind.iter().map(to_duckdb).collect();
        let mut rows = stmt.query(duckdb::params_from_iter(params.iter()))?;

        // Column names are only known once the statement has run.
        let names = rows
            .as_ref()
            .map(|statement| statement.column_names())
            .unwrap_or_default();

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (idx, name) in names.iter().enumerate() {
                let value: Value = row.get(idx)?;
                record.push(name.clone(), from_duckdb(value));
            }
            out.push(record);
        }
        Ok(out)
    }

    async fn fetch_one(&self, sql: &str, bind: &[SqlValue]) -> Result<Option<SqlValue>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(sql)?;
        let params: Vec<Value> = bind.iter().map(to_duckdb).collect();
        let mut rows = stmt.query(duckdb::params_from_iter(params.iter()))?;
        match rows.next()? {
            Some(row) => {
                let value: Value = row.get(0)?;
                Ok(Some(from_duckdb(value)))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_render_in_storage_format() {
        // 2024-03-20 10:00:00 UTC
        let value = from_duckdb(Value::Timestamp(TimeUnit::Microsecond, 1_710_928_800_000_000));
        assert_eq!(value, SqlValue::Text("2024-03-20 10:00:00".to_string()));

        let value = from_duckdb(Value::Timestamp(TimeUnit::Second, 1_710_928_800));
        assert_eq!(value, SqlValue::Text("2024-03-20 10:00:00".to_string()));
    }

    #[test]
    fn integers_widen() {
        assert_eq!(from_duckdb(Value::TinyInt(1)), SqlValue::Int(1));
        assert_eq!(from_duckdb(Value::Int(-7)), SqlValue::Int(-7));
        assert_eq!(from_duckdb(Value::Boolean(true)), SqlValue::Int(1));
    }

    #[test]
    fn binds_map_one_to_one() {
        assert!(matches!(to_duckdb(&SqlValue::Int(3)), Value::BigInt(3)));
        assert!(matches!(to_duckdb(&SqlValue::Null), Value::Null));
        assert!(matches!(to_duckdb(&SqlValue::Blob(vec![1])), Value::Blob(ref b) if b == &[1]));
    }

    #[tokio::test]
    async fn rows_carry_column_names() {
        let db = DuckDbBackend::open_in_memory().expect("db");
        let rows = db
            .fetch_all(
                "SELECT ?::BIGINT AS answer, 'x' AS label",
                &[SqlValue::Int(42)],
            )
            .await
            .expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("answer"), Some(&SqlValue::Int(42)));
        assert_eq!(rows[0].get("label"), Some(&SqlValue::Text("x".to_string())));
    }

    #[tokio::test]
    async fn fetch_one_on_empty_result_is_none() {
        let db = DuckDbBackend::open_in_memory().expect("db");
        let value = db
            .fetch_one(
                "SELECT idsite FROM site WHERE idsite = ?",
                &[SqlValue::Int(9)],
            )
            .await
            .expect("query");
        assert_eq!(value, None);
    }
}
