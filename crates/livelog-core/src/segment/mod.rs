//! Segment filters and their compilation into SQL.
//!
//! A segment is an opaque boolean expression owned by the caller. The live
//! query layer hands every query it builds to a [`SegmentCompiler`], which
//! ANDs the segment's predicate onto the query's own WHERE clause and returns
//! the final SQL with a bind list in placeholder order.

mod compiler;
mod expression;

use thiserror::Error;

use crate::value::SqlValue;

pub use compiler::SqlSegmentCompiler;
pub use expression::{Condition, Operator, SegmentExpr};

#[derive(Debug, Error, PartialEq)]
pub enum SegmentError {
    #[error("unknown segment dimension: {0}")]
    UnknownDimension(String),

    #[error("malformed segment condition: {0}")]
    MalformedCondition(String),

    #[error("operator {op} is not supported for segment dimension {dimension}")]
    UnsupportedOperator { dimension: String, op: String },

    #[error("invalid value {value:?} for segment dimension {dimension}")]
    InvalidValue { dimension: String, value: String },
}

/// A caller-supplied segment definition scoped to one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub definition: String,
    pub site_id: i64,
}

impl Segment {
    pub fn new(definition: impl Into<String>, site_id: i64) -> Self {
        Self {
            definition: definition.into(),
            site_id,
        }
    }
}

/// The log tables a live query can read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogTable {
    Visit,
    Action,
    Conversion,
}

impl LogTable {
    pub fn name(&self) -> &'static str {
        match self {
            LogTable::Visit => "log_visit",
            LogTable::Action => "log_link_visit_action",
            LogTable::Conversion => "log_conversion",
        }
    }
}

/// Everything needed to render one SELECT, before the segment is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub select: String,
    pub from: LogTable,
    pub where_clause: Option<String>,
    pub bind: Vec<SqlValue>,
    pub order_by: Option<String>,
    pub group_by: Option<String>,
    /// `0` means no limit.
    pub limit: u64,
}

impl SelectQuery {
    pub fn new(select: impl Into<String>, from: LogTable) -> Self {
        Self {
            select: select.into(),
            from,
            where_clause: None,
            bind: Vec::new(),
            order_by: None,
            group_by: None,
            limit: 0,
        }
    }

    pub fn filter(mut self, where_clause: impl Into<String>, bind: Vec<SqlValue>) -> Self {
        self.where_clause = Some(where_clause.into());
        self.bind = bind;
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Render the query with extra joined tables and an optional predicate.
    ///
    /// The query's own binds come first, then the predicate's, matching the
    /// order their placeholders appear in `WHERE (own) AND (predicate)`.
    pub fn render(self, joins: &[LogTable], predicate: Option<Predicate>) -> CompiledQuery {
        let from = self.from.name();
        let mut sql = format!("SELECT {} FROM {from}", self.select);
        for table in joins.iter().filter(|t| **t != self.from) {
            let name = table.name();
            sql.push_str(&format!(
                " LEFT JOIN {name} ON {name}.idvisit = {from}.idvisit"
            ));
        }

        let mut bind = self.bind;
        let own = self.where_clause.filter(|w| !w.trim().is_empty());
        match (own, predicate) {
            (Some(own), Some(pred)) => {
                sql.push_str(&format!(" WHERE ({own}) AND ({})", pred.sql));
                bind.extend(pred.bind);
            }
            (Some(own), None) => sql.push_str(&format!(" WHERE {own}")),
            (None, Some(pred)) => {
                sql.push_str(&format!(" WHERE {}", pred.sql));
                bind.extend(pred.bind);
            }
            (None, None) => {}
        }

        if let Some(group_by) = self.group_by {
            sql.push_str(&format!(" GROUP BY {group_by}"));
        }
        if let Some(order_by) = self.order_by {
            sql.push_str(&format!(" ORDER BY {order_by}"));
        }
        if self.limit > 0 {
            sql.push_str(&format!(" LIMIT {}", self.limit));
        }

        CompiledQuery { sql, bind }
    }
}

/// A SQL boolean expression with its own binds.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub sql: String,
    pub bind: Vec<SqlValue>,
}

/// Final SQL plus binds in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub bind: Vec<SqlValue>,
}

impl CompiledQuery {
    /// Number of `?` placeholders in `sql`.
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}

pub trait SegmentCompiler: Send + Sync + 'static {
    fn compile(
        &self,
        segment: &Segment,
        query: SelectQuery,
    ) -> Result<CompiledQuery, SegmentError>;
}
