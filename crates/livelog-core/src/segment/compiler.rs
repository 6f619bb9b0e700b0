use std::collections::BTreeSet;

use tracing::debug;

use super::expression::{Condition, Operator, SegmentExpr};
use super::{
    CompiledQuery, LogTable, Predicate, Segment, SegmentCompiler, SegmentError, SelectQuery,
};
use crate::value::SqlValue;
use crate::visitor::decode_visitor_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    VisitorId,
    Integer,
    Number,
    Flag,
    VisitorType,
    Text,
}

struct Dimension {
    name: &'static str,
    table: LogTable,
    column: &'static str,
    kind: ValueKind,
}

const DIMENSIONS: &[Dimension] = &[
    Dimension {
        name: "visitorId",
        table: LogTable::Visit,
        column: "idvisitor",
        kind: ValueKind::VisitorId,
    },
    Dimension {
        name: "visitId",
        table: LogTable::Visit,
        column: "idvisit",
        kind: ValueKind::Integer,
    },
    Dimension {
        name: "visitorType",
        table: LogTable::Visit,
        column: "visitor_returning",
        kind: ValueKind::VisitorType,
    },
    Dimension {
        name: "actions",
        table: LogTable::Visit,
        column: "visit_total_actions",
        kind: ValueKind::Integer,
    },
    Dimension {
        name: "visitDuration",
        table: LogTable::Visit,
        column: "visit_total_time",
        kind: ValueKind::Integer,
    },
    Dimension {
        name: "visitConverted",
        table: LogTable::Visit,
        column: "visit_goal_converted",
        kind: ValueKind::Flag,
    },
    Dimension {
        name: "countryCode",
        table: LogTable::Visit,
        column: "location_country",
        kind: ValueKind::Text,
    },
    Dimension {
        name: "browserCode",
        table: LogTable::Visit,
        column: "config_browser_name",
        kind: ValueKind::Text,
    },
    Dimension {
        name: "operatingSystemCode",
        table: LogTable::Visit,
        column: "config_os",
        kind: ValueKind::Text,
    },
    Dimension {
        name: "deviceType",
        table: LogTable::Visit,
        column: "config_device_type",
        kind: ValueKind::Text,
    },
    Dimension {
        name: "referrerType",
        table: LogTable::Visit,
        column: "referer_type",
        kind: ValueKind::Text,
    },
    Dimension {
        name: "referrerName",
        table: LogTable::Visit,
        column: "referer_name",
        kind: ValueKind::Text,
    },
    Dimension {
        name: "pageUrl",
        table: LogTable::Action,
        column: "url",
        kind: ValueKind::Text,
    },
    Dimension {
        name: "goalId",
        table: LogTable::Conversion,
        column: "idgoal",
        kind: ValueKind::Integer,
    },
    Dimension {
        name: "revenue",
        table: LogTable::Conversion,
        column: "revenue",
        kind: ValueKind::Number,
    },
];

/// Segment compiler for the built-in log schema.
///
/// Conditions on columns outside the query's FROM table pull that table in
/// with a `LEFT JOIN` on `idvisit`. A visit can then appear once per joined
/// row, so callers that need one row per visit must collapse on `idvisit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlSegmentCompiler;

impl SqlSegmentCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl SegmentCompiler for SqlSegmentCompiler {
    fn compile(
        &self,
        segment: &Segment,
        query: SelectQuery,
    ) -> Result<CompiledQuery, SegmentError> {
        let Some(expr) = SegmentExpr::parse(&segment.definition)? else {
            return Ok(query.render(&[], None));
        };

        let mut tables = BTreeSet::new();
        let mut and_sql = Vec::with_capacity(expr.and_terms.len());
        let mut bind = Vec::new();
        for or_terms in &expr.and_terms {
            let mut or_sql = Vec::with_capacity(or_terms.len());
            for condition in or_terms {
                let dimension = lookup(&condition.dimension)?;
                tables.insert(dimension.table);
                let (sql, value) = condition_sql(dimension, condition)?;
                or_sql.push(sql);
                bind.push(value);
            }
            and_sql.push(format!("({})", or_sql.join(" OR ")));
        }

        let joins: Vec<LogTable> = tables.into_iter().collect();
        debug!(
            site_id = segment.site_id,
            segment = %segment.definition,
            joins = joins.len(),
            "Compiled segment"
        );
        Ok(query.render(
            &joins,
            Some(Predicate {
                sql: and_sql.join(" AND "),
                bind,
            }),
        ))
    }
}

fn lookup(name: &str) -> Result<&'static Dimension, SegmentError> {
    DIMENSIONS
        .iter()
        .find(|d| d.name == name)
        .ok_or_else(|| SegmentError::UnknownDimension(name.to_string()))
}

fn condition_sql(
    dimension: &Dimension,
    condition: &Condition,
) -> Result<(String, SqlValue), SegmentError> {
    let column = format!("{}.{}", dimension.table.name(), dimension.column);
    let unsupported = || SegmentError::UnsupportedOperator {
        dimension: dimension.name.to_string(),
        op: condition.op.to_string(),
    };
    let invalid = || SegmentError::InvalidValue {
        dimension: dimension.name.to_string(),
        value: condition.value.clone(),
    };

    let ordered = matches!(dimension.kind, ValueKind::Integer | ValueKind::Number);
    let textual = dimension.kind == ValueKind::Text;
    let sql = match condition.op {
        Operator::Equals => format!("{column} = ?"),
        Operator::NotEquals => format!("({column} IS NULL OR {column} <> ?)"),
        Operator::Less if ordered => format!("{column} < ?"),
        Operator::LessOrEqual if ordered => format!("{column} <= ?"),
        Operator::Greater if ordered => format!("{column} > ?"),
        Operator::GreaterOrEqual if ordered => format!("{column} >= ?"),
        Operator::Contains | Operator::StartsWith | Operator::EndsWith if textual => {
            format!("{column} LIKE ? ESCAPE '\\'")
        }
        Operator::NotContains if textual => {
            format!("({column} IS NULL OR {column} NOT LIKE ? ESCAPE '\\')")
        }
        _ => return Err(unsupported()),
    };

    let raw = condition.value.trim();
    let value = match dimension.kind {
        ValueKind::VisitorId => SqlValue::Blob(decode_visitor_id(raw).ok_or_else(invalid)?),
        ValueKind::Integer => SqlValue::Int(raw.parse().map_err(|_| invalid())?),
        ValueKind::Number => SqlValue::Float(raw.parse().map_err(|_| invalid())?),
        ValueKind::Flag => match raw {
            "0" => SqlValue::Int(0),
            "1" => SqlValue::Int(1),
            _ => return Err(invalid()),
        },
        ValueKind::VisitorType => match raw {
            "new" => SqlValue::Int(0),
            "returning" => SqlValue::Int(1),
            _ => return Err(invalid()),
        },
        ValueKind::Text => {
            let escaped = escape_like(raw);
            SqlValue::Text(match condition.op {
                Operator::Contains | Operator::NotContains => format!("%{escaped}%"),
                Operator::StartsWith => format!("{escaped}%"),
                Operator::EndsWith => format!("%{escaped}"),
                _ => raw.to_string(),
            })
        }
    };

    Ok((sql, value))
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
