use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use livelog_core::live::{AdjacentQuery, Direction, SortOrder, VisitsQuery};

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CountersParams {
    #[serde(rename = "lastMinutes")]
    pub last_minutes: Option<String>,
    pub segment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VisitsParams {
    pub period: Option<String>,
    pub date: Option<String>,
    pub segment: Option<String>,
    pub filter_limit: Option<String>,
    #[serde(rename = "visitorId")]
    pub visitor_id: Option<String>,
    #[serde(rename = "minTimestamp")]
    pub min_timestamp: Option<String>,
    pub filter_sort_order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjacentParams {
    #[serde(rename = "visitLastActionTime")]
    pub visit_last_action_time: Option<String>,
    pub direction: Option<String>,
    pub segment: Option<String>,
}

/// Parse an optional integer query parameter. Blank counts as absent.
fn parse_param<T: std::str::FromStr>(
    name: &str,
    raw: Option<&str>,
) -> Result<Option<T>, AppError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{name} must be an integer"))),
    }
}

/// `GET /api/sites/:id/live/counters` - Visits, actions, visitors and
/// conversions over the last `lastMinutes` minutes.
///
/// The counters are wrapped in a one-element list.
#[tracing::instrument(skip(state))]
pub async fn get_counters(
    State(state): State<Arc<AppState>>,
    Path(site_id): Path<i64>,
    Query(params): Query<CountersParams>,
) -> Result<impl IntoResponse, AppError> {
    let last_minutes = parse_param::<u32>("lastMinutes", params.last_minutes.as_deref())?;
    let counters = state
        .live
        .query_counters(
            site_id,
            last_minutes,
            params.segment.as_deref().unwrap_or(""),
        )
        .await?;

    Ok(Json(json!({ "data": [counters] })))
}

/// `GET /api/sites/:id/live/visits` - Most recent visits, one row per visit.
#[tracing::instrument(skip(state))]
pub async fn get_visits(
    State(state): State<Arc<AppState>>,
    Path(site_id): Path<i64>,
    Query(params): Query<VisitsParams>,
) -> Result<impl IntoResponse, AppError> {
    let query = VisitsQuery {
        site_id,
        period: params.period,
        date: params.date,
        segment: params.segment.unwrap_or_default(),
        fetch_limit: parse_param::<i64>("filter_limit", params.filter_limit.as_deref())?
            .unwrap_or(0),
        visitor_id: params.visitor_id,
        min_timestamp: parse_param::<i64>("minTimestamp", params.min_timestamp.as_deref())?,
        sort_order: SortOrder::parse(params.filter_sort_order.as_deref()),
    };

    let rows = state.live.query_log_visits(&query).await?;
    Ok(Json(json!({ "data": rows })))
}

/// `GET /api/sites/:id/live/visitors/:visitor_id/adjacent` - The visitor
/// listed right after (`direction=next`) or before (`direction=prev`) the
/// given one.
#[tracing::instrument(skip(state))]
pub async fn get_adjacent_visitor(
    State(state): State<Arc<AppState>>,
    Path((site_id, visitor_id)): Path<(i64, String)>,
    Query(params): Query<AdjacentParams>,
) -> Result<impl IntoResponse, AppError> {
    let visit_last_action_time = params
        .visit_last_action_time
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("visitLastActionTime is required".to_string()))?;
    let direction = params
        .direction
        .as_deref()
        .and_then(Direction::parse)
        .ok_or_else(|| AppError::BadRequest("direction must be next or prev".to_string()))?;

    let idvisitor = state
        .live
        .query_adjacent_visitor_id(&AdjacentQuery {
            site_id,
            visitor_id,
            visit_last_action_time,
            segment: params.segment.unwrap_or_default(),
            direction,
        })
        .await?;

    Ok(Json(json!({ "data": { "idvisitor": idvisitor } })))
}
