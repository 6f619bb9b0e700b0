//! The live query builder: recent visits, trailing counters and adjacent
//! visitor lookup.
//!
//! [`LiveModel`] owns no mutable state. Every operation builds its SQL through
//! the injected [`SegmentCompiler`] and runs it on the injected
//! [`QueryExecutor`]; failures come back as [`LiveError`].

mod adjacent;
mod counters;
mod visits;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::backend::{QueryExecutor, Site, SiteResolver};
use crate::error::LiveError;
use crate::segment::SegmentCompiler;
use crate::site_scope::SiteScope;

pub use counters::Counters;

/// Source of "now". Injected so time-window tests are deterministic.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// `asc` in any case sorts ascending; everything else, including
    /// garbage, sorts descending.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(v) if v.trim().eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

impl Direction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "next" => Some(Direction::Next),
            "prev" | "previous" => Some(Direction::Prev),
            _ => None,
        }
    }
}

/// Parameters of a visit listing.
#[derive(Debug, Clone, Default)]
pub struct VisitsQuery {
    pub site_id: i64,
    pub period: Option<String>,
    pub date: Option<String>,
    pub segment: String,
    /// Values below 1 mean "no limit".
    pub fetch_limit: i64,
    pub visitor_id: Option<String>,
    /// Unix seconds; only visits whose last action is strictly later match.
    pub min_timestamp: Option<i64>,
    pub sort_order: SortOrder,
}

/// Parameters of an adjacent-visitor lookup.
#[derive(Debug, Clone)]
pub struct AdjacentQuery {
    pub site_id: i64,
    pub visitor_id: String,
    /// Reference timestamp in storage format (`YYYY-MM-DD HH:MM:SS`, UTC).
    pub visit_last_action_time: String,
    pub segment: String,
    pub direction: Direction,
}

#[derive(Clone)]
pub struct LiveModel {
    executor: Arc<dyn QueryExecutor>,
    segments: Arc<dyn SegmentCompiler>,
    sites: Arc<dyn SiteResolver>,
    site_scope: SiteScope,
    clock: Clock,
}

impl fmt::Debug for LiveModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveModel")
            .field("site_scope", &self.site_scope)
            .finish_non_exhaustive()
    }
}

impl LiveModel {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        segments: Arc<dyn SegmentCompiler>,
        sites: Arc<dyn SiteResolver>,
    ) -> Self {
        Self {
            executor,
            segments,
            sites,
            site_scope: SiteScope::default(),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_site_scope(mut self, site_scope: SiteScope) -> Self {
        self.site_scope = site_scope;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    async fn site(&self, site_id: i64) -> Result<Site, LiveError> {
        self.sites
            .resolve(site_id)
            .await
            .map_err(LiveError::Site)?
            .ok_or(LiveError::SiteNotFound(site_id))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_order_only_honours_asc() {
        assert_eq!(SortOrder::parse(Some("asc")), SortOrder::Asc);
        assert_eq!(SortOrder::parse(Some("ASC")), SortOrder::Asc);
        assert_eq!(SortOrder::parse(Some("desc")), SortOrder::Desc);
        assert_eq!(SortOrder::parse(Some("ascending")), SortOrder::Desc);
        assert_eq!(
            SortOrder::parse(Some("1; DROP TABLE log_visit")),
            SortOrder::Desc
        );
        assert_eq!(SortOrder::parse(None), SortOrder::Desc);
    }

    #[test]
    fn direction_parse() {
        assert_eq!(Direction::parse("next"), Some(Direction::Next));
        assert_eq!(Direction::parse("prev"), Some(Direction::Prev));
        assert_eq!(Direction::parse("previous"), Some(Direction::Prev));
        assert_eq!(Direction::parse("sideways"), None);
    }
}
