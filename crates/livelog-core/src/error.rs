use thiserror::Error;

use crate::segment::SegmentError;

/// Errors surfaced by the live query layer.
///
/// Validation variants name the offending input so callers can echo it back.
/// Collaborator failures keep their source chain.
#[derive(Debug, Error)]
pub enum LiveError {
    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("invalid date range: {0}")]
    InvalidRange(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("site scope for site {0} expanded to an empty set")]
    EmptySiteScope(i64),

    #[error("site not found: {0}")]
    SiteNotFound(i64),

    #[error(transparent)]
    Segment(#[from] SegmentError),

    #[error("site lookup failed: {0}")]
    Site(#[source] anyhow::Error),

    #[error("database query failed: {0}")]
    Database(#[source] anyhow::Error),
}

impl LiveError {
    /// `true` for errors caused by caller input rather than a collaborator.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LiveError::InvalidPeriod(_)
                | LiveError::InvalidDate(_)
                | LiveError::InvalidRange(_)
                | LiveError::InvalidTimestamp(_)
                | LiveError::InvalidTimezone(_)
                | LiveError::EmptySiteScope(_)
                | LiveError::Segment(_)
        )
    }
}
