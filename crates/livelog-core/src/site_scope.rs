//! Site-ID scoping for every live query.
//!
//! Roll-up views register hooks that widen a single site into the set of
//! sites it aggregates. Hooks run in registration order; the final set is
//! deduplicated and must not be empty.

use std::fmt;
use std::sync::Arc;

use crate::error::LiveError;
use crate::value::SqlValue;

pub type SiteScopeHook = Arc<dyn Fn(Vec<i64>) -> Vec<i64> + Send + Sync>;

#[derive(Clone, Default)]
pub struct SiteScope {
    hooks: Vec<SiteScopeHook>,
}

impl fmt::Debug for SiteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteScope")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl SiteScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, hook: F)
    where
        F: Fn(Vec<i64>) -> Vec<i64> + Send + Sync + 'static,
    {
        self.hooks.push(Arc::new(hook));
    }

    pub fn expand(&self, site_id: i64) -> Result<Vec<i64>, LiveError> {
        let mut ids = vec![site_id];
        for hook in &self.hooks {
            ids = hook(ids);
        }

        let mut unique = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        if unique.is_empty() {
            return Err(LiveError::EmptySiteScope(site_id));
        }
        Ok(unique)
    }

    /// `"<table>.idsite IN (?, ...)"` plus its binds.
    ///
    /// `table` is always one of the fixed log table names, never caller input.
    pub fn where_clause(
        &self,
        site_id: i64,
        table: &str,
    ) -> Result<(String, Vec<SqlValue>), LiveError> {
        let ids = self.expand(site_id)?;
        let placeholders = vec!["?"; ids.len()].join(", ");
        let clause = format!("{table}.idsite IN ({placeholders})");
        Ok((clause, ids.into_iter().map(SqlValue::Int).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scope_is_the_site_itself() {
        let scope = SiteScope::new();
        let (clause, bind) = scope.where_clause(3, "log_visit").expect("clause");
        assert_eq!(clause, "log_visit.idsite IN (?)");
        assert_eq!(bind, vec![SqlValue::Int(3)]);
    }

    #[test]
    fn hooks_run_in_order_and_dedupe() {
        let mut scope = SiteScope::new();
        scope.register(|mut ids| {
            ids.extend([4, 5]);
            ids
        });
        scope.register(|mut ids| {
            ids.push(4);
            ids
        });

        let (clause, bind) = scope.where_clause(1, "log_conversion").expect("clause");
        assert_eq!(clause, "log_conversion.idsite IN (?, ?, ?)");
        assert_eq!(
            bind,
            vec![SqlValue::Int(1), SqlValue::Int(4), SqlValue::Int(5)]
        );
    }

    #[test]
    fn empty_expansion_is_rejected() {
        let mut scope = SiteScope::new();
        scope.register(|_| Vec::new());
        let err = scope.expand(9).expect_err("empty scope");
        assert!(matches!(err, LiveError::EmptySiteScope(9)));
    }
}
