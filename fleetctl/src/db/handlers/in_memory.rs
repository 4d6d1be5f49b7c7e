//! In-memory repository backend.
//!
//! Rows live in a `HashMap` behind a `parking_lot::RwLock`, keyed by id. Filtering, ordering
//! and unique constraints are described per entity through [`InMemoryRecord`], so both
//! backends answer the same queries the same way. Unique violations are reported with the
//! Postgres constraint names so callers cannot tell the backends apart.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::instrument;
use uuid::Uuid;

use crate::db::errors::{DbError, Result};
use crate::db::handlers::repository::Repository;
use crate::types::abbrev_uuid;

/// A row type that can be stored by [`InMemoryRepository`].
pub trait InMemoryRecord: Clone + Send + Sync + 'static {
    type Create: Send + Sync;
    type Update: Send + Sync;
    type Filter: Send + Sync;

    /// Table name, used in constraint violations
    const TABLE: &'static str;

    fn id(&self) -> Uuid;

    fn from_create(id: Uuid, now: DateTime<Utc>, request: &Self::Create) -> Self;

    fn apply_update(&mut self, request: &Self::Update, now: DateTime<Utc>);

    fn matches(&self, filter: &Self::Filter) -> bool;

    /// `(skip, limit)` of the filter
    fn page(filter: &Self::Filter) -> (i64, i64);

    /// Listing order, matching the `ORDER BY` of the Postgres repository
    fn compare(&self, other: &Self) -> Ordering;

    /// `(constraint name, normalized value)` pairs that must be unique across the table
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// Generic repository over an in-process map.
pub struct InMemoryRepository<R> {
    rows: Arc<RwLock<HashMap<Uuid, R>>>,
}

impl<R> Clone for InMemoryRepository<R> {
    fn clone(&self) -> Self {
        Self { rows: self.rows.clone() }
    }
}

impl<R> Default for InMemoryRepository<R> {
    fn default() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<R: InMemoryRecord> InMemoryRepository<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access for backend-specific lookups (e.g. users by email)
    pub(crate) fn find(&self, predicate: impl Fn(&R) -> bool) -> Option<R> {
        self.rows.read().values().find(|row| predicate(row)).cloned()
    }

    /// Mutate one row in place
    pub(crate) fn modify(&self, id: Uuid, f: impl FnOnce(&mut R)) -> Result<R> {
        let mut rows = self.rows.write();
        let row = rows.get_mut(&id).ok_or(DbError::NotFound)?;
        f(row);
        Ok(row.clone())
    }

    fn check_unique(rows: &HashMap<Uuid, R>, candidate: &R) -> Result<()> {
        let keys = candidate.unique_keys();
        if keys.is_empty() {
            return Ok(());
        }
        for other in rows.values().filter(|other| other.id() != candidate.id()) {
            let other_keys = other.unique_keys();
            for (constraint, value) in &keys {
                if other_keys.iter().any(|(c, v)| c == constraint && v == value) {
                    return Err(DbError::UniqueViolation {
                        constraint: Some(constraint.to_string()),
                        table: Some(R::TABLE.to_string()),
                        message: format!("duplicate key value violates unique constraint \"{constraint}\""),
                        conflicting_value: Some(value.clone()),
                    });
                }
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<R: InMemoryRecord> Repository for InMemoryRepository<R> {
    type CreateRequest = R::Create;
    type UpdateRequest = R::Update;
    type Response = R;
    type Id = Uuid;
    type Filter = R::Filter;

    #[instrument(skip(self, request), fields(table = R::TABLE), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let row = R::from_create(Uuid::new_v4(), Utc::now(), request);
        let mut rows = self.rows.write();
        Self::check_unique(&rows, &row)?;
        rows.insert(row.id(), row.clone());
        Ok(row)
    }

    #[instrument(skip(self), fields(table = R::TABLE, id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        Ok(self.rows.read().get(&id).cloned())
    }

    #[instrument(skip(self, ids), fields(table = R::TABLE, count = ids.len()), err)]
    async fn get_bulk(&self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let rows = self.rows.read();
        Ok(ids
            .into_iter()
            .filter_map(|id| rows.get(&id).map(|row| (id, row.clone())))
            .collect())
    }

    #[instrument(skip(self, filter), fields(table = R::TABLE), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let (skip, limit) = R::page(filter);
        let mut matching: Vec<R> = self.rows.read().values().filter(|row| row.matches(filter)).cloned().collect();
        matching.sort_by(|a, b| a.compare(b).then_with(|| a.id().cmp(&b.id())));
        Ok(matching
            .into_iter()
            .skip(usize::try_from(skip.max(0)).unwrap_or(usize::MAX))
            .take(usize::try_from(limit.max(0)).unwrap_or(usize::MAX))
            .collect())
    }

    #[instrument(skip(self, filter), fields(table = R::TABLE), err)]
    async fn count(&self, filter: &Self::Filter) -> Result<i64> {
        let count = self.rows.read().values().filter(|row| row.matches(filter)).count();
        Ok(count as i64)
    }

    #[instrument(skip(self, request), fields(table = R::TABLE, id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut rows = self.rows.write();
        let mut updated = rows.get(&id).cloned().ok_or(DbError::NotFound)?;
        updated.apply_update(request, Utc::now());
        Self::check_unique(&rows, &updated)?;
        rows.insert(id, updated.clone());
        Ok(updated)
    }

    #[instrument(skip(self), fields(table = R::TABLE, id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        Ok(self.rows.write().remove(&id).is_some())
    }
}

/// Case-insensitive substring match used by `search` filters
pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// [`contains_ci`] over optional columns, which never match
pub(crate) fn opt_contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| contains_ci(h, needle))
}

/// `None` in a filter means "any value"
pub(crate) fn matches_opt<T: PartialEq>(wanted: &Option<T>, actual: &T) -> bool {
    wanted.as_ref().is_none_or(|w| w == actual)
}

/// Like [`matches_opt`] for nullable columns: a set filter never matches a NULL column
pub(crate) fn matches_nullable<T: PartialEq>(wanted: &Option<T>, actual: &Option<T>) -> bool {
    match wanted {
        None => true,
        Some(w) => actual.as_ref() == Some(w),
    }
}
