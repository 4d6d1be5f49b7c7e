//! Base repository trait for database operations.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use uuid::Uuid;

/// Contains the Repository trait.
///
/// A repository is the data access layer for one table. It provides methods for creating,
/// reading, updating, and deleting entities, as well as listing and counting them with simple
/// filters. Every entity has a Postgres implementation and shares the generic in-memory one.
use crate::db::errors::Result;

/// Base repository trait providing common database operations
///
/// This trait has separate associated types for create requests, update requests, and responses.
/// Repositories are shared between requests, so all methods take `&self`.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    /// The request type for creating entities
    type CreateRequest: Send + Sync;

    /// The request type for updating entities
    type UpdateRequest: Send + Sync;

    /// The response/DTO type returned by operations
    type Response: Send + Sync;

    /// The identifier type for lookups
    type Id: Send + Sync + Copy + Eq + Hash;

    /// The filter type for list operations
    type Filter: Send + Sync;

    /// Create a new entity
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Get an entity by ID
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// Get lots of entities by their IDs, keyed by ID
    async fn get_bulk(&self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>>;

    /// List entities with filtering and pagination
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Count entities matching the filter, ignoring pagination
    async fn count(&self, filter: &Self::Filter) -> Result<i64>;

    /// Update an entity by ID. Fails with `NotFound` when the entity does not exist.
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;

    /// Delete an entity by ID
    async fn delete(&self, id: Self::Id) -> Result<bool>;
}

/// A repository behind a trait object, as held by [`crate::db::Stores`]
pub type SharedRepository<C, U, R, F> = Arc<dyn Repository<CreateRequest = C, UpdateRequest = U, Response = R, Id = Uuid, Filter = F>>;

/// Limit used by callers that need every matching row (reports, exports)
pub const UNBOUNDED: i64 = i64::MAX;
