//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL, plus an in-memory
//! backend with the same semantics for development and tests. It follows the Repository pattern
//! to provide clean abstractions over database operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers, CQRS handlers)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Stores    │  (one Arc<dyn Repository> per entity)
//! └──────┬──────┘
//!        │
//!   ┌────┴─────┐
//!   ↓          ↓
//! ┌──────┐  ┌──────────┐
//! │ Pg   │  │ In-memory│
//! └──────┘  └──────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations for CRUD operations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//! - [`stores`]: The bundle of repositories held in application state
//!
//! # Consistency
//!
//! Each repository call is atomic on its own. Operations that touch several entities
//! (e.g. starting a trip and marking its vehicle in service) are sequences of calls, not one
//! transaction.
//!
//! # Migrations
//!
//! Database migrations are managed by SQLx and located in the `migrations/` directory.
//! The [`crate::migrator`] function provides access to the migrator:
//!
//! ```ignore
//! fleetctl::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;
pub mod stores;

pub use stores::Stores;
