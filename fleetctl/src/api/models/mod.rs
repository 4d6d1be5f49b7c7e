//! API request and response data models.
//!
//! This module contains the data structures used for HTTP request deserialization
//! and response serialization. These models define the public API contract.
//!
//! # Design Principles
//!
//! - **Separation of Concerns**: API models are distinct from database models,
//!   allowing independent evolution of API and storage representations
//! - **Validation**: Models use serde for deserialization and validation
//! - **OpenAPI**: All models are annotated with `utoipa` for automatic API docs
//! - **Type Safety**: Strong typing with newtype wrappers for IDs
//!
//! # Model Categories
//!
//! ## Master Data
//!
//! - [`companies`]: Tenants
//! - [`carriers`]: Transport companies working for a tenant
//! - [`drivers`], [`vehicles`]: Resources assigned to routes
//!
//! ## Operations
//!
//! - [`routes`], [`trips`]: Planned routes and their executions
//! - [`alerts`], [`costs`], [`documents`]: Operational records
//! - [`reports`]: Dashboard and summary report
//!
//! ## Accounts
//!
//! - [`users`]: User profiles, roles, and creation/update requests
//! - [`auth`]: Login and password management payloads
//!
//! ## Shared
//!
//! - [`pagination`]: `skip`/`limit` parameters and the paginated envelope
//!
//! # Example
//!
//! ```ignore
//! use fleetctl::api::models::routes::{RouteCreate, RouteResponse};
//!
//! let create_req: RouteCreate = serde_json::from_str(json_str)?;
//! let json = serde_json::to_string(&RouteResponse::from(record))?;
//! ```

pub mod alerts;
pub mod auth;
pub mod carriers;
pub mod companies;
pub mod costs;
pub mod documents;
pub mod drivers;
pub mod pagination;
pub mod reports;
pub mod routes;
pub mod trips;
pub mod users;
pub mod vehicles;
