//! HTTP request handlers for all API endpoints.
//!
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Authentication and authorization checks, through the
//!   [`crate::auth::permissions::RequiresPermission`] extractor
//! - Tenant scoping of every read and write
//! - Calling the repositories directly, or dispatching a command/query on the [`crate::cqrs`] buses
//!
//! # Handler Modules
//!
//! - [`auth`]: Login, logout, current user, password change
//! - [`companies`], [`carriers`], [`drivers`], [`vehicles`]: Master data CRUD
//! - [`routes`]: Route CRUD, assignment, status changes and details
//! - [`trips`]: Scheduling and the trip lifecycle
//! - [`alerts`]: Raising, acknowledging and resolving alerts
//! - [`costs`]: Operating costs
//! - [`documents`]: Compliance documents and their expiry
//! - [`users`]: Accounts and roles
//! - [`reports`]: Dashboard and summary report
//! - [`exports`]: CSV, XLSX and PDF downloads
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which converts to the matching HTTP status code and
//! a JSON error body.

pub mod alerts;
pub mod auth;
pub mod carriers;
pub mod companies;
pub mod costs;
pub mod documents;
pub mod drivers;
pub mod exports;
pub mod reports;
pub mod routes;
pub mod trips;
pub mod users;
pub mod vehicles;
