//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Authentication** (`/authentication/*`): Login, logout, password change, CSRF token
//! - **Master data** (`/admin/api/v1/{companies,carriers,drivers,vehicles}`)
//! - **Operations** (`/admin/api/v1/{routes,trips,alerts,costs,documents}`)
//! - **Users** (`/admin/api/v1/users/*`): Accounts and roles
//! - **Reports** (`/admin/api/v1/{dashboard,reports/summary,exports/*}`)
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`.
//! API documentation is available at `/admin/docs` when the server is running.

pub mod handlers;
pub mod models;
