//! Authentication and authorization.
//!
//! # Authentication
//!
//! Users log in with email and password at `/authentication/login` and receive a signed JWT
//! (see [`session`]). The same token is accepted from three places, checked in this order:
//!
//! 1. `Authorization: Bearer <token>`
//! 2. `X-Access-Token: <token>`
//! 3. the session cookie set at login
//!
//! Resolved tokens are kept in a short-lived [`cache`], and logged-out tokens are remembered in
//! a revocation set until they expire. Browser sessions riding on the cookie must also present
//! the [`csrf`] token on unsafe methods.
//!
//! # Authorization
//!
//! - [`rbac`]: the static role to permission table
//! - [`permissions`]: the [`permissions::RequiresPermission`] extractor and the
//!   [`permissions::TenantScope`] every non-admin read and write is filtered through
//!
//! ```ignore
//! use fleetctl::auth::permissions::{RequiresPermission, operation, resource};
//!
//! async fn list_trips(
//!     State(state): State<AppState>,
//!     current_user: RequiresPermission<resource::Trips, operation::ReadOwn>,
//! ) -> Result<Json<PaginatedResponse<TripResponse>>> {
//!     let scope = current_user.scope()?;
//!     ...
//! }
//! ```

pub mod cache;
pub mod csrf;
pub mod current_user;
pub mod password;
pub mod permissions;
pub mod rbac;
pub mod session;
