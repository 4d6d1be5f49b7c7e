//! Database record models matching table schemas.
//!
//! Each entity has a `*CreateDBRequest`, a `*UpdateDBRequest` and a `*DBResponse`. Responses
//! derive `sqlx::FromRow` where the row maps one-to-one onto the table; users are assembled
//! from the `users` and `user_roles` tables.
//!
//! Database models are distinct from the API models in [`crate::api::models`] so storage and
//! wire representations can evolve independently.

pub mod alerts;
pub mod carriers;
pub mod companies;
pub mod costs;
pub mod documents;
pub mod drivers;
pub mod routes;
pub mod trips;
pub mod users;
pub mod vehicles;
