//! Repository implementations for database access.
//!
//! Each entity module holds a Postgres repository, the entity's filter type and the
//! [`in_memory::InMemoryRecord`] description used by the in-memory backend.
//!
//! # Available Repositories
//!
//! - [`Companies`], [`Carriers`], [`Drivers`], [`Vehicles`]: tenant master data
//! - [`Routes`], [`Trips`]: planned routes and their executions
//! - [`Alerts`], [`Costs`], [`Documents`]: operational records
//! - [`Users`]: accounts and roles, with the extra [`UserStore`] lookups
//!
//! # Common Pattern
//!
//! Repositories are built once at startup and shared through [`crate::db::Stores`]:
//!
//! ```ignore
//! use fleetctl::db::{Stores, handlers::{Repository, vehicles::VehicleFilter}};
//!
//! async fn example(stores: &Stores, company_id: uuid::Uuid) -> anyhow::Result<()> {
//!     let filter = VehicleFilter::new(0, 10).with_company(company_id);
//!     let vehicles = stores.vehicles.list(&filter).await?;
//!     let total = stores.vehicles.count(&filter).await?;
//!     println!("{} of {total}", vehicles.len());
//!     Ok(())
//! }
//! ```

pub mod alerts;
pub mod carriers;
pub mod companies;
pub mod costs;
pub mod documents;
pub mod drivers;
pub mod in_memory;
pub mod repository;
pub mod routes;
pub mod trips;
pub mod users;
pub mod vehicles;

pub use alerts::Alerts;
pub use carriers::Carriers;
pub use companies::Companies;
pub use costs::Costs;
pub use documents::Documents;
pub use drivers::Drivers;
pub use repository::Repository;
pub use routes::Routes;
pub use trips::Trips;
pub use users::{UserStore, Users};
pub use vehicles::Vehicles;
