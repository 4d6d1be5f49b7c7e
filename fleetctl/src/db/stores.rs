//! The set of repositories the application runs against.

use std::sync::Arc;

use sqlx::PgPool;

use crate::db::handlers::alerts::AlertFilter;
use crate::db::handlers::carriers::CarrierFilter;
use crate::db::handlers::companies::CompanyFilter;
use crate::db::handlers::costs::CostFilter;
use crate::db::handlers::documents::DocumentFilter;
use crate::db::handlers::drivers::DriverFilter;
use crate::db::handlers::in_memory::InMemoryRepository;
use crate::db::handlers::repository::SharedRepository;
use crate::db::handlers::routes::RouteFilter;
use crate::db::handlers::trips::TripFilter;
use crate::db::handlers::vehicles::VehicleFilter;
use crate::db::handlers::{Alerts, Carriers, Companies, Costs, Documents, Drivers, Routes, Trips, UserStore, Users, Vehicles};
use crate::db::models::{
    alerts::{AlertCreateDBRequest, AlertDBResponse, AlertUpdateDBRequest},
    carriers::{CarrierCreateDBRequest, CarrierDBResponse, CarrierUpdateDBRequest},
    companies::{CompanyCreateDBRequest, CompanyDBResponse, CompanyUpdateDBRequest},
    costs::{CostCreateDBRequest, CostDBResponse, CostUpdateDBRequest},
    documents::{DocumentCreateDBRequest, DocumentDBResponse, DocumentUpdateDBRequest},
    drivers::{DriverCreateDBRequest, DriverDBResponse, DriverUpdateDBRequest},
    routes::{RouteCreateDBRequest, RouteDBResponse, RouteUpdateDBRequest},
    trips::{TripCreateDBRequest, TripDBResponse, TripUpdateDBRequest},
    users::UserDBResponse,
    vehicles::{VehicleCreateDBRequest, VehicleDBResponse, VehicleUpdateDBRequest},
};

pub type CompanyStore = SharedRepository<CompanyCreateDBRequest, CompanyUpdateDBRequest, CompanyDBResponse, CompanyFilter>;
pub type CarrierStore = SharedRepository<CarrierCreateDBRequest, CarrierUpdateDBRequest, CarrierDBResponse, CarrierFilter>;
pub type DriverStore = SharedRepository<DriverCreateDBRequest, DriverUpdateDBRequest, DriverDBResponse, DriverFilter>;
pub type VehicleStore = SharedRepository<VehicleCreateDBRequest, VehicleUpdateDBRequest, VehicleDBResponse, VehicleFilter>;
pub type RouteStore = SharedRepository<RouteCreateDBRequest, RouteUpdateDBRequest, RouteDBResponse, RouteFilter>;
pub type TripStore = SharedRepository<TripCreateDBRequest, TripUpdateDBRequest, TripDBResponse, TripFilter>;
pub type AlertStore = SharedRepository<AlertCreateDBRequest, AlertUpdateDBRequest, AlertDBResponse, AlertFilter>;
pub type CostStore = SharedRepository<CostCreateDBRequest, CostUpdateDBRequest, CostDBResponse, CostFilter>;
pub type DocumentStore = SharedRepository<DocumentCreateDBRequest, DocumentUpdateDBRequest, DocumentDBResponse, DocumentFilter>;

/// One repository per entity, behind trait objects so handlers don't care which backend is live.
#[derive(Clone)]
pub struct Stores {
    pub companies: CompanyStore,
    pub carriers: CarrierStore,
    pub drivers: DriverStore,
    pub vehicles: VehicleStore,
    pub routes: RouteStore,
    pub trips: TripStore,
    pub alerts: AlertStore,
    pub costs: CostStore,
    pub documents: DocumentStore,
    pub users: Arc<dyn UserStore>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            companies: Arc::new(Companies::new(pool.clone())),
            carriers: Arc::new(Carriers::new(pool.clone())),
            drivers: Arc::new(Drivers::new(pool.clone())),
            vehicles: Arc::new(Vehicles::new(pool.clone())),
            routes: Arc::new(Routes::new(pool.clone())),
            trips: Arc::new(Trips::new(pool.clone())),
            alerts: Arc::new(Alerts::new(pool.clone())),
            costs: Arc::new(Costs::new(pool.clone())),
            documents: Arc::new(Documents::new(pool.clone())),
            users: Arc::new(Users::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            companies: Arc::new(InMemoryRepository::<CompanyDBResponse>::new()),
            carriers: Arc::new(InMemoryRepository::<CarrierDBResponse>::new()),
            drivers: Arc::new(InMemoryRepository::<DriverDBResponse>::new()),
            vehicles: Arc::new(InMemoryRepository::<VehicleDBResponse>::new()),
            routes: Arc::new(InMemoryRepository::<RouteDBResponse>::new()),
            trips: Arc::new(InMemoryRepository::<TripDBResponse>::new()),
            alerts: Arc::new(InMemoryRepository::<AlertDBResponse>::new()),
            costs: Arc::new(InMemoryRepository::<CostDBResponse>::new()),
            documents: Arc::new(InMemoryRepository::<DocumentDBResponse>::new()),
            users: Arc::new(InMemoryRepository::<UserDBResponse>::new()),
        }
    }
}
