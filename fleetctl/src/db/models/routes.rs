//! Database models for routes.

use crate::api::models::routes::{RouteCreate, RouteShift, RouteStatus, RouteUpdate};
use crate::types::{CarrierId, CompanyId, DriverId, RouteId, VehicleId};
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new route
#[derive(Debug, Clone)]
pub struct RouteCreateDBRequest {
    pub company_id: CompanyId,
    pub carrier_id: Option<CarrierId>,
    pub driver_id: Option<DriverId>,
    pub vehicle_id: Option<VehicleId>,
    pub code: String,
    pub name: String,
    pub origin: String,
    pub destination: String,
    pub distance_km: f64,
    pub departure_time: Option<NaiveTime>,
    pub shift: RouteShift,
    pub status: RouteStatus,
}

impl RouteCreateDBRequest {
    /// New routes always start out planned
    pub fn new(company_id: CompanyId, api: RouteCreate) -> Self {
        Self {
            company_id,
            carrier_id: api.carrier_id,
            driver_id: api.driver_id,
            vehicle_id: api.vehicle_id,
            code: api.code.trim().to_ascii_uppercase(),
            name: api.name.trim().to_string(),
            origin: api.origin.trim().to_string(),
            destination: api.destination.trim().to_string(),
            distance_km: api.distance_km,
            departure_time: api.departure_time,
            shift: api.shift,
            status: RouteStatus::Planned,
        }
    }
}

/// Database request for updating a route
///
/// Assignment fields are `Some(None)` to clear the assignment.
#[derive(Debug, Clone, Default)]
pub struct RouteUpdateDBRequest {
    pub carrier_id: Option<Option<CarrierId>>,
    pub driver_id: Option<Option<DriverId>>,
    pub vehicle_id: Option<Option<VehicleId>>,
    pub code: Option<String>,
    pub name: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub distance_km: Option<f64>,
    pub departure_time: Option<NaiveTime>,
    pub shift: Option<RouteShift>,
    pub status: Option<RouteStatus>,
}

impl From<RouteUpdate> for RouteUpdateDBRequest {
    fn from(api: RouteUpdate) -> Self {
        Self {
            code: api.code.map(|c| c.trim().to_ascii_uppercase()),
            name: api.name.map(|n| n.trim().to_string()),
            origin: api.origin.map(|o| o.trim().to_string()),
            destination: api.destination.map(|d| d.trim().to_string()),
            distance_km: api.distance_km,
            departure_time: api.departure_time,
            shift: api.shift,
            ..Default::default()
        }
    }
}

/// Database response for a route
#[derive(Debug, Clone, FromRow)]
pub struct RouteDBResponse {
    pub id: RouteId,
    pub company_id: CompanyId,
    pub carrier_id: Option<CarrierId>,
    pub driver_id: Option<DriverId>,
    pub vehicle_id: Option<VehicleId>,
    pub code: String,
    pub name: String,
    pub origin: String,
    pub destination: String,
    pub distance_km: f64,
    pub departure_time: Option<NaiveTime>,
    pub shift: RouteShift,
    pub status: RouteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
