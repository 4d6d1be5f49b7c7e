//! Database models for vehicles.

use crate::api::models::vehicles::{VehicleCreate, VehicleKind, VehicleStatus, VehicleUpdate};
use crate::types::{CarrierId, CompanyId, VehicleId};
use crate::validation::normalize_plate;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new vehicle
#[derive(Debug, Clone)]
pub struct VehicleCreateDBRequest {
    pub company_id: CompanyId,
    pub carrier_id: Option<CarrierId>,
    pub plate: String,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub year: Option<i32>,
    pub capacity: Option<i32>,
    pub kind: VehicleKind,
    pub status: VehicleStatus,
    pub odometer_km: f64,
}

impl VehicleCreateDBRequest {
    pub fn new(company_id: CompanyId, api: VehicleCreate) -> Self {
        Self {
            company_id,
            carrier_id: api.carrier_id,
            plate: normalize_plate(&api.plate),
            model: api.model,
            manufacturer: api.manufacturer,
            year: api.year,
            capacity: api.capacity,
            kind: api.kind,
            status: api.status.unwrap_or(VehicleStatus::Available),
            odometer_km: api.odometer_km.unwrap_or(0.0),
        }
    }
}

/// Database request for updating a vehicle
#[derive(Debug, Clone, Default)]
pub struct VehicleUpdateDBRequest {
    pub carrier_id: Option<Option<CarrierId>>,
    pub plate: Option<String>,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub year: Option<i32>,
    pub capacity: Option<i32>,
    pub kind: Option<VehicleKind>,
    pub status: Option<VehicleStatus>,
    pub odometer_km: Option<f64>,
}

impl VehicleUpdateDBRequest {
    /// Status-only update, used by the trip lifecycle
    pub fn status(status: VehicleStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

impl From<VehicleUpdate> for VehicleUpdateDBRequest {
    fn from(api: VehicleUpdate) -> Self {
        Self {
            carrier_id: api.carrier_id,
            plate: api.plate.as_deref().map(normalize_plate),
            model: api.model,
            manufacturer: api.manufacturer,
            year: api.year,
            capacity: api.capacity,
            kind: api.kind,
            status: api.status,
            odometer_km: api.odometer_km,
        }
    }
}

/// Database response for a vehicle
#[derive(Debug, Clone, FromRow)]
pub struct VehicleDBResponse {
    pub id: VehicleId,
    pub company_id: CompanyId,
    pub carrier_id: Option<CarrierId>,
    pub plate: String,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub year: Option<i32>,
    pub capacity: Option<i32>,
    pub kind: VehicleKind,
    pub status: VehicleStatus,
    pub odometer_km: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
