//! API request/response models for vehicles.

use crate::api::models::pagination::Pagination;
use crate::db::models::vehicles::VehicleDBResponse;
use crate::errors::Error;
use crate::types::{CarrierId, CompanyId, VehicleId};
use crate::validation::{Validate, ValidationErrors, is_valid_plate, is_valid_vehicle_year};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "vehicle_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VehicleKind {
    Bus,
    Minibus,
    Van,
    Car,
    Truck,
}

impl VehicleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleKind::Bus => "bus",
            VehicleKind::Minibus => "minibus",
            VehicleKind::Van => "van",
            VehicleKind::Car => "car",
            VehicleKind::Truck => "truck",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "vehicle_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    InService,
    Maintenance,
    Inactive,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Available => "available",
            VehicleStatus::InService => "in_service",
            VehicleStatus::Maintenance => "maintenance",
            VehicleStatus::Inactive => "inactive",
        }
    }

    /// Vehicles in maintenance or retired cannot be put on a route or a trip
    pub fn is_assignable(&self) -> bool {
        matches!(self, VehicleStatus::Available | VehicleStatus::InService)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VehicleCreate {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub carrier_id: Option<CarrierId>,
    /// License plate, `ABC-1234` or Mercosur `ABC1D23`; stored uppercased without separators
    pub plate: String,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub year: Option<i32>,
    /// Seated passenger capacity
    pub capacity: Option<i32>,
    pub kind: VehicleKind,
    pub status: Option<VehicleStatus>,
    pub odometer_km: Option<f64>,
}

fn check_common(errors: &mut ValidationErrors, year: Option<i32>, capacity: Option<i32>, odometer_km: Option<f64>) {
    if let Some(year) = year
        && !is_valid_vehicle_year(year)
    {
        errors.add("year", "is out of range");
    }
    if let Some(capacity) = capacity
        && capacity < 1
    {
        errors.add("capacity", "must be at least 1");
    }
    errors.non_negative("odometer_km", odometer_km);
}

impl Validate for VehicleCreate {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        if !is_valid_plate(&self.plate) {
            errors.add("plate", "must be a valid license plate");
        }
        check_common(&mut errors, self.year, self.capacity, self.odometer_km);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct VehicleUpdate {
    /// `null` detaches the vehicle from its carrier
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, format = "uuid")]
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

impl Validate for VehicleUpdate {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        if let Some(plate) = &self.plate
            && !is_valid_plate(plate)
        {
            errors.add("plate", "must be a valid license plate");
        }
        check_common(&mut errors, self.year, self.capacity, self.odometer_km);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VehicleResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: VehicleId,
    #[schema(value_type = String, format = "uuid")]
    pub company_id: CompanyId,
    #[schema(value_type = Option<String>, format = "uuid")]
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

impl From<VehicleDBResponse> for VehicleResponse {
    fn from(db: VehicleDBResponse) -> Self {
        Self {
            id: db.id,
            company_id: db.company_id,
            carrier_id: db.carrier_id,
            plate: db.plate,
            model: db.model,
            manufacturer: db.manufacturer,
            year: db.year,
            capacity: db.capacity,
            kind: db.kind,
            status: db.status,
            odometer_km: db.odometer_km,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing (and exporting) vehicles
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListVehiclesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on plate, model and manufacturer
    pub search: Option<String>,

    /// Only honoured for admins
    #[param(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,

    #[param(value_type = Option<String>, format = "uuid")]
    pub carrier_id: Option<CarrierId>,

    pub status: Option<VehicleStatus>,

    pub kind: Option<VehicleKind>,
}
