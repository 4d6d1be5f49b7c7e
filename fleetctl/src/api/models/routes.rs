//! API request/response models for routes.

use crate::api::models::alerts::AlertResponse;
use crate::api::models::carriers::CarrierResponse;
use crate::api::models::drivers::DriverResponse;
use crate::api::models::pagination::Pagination;
use crate::api::models::trips::TripResponse;
use crate::api::models::vehicles::VehicleResponse;
use crate::db::models::routes::RouteDBResponse;
use crate::errors::Error;
use crate::types::{CarrierId, CompanyId, DriverId, RouteId, VehicleId};
use crate::validation::{Validate, ValidationErrors};
use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "route_shift", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RouteShift {
    Morning,
    Afternoon,
    Night,
}

impl RouteShift {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteShift::Morning => "morning",
            RouteShift::Afternoon => "afternoon",
            RouteShift::Night => "night",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "route_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Planned,
    Active,
    Suspended,
    Cancelled,
}

impl RouteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStatus::Planned => "planned",
            RouteStatus::Active => "active",
            RouteStatus::Suspended => "suspended",
            RouteStatus::Cancelled => "cancelled",
        }
    }

    /// Planned routes go active, active and suspended toggle, anything but cancelled can be
    /// cancelled. Cancelled is terminal.
    pub fn can_transition_to(&self, next: RouteStatus) -> bool {
        use RouteStatus::*;
        matches!(
            (self, next),
            (Planned, Active) | (Active, Suspended) | (Suspended, Active) | (Planned | Active | Suspended, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RouteCreate {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub carrier_id: Option<CarrierId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub driver_id: Option<DriverId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub vehicle_id: Option<VehicleId>,
    /// Short operator-facing code, unique within the company
    pub code: String,
    pub name: String,
    pub origin: String,
    pub destination: String,
    pub distance_km: f64,
    #[schema(value_type = Option<String>, example = "06:30:00")]
    pub departure_time: Option<NaiveTime>,
    pub shift: RouteShift,
}

impl Validate for RouteCreate {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        errors.require_non_blank("code", &self.code);
        errors.max_length("code", &self.code, 32);
        errors.require_non_blank("name", &self.name);
        errors.require_non_blank("origin", &self.origin);
        errors.require_non_blank("destination", &self.destination);
        errors.non_negative("distance_km", Some(self.distance_km));
        errors.into_result()
    }
}

/// Descriptive fields of a route. Status and assignments change through their own endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RouteUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub distance_km: Option<f64>,
    #[schema(value_type = Option<String>, example = "06:30:00")]
    pub departure_time: Option<NaiveTime>,
    pub shift: Option<RouteShift>,
}

impl Validate for RouteUpdate {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        errors.require_non_blank_opt("code", self.code.as_deref());
        errors.require_non_blank_opt("name", self.name.as_deref());
        errors.require_non_blank_opt("origin", self.origin.as_deref());
        errors.require_non_blank_opt("destination", self.destination.as_deref());
        errors.non_negative("distance_km", self.distance_km);
        errors.into_result()
    }
}

/// Assign or clear the carrier, driver and vehicle of a route. Absent fields are left alone,
/// `null` clears the assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RouteAssignment {
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub carrier_id: Option<Option<CarrierId>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub driver_id: Option<Option<DriverId>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub vehicle_id: Option<Option<VehicleId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RouteStatusChange {
    pub status: RouteStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RouteResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: RouteId,
    #[schema(value_type = String, format = "uuid")]
    pub company_id: CompanyId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub carrier_id: Option<CarrierId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub driver_id: Option<DriverId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub vehicle_id: Option<VehicleId>,
    pub code: String,
    pub name: String,
    pub origin: String,
    pub destination: String,
    pub distance_km: f64,
    #[schema(value_type = Option<String>, example = "06:30:00")]
    pub departure_time: Option<NaiveTime>,
    pub shift: RouteShift,
    pub status: RouteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RouteDBResponse> for RouteResponse {
    fn from(db: RouteDBResponse) -> Self {
        Self {
            id: db.id,
            company_id: db.company_id,
            carrier_id: db.carrier_id,
            driver_id: db.driver_id,
            vehicle_id: db.vehicle_id,
            code: db.code,
            name: db.name,
            origin: db.origin,
            destination: db.destination,
            distance_km: db.distance_km,
            departure_time: db.departure_time,
            shift: db.shift,
            status: db.status,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// A route with its assignments resolved, its latest trips and open alerts.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RouteDetailsResponse {
    pub route: RouteResponse,
    pub carrier: Option<CarrierResponse>,
    pub driver: Option<DriverResponse>,
    pub vehicle: Option<VehicleResponse>,
    pub recent_trips: Vec<TripResponse>,
    /// Empty for callers that cannot read alerts
    pub open_alerts: Vec<AlertResponse>,
    /// Sum of all costs recorded against the route; absent for callers that cannot read costs
    #[schema(value_type = Option<String>, example = "1520.50")]
    pub total_cost: Option<Decimal>,
}

/// Query parameters for listing (and exporting) routes
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListRoutesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on code, name, origin and destination
    pub search: Option<String>,

    /// Only honoured for admins
    #[param(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,

    #[param(value_type = Option<String>, format = "uuid")]
    pub carrier_id: Option<CarrierId>,

    #[param(value_type = Option<String>, format = "uuid")]
    pub driver_id: Option<DriverId>,

    #[param(value_type = Option<String>, format = "uuid")]
    pub vehicle_id: Option<VehicleId>,

    pub status: Option<RouteStatus>,

    pub shift: Option<RouteShift>,
}
