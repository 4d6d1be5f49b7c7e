//! API request/response models for trips.

use crate::api::models::pagination::Pagination;
use crate::db::models::trips::TripDBResponse;
use crate::errors::Error;
use crate::types::{CarrierId, CompanyId, DriverId, RouteId, TripId, VehicleId};
use crate::validation::{Validate, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "trip_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Scheduled => "scheduled",
            TripStatus::InProgress => "in_progress",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }

    /// `scheduled -> in_progress -> completed`, and cancellation from either open state.
    pub fn can_transition_to(&self, next: TripStatus) -> bool {
        use TripStatus::*;
        matches!(
            (self, next),
            (Scheduled, InProgress) | (InProgress, Completed) | (Scheduled | InProgress, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }
}

/// Schedule a trip on a route. Driver and vehicle default to the route's assignment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TripSchedule {
    #[schema(value_type = String, format = "uuid")]
    pub route_id: RouteId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub driver_id: Option<DriverId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub vehicle_id: Option<VehicleId>,
    pub scheduled_for: DateTime<Utc>,
    pub passenger_count: Option<i32>,
    pub notes: Option<String>,
}

impl Validate for TripSchedule {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        if let Some(count) = self.passenger_count
            && count < 0
        {
            errors.add("passenger_count", "must not be negative");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TripStart {
    pub start_odometer_km: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TripComplete {
    pub end_odometer_km: Option<f64>,
    pub passenger_count: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TripCancel {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TripResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: TripId,
    #[schema(value_type = String, format = "uuid")]
    pub company_id: CompanyId,
    #[schema(value_type = String, format = "uuid")]
    pub route_id: RouteId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub carrier_id: Option<CarrierId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub driver_id: Option<DriverId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub vehicle_id: Option<VehicleId>,
    pub scheduled_for: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: TripStatus,
    pub passenger_count: Option<i32>,
    pub start_odometer_km: Option<f64>,
    pub end_odometer_km: Option<f64>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TripDBResponse> for TripResponse {
    fn from(db: TripDBResponse) -> Self {
        Self {
            id: db.id,
            company_id: db.company_id,
            route_id: db.route_id,
            carrier_id: db.carrier_id,
            driver_id: db.driver_id,
            vehicle_id: db.vehicle_id,
            scheduled_for: db.scheduled_for,
            started_at: db.started_at,
            finished_at: db.finished_at,
            status: db.status,
            passenger_count: db.passenger_count,
            start_odometer_km: db.start_odometer_km,
            end_odometer_km: db.end_odometer_km,
            notes: db.notes,
            cancellation_reason: db.cancellation_reason,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing (and exporting) trips
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListTripsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only honoured for admins
    #[param(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,

    #[param(value_type = Option<String>, format = "uuid")]
    pub carrier_id: Option<CarrierId>,

    #[param(value_type = Option<String>, format = "uuid")]
    pub route_id: Option<RouteId>,

    #[param(value_type = Option<String>, format = "uuid")]
    pub driver_id: Option<DriverId>,

    #[param(value_type = Option<String>, format = "uuid")]
    pub vehicle_id: Option<VehicleId>,

    pub status: Option<TripStatus>,

    /// Trips scheduled at or after this instant
    pub from: Option<DateTime<Utc>>,

    /// Trips scheduled before this instant
    pub to: Option<DateTime<Utc>>,
}
