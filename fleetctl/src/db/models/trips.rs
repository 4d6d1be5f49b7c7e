//! Database models for trips.

use crate::api::models::trips::TripStatus;
use crate::types::{CarrierId, CompanyId, DriverId, RouteId, TripId, VehicleId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new trip
#[derive(Debug, Clone)]
pub struct TripCreateDBRequest {
    pub company_id: CompanyId,
    pub route_id: RouteId,
    pub carrier_id: Option<CarrierId>,
    pub driver_id: Option<DriverId>,
    pub vehicle_id: Option<VehicleId>,
    pub scheduled_for: DateTime<Utc>,
    pub passenger_count: Option<i32>,
    pub notes: Option<String>,
}

/// Database request for updating a trip
///
/// Trips only change through lifecycle commands, so this carries the fields those commands set.
#[derive(Debug, Clone, Default)]
pub struct TripUpdateDBRequest {
    pub status: Option<TripStatus>,
    pub driver_id: Option<Option<DriverId>>,
    pub vehicle_id: Option<Option<VehicleId>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub passenger_count: Option<i32>,
    pub start_odometer_km: Option<f64>,
    pub end_odometer_km: Option<f64>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
}

/// Database response for a trip
#[derive(Debug, Clone, FromRow)]
pub struct TripDBResponse {
    pub id: TripId,
    pub company_id: CompanyId,
    pub route_id: RouteId,
    pub carrier_id: Option<CarrierId>,
    pub driver_id: Option<DriverId>,
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

impl TripDBResponse {
    /// Distance driven according to the odometer readings, if both were recorded
    pub fn odometer_distance_km(&self) -> Option<f64> {
        match (self.start_odometer_km, self.end_odometer_km) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }
}
