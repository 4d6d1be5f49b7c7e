//! Database models for alerts.

use crate::api::models::alerts::{AlertKind, AlertSeverity, AlertStatus};
use crate::types::{AlertId, CompanyId, DriverId, RouteId, TripId, UserId, VehicleId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for raising a new alert
#[derive(Debug, Clone)]
pub struct AlertCreateDBRequest {
    pub company_id: CompanyId,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub title: String,
    pub description: Option<String>,
    pub route_id: Option<RouteId>,
    pub trip_id: Option<TripId>,
    pub vehicle_id: Option<VehicleId>,
    pub driver_id: Option<DriverId>,
    pub raised_by: Option<UserId>,
}

/// Database request for updating an alert
#[derive(Debug, Clone, Default)]
pub struct AlertUpdateDBRequest {
    pub status: Option<AlertStatus>,
    pub acknowledged_by: Option<UserId>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    /// `Some(None)` clears the reference
    pub vehicle_id: Option<Option<VehicleId>>,
    pub driver_id: Option<Option<DriverId>>,
}

/// Database response for an alert
#[derive(Debug, Clone, FromRow)]
pub struct AlertDBResponse {
    pub id: AlertId,
    pub company_id: CompanyId,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub title: String,
    pub description: Option<String>,
    pub route_id: Option<RouteId>,
    pub trip_id: Option<TripId>,
    pub vehicle_id: Option<VehicleId>,
    pub driver_id: Option<DriverId>,
    pub raised_by: Option<UserId>,
    pub acknowledged_by: Option<UserId>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
