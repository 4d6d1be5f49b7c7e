//! API request/response models for operational alerts.

use crate::api::models::pagination::Pagination;
use crate::db::models::alerts::AlertDBResponse;
use crate::errors::Error;
use crate::types::{AlertId, CompanyId, DriverId, RouteId, TripId, UserId, VehicleId};
use crate::validation::{Validate, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "alert_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Delay,
    Breakdown,
    Accident,
    DocumentExpiring,
    MaintenanceDue,
    RouteDeviation,
    Other,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Delay => "delay",
            AlertKind::Breakdown => "breakdown",
            AlertKind::Accident => "accident",
            AlertKind::DocumentExpiring => "document_expiring",
            AlertKind::MaintenanceDue => "maintenance_due",
            AlertKind::RouteDeviation => "route_deviation",
            AlertKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema)]
#[sqlx(type_name = "alert_severity", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub const ALL: [AlertSeverity; 4] = [
        AlertSeverity::Low,
        AlertSeverity::Medium,
        AlertSeverity::High,
        AlertSeverity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "alert_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "open",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
        }
    }

    /// `open -> acknowledged -> resolved`, or straight from open to resolved.
    pub fn can_transition_to(&self, next: AlertStatus) -> bool {
        use AlertStatus::*;
        matches!((self, next), (Open, Acknowledged) | (Open | Acknowledged, Resolved))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlertCreate {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub route_id: Option<RouteId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub trip_id: Option<TripId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub vehicle_id: Option<VehicleId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub driver_id: Option<DriverId>,
}

impl Validate for AlertCreate {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        errors.require_non_blank("title", &self.title);
        errors.max_length("title", &self.title, 200);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AlertResolve {
    pub resolution_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlertResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AlertId,
    #[schema(value_type = String, format = "uuid")]
    pub company_id: CompanyId,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub route_id: Option<RouteId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub trip_id: Option<TripId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub vehicle_id: Option<VehicleId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub driver_id: Option<DriverId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub raised_by: Option<UserId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub acknowledged_by: Option<UserId>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AlertDBResponse> for AlertResponse {
    fn from(db: AlertDBResponse) -> Self {
        Self {
            id: db.id,
            company_id: db.company_id,
            kind: db.kind,
            severity: db.severity,
            status: db.status,
            title: db.title,
            description: db.description,
            route_id: db.route_id,
            trip_id: db.trip_id,
            vehicle_id: db.vehicle_id,
            driver_id: db.driver_id,
            raised_by: db.raised_by,
            acknowledged_by: db.acknowledged_by,
            acknowledged_at: db.acknowledged_at,
            resolved_by: db.resolved_by,
            resolved_at: db.resolved_at,
            resolution_notes: db.resolution_notes,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing (and exporting) alerts
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListAlertsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on title and description
    pub search: Option<String>,

    /// Only honoured for admins
    #[param(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,

    pub status: Option<AlertStatus>,

    pub severity: Option<AlertSeverity>,

    pub kind: Option<AlertKind>,

    #[param(value_type = Option<String>, format = "uuid")]
    pub route_id: Option<RouteId>,

    #[param(value_type = Option<String>, format = "uuid")]
    pub vehicle_id: Option<VehicleId>,

    #[param(value_type = Option<String>, format = "uuid")]
    pub driver_id: Option<DriverId>,

    /// Alerts raised at or after this instant
    pub from: Option<DateTime<Utc>>,

    /// Alerts raised before this instant
    pub to: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_lifecycle() {
        use AlertStatus::*;
        assert!(Open.can_transition_to(Acknowledged));
        assert!(Open.can_transition_to(Resolved));
        assert!(Acknowledged.can_transition_to(Resolved));

        assert!(!Acknowledged.can_transition_to(Acknowledged));
        assert!(!Resolved.can_transition_to(Open));
        assert!(!Resolved.can_transition_to(Acknowledged));
        assert!(!Acknowledged.can_transition_to(Open));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Critical > AlertSeverity::High);
        assert!(AlertSeverity::Low < AlertSeverity::Medium);
    }

    #[test]
    fn test_status_binds_as_postgres_array() {
        use sqlx::{TypeInfo, postgres::PgHasArrayType};
        assert_eq!(AlertStatus::array_type_info().name(), "alert_status[]");
    }
}
