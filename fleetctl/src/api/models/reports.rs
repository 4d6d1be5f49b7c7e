//! API models for the fleet report and the dashboard.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::types::CompanyId;

/// Query parameters for the summary report (and its export)
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ReportQuery {
    /// Only honoured for admins; omitted means every company
    #[param(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,
    /// First day of the range (inclusive). Defaults to 30 days before `to`.
    pub from: Option<NaiveDate>,
    /// Last day of the range (inclusive). Defaults to today.
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DashboardQuery {
    /// Only honoured for admins
    #[param(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,
}

/// Operational summary for a date range
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FleetReport {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Current route count by status
    pub routes_by_status: BTreeMap<String, i64>,
    pub drivers_by_status: BTreeMap<String, i64>,
    pub vehicles_by_status: BTreeMap<String, i64>,
    /// Trips scheduled within the range, by status
    pub trips_by_status: BTreeMap<String, i64>,
    pub total_trips: i64,
    /// completed / (completed + cancelled); absent when no trip finished either way
    pub completion_rate: Option<f64>,
    /// Odometer distance of completed trips, falling back to the route distance
    pub total_distance_km: f64,
    #[schema(value_type = BTreeMap<String, String>)]
    pub costs_by_category: BTreeMap<String, Decimal>,
    #[schema(value_type = String, example = "15230.75")]
    pub total_cost: Decimal,
    /// Absent when no distance was driven
    #[schema(value_type = Option<String>, example = "3.42")]
    pub cost_per_km: Option<Decimal>,
    /// Alerts raised within the range, by severity
    pub alerts_by_severity: BTreeMap<String, i64>,
    /// Alerts raised within the range that are not yet resolved
    pub open_alerts: i64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,
    pub active_routes: i64,
    /// Trips scheduled for today (UTC), by status
    pub trips_today: BTreeMap<String, i64>,
    /// Unresolved alerts by severity
    pub open_alerts_by_severity: BTreeMap<String, i64>,
    pub vehicles_by_status: BTreeMap<String, i64>,
    /// Documents expired or expiring within the warning window
    pub expiring_documents: i64,
    #[schema(value_type = String, example = "4210.00")]
    pub month_to_date_cost: Decimal,
    pub generated_at: DateTime<Utc>,
}
