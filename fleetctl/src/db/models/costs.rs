//! Database models for costs.

use crate::api::models::costs::{CostCategory, CostUpdate};
use crate::types::{CarrierId, CompanyId, CostId, RouteId, TripId, UserId, VehicleId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

/// Database request for recording a new cost
#[derive(Debug, Clone)]
pub struct CostCreateDBRequest {
    pub company_id: CompanyId,
    pub category: CostCategory,
    pub amount: Decimal,
    pub currency: String,
    pub incurred_on: NaiveDate,
    pub description: Option<String>,
    pub route_id: Option<RouteId>,
    pub vehicle_id: Option<VehicleId>,
    pub carrier_id: Option<CarrierId>,
    pub trip_id: Option<TripId>,
    pub recorded_by: Option<UserId>,
}

/// Database request for updating a cost
#[derive(Debug, Clone, Default)]
pub struct CostUpdateDBRequest {
    pub category: Option<CostCategory>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub incurred_on: Option<NaiveDate>,
    pub description: Option<String>,
    /// `Some(None)` clears the reference
    pub vehicle_id: Option<Option<VehicleId>>,
    pub carrier_id: Option<Option<CarrierId>>,
}

impl From<CostUpdate> for CostUpdateDBRequest {
    fn from(api: CostUpdate) -> Self {
        Self {
            category: api.category,
            amount: api.amount,
            currency: api.currency,
            incurred_on: api.incurred_on,
            description: api.description,
            ..Default::default()
        }
    }
}

/// Database response for a cost
#[derive(Debug, Clone, FromRow)]
pub struct CostDBResponse {
    pub id: CostId,
    pub company_id: CompanyId,
    pub category: CostCategory,
    pub amount: Decimal,
    pub currency: String,
    pub incurred_on: NaiveDate,
    pub description: Option<String>,
    pub route_id: Option<RouteId>,
    pub vehicle_id: Option<VehicleId>,
    pub carrier_id: Option<CarrierId>,
    pub trip_id: Option<TripId>,
    pub recorded_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
