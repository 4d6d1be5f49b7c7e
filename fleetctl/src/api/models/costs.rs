//! API request/response models for operating costs.

use crate::api::models::pagination::Pagination;
use crate::db::models::costs::CostDBResponse;
use crate::errors::Error;
use crate::types::{CarrierId, CompanyId, CostId, RouteId, TripId, UserId, VehicleId};
use crate::validation::{Validate, ValidationErrors, is_valid_currency};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Currency used when a cost does not name one
pub const DEFAULT_CURRENCY: &str = "BRL";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema)]
#[sqlx(type_name = "cost_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CostCategory {
    Fuel,
    Maintenance,
    Toll,
    Salary,
    Insurance,
    Parts,
    Other,
}

impl CostCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostCategory::Fuel => "fuel",
            CostCategory::Maintenance => "maintenance",
            CostCategory::Toll => "toll",
            CostCategory::Salary => "salary",
            CostCategory::Insurance => "insurance",
            CostCategory::Parts => "parts",
            CostCategory::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CostCreate {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,
    pub category: CostCategory,
    #[schema(value_type = String, example = "350.00")]
    pub amount: Decimal,
    /// ISO-4217 code, defaults to BRL
    pub currency: Option<String>,
    pub incurred_on: NaiveDate,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub route_id: Option<RouteId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub vehicle_id: Option<VehicleId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub carrier_id: Option<CarrierId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub trip_id: Option<TripId>,
}

impl Validate for CostCreate {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        errors.positive_amount("amount", self.amount);
        if let Some(currency) = &self.currency
            && !is_valid_currency(currency)
        {
            errors.add("currency", "must be a three letter ISO-4217 code");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CostUpdate {
    pub category: Option<CostCategory>,
    #[schema(value_type = Option<String>, example = "350.00")]
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub incurred_on: Option<NaiveDate>,
    pub description: Option<String>,
}

impl Validate for CostUpdate {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        if let Some(amount) = self.amount {
            errors.positive_amount("amount", amount);
        }
        if let Some(currency) = &self.currency
            && !is_valid_currency(currency)
        {
            errors.add("currency", "must be a three letter ISO-4217 code");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CostResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CostId,
    #[schema(value_type = String, format = "uuid")]
    pub company_id: CompanyId,
    pub category: CostCategory,
    #[schema(value_type = String, example = "350.00")]
    pub amount: Decimal,
    pub currency: String,
    pub incurred_on: NaiveDate,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub route_id: Option<RouteId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub vehicle_id: Option<VehicleId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub carrier_id: Option<CarrierId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub trip_id: Option<TripId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub recorded_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CostDBResponse> for CostResponse {
    fn from(db: CostDBResponse) -> Self {
        Self {
            id: db.id,
            company_id: db.company_id,
            category: db.category,
            amount: db.amount,
            currency: db.currency,
            incurred_on: db.incurred_on,
            description: db.description,
            route_id: db.route_id,
            vehicle_id: db.vehicle_id,
            carrier_id: db.carrier_id,
            trip_id: db.trip_id,
            recorded_by: db.recorded_by,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing (and exporting) costs
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListCostsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only honoured for admins
    #[param(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,

    pub category: Option<CostCategory>,

    #[param(value_type = Option<String>, format = "uuid")]
    pub route_id: Option<RouteId>,

    #[param(value_type = Option<String>, format = "uuid")]
    pub vehicle_id: Option<VehicleId>,

    #[param(value_type = Option<String>, format = "uuid")]
    pub carrier_id: Option<CarrierId>,

    /// First day included (inclusive)
    pub from: Option<NaiveDate>,

    /// Last day included (inclusive)
    pub to: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_cost_validation() {
        let create = CostCreate {
            company_id: None,
            category: CostCategory::Fuel,
            amount: Decimal::from_str("-10.00").unwrap(),
            currency: Some("reais".to_string()),
            incurred_on: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            description: None,
            route_id: None,
            vehicle_id: None,
            carrier_id: None,
            trip_id: None,
        };
        let Err(Error::Validation { errors }) = create.validate() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["amount", "currency"]);
    }

    #[test]
    fn test_amount_accepts_string_and_number() {
        let from_str: CostUpdate = serde_json::from_str(r#"{"amount": "12.50"}"#).unwrap();
        let from_num: CostUpdate = serde_json::from_str(r#"{"amount": 12.5}"#).unwrap();
        assert_eq!(from_str.amount, from_num.amount);
    }
}
