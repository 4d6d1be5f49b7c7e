//! Database models for carriers.

use crate::api::models::carriers::{CarrierCreate, CarrierUpdate};
use crate::types::{CarrierId, CompanyId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new carrier
#[derive(Debug, Clone)]
pub struct CarrierCreateDBRequest {
    pub company_id: CompanyId,
    pub name: String,
    pub tax_id: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub active: bool,
}

impl CarrierCreateDBRequest {
    /// Build from the API request once the owning company has been resolved
    pub fn new(company_id: CompanyId, api: CarrierCreate) -> Self {
        Self {
            company_id,
            name: api.name.trim().to_string(),
            tax_id: api.tax_id,
            contact_name: api.contact_name,
            email: api.email,
            phone: api.phone,
            active: api.active.unwrap_or(true),
        }
    }
}

/// Database request for updating a carrier
#[derive(Debug, Clone, Default)]
pub struct CarrierUpdateDBRequest {
    pub name: Option<String>,
    pub tax_id: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub active: Option<bool>,
}

impl From<CarrierUpdate> for CarrierUpdateDBRequest {
    fn from(api: CarrierUpdate) -> Self {
        Self {
            name: api.name.map(|n| n.trim().to_string()),
            tax_id: api.tax_id,
            contact_name: api.contact_name,
            email: api.email,
            phone: api.phone,
            active: api.active,
        }
    }
}

/// Database response for a carrier
#[derive(Debug, Clone, FromRow)]
pub struct CarrierDBResponse {
    pub id: CarrierId,
    pub company_id: CompanyId,
    pub name: String,
    pub tax_id: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
