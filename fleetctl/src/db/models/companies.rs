//! Database models for companies.

use crate::api::models::companies::{CompanyCreate, CompanyUpdate};
use crate::types::CompanyId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new company
#[derive(Debug, Clone)]
pub struct CompanyCreateDBRequest {
    pub name: String,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub active: bool,
}

impl From<CompanyCreate> for CompanyCreateDBRequest {
    fn from(api: CompanyCreate) -> Self {
        Self {
            name: api.name.trim().to_string(),
            tax_id: api.tax_id,
            email: api.email,
            phone: api.phone,
            address: api.address,
            city: api.city,
            state: api.state,
            active: api.active.unwrap_or(true),
        }
    }
}

/// Database request for updating a company
#[derive(Debug, Clone, Default)]
pub struct CompanyUpdateDBRequest {
    pub name: Option<String>,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub active: Option<bool>,
}

impl From<CompanyUpdate> for CompanyUpdateDBRequest {
    fn from(api: CompanyUpdate) -> Self {
        Self {
            name: api.name.map(|n| n.trim().to_string()),
            tax_id: api.tax_id,
            email: api.email,
            phone: api.phone,
            address: api.address,
            city: api.city,
            state: api.state,
            active: api.active,
        }
    }
}

/// Database response for a company
#[derive(Debug, Clone, FromRow)]
pub struct CompanyDBResponse {
    pub id: CompanyId,
    pub name: String,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
