//! Database models for drivers.

use crate::api::models::drivers::{DriverCreate, DriverStatus, DriverUpdate};
use crate::types::{CarrierId, CompanyId, DriverId};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

/// Database request for creating a new driver
#[derive(Debug, Clone)]
pub struct DriverCreateDBRequest {
    pub company_id: CompanyId,
    pub carrier_id: Option<CarrierId>,
    pub name: String,
    pub document_number: String,
    pub license_number: Option<String>,
    pub license_category: Option<String>,
    pub license_expires_on: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: DriverStatus,
}

impl DriverCreateDBRequest {
    pub fn new(company_id: CompanyId, api: DriverCreate) -> Self {
        Self {
            company_id,
            carrier_id: api.carrier_id,
            name: api.name.trim().to_string(),
            document_number: api.document_number.trim().to_string(),
            license_number: api.license_number,
            license_category: api.license_category,
            license_expires_on: api.license_expires_on,
            phone: api.phone,
            email: api.email,
            status: api.status.unwrap_or(DriverStatus::Active),
        }
    }
}

/// Database request for updating a driver
///
/// `carrier_id` is `Some(None)` to detach the driver from its carrier.
#[derive(Debug, Clone, Default)]
pub struct DriverUpdateDBRequest {
    pub carrier_id: Option<Option<CarrierId>>,
    pub name: Option<String>,
    pub document_number: Option<String>,
    pub license_number: Option<String>,
    pub license_category: Option<String>,
    pub license_expires_on: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: Option<DriverStatus>,
}

impl From<DriverUpdate> for DriverUpdateDBRequest {
    fn from(api: DriverUpdate) -> Self {
        Self {
            carrier_id: api.carrier_id,
            name: api.name.map(|n| n.trim().to_string()),
            document_number: api.document_number.map(|d| d.trim().to_string()),
            license_number: api.license_number,
            license_category: api.license_category,
            license_expires_on: api.license_expires_on,
            phone: api.phone,
            email: api.email,
            status: api.status,
        }
    }
}

/// Database response for a driver
#[derive(Debug, Clone, FromRow)]
pub struct DriverDBResponse {
    pub id: DriverId,
    pub company_id: CompanyId,
    pub carrier_id: Option<CarrierId>,
    pub name: String,
    pub document_number: String,
    pub license_number: Option<String>,
    pub license_category: Option<String>,
    pub license_expires_on: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: DriverStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
