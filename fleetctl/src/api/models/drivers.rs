//! API request/response models for drivers.

use crate::api::models::pagination::Pagination;
use crate::db::models::drivers::DriverDBResponse;
use crate::errors::Error;
use crate::types::{CarrierId, CompanyId, DriverId};
use crate::validation::{Validate, ValidationErrors};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "driver_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Active,
    Inactive,
    OnLeave,
}

impl DriverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Active => "active",
            DriverStatus::Inactive => "inactive",
            DriverStatus::OnLeave => "on_leave",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DriverCreate {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub carrier_id: Option<CarrierId>,
    pub name: String,
    /// Personal document number (CPF); unique within the company
    pub document_number: String,
    pub license_number: Option<String>,
    pub license_category: Option<String>,
    pub license_expires_on: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: Option<DriverStatus>,
}

impl Validate for DriverCreate {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        errors.require_non_blank("name", &self.name);
        errors.max_length("name", &self.name, 200);
        errors.require_non_blank("document_number", &self.document_number);
        errors.require_non_blank_opt("license_number", self.license_number.as_deref());
        errors.email("email", self.email.as_deref());
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DriverUpdate {
    /// `null` detaches the driver from its carrier
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, format = "uuid")]
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

impl Validate for DriverUpdate {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        errors.require_non_blank_opt("name", self.name.as_deref());
        errors.require_non_blank_opt("document_number", self.document_number.as_deref());
        errors.email("email", self.email.as_deref());
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DriverResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: DriverId,
    #[schema(value_type = String, format = "uuid")]
    pub company_id: CompanyId,
    #[schema(value_type = Option<String>, format = "uuid")]
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

impl From<DriverDBResponse> for DriverResponse {
    fn from(db: DriverDBResponse) -> Self {
        Self {
            id: db.id,
            company_id: db.company_id,
            carrier_id: db.carrier_id,
            name: db.name,
            document_number: db.document_number,
            license_number: db.license_number,
            license_category: db.license_category,
            license_expires_on: db.license_expires_on,
            phone: db.phone,
            email: db.email,
            status: db.status,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing (and exporting) drivers
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListDriversQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on name, document and license number
    pub search: Option<String>,

    /// Only honoured for admins
    #[param(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,

    #[param(value_type = Option<String>, format = "uuid")]
    pub carrier_id: Option<CarrierId>,

    pub status: Option<DriverStatus>,
}
