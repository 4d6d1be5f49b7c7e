//! API request/response models for companies (tenants).

use crate::api::models::pagination::Pagination;
use crate::db::models::companies::CompanyDBResponse;
use crate::errors::Error;
use crate::types::CompanyId;
use crate::validation::{Validate, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompanyCreate {
    pub name: String,
    /// National registration number (CNPJ); unique when present
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub active: Option<bool>,
}

impl Validate for CompanyCreate {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        errors.require_non_blank("name", &self.name);
        errors.max_length("name", &self.name, 200);
        errors.require_non_blank_opt("tax_id", self.tax_id.as_deref());
        errors.email("email", self.email.as_deref());
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CompanyUpdate {
    pub name: Option<String>,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub active: Option<bool>,
}

impl Validate for CompanyUpdate {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            errors.require_non_blank("name", name);
            errors.max_length("name", name, 200);
        }
        errors.require_non_blank_opt("tax_id", self.tax_id.as_deref());
        errors.email("email", self.email.as_deref());
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompanyResponse {
    #[schema(value_type = String, format = "uuid")]
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

impl From<CompanyDBResponse> for CompanyResponse {
    fn from(db: CompanyDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            tax_id: db.tax_id,
            email: db.email,
            phone: db.phone,
            address: db.address,
            city: db.city,
            state: db.state,
            active: db.active,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing companies
#[serde_as]
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListCompaniesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on name, tax id and city
    pub search: Option<String>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<bool>)]
    pub active: Option<bool>,
}
