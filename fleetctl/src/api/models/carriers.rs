//! API request/response models for carriers (transport subcontractors).

use crate::api::models::pagination::Pagination;
use crate::db::models::carriers::CarrierDBResponse;
use crate::errors::Error;
use crate::types::{CarrierId, CompanyId};
use crate::validation::{Validate, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CarrierCreate {
    /// Defaults to the caller's company for non-admin callers
    #[schema(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,
    pub name: String,
    pub tax_id: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub active: Option<bool>,
}

impl Validate for CarrierCreate {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        errors.require_non_blank("name", &self.name);
        errors.max_length("name", &self.name, 200);
        errors.email("email", self.email.as_deref());
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CarrierUpdate {
    pub name: Option<String>,
    pub tax_id: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub active: Option<bool>,
}

impl Validate for CarrierUpdate {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        errors.require_non_blank_opt("name", self.name.as_deref());
        errors.email("email", self.email.as_deref());
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CarrierResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CarrierId,
    #[schema(value_type = String, format = "uuid")]
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

impl From<CarrierDBResponse> for CarrierResponse {
    fn from(db: CarrierDBResponse) -> Self {
        Self {
            id: db.id,
            company_id: db.company_id,
            name: db.name,
            tax_id: db.tax_id,
            contact_name: db.contact_name,
            email: db.email,
            phone: db.phone,
            active: db.active,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing carriers
#[serde_as]
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListCarriersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on name, tax id and contact
    pub search: Option<String>,

    /// Only honoured for admins
    #[param(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<bool>)]
    pub active: Option<bool>,
}
