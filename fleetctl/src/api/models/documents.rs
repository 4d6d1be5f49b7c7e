//! API request/response models for compliance documents (licenses, registrations, policies).

use crate::api::models::pagination::Pagination;
use crate::db::models::documents::DocumentDBResponse;
use crate::errors::Error;
use crate::types::{CompanyId, DocumentId};
use crate::validation::{Validate, ValidationErrors};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "document_owner_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentOwnerKind {
    Company,
    Carrier,
    Driver,
    Vehicle,
}

impl DocumentOwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentOwnerKind::Company => "company",
            DocumentOwnerKind::Carrier => "carrier",
            DocumentOwnerKind::Driver => "driver",
            DocumentOwnerKind::Vehicle => "vehicle",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "document_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    DriverLicense,
    VehicleRegistration,
    Insurance,
    Inspection,
    Contract,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::DriverLicense => "driver_license",
            DocumentType::VehicleRegistration => "vehicle_registration",
            DocumentType::Insurance => "insurance",
            DocumentType::Inspection => "inspection",
            DocumentType::Contract => "contract",
            DocumentType::Other => "other",
        }
    }
}

/// Where a document stands relative to today and the warning window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryState {
    Expired,
    Expiring,
}

impl ExpiryState {
    /// `None` when the document has no expiry date or expires after the window.
    pub fn classify(expires_on: Option<NaiveDate>, today: NaiveDate, within_days: i64) -> Option<Self> {
        let expires_on = expires_on?;
        if expires_on < today {
            Some(ExpiryState::Expired)
        } else if (expires_on - today).num_days() <= within_days {
            Some(ExpiryState::Expiring)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentCreate {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,
    pub owner_kind: DocumentOwnerKind,
    /// Id of the company, carrier, driver or vehicle the document belongs to
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: Uuid,
    pub doc_type: DocumentType,
    pub number: String,
    pub issued_on: Option<NaiveDate>,
    pub expires_on: Option<NaiveDate>,
    pub file_url: Option<String>,
    pub notes: Option<String>,
}

fn check_dates(errors: &mut ValidationErrors, issued_on: Option<NaiveDate>, expires_on: Option<NaiveDate>) {
    if let (Some(issued), Some(expires)) = (issued_on, expires_on)
        && expires < issued
    {
        errors.add("expires_on", "must not be before issued_on");
    }
}

fn check_url(errors: &mut ValidationErrors, file_url: Option<&str>) {
    if let Some(url) = file_url
        && url::Url::parse(url).is_err()
    {
        errors.add("file_url", "must be an absolute url");
    }
}

impl Validate for DocumentCreate {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        errors.require_non_blank("number", &self.number);
        check_dates(&mut errors, self.issued_on, self.expires_on);
        check_url(&mut errors, self.file_url.as_deref());
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DocumentUpdate {
    pub doc_type: Option<DocumentType>,
    pub number: Option<String>,
    pub issued_on: Option<NaiveDate>,
    pub expires_on: Option<NaiveDate>,
    pub file_url: Option<String>,
    pub notes: Option<String>,
}

impl Validate for DocumentUpdate {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        errors.require_non_blank_opt("number", self.number.as_deref());
        check_dates(&mut errors, self.issued_on, self.expires_on);
        check_url(&mut errors, self.file_url.as_deref());
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: DocumentId,
    #[schema(value_type = String, format = "uuid")]
    pub company_id: CompanyId,
    pub owner_kind: DocumentOwnerKind,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: Uuid,
    pub doc_type: DocumentType,
    pub number: String,
    pub issued_on: Option<NaiveDate>,
    pub expires_on: Option<NaiveDate>,
    pub file_url: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DocumentDBResponse> for DocumentResponse {
    fn from(db: DocumentDBResponse) -> Self {
        Self {
            id: db.id,
            company_id: db.company_id,
            owner_kind: db.owner_kind,
            owner_id: db.owner_id,
            doc_type: db.doc_type,
            number: db.number,
            issued_on: db.issued_on,
            expires_on: db.expires_on,
            file_url: db.file_url,
            notes: db.notes,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// A document that is expired or about to expire.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExpiringDocumentResponse {
    #[serde(flatten)]
    pub document: DocumentResponse,
    pub expiry_state: ExpiryState,
    /// Negative when already expired
    pub days_until_expiry: i64,
}

/// Query parameters for listing (and exporting) documents
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListDocumentsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on number and notes
    pub search: Option<String>,

    /// Only honoured for admins
    #[param(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,

    pub owner_kind: Option<DocumentOwnerKind>,

    #[param(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<Uuid>,

    pub doc_type: Option<DocumentType>,
}

/// Query parameters for the expiring-documents listing
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ExpiringDocumentsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Window in days, defaults to the configured warning window
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<i64>, minimum = 0)]
    pub within_days: Option<i64>,

    /// Only honoured for admins
    #[param(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_expiry_classification() {
        let today = day(10);
        assert_eq!(ExpiryState::classify(Some(day(9)), today, 30), Some(ExpiryState::Expired));
        assert_eq!(ExpiryState::classify(Some(day(10)), today, 30), Some(ExpiryState::Expiring));
        assert_eq!(ExpiryState::classify(Some(day(20)), today, 10), Some(ExpiryState::Expiring));
        assert_eq!(ExpiryState::classify(Some(day(21)), today, 10), None);
        assert_eq!(ExpiryState::classify(None, today, 30), None);
    }

    #[test]
    fn test_document_validation() {
        let create = DocumentCreate {
            company_id: None,
            owner_kind: DocumentOwnerKind::Driver,
            owner_id: Uuid::new_v4(),
            doc_type: DocumentType::DriverLicense,
            number: " ".to_string(),
            issued_on: Some(day(10)),
            expires_on: Some(day(1)),
            file_url: Some("not a url".to_string()),
            notes: None,
        };
        let Err(Error::Validation { errors }) = create.validate() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["expires_on", "file_url", "number"]);
    }
}
