//! Database models for documents.

use crate::api::models::documents::{DocumentCreate, DocumentOwnerKind, DocumentType, DocumentUpdate};
use crate::types::{CompanyId, DocumentId};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database request for creating a new document
#[derive(Debug, Clone)]
pub struct DocumentCreateDBRequest {
    pub company_id: CompanyId,
    pub owner_kind: DocumentOwnerKind,
    pub owner_id: Uuid,
    pub doc_type: DocumentType,
    pub number: String,
    pub issued_on: Option<NaiveDate>,
    pub expires_on: Option<NaiveDate>,
    pub file_url: Option<String>,
    pub notes: Option<String>,
}

impl DocumentCreateDBRequest {
    pub fn new(company_id: CompanyId, api: DocumentCreate) -> Self {
        Self {
            company_id,
            owner_kind: api.owner_kind,
            owner_id: api.owner_id,
            doc_type: api.doc_type,
            number: api.number.trim().to_string(),
            issued_on: api.issued_on,
            expires_on: api.expires_on,
            file_url: api.file_url,
            notes: api.notes,
        }
    }
}

/// Database request for updating a document
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdateDBRequest {
    pub doc_type: Option<DocumentType>,
    pub number: Option<String>,
    pub issued_on: Option<NaiveDate>,
    pub expires_on: Option<NaiveDate>,
    pub file_url: Option<String>,
    pub notes: Option<String>,
}

impl From<DocumentUpdate> for DocumentUpdateDBRequest {
    fn from(api: DocumentUpdate) -> Self {
        Self {
            doc_type: api.doc_type,
            number: api.number.map(|n| n.trim().to_string()),
            issued_on: api.issued_on,
            expires_on: api.expires_on,
            file_url: api.file_url,
            notes: api.notes,
        }
    }
}

/// Database response for a document
#[derive(Debug, Clone, FromRow)]
pub struct DocumentDBResponse {
    pub id: DocumentId,
    pub company_id: CompanyId,
    pub owner_kind: DocumentOwnerKind,
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
