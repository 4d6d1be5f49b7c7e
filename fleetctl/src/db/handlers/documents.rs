//! Database repository for documents.

use crate::api::models::documents::{DocumentOwnerKind, DocumentType};
use crate::db::errors::{DbError, Result};
use crate::db::handlers::in_memory::{InMemoryRecord, contains_ci, matches_opt, opt_contains_ci};
use crate::db::handlers::repository::Repository;
use crate::db::models::documents::{DocumentCreateDBRequest, DocumentDBResponse, DocumentUpdateDBRequest};
use crate::types::{CompanyId, DocumentId, abbrev_uuid};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing documents
#[derive(Debug, Clone)]
pub struct DocumentFilter {
    pub skip: i64,
    pub limit: i64,
    pub company_id: Option<CompanyId>,
    pub owner_kind: Option<DocumentOwnerKind>,
    pub owner_id: Option<Uuid>,
    pub doc_type: Option<DocumentType>,
    /// Only documents with an expiry date on or before this day
    pub expires_on_or_before: Option<NaiveDate>,
    /// Case-insensitive substring search on number and notes
    pub search: Option<String>,
}

impl DocumentFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            company_id: None,
            owner_kind: None,
            owner_id: None,
            doc_type: None,
            expires_on_or_before: None,
            search: None,
        }
    }

    pub fn with_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn with_owner(mut self, owner_kind: DocumentOwnerKind, owner_id: Uuid) -> Self {
        self.owner_kind = Some(owner_kind);
        self.owner_id = Some(owner_id);
        self
    }

    pub fn expiring_by(mut self, day: NaiveDate) -> Self {
        self.expires_on_or_before = Some(day);
        self
    }
}

pub struct Documents {
    db: PgPool,
}

impl Documents {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &DocumentFilter) {
        if let Some(company_id) = filter.company_id {
            query.push(" AND company_id = ");
            query.push_bind(company_id);
        }
        if let Some(owner_kind) = filter.owner_kind {
            query.push(" AND owner_kind = ");
            query.push_bind(owner_kind);
        }
        if let Some(owner_id) = filter.owner_id {
            query.push(" AND owner_id = ");
            query.push_bind(owner_id);
        }
        if let Some(doc_type) = filter.doc_type {
            query.push(" AND doc_type = ");
            query.push_bind(doc_type);
        }
        if let Some(day) = filter.expires_on_or_before {
            query.push(" AND expires_on IS NOT NULL AND expires_on <= ");
            query.push_bind(day);
        }
        if let Some(ref search) = filter.search {
            let pattern = format!("%{search}%");
            query.push(" AND (number ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR COALESCE(notes, '') ILIKE ");
            query.push_bind(pattern);
            query.push(")");
        }
    }
}

#[async_trait::async_trait]
impl Repository for Documents {
    type CreateRequest = DocumentCreateDBRequest;
    type UpdateRequest = DocumentUpdateDBRequest;
    type Response = DocumentDBResponse;
    type Id = DocumentId;
    type Filter = DocumentFilter;

    #[instrument(skip(self, request), fields(owner_kind = request.owner_kind.as_str(), owner_id = %abbrev_uuid(&request.owner_id)), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let document = sqlx::query_as::<_, DocumentDBResponse>(
            r#"
            INSERT INTO documents (id, company_id, owner_kind, owner_id, doc_type, number, issued_on, expires_on,
                                   file_url, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.company_id)
        .bind(request.owner_kind)
        .bind(request.owner_id)
        .bind(request.doc_type)
        .bind(&request.number)
        .bind(request.issued_on)
        .bind(request.expires_on)
        .bind(&request.file_url)
        .bind(&request.notes)
        .fetch_one(&self.db)
        .await?;

        Ok(document)
    }

    #[instrument(skip(self), fields(document_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let document = sqlx::query_as::<_, DocumentDBResponse>("SELECT * FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(document)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let documents = sqlx::query_as::<_, DocumentDBResponse>("SELECT * FROM documents WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.db)
            .await?;
        Ok(documents.into_iter().map(|d| (d.id, d)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM documents WHERE 1=1");
        Self::push_filters(&mut query, filter);
        query.push(" ORDER BY created_at DESC, id ASC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let documents = query.build_query_as::<DocumentDBResponse>().fetch_all(&self.db).await?;
        Ok(documents)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM documents WHERE 1=1");
        Self::push_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self, request), fields(document_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let document = sqlx::query_as::<_, DocumentDBResponse>(
            r#"
            UPDATE documents SET
                doc_type = COALESCE($2, doc_type),
                number = COALESCE($3, number),
                issued_on = COALESCE($4, issued_on),
                expires_on = COALESCE($5, expires_on),
                file_url = COALESCE($6, file_url),
                notes = COALESCE($7, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.doc_type)
        .bind(&request.number)
        .bind(request.issued_on)
        .bind(request.expires_on)
        .bind(&request.file_url)
        .bind(&request.notes)
        .fetch_optional(&self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(document)
    }

    #[instrument(skip(self), fields(document_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1").bind(id).execute(&self.db).await?;
        Ok(result.rows_affected() > 0)
    }
}

impl InMemoryRecord for DocumentDBResponse {
    type Create = DocumentCreateDBRequest;
    type Update = DocumentUpdateDBRequest;
    type Filter = DocumentFilter;

    const TABLE: &'static str = "documents";

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(id: Uuid, now: DateTime<Utc>, request: &Self::Create) -> Self {
        Self {
            id,
            company_id: request.company_id,
            owner_kind: request.owner_kind,
            owner_id: request.owner_id,
            doc_type: request.doc_type,
            number: request.number.clone(),
            issued_on: request.issued_on,
            expires_on: request.expires_on,
            file_url: request.file_url.clone(),
            notes: request.notes.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_update(&mut self, request: &Self::Update, now: DateTime<Utc>) {
        if let Some(doc_type) = request.doc_type {
            self.doc_type = doc_type;
        }
        if let Some(number) = &request.number {
            self.number = number.clone();
        }
        if let Some(issued_on) = request.issued_on {
            self.issued_on = Some(issued_on);
        }
        if let Some(expires_on) = request.expires_on {
            self.expires_on = Some(expires_on);
        }
        if let Some(file_url) = &request.file_url {
            self.file_url = Some(file_url.clone());
        }
        if let Some(notes) = &request.notes {
            self.notes = Some(notes.clone());
        }
        self.updated_at = now;
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        matches_opt(&filter.company_id, &self.company_id)
            && matches_opt(&filter.owner_kind, &self.owner_kind)
            && matches_opt(&filter.owner_id, &self.owner_id)
            && matches_opt(&filter.doc_type, &self.doc_type)
            && filter
                .expires_on_or_before
                .is_none_or(|day| self.expires_on.is_some_and(|expires| expires <= day))
            && filter
                .search
                .as_deref()
                .is_none_or(|s| contains_ci(&self.number, s) || opt_contains_ci(self.notes.as_deref(), s))
    }

    fn page(filter: &Self::Filter) -> (i64, i64) {
        (filter.skip, filter.limit)
    }

    fn compare(&self, other: &Self) -> Ordering {
        other.created_at.cmp(&self.created_at)
    }
}
