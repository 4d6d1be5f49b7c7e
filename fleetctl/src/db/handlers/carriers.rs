//! Database repository for carriers.

use crate::db::errors::{DbError, Result};
use crate::db::handlers::in_memory::{InMemoryRecord, contains_ci, matches_opt, opt_contains_ci};
use crate::db::handlers::repository::Repository;
use crate::db::models::carriers::{CarrierCreateDBRequest, CarrierDBResponse, CarrierUpdateDBRequest};
use crate::types::{CarrierId, CompanyId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing carriers
#[derive(Debug, Clone)]
pub struct CarrierFilter {
    pub skip: i64,
    pub limit: i64,
    pub company_id: Option<CompanyId>,
    /// Restrict to a single carrier (carrier users only see themselves)
    pub id: Option<CarrierId>,
    pub search: Option<String>,
    pub active: Option<bool>,
}

impl CarrierFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            company_id: None,
            id: None,
            search: None,
            active: None,
        }
    }

    pub fn with_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }
}

pub struct Carriers {
    db: PgPool,
}

impl Carriers {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &CarrierFilter) {
        if let Some(company_id) = filter.company_id {
            query.push(" AND company_id = ");
            query.push_bind(company_id);
        }
        if let Some(id) = filter.id {
            query.push(" AND id = ");
            query.push_bind(id);
        }
        if let Some(active) = filter.active {
            query.push(" AND active = ");
            query.push_bind(active);
        }
        if let Some(ref search) = filter.search {
            let pattern = format!("%{search}%");
            query.push(" AND (name ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR COALESCE(tax_id, '') ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR COALESCE(contact_name, '') ILIKE ");
            query.push_bind(pattern);
            query.push(")");
        }
    }
}

#[async_trait::async_trait]
impl Repository for Carriers {
    type CreateRequest = CarrierCreateDBRequest;
    type UpdateRequest = CarrierUpdateDBRequest;
    type Response = CarrierDBResponse;
    type Id = CarrierId;
    type Filter = CarrierFilter;

    #[instrument(skip(self, request), fields(company_id = %abbrev_uuid(&request.company_id), name = %request.name), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let carrier = sqlx::query_as::<_, CarrierDBResponse>(
            r#"
            INSERT INTO carriers (id, company_id, name, tax_id, contact_name, email, phone, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.company_id)
        .bind(&request.name)
        .bind(&request.tax_id)
        .bind(&request.contact_name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(request.active)
        .fetch_one(&self.db)
        .await?;

        Ok(carrier)
    }

    #[instrument(skip(self), fields(carrier_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let carrier = sqlx::query_as::<_, CarrierDBResponse>("SELECT * FROM carriers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(carrier)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let carriers = sqlx::query_as::<_, CarrierDBResponse>("SELECT * FROM carriers WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.db)
            .await?;
        Ok(carriers.into_iter().map(|c| (c.id, c)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM carriers WHERE 1=1");
        Self::push_filters(&mut query, filter);
        query.push(" ORDER BY name ASC, id ASC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let carriers = query.build_query_as::<CarrierDBResponse>().fetch_all(&self.db).await?;
        Ok(carriers)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM carriers WHERE 1=1");
        Self::push_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self, request), fields(carrier_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let carrier = sqlx::query_as::<_, CarrierDBResponse>(
            r#"
            UPDATE carriers SET
                name = COALESCE($2, name),
                tax_id = COALESCE($3, tax_id),
                contact_name = COALESCE($4, contact_name),
                email = COALESCE($5, email),
                phone = COALESCE($6, phone),
                active = COALESCE($7, active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.tax_id)
        .bind(&request.contact_name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(request.active)
        .fetch_optional(&self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(carrier)
    }

    #[instrument(skip(self), fields(carrier_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM carriers WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| DbError::from(e).protect_on_delete("carrier", id))?;
        Ok(result.rows_affected() > 0)
    }
}

impl InMemoryRecord for CarrierDBResponse {
    type Create = CarrierCreateDBRequest;
    type Update = CarrierUpdateDBRequest;
    type Filter = CarrierFilter;

    const TABLE: &'static str = "carriers";

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(id: Uuid, now: DateTime<Utc>, request: &Self::Create) -> Self {
        Self {
            id,
            company_id: request.company_id,
            name: request.name.clone(),
            tax_id: request.tax_id.clone(),
            contact_name: request.contact_name.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            active: request.active,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_update(&mut self, request: &Self::Update, now: DateTime<Utc>) {
        if let Some(name) = &request.name {
            self.name = name.clone();
        }
        if let Some(tax_id) = &request.tax_id {
            self.tax_id = Some(tax_id.clone());
        }
        if let Some(contact_name) = &request.contact_name {
            self.contact_name = Some(contact_name.clone());
        }
        if let Some(email) = &request.email {
            self.email = Some(email.clone());
        }
        if let Some(phone) = &request.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(active) = request.active {
            self.active = active;
        }
        self.updated_at = now;
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        matches_opt(&filter.company_id, &self.company_id)
            && matches_opt(&filter.id, &self.id)
            && matches_opt(&filter.active, &self.active)
            && filter.search.as_deref().is_none_or(|s| {
                contains_ci(&self.name, s)
                    || opt_contains_ci(self.tax_id.as_deref(), s)
                    || opt_contains_ci(self.contact_name.as_deref(), s)
            })
    }

    fn page(filter: &Self::Filter) -> (i64, i64) {
        (filter.skip, filter.limit)
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}
