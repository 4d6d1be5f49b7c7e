//! Database repository for drivers.

use crate::api::models::drivers::DriverStatus;
use crate::db::errors::{DbError, Result};
use crate::db::handlers::in_memory::{InMemoryRecord, contains_ci, matches_nullable, matches_opt, opt_contains_ci};
use crate::db::handlers::repository::Repository;
use crate::db::models::drivers::{DriverCreateDBRequest, DriverDBResponse, DriverUpdateDBRequest};
use crate::types::{CarrierId, CompanyId, DriverId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing drivers
#[derive(Debug, Clone)]
pub struct DriverFilter {
    pub skip: i64,
    pub limit: i64,
    pub company_id: Option<CompanyId>,
    pub carrier_id: Option<CarrierId>,
    pub status: Option<DriverStatus>,
    /// Case-insensitive substring search on name, document and license number
    pub search: Option<String>,
}

impl DriverFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            company_id: None,
            carrier_id: None,
            status: None,
            search: None,
        }
    }

    pub fn with_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn with_carrier(mut self, carrier_id: CarrierId) -> Self {
        self.carrier_id = Some(carrier_id);
        self
    }

    pub fn with_status(mut self, status: DriverStatus) -> Self {
        self.status = Some(status);
        self
    }
}

pub struct Drivers {
    db: PgPool,
}

impl Drivers {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &DriverFilter) {
        if let Some(company_id) = filter.company_id {
            query.push(" AND company_id = ");
            query.push_bind(company_id);
        }
        if let Some(carrier_id) = filter.carrier_id {
            query.push(" AND carrier_id = ");
            query.push_bind(carrier_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ");
            query.push_bind(status);
        }
        if let Some(ref search) = filter.search {
            let pattern = format!("%{search}%");
            query.push(" AND (name ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR document_number ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR COALESCE(license_number, '') ILIKE ");
            query.push_bind(pattern);
            query.push(")");
        }
    }
}

#[async_trait::async_trait]
impl Repository for Drivers {
    type CreateRequest = DriverCreateDBRequest;
    type UpdateRequest = DriverUpdateDBRequest;
    type Response = DriverDBResponse;
    type Id = DriverId;
    type Filter = DriverFilter;

    #[instrument(skip(self, request), fields(company_id = %abbrev_uuid(&request.company_id)), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let driver = sqlx::query_as::<_, DriverDBResponse>(
            r#"
            INSERT INTO drivers (id, company_id, carrier_id, name, document_number, license_number,
                                 license_category, license_expires_on, phone, email, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.company_id)
        .bind(request.carrier_id)
        .bind(&request.name)
        .bind(&request.document_number)
        .bind(&request.license_number)
        .bind(&request.license_category)
        .bind(request.license_expires_on)
        .bind(&request.phone)
        .bind(&request.email)
        .bind(request.status)
        .fetch_one(&self.db)
        .await?;

        Ok(driver)
    }

    #[instrument(skip(self), fields(driver_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let driver = sqlx::query_as::<_, DriverDBResponse>("SELECT * FROM drivers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(driver)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let drivers = sqlx::query_as::<_, DriverDBResponse>("SELECT * FROM drivers WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.db)
            .await?;
        Ok(drivers.into_iter().map(|d| (d.id, d)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM drivers WHERE 1=1");
        Self::push_filters(&mut query, filter);
        query.push(" ORDER BY name ASC, id ASC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let drivers = query.build_query_as::<DriverDBResponse>().fetch_all(&self.db).await?;
        Ok(drivers)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM drivers WHERE 1=1");
        Self::push_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self, request), fields(driver_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let driver = sqlx::query_as::<_, DriverDBResponse>(
            r#"
            UPDATE drivers SET
                carrier_id = CASE WHEN $2 THEN $3 ELSE carrier_id END,
                name = COALESCE($4, name),
                document_number = COALESCE($5, document_number),
                license_number = COALESCE($6, license_number),
                license_category = COALESCE($7, license_category),
                license_expires_on = COALESCE($8, license_expires_on),
                phone = COALESCE($9, phone),
                email = COALESCE($10, email),
                status = COALESCE($11, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.carrier_id.is_some())
        .bind(request.carrier_id.flatten())
        .bind(&request.name)
        .bind(&request.document_number)
        .bind(&request.license_number)
        .bind(&request.license_category)
        .bind(request.license_expires_on)
        .bind(&request.phone)
        .bind(&request.email)
        .bind(request.status)
        .fetch_optional(&self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(driver)
    }

    #[instrument(skip(self), fields(driver_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM drivers WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| DbError::from(e).protect_on_delete("driver", id))?;
        Ok(result.rows_affected() > 0)
    }
}

impl InMemoryRecord for DriverDBResponse {
    type Create = DriverCreateDBRequest;
    type Update = DriverUpdateDBRequest;
    type Filter = DriverFilter;

    const TABLE: &'static str = "drivers";

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(id: Uuid, now: DateTime<Utc>, request: &Self::Create) -> Self {
        Self {
            id,
            company_id: request.company_id,
            carrier_id: request.carrier_id,
            name: request.name.clone(),
            document_number: request.document_number.clone(),
            license_number: request.license_number.clone(),
            license_category: request.license_category.clone(),
            license_expires_on: request.license_expires_on,
            phone: request.phone.clone(),
            email: request.email.clone(),
            status: request.status,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_update(&mut self, request: &Self::Update, now: DateTime<Utc>) {
        if let Some(carrier_id) = request.carrier_id {
            self.carrier_id = carrier_id;
        }
        if let Some(name) = &request.name {
            self.name = name.clone();
        }
        if let Some(document_number) = &request.document_number {
            self.document_number = document_number.clone();
        }
        if let Some(license_number) = &request.license_number {
            self.license_number = Some(license_number.clone());
        }
        if let Some(license_category) = &request.license_category {
            self.license_category = Some(license_category.clone());
        }
        if let Some(expires_on) = request.license_expires_on {
            self.license_expires_on = Some(expires_on);
        }
        if let Some(phone) = &request.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(email) = &request.email {
            self.email = Some(email.clone());
        }
        if let Some(status) = request.status {
            self.status = status;
        }
        self.updated_at = now;
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        matches_opt(&filter.company_id, &self.company_id)
            && matches_nullable(&filter.carrier_id, &self.carrier_id)
            && matches_opt(&filter.status, &self.status)
            && filter.search.as_deref().is_none_or(|s| {
                contains_ci(&self.name, s)
                    || contains_ci(&self.document_number, s)
                    || opt_contains_ci(self.license_number.as_deref(), s)
            })
    }

    fn page(filter: &Self::Filter) -> (i64, i64) {
        (filter.skip, filter.limit)
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![(
            "drivers_company_document_number_key",
            format!("{}, {}", self.company_id, self.document_number),
        )]
    }
}
