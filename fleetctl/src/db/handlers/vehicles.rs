//! Database repository for vehicles.

use crate::api::models::vehicles::{VehicleKind, VehicleStatus};
use crate::db::errors::{DbError, Result};
use crate::db::handlers::in_memory::{InMemoryRecord, contains_ci, matches_nullable, matches_opt, opt_contains_ci};
use crate::db::handlers::repository::Repository;
use crate::db::models::vehicles::{VehicleCreateDBRequest, VehicleDBResponse, VehicleUpdateDBRequest};
use crate::types::{CarrierId, CompanyId, VehicleId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing vehicles
#[derive(Debug, Clone)]
pub struct VehicleFilter {
    pub skip: i64,
    pub limit: i64,
    pub company_id: Option<CompanyId>,
    pub carrier_id: Option<CarrierId>,
    pub status: Option<VehicleStatus>,
    pub kind: Option<VehicleKind>,
    /// Case-insensitive substring search on plate, model and manufacturer
    pub search: Option<String>,
}

impl VehicleFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            company_id: None,
            carrier_id: None,
            status: None,
            kind: None,
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

    pub fn with_status(mut self, status: VehicleStatus) -> Self {
        self.status = Some(status);
        self
    }
}

pub struct Vehicles {
    db: PgPool,
}

impl Vehicles {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &VehicleFilter) {
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
        if let Some(kind) = filter.kind {
            query.push(" AND kind = ");
            query.push_bind(kind);
        }
        if let Some(ref search) = filter.search {
            let pattern = format!("%{search}%");
            query.push(" AND (plate ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR COALESCE(model, '') ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR COALESCE(manufacturer, '') ILIKE ");
            query.push_bind(pattern);
            query.push(")");
        }
    }
}

#[async_trait::async_trait]
impl Repository for Vehicles {
    type CreateRequest = VehicleCreateDBRequest;
    type UpdateRequest = VehicleUpdateDBRequest;
    type Response = VehicleDBResponse;
    type Id = VehicleId;
    type Filter = VehicleFilter;

    #[instrument(skip(self, request), fields(plate = %request.plate), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let vehicle = sqlx::query_as::<_, VehicleDBResponse>(
            r#"
            INSERT INTO vehicles (id, company_id, carrier_id, plate, model, manufacturer, year, capacity,
                                  kind, status, odometer_km)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.company_id)
        .bind(request.carrier_id)
        .bind(&request.plate)
        .bind(&request.model)
        .bind(&request.manufacturer)
        .bind(request.year)
        .bind(request.capacity)
        .bind(request.kind)
        .bind(request.status)
        .bind(request.odometer_km)
        .fetch_one(&self.db)
        .await?;

        Ok(vehicle)
    }

    #[instrument(skip(self), fields(vehicle_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let vehicle = sqlx::query_as::<_, VehicleDBResponse>("SELECT * FROM vehicles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(vehicle)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let vehicles = sqlx::query_as::<_, VehicleDBResponse>("SELECT * FROM vehicles WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.db)
            .await?;
        Ok(vehicles.into_iter().map(|v| (v.id, v)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM vehicles WHERE 1=1");
        Self::push_filters(&mut query, filter);
        query.push(" ORDER BY plate ASC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let vehicles = query.build_query_as::<VehicleDBResponse>().fetch_all(&self.db).await?;
        Ok(vehicles)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM vehicles WHERE 1=1");
        Self::push_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self, request), fields(vehicle_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let vehicle = sqlx::query_as::<_, VehicleDBResponse>(
            r#"
            UPDATE vehicles SET
                carrier_id = CASE WHEN $2 THEN $3 ELSE carrier_id END,
                plate = COALESCE($4, plate),
                model = COALESCE($5, model),
                manufacturer = COALESCE($6, manufacturer),
                year = COALESCE($7, year),
                capacity = COALESCE($8, capacity),
                kind = COALESCE($9, kind),
                status = COALESCE($10, status),
                odometer_km = COALESCE($11, odometer_km),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.carrier_id.is_some())
        .bind(request.carrier_id.flatten())
        .bind(&request.plate)
        .bind(&request.model)
        .bind(&request.manufacturer)
        .bind(request.year)
        .bind(request.capacity)
        .bind(request.kind)
        .bind(request.status)
        .bind(request.odometer_km)
        .fetch_optional(&self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(vehicle)
    }

    #[instrument(skip(self), fields(vehicle_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM vehicles WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| DbError::from(e).protect_on_delete("vehicle", id))?;
        Ok(result.rows_affected() > 0)
    }
}

impl InMemoryRecord for VehicleDBResponse {
    type Create = VehicleCreateDBRequest;
    type Update = VehicleUpdateDBRequest;
    type Filter = VehicleFilter;

    const TABLE: &'static str = "vehicles";

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(id: Uuid, now: DateTime<Utc>, request: &Self::Create) -> Self {
        Self {
            id,
            company_id: request.company_id,
            carrier_id: request.carrier_id,
            plate: request.plate.clone(),
            model: request.model.clone(),
            manufacturer: request.manufacturer.clone(),
            year: request.year,
            capacity: request.capacity,
            kind: request.kind,
            status: request.status,
            odometer_km: request.odometer_km,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_update(&mut self, request: &Self::Update, now: DateTime<Utc>) {
        if let Some(carrier_id) = request.carrier_id {
            self.carrier_id = carrier_id;
        }
        if let Some(plate) = &request.plate {
            self.plate = plate.clone();
        }
        if let Some(model) = &request.model {
            self.model = Some(model.clone());
        }
        if let Some(manufacturer) = &request.manufacturer {
            self.manufacturer = Some(manufacturer.clone());
        }
        if let Some(year) = request.year {
            self.year = Some(year);
        }
        if let Some(capacity) = request.capacity {
            self.capacity = Some(capacity);
        }
        if let Some(kind) = request.kind {
            self.kind = kind;
        }
        if let Some(status) = request.status {
            self.status = status;
        }
        if let Some(odometer_km) = request.odometer_km {
            self.odometer_km = odometer_km;
        }
        self.updated_at = now;
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        matches_opt(&filter.company_id, &self.company_id)
            && matches_nullable(&filter.carrier_id, &self.carrier_id)
            && matches_opt(&filter.status, &self.status)
            && matches_opt(&filter.kind, &self.kind)
            && filter.search.as_deref().is_none_or(|s| {
                contains_ci(&self.plate, s)
                    || opt_contains_ci(self.model.as_deref(), s)
                    || opt_contains_ci(self.manufacturer.as_deref(), s)
            })
    }

    fn page(filter: &Self::Filter) -> (i64, i64) {
        (filter.skip, filter.limit)
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.plate.cmp(&other.plate)
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("vehicles_plate_key", self.plate.clone())]
    }
}
