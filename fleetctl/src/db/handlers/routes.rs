//! Database repository for routes.

use crate::api::models::routes::{RouteShift, RouteStatus};
use crate::db::errors::{DbError, Result};
use crate::db::handlers::in_memory::{InMemoryRecord, contains_ci, matches_nullable, matches_opt};
use crate::db::handlers::repository::Repository;
use crate::db::models::routes::{RouteCreateDBRequest, RouteDBResponse, RouteUpdateDBRequest};
use crate::types::{CarrierId, CompanyId, DriverId, RouteId, VehicleId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing routes
#[derive(Debug, Clone)]
pub struct RouteFilter {
    pub skip: i64,
    pub limit: i64,
    pub company_id: Option<CompanyId>,
    pub carrier_id: Option<CarrierId>,
    pub driver_id: Option<DriverId>,
    pub vehicle_id: Option<VehicleId>,
    pub status: Option<RouteStatus>,
    pub shift: Option<RouteShift>,
    /// Case-insensitive substring search on code, name, origin and destination
    pub search: Option<String>,
}

impl RouteFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            company_id: None,
            carrier_id: None,
            driver_id: None,
            vehicle_id: None,
            status: None,
            shift: None,
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

    pub fn with_driver(mut self, driver_id: DriverId) -> Self {
        self.driver_id = Some(driver_id);
        self
    }

    pub fn with_vehicle(mut self, vehicle_id: VehicleId) -> Self {
        self.vehicle_id = Some(vehicle_id);
        self
    }

    pub fn with_status(mut self, status: RouteStatus) -> Self {
        self.status = Some(status);
        self
    }
}

pub struct Routes {
    db: PgPool,
}

impl Routes {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &RouteFilter) {
        if let Some(company_id) = filter.company_id {
            query.push(" AND company_id = ");
            query.push_bind(company_id);
        }
        if let Some(carrier_id) = filter.carrier_id {
            query.push(" AND carrier_id = ");
            query.push_bind(carrier_id);
        }
        if let Some(driver_id) = filter.driver_id {
            query.push(" AND driver_id = ");
            query.push_bind(driver_id);
        }
        if let Some(vehicle_id) = filter.vehicle_id {
            query.push(" AND vehicle_id = ");
            query.push_bind(vehicle_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ");
            query.push_bind(status);
        }
        if let Some(shift) = filter.shift {
            query.push(" AND shift = ");
            query.push_bind(shift);
        }
        if let Some(ref search) = filter.search {
            let pattern = format!("%{search}%");
            query.push(" AND (code ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR name ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR origin ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR destination ILIKE ");
            query.push_bind(pattern);
            query.push(")");
        }
    }
}

#[async_trait::async_trait]
impl Repository for Routes {
    type CreateRequest = RouteCreateDBRequest;
    type UpdateRequest = RouteUpdateDBRequest;
    type Response = RouteDBResponse;
    type Id = RouteId;
    type Filter = RouteFilter;

    #[instrument(skip(self, request), fields(code = %request.code, company_id = %abbrev_uuid(&request.company_id)), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let route = sqlx::query_as::<_, RouteDBResponse>(
            r#"
            INSERT INTO routes (id, company_id, carrier_id, driver_id, vehicle_id, code, name, origin,
                                destination, distance_km, departure_time, shift, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.company_id)
        .bind(request.carrier_id)
        .bind(request.driver_id)
        .bind(request.vehicle_id)
        .bind(&request.code)
        .bind(&request.name)
        .bind(&request.origin)
        .bind(&request.destination)
        .bind(request.distance_km)
        .bind(request.departure_time)
        .bind(request.shift)
        .bind(request.status)
        .fetch_one(&self.db)
        .await?;

        Ok(route)
    }

    #[instrument(skip(self), fields(route_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let route = sqlx::query_as::<_, RouteDBResponse>("SELECT * FROM routes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(route)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let routes = sqlx::query_as::<_, RouteDBResponse>("SELECT * FROM routes WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.db)
            .await?;
        Ok(routes.into_iter().map(|r| (r.id, r)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM routes WHERE 1=1");
        Self::push_filters(&mut query, filter);
        query.push(" ORDER BY code ASC, id ASC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let routes = query.build_query_as::<RouteDBResponse>().fetch_all(&self.db).await?;
        Ok(routes)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM routes WHERE 1=1");
        Self::push_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self, request), fields(route_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let route = sqlx::query_as::<_, RouteDBResponse>(
            r#"
            UPDATE routes SET
                carrier_id = CASE WHEN $2 THEN $3 ELSE carrier_id END,
                driver_id = CASE WHEN $4 THEN $5 ELSE driver_id END,
                vehicle_id = CASE WHEN $6 THEN $7 ELSE vehicle_id END,
                code = COALESCE($8, code),
                name = COALESCE($9, name),
                origin = COALESCE($10, origin),
                destination = COALESCE($11, destination),
                distance_km = COALESCE($12, distance_km),
                departure_time = COALESCE($13, departure_time),
                shift = COALESCE($14, shift),
                status = COALESCE($15, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.carrier_id.is_some())
        .bind(request.carrier_id.flatten())
        .bind(request.driver_id.is_some())
        .bind(request.driver_id.flatten())
        .bind(request.vehicle_id.is_some())
        .bind(request.vehicle_id.flatten())
        .bind(&request.code)
        .bind(&request.name)
        .bind(&request.origin)
        .bind(&request.destination)
        .bind(request.distance_km)
        .bind(request.departure_time)
        .bind(request.shift)
        .bind(request.status)
        .fetch_optional(&self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(route)
    }

    #[instrument(skip(self), fields(route_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM routes WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| DbError::from(e).protect_on_delete("route", id))?;
        Ok(result.rows_affected() > 0)
    }
}

impl InMemoryRecord for RouteDBResponse {
    type Create = RouteCreateDBRequest;
    type Update = RouteUpdateDBRequest;
    type Filter = RouteFilter;

    const TABLE: &'static str = "routes";

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(id: Uuid, now: DateTime<Utc>, request: &Self::Create) -> Self {
        Self {
            id,
            company_id: request.company_id,
            carrier_id: request.carrier_id,
            driver_id: request.driver_id,
            vehicle_id: request.vehicle_id,
            code: request.code.clone(),
            name: request.name.clone(),
            origin: request.origin.clone(),
            destination: request.destination.clone(),
            distance_km: request.distance_km,
            departure_time: request.departure_time,
            shift: request.shift,
            status: request.status,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_update(&mut self, request: &Self::Update, now: DateTime<Utc>) {
        if let Some(carrier_id) = request.carrier_id {
            self.carrier_id = carrier_id;
        }
        if let Some(driver_id) = request.driver_id {
            self.driver_id = driver_id;
        }
        if let Some(vehicle_id) = request.vehicle_id {
            self.vehicle_id = vehicle_id;
        }
        if let Some(code) = &request.code {
            self.code = code.clone();
        }
        if let Some(name) = &request.name {
            self.name = name.clone();
        }
        if let Some(origin) = &request.origin {
            self.origin = origin.clone();
        }
        if let Some(destination) = &request.destination {
            self.destination = destination.clone();
        }
        if let Some(distance_km) = request.distance_km {
            self.distance_km = distance_km;
        }
        if let Some(departure_time) = request.departure_time {
            self.departure_time = Some(departure_time);
        }
        if let Some(shift) = request.shift {
            self.shift = shift;
        }
        if let Some(status) = request.status {
            self.status = status;
        }
        self.updated_at = now;
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        matches_opt(&filter.company_id, &self.company_id)
            && matches_nullable(&filter.carrier_id, &self.carrier_id)
            && matches_nullable(&filter.driver_id, &self.driver_id)
            && matches_nullable(&filter.vehicle_id, &self.vehicle_id)
            && matches_opt(&filter.status, &self.status)
            && matches_opt(&filter.shift, &self.shift)
            && filter.search.as_deref().is_none_or(|s| {
                contains_ci(&self.code, s)
                    || contains_ci(&self.name, s)
                    || contains_ci(&self.origin, s)
                    || contains_ci(&self.destination, s)
            })
    }

    fn page(filter: &Self::Filter) -> (i64, i64) {
        (filter.skip, filter.limit)
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.code.cmp(&other.code)
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("routes_company_code_key", format!("{}, {}", self.company_id, self.code))]
    }
}
