//! Database repository for trips.

use crate::api::models::trips::TripStatus;
use crate::db::errors::{DbError, Result};
use crate::db::handlers::in_memory::{InMemoryRecord, matches_nullable, matches_opt};
use crate::db::handlers::repository::Repository;
use crate::db::models::trips::{TripCreateDBRequest, TripDBResponse, TripUpdateDBRequest};
use crate::types::{CarrierId, CompanyId, DriverId, RouteId, TripId, VehicleId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing trips
#[derive(Debug, Clone)]
pub struct TripFilter {
    pub skip: i64,
    pub limit: i64,
    pub company_id: Option<CompanyId>,
    pub carrier_id: Option<CarrierId>,
    pub route_id: Option<RouteId>,
    pub driver_id: Option<DriverId>,
    pub vehicle_id: Option<VehicleId>,
    pub status: Option<TripStatus>,
    /// Scheduled at or after (inclusive)
    pub from: Option<DateTime<Utc>>,
    /// Scheduled before (exclusive)
    pub to: Option<DateTime<Utc>>,
}

impl TripFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            company_id: None,
            carrier_id: None,
            route_id: None,
            driver_id: None,
            vehicle_id: None,
            status: None,
            from: None,
            to: None,
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

    pub fn with_route(mut self, route_id: RouteId) -> Self {
        self.route_id = Some(route_id);
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

    pub fn with_status(mut self, status: TripStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn scheduled_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }
}

pub struct Trips {
    db: PgPool,
}

impl Trips {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &TripFilter) {
        if let Some(company_id) = filter.company_id {
            query.push(" AND company_id = ");
            query.push_bind(company_id);
        }
        if let Some(carrier_id) = filter.carrier_id {
            query.push(" AND carrier_id = ");
            query.push_bind(carrier_id);
        }
        if let Some(route_id) = filter.route_id {
            query.push(" AND route_id = ");
            query.push_bind(route_id);
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
        if let Some(from) = filter.from {
            query.push(" AND scheduled_for >= ");
            query.push_bind(from);
        }
        if let Some(to) = filter.to {
            query.push(" AND scheduled_for < ");
            query.push_bind(to);
        }
    }
}

#[async_trait::async_trait]
impl Repository for Trips {
    type CreateRequest = TripCreateDBRequest;
    type UpdateRequest = TripUpdateDBRequest;
    type Response = TripDBResponse;
    type Id = TripId;
    type Filter = TripFilter;

    #[instrument(skip(self, request), fields(route_id = %abbrev_uuid(&request.route_id)), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let trip = sqlx::query_as::<_, TripDBResponse>(
            r#"
            INSERT INTO trips (id, company_id, route_id, carrier_id, driver_id, vehicle_id, scheduled_for,
                               status, passenger_count, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'scheduled', $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.company_id)
        .bind(request.route_id)
        .bind(request.carrier_id)
        .bind(request.driver_id)
        .bind(request.vehicle_id)
        .bind(request.scheduled_for)
        .bind(request.passenger_count)
        .bind(&request.notes)
        .fetch_one(&self.db)
        .await?;

        Ok(trip)
    }

    #[instrument(skip(self), fields(trip_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let trip = sqlx::query_as::<_, TripDBResponse>("SELECT * FROM trips WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(trip)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let trips = sqlx::query_as::<_, TripDBResponse>("SELECT * FROM trips WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.db)
            .await?;
        Ok(trips.into_iter().map(|t| (t.id, t)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM trips WHERE 1=1");
        Self::push_filters(&mut query, filter);
        query.push(" ORDER BY scheduled_for DESC, id ASC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let trips = query.build_query_as::<TripDBResponse>().fetch_all(&self.db).await?;
        Ok(trips)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM trips WHERE 1=1");
        Self::push_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self, request), fields(trip_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let trip = sqlx::query_as::<_, TripDBResponse>(
            r#"
            UPDATE trips SET
                status = COALESCE($2, status),
                driver_id = CASE WHEN $3 THEN $4 ELSE driver_id END,
                vehicle_id = CASE WHEN $5 THEN $6 ELSE vehicle_id END,
                started_at = COALESCE($7, started_at),
                finished_at = COALESCE($8, finished_at),
                passenger_count = COALESCE($9, passenger_count),
                start_odometer_km = COALESCE($10, start_odometer_km),
                end_odometer_km = COALESCE($11, end_odometer_km),
                notes = COALESCE($12, notes),
                cancellation_reason = COALESCE($13, cancellation_reason),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.status)
        .bind(request.driver_id.is_some())
        .bind(request.driver_id.flatten())
        .bind(request.vehicle_id.is_some())
        .bind(request.vehicle_id.flatten())
        .bind(request.started_at)
        .bind(request.finished_at)
        .bind(request.passenger_count)
        .bind(request.start_odometer_km)
        .bind(request.end_odometer_km)
        .bind(&request.notes)
        .bind(&request.cancellation_reason)
        .fetch_optional(&self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(trip)
    }

    #[instrument(skip(self), fields(trip_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| DbError::from(e).protect_on_delete("trip", id))?;
        Ok(result.rows_affected() > 0)
    }
}

impl InMemoryRecord for TripDBResponse {
    type Create = TripCreateDBRequest;
    type Update = TripUpdateDBRequest;
    type Filter = TripFilter;

    const TABLE: &'static str = "trips";

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(id: Uuid, now: DateTime<Utc>, request: &Self::Create) -> Self {
        Self {
            id,
            company_id: request.company_id,
            route_id: request.route_id,
            carrier_id: request.carrier_id,
            driver_id: request.driver_id,
            vehicle_id: request.vehicle_id,
            scheduled_for: request.scheduled_for,
            started_at: None,
            finished_at: None,
            status: TripStatus::Scheduled,
            passenger_count: request.passenger_count,
            start_odometer_km: None,
            end_odometer_km: None,
            notes: request.notes.clone(),
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_update(&mut self, request: &Self::Update, now: DateTime<Utc>) {
        if let Some(status) = request.status {
            self.status = status;
        }
        if let Some(driver_id) = request.driver_id {
            self.driver_id = driver_id;
        }
        if let Some(vehicle_id) = request.vehicle_id {
            self.vehicle_id = vehicle_id;
        }
        if let Some(started_at) = request.started_at {
            self.started_at = Some(started_at);
        }
        if let Some(finished_at) = request.finished_at {
            self.finished_at = Some(finished_at);
        }
        if let Some(count) = request.passenger_count {
            self.passenger_count = Some(count);
        }
        if let Some(km) = request.start_odometer_km {
            self.start_odometer_km = Some(km);
        }
        if let Some(km) = request.end_odometer_km {
            self.end_odometer_km = Some(km);
        }
        if let Some(notes) = &request.notes {
            self.notes = Some(notes.clone());
        }
        if let Some(reason) = &request.cancellation_reason {
            self.cancellation_reason = Some(reason.clone());
        }
        self.updated_at = now;
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        matches_opt(&filter.company_id, &self.company_id)
            && matches_nullable(&filter.carrier_id, &self.carrier_id)
            && matches_opt(&filter.route_id, &self.route_id)
            && matches_nullable(&filter.driver_id, &self.driver_id)
            && matches_nullable(&filter.vehicle_id, &self.vehicle_id)
            && matches_opt(&filter.status, &self.status)
            && filter.from.is_none_or(|from| self.scheduled_for >= from)
            && filter.to.is_none_or(|to| self.scheduled_for < to)
    }

    fn page(filter: &Self::Filter) -> (i64, i64) {
        (filter.skip, filter.limit)
    }

    fn compare(&self, other: &Self) -> Ordering {
        other.scheduled_for.cmp(&self.scheduled_for)
    }
}
